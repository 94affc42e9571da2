/*!
 * Selection Engine
 *
 * One connection, one invisible coordination window and one event loop
 * thread per engine. Requests to the server may be issued from any thread;
 * only the loop reads events. The loop answers conversion requests for
 * boards we own, routes conversion replies to waiting requestors and turns
 * owner-change notifications into monitor refreshes.
 */

use super::atoms::AtomCache;
use super::monitor::MonitorRegistry;
use super::owner::OwnershipTable;
use super::pending::PendingReplies;
use crate::core::config::ClipboardConfig;
use crate::core::errors::{ClipboardError, ClipboardResult};
use crate::core::limits::{EVENT_LOOP_THREAD_NAME, TRANSFER_SLOTS};
use crate::core::types::{Atom, Board, Window, NONE};
use crate::transport::{Connector, Event, SelectionNotify, Transport};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// Name prefix of the properties replies are written to on our window
pub const TRANSFER_PROPERTY: &str = "CLIPSEL_TRANSFER";

/// Atoms interned once at startup
#[derive(Debug, Clone, Copy)]
pub struct WellKnownAtoms {
    pub clipboard: Atom,
    pub primary: Atom,
    pub secondary: Atom,
    pub targets: Atom,
    pub save_targets: Atom,
    pub multiple: Atom,
    pub incr: Atom,
    pub utf8_string: Atom,
    pub compound_text: Atom,
    pub text: Atom,
    pub string: Atom,
}

impl WellKnownAtoms {
    fn intern(atoms: &AtomCache) -> ClipboardResult<Self> {
        Ok(Self {
            clipboard: atoms.intern("CLIPBOARD")?,
            primary: atoms.intern("PRIMARY")?,
            secondary: atoms.intern("SECONDARY")?,
            targets: atoms.intern("TARGETS")?,
            save_targets: atoms.intern("SAVE_TARGETS")?,
            multiple: atoms.intern("MULTIPLE")?,
            incr: atoms.intern("INCR")?,
            utf8_string: atoms.intern("UTF8_STRING")?,
            compound_text: atoms.intern("COMPOUND_TEXT")?,
            text: atoms.intern("TEXT")?,
            string: atoms.intern("STRING")?,
        })
    }

    /// Selection atom of a board
    pub fn selection(&self, board: Board) -> ClipboardResult<Atom> {
        match board {
            Board::Default => Ok(self.clipboard),
            Board::PrimarySelection => Ok(self.primary),
            Board::SecondarySelection => Ok(self.secondary),
            Board::Invalid => Err(ClipboardError::BoardUnsupported(board)),
        }
    }

    /// Board of a selection atom, `Invalid` for anything else
    #[must_use]
    pub fn board(&self, selection: Atom) -> Board {
        if selection == self.clipboard {
            Board::Default
        } else if selection == self.primary {
            Board::PrimarySelection
        } else if selection == self.secondary {
            Board::SecondarySelection
        } else {
            Board::Invalid
        }
    }

    /// Legacy text aliases advertised for text payloads
    #[must_use]
    pub fn text_aliases(&self) -> [Atom; 4] {
        [self.utf8_string, self.compound_text, self.text, self.string]
    }
}

/// Transfer properties handed out round-robin, one per conversion request
pub(super) struct TransferSlots {
    atoms: Vec<Atom>,
    next: AtomicUsize,
}

impl TransferSlots {
    fn intern(atoms: &AtomCache) -> ClipboardResult<Self> {
        let atoms = (0..TRANSFER_SLOTS)
            .map(|i| atoms.intern(&format!("{TRANSFER_PROPERTY}_{i}")))
            .collect::<ClipboardResult<Vec<_>>>()?;
        Ok(Self {
            atoms,
            next: AtomicUsize::new(0),
        })
    }

    pub(super) fn next(&self) -> Atom {
        let i = self.next.fetch_add(1, Ordering::Relaxed);
        self.atoms[i % self.atoms.len()]
    }

    pub(super) fn contains(&self, property: Atom) -> bool {
        self.atoms.contains(&property)
    }
}

/// Selection ownership and transfer engine
pub struct SelectionEngine {
    pub(super) config: ClipboardConfig,
    pub(super) transport: Arc<dyn Transport>,
    pub(super) window: Window,
    pub(super) atoms: AtomCache,
    pub(super) well_known: WellKnownAtoms,
    pub(super) transfers: TransferSlots,
    pub(super) owned: OwnershipTable,
    pub(super) pending: PendingReplies,
    pub(super) monitors: MonitorRegistry,
    // Start of the unanswered poll, if any
    pub(super) poll_pending: Mutex<Option<Instant>>,
    running: AtomicBool,
    // Dropped when the loop exits, which wakes every waiter
    closed_tx: Mutex<Option<flume::Sender<()>>>,
    pub(super) closed_rx: flume::Receiver<()>,
}

impl SelectionEngine {
    /// Connect, create the coordination window and start the event loop
    ///
    /// Setup runs on the calling thread so its errors reach the caller.
    pub fn start(config: ClipboardConfig, connector: &Connector) -> ClipboardResult<Arc<Self>> {
        let transport = connector()?;
        let atoms = AtomCache::new(Arc::clone(&transport));
        let well_known = WellKnownAtoms::intern(&atoms)?;
        let transfers = TransferSlots::intern(&atoms)?;
        let window = transport.create_window(&config.window_title)?;

        for board in &config.boards {
            transport.watch_selection(window, well_known.selection(*board)?)?;
        }
        transport.flush()?;

        let (closed_tx, closed_rx) = flume::bounded(1);
        let engine = Arc::new(Self {
            pending: PendingReplies::new(config.reply_queue_depth),
            config,
            transport,
            window,
            atoms,
            well_known,
            transfers,
            owned: OwnershipTable::new(),
            monitors: MonitorRegistry::new(),
            poll_pending: Mutex::new(None),
            running: AtomicBool::new(true),
            closed_tx: Mutex::new(Some(closed_tx)),
            closed_rx,
        });

        let worker = Arc::clone(&engine);
        thread::Builder::new()
            .name(EVENT_LOOP_THREAD_NAME.to_string())
            .spawn(move || worker.run())
            .map_err(|e| {
                ClipboardError::ConnectionUnavailable(format!("failed to spawn event loop: {e}"))
            })?;

        info!(
            window = engine.window,
            boards = ?engine.config.boards,
            "Selection engine started"
        );
        Ok(engine)
    }

    #[inline]
    #[must_use]
    pub fn window(&self) -> Window {
        self.window
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ClipboardConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn atoms(&self) -> &AtomCache {
        &self.atoms
    }

    #[inline]
    #[must_use]
    pub fn well_known(&self) -> &WellKnownAtoms {
        &self.well_known
    }

    /// False once the event loop has exited
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(super) fn ensure_running(&self) -> ClipboardResult<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(ClipboardError::ConnectionUnavailable(
                "connection to display lost".into(),
            ))
        }
    }

    pub(super) fn ensure_board(&self, board: Board) -> ClipboardResult<Atom> {
        if !self.config.supports(board) {
            return Err(ClipboardError::BoardUnsupported(board));
        }
        self.well_known.selection(board)
    }

    fn run(self: Arc<Self>) {
        debug!(window = self.window, "event loop running");

        loop {
            match self.transport.wait_for_event() {
                Ok(event) => {
                    self.dispatch(event);
                    if let Err(e) = self.transport.flush() {
                        warn!(error = %e, "flush after event failed");
                    }
                }
                Err(e) => {
                    error!(error = %e, "Event loop stopping: display connection unusable");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::Release);
        self.closed_tx.lock().take();
    }

    fn dispatch(self: &Arc<Self>, event: Event) {
        match event {
            Event::SelectionRequest(request) => self.answer_request(&request),
            Event::SelectionNotify(notify) => self.route_notify(notify),
            Event::SelectionClear { selection, .. } => self.handle_clear(selection),
            Event::OwnerChange {
                owner,
                selection,
                selection_timestamp,
                ..
            } => self.handle_owner_change(owner, selection, selection_timestamp),
            Event::PropertyNotify {
                window,
                atom,
                deleted,
            } => trace!(window, atom, deleted, "property notify"),
            Event::Error { code, major, minor } => {
                warn!(code, major, minor, "display reported a protocol error");
            }
            Event::Other(kind) => trace!(kind, "ignored event"),
        }
    }

    fn route_notify(self: &Arc<Self>, notify: SelectionNotify) {
        let board = self.well_known.board(notify.selection);
        if board == Board::Invalid {
            debug!(selection = notify.selection, "reply for unknown selection");
            return;
        }

        let targets = self.well_known.targets;

        if notify.property == targets {
            // Refresh reply: our monitor asked for TARGETS into TARGETS
            self.pending.take_refresh(board);
            self.settle_poll();
            self.deliver_refresh(board, notify.property);
            return;
        }

        if notify.property == NONE && notify.target == targets && self.pending.take_refresh(board)
        {
            self.settle_poll();
            debug!(board = %board, "refresh refused by owner");
            return;
        }

        if self.transfers.contains(notify.property) || notify.property == NONE {
            if !self.pending.deliver(board, notify) {
                warn!(board = %board, target = notify.target, "reply queue full, reply dropped");
            }
            return;
        }

        warn!(
            board = %board,
            target = notify.target,
            property = notify.property,
            "unexpected selection notify"
        );
    }

    fn handle_clear(&self, selection: Atom) {
        let board = self.well_known.board(selection);
        if board == Board::Invalid {
            return;
        }

        // A stale clear may arrive after we re-claimed the board
        match self.transport.selection_owner(selection) {
            Ok(owner) if owner == self.window => {
                debug!(board = %board, "ignoring stale selection clear");
            }
            _ => {
                if self.owned.remove(board).is_some() {
                    info!(board = %board, "Selection ownership lost");
                }
            }
        }
    }

    fn handle_owner_change(&self, owner: Window, selection: Atom, time: u32) {
        let board = self.well_known.board(selection);
        if owner == self.window || board == Board::Invalid {
            trace!(owner, selection, "owner change ignored");
            return;
        }
        if owner == NONE {
            debug!(board = %board, "board has no owner");
            return;
        }
        if self.monitors.is_empty() {
            return;
        }

        if let Err(e) = self.request_refresh(board, selection, time) {
            warn!(board = %board, error = %e, "failed to request target refresh");
        }
    }

    /// End the pending poll once every refresh has been answered
    fn settle_poll(&self) {
        if self.pending.total_refreshes() == 0 {
            *self.poll_pending.lock() = None;
        }
    }

    /// Ask the owner of `selection` for its targets on behalf of monitors
    pub(super) fn request_refresh(
        &self,
        board: Board,
        selection: Atom,
        time: u32,
    ) -> ClipboardResult<()> {
        let targets = self.well_known.targets;
        self.pending.note_refresh(board)?;
        if let Err(e) = self
            .transport
            .convert_selection(self.window, selection, targets, targets, time)
        {
            self.pending.take_refresh(board);
            return Err(e.into());
        }
        Ok(())
    }
}

impl Drop for SelectionEngine {
    fn drop(&mut self) {
        debug!(window = self.window, "selection engine dropped");
    }
}
