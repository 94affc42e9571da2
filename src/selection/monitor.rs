/*!
 * Change Monitor
 *
 * Observers of ownership changes. The registry is copy-on-write behind an
 * `ArcSwap`, so the event loop takes a consistent list without locking.
 * Each notification fires on its own short-lived thread: callbacks of a
 * monitor run in registration order and the first error skips the rest of
 * that firing only.
 */

use super::engine::SelectionEngine;
use crate::core::errors::{ClipboardError, ClipboardResult};
use crate::core::limits::MONITOR_THREAD_NAME;
use crate::core::types::{Atom, Board, CURRENT_TIME};
use crate::data::Snapshot;
use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Observer invoked with the new owner's snapshot
pub type MonitorCallback = Arc<dyn Fn(&Snapshot) -> anyhow::Result<()> + Send + Sync>;

pub(crate) struct MonitorEntry {
    id: u64,
    callbacks: RwLock<Vec<MonitorCallback>>,
}

impl MonitorEntry {
    fn fire(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        // Clone the list so callbacks may subscribe more callbacks
        let callbacks = self.callbacks.read().clone();
        for callback in &callbacks {
            callback(snapshot)?;
        }
        Ok(())
    }
}

/// Registered monitors in registration order
pub struct MonitorRegistry {
    entries: ArcSwap<Vec<Arc<MonitorEntry>>>,
    writer: Mutex<()>,
    next_id: AtomicU64,
}

impl MonitorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
            writer: Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    fn register(&self) -> Arc<MonitorEntry> {
        let entry = Arc::new(MonitorEntry {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            callbacks: RwLock::new(Vec::new()),
        });

        let _writer = self.writer.lock();
        let mut entries = self.entries.load_full().as_ref().clone();
        entries.push(Arc::clone(&entry));
        self.entries.store(Arc::new(entries));
        entry
    }

    fn remove(&self, id: u64) -> ClipboardResult<()> {
        let _writer = self.writer.lock();
        let current = self.entries.load_full();
        if !current.iter().any(|e| e.id == id) {
            return Err(ClipboardError::NotFound);
        }
        let entries: Vec<_> = current.iter().filter(|e| e.id != id).cloned().collect();
        self.entries.store(Arc::new(entries));
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fire every monitor on a separate thread
    fn dispatch(&self, snapshot: Snapshot) {
        let entries = self.entries.load_full();
        if entries.is_empty() {
            trace!("no monitors registered");
            return;
        }

        let spawned = thread::Builder::new()
            .name(MONITOR_THREAD_NAME.to_string())
            .spawn(move || {
                for entry in entries.iter() {
                    if let Err(e) = entry.fire(&snapshot) {
                        warn!(monitor = entry.id, error = %e, "monitor callback failed");
                    }
                }
            });
        if let Err(e) = spawned {
            warn!(error = %e, "failed to spawn monitor dispatch");
        }
    }
}

impl Default for MonitorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for one observer of ownership changes
#[derive(Clone)]
pub struct Monitor {
    entry: Arc<MonitorEntry>,
    engine: Arc<SelectionEngine>,
}

impl Monitor {
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.entry.id
    }

    /// Append a callback; it runs after those registered before it
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&Snapshot) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.entry.callbacks.write().push(Arc::new(callback));
    }

    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.entry.callbacks.read().len()
    }

    /// Run this monitor's callbacks on the calling thread
    pub fn fire(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        self.entry.fire(snapshot)
    }

    /// Ask every board's owner for its targets again
    pub fn poll(&self) -> ClipboardResult<()> {
        self.engine.poll()
    }

    /// Stop receiving notifications
    pub fn close(&self) -> ClipboardResult<()> {
        self.engine.unsubscribe(self)
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("id", &self.entry.id)
            .field("callbacks", &self.callback_count())
            .finish()
    }
}

impl SelectionEngine {
    /// Register a monitor with no callbacks yet
    pub fn monitor(self: &Arc<Self>) -> Monitor {
        let entry = self.monitors.register();
        debug!(monitor = entry.id, "monitor registered");
        Monitor {
            entry,
            engine: Arc::clone(self),
        }
    }

    /// Register a monitor with one callback
    pub fn subscribe<F>(self: &Arc<Self>, callback: F) -> Monitor
    where
        F: Fn(&Snapshot) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let monitor = self.monitor();
        monitor.subscribe(callback);
        monitor
    }

    /// Remove a monitor; unknown or already removed handles are `NotFound`
    pub fn unsubscribe(&self, monitor: &Monitor) -> ClipboardResult<()> {
        self.monitors.remove(monitor.id())?;
        debug!(monitor = monitor.id(), "monitor removed");
        Ok(())
    }

    #[must_use]
    pub fn monitor_count(&self) -> usize {
        self.monitors.len()
    }

    /// Target refreshes awaiting a reply on `board`
    #[must_use]
    pub fn pending_refreshes(&self, board: Board) -> u32 {
        self.pending.refreshes(board)
    }

    /// Nudge: re-request targets from the owners of boards we do not own
    ///
    /// Never blocks. While an earlier nudge is unanswered further calls are
    /// coalesced into it; a nudge unanswered past the fetch timeout expires.
    pub fn poll(&self) -> ClipboardResult<()> {
        self.ensure_running()?;
        {
            let mut pending = self.poll_pending.lock();
            if pending.is_some_and(|since| since.elapsed() < self.config.fetch_timeout) {
                trace!("poll coalesced");
                return Ok(());
            }
            *pending = Some(Instant::now());
        }

        let mut issued = 0usize;
        for board in &self.config.boards {
            if self.owned.contains(*board) {
                continue;
            }
            let selection = self.well_known.selection(*board)?;
            if let Err(e) = self.request_refresh(*board, selection, CURRENT_TIME) {
                *self.poll_pending.lock() = None;
                return Err(e);
            }
            issued += 1;
        }

        if issued == 0 {
            *self.poll_pending.lock() = None;
            return Ok(());
        }
        self.transport.flush()?;
        Ok(())
    }

    /// Decode a refresh reply and hand the snapshot to the monitors
    pub(super) fn deliver_refresh(self: &Arc<Self>, board: Board, property: Atom) {
        let atoms = match self.read_atoms(property) {
            Ok(atoms) => atoms,
            Err(e) => {
                warn!(board = %board, error = %e, "failed to read refreshed targets");
                return;
            }
        };

        let snapshot = self.snapshot_from_targets(board, &atoms);
        debug!(board = %board, formats = snapshot.len(), "ownership change observed");
        self.monitors.dispatch(snapshot);
    }
}
