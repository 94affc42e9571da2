/*!
 * Pending Replies
 *
 * Per-board correlation of conversion replies. Each board owns a bounded
 * reply queue fed by the event loop and a turn lock that serializes the
 * requestors of that board. A reply is taken only if it names both the
 * target and the transfer property of the request waiting for it.
 *
 * A counter of outstanding monitor refreshes sits next to each queue: a
 * refused TARGETS conversion looks the same whether a refresh or a fetch
 * asked for it, and the counter decides who consumes it.
 */

use crate::core::cancel::CancelToken;
use crate::core::errors::{ClipboardError, ClipboardResult};
use crate::core::types::{Atom, Board, NONE};
use crate::transport::SelectionNotify;
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Granularity at which a waiting turn re-checks its cancel token
const TURN_POLL_INTERVAL: Duration = Duration::from_millis(20);

struct ReplySlot {
    tx: flume::Sender<SelectionNotify>,
    rx: flume::Receiver<SelectionNotify>,
    turn: Mutex<()>,
    refreshes: AtomicU32,
}

impl ReplySlot {
    fn new(depth: usize) -> Self {
        let (tx, rx) = flume::bounded(depth.max(1));
        Self {
            tx,
            rx,
            turn: Mutex::new(()),
            refreshes: AtomicU32::new(0),
        }
    }
}

/// Reply queues for the three boards
pub struct PendingReplies {
    slots: [ReplySlot; 3],
}

enum Wake {
    Reply(SelectionNotify),
    Cancelled,
    Closed,
}

impl PendingReplies {
    #[must_use]
    pub fn new(depth: usize) -> Self {
        Self {
            slots: [
                ReplySlot::new(depth),
                ReplySlot::new(depth),
                ReplySlot::new(depth),
            ],
        }
    }

    fn slot(&self, board: Board) -> ClipboardResult<&ReplySlot> {
        board
            .slot()
            .map(|i| &self.slots[i])
            .ok_or(ClipboardError::BoardUnsupported(board))
    }

    /// Hand a reply to the board's waiter; false when the queue is full
    pub fn deliver(&self, board: Board, notify: SelectionNotify) -> bool {
        match self.slot(board) {
            Ok(slot) => slot.tx.try_send(notify).is_ok(),
            Err(_) => false,
        }
    }

    /// Replies sitting in the board's queue
    #[must_use]
    pub fn queued(&self, board: Board) -> usize {
        self.slot(board).map_or(0, |s| s.rx.len())
    }

    /// Record a monitor refresh in flight
    pub fn note_refresh(&self, board: Board) -> ClipboardResult<()> {
        self.slot(board)?.refreshes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Consume one outstanding refresh, if any
    pub fn take_refresh(&self, board: Board) -> bool {
        self.slot(board).is_ok_and(|slot| {
            slot.refreshes
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
                .is_ok()
        })
    }

    /// Outstanding refreshes for a board
    #[must_use]
    pub fn refreshes(&self, board: Board) -> u32 {
        self.slot(board)
            .map_or(0, |s| s.refreshes.load(Ordering::Acquire))
    }

    /// Refreshes in flight across all boards
    #[must_use]
    pub fn total_refreshes(&self) -> u32 {
        self.slots
            .iter()
            .map(|s| s.refreshes.load(Ordering::Acquire))
            .sum()
    }

    /// Wait for the board's turn, then drop replies left by earlier requests
    pub fn begin(&self, board: Board, cancel: &CancelToken) -> ClipboardResult<Turn<'_>> {
        let slot = self.slot(board)?;

        let guard = loop {
            cancel.check()?;
            let slice = Instant::now() + TURN_POLL_INTERVAL;
            let until = cancel.deadline().map_or(slice, |d| d.min(slice));
            if let Some(guard) = slot.turn.try_lock_until(until) {
                break guard;
            }
        };

        let stale = slot.rx.drain().count();
        if stale > 0 {
            debug!(board = %board, stale, "discarded stale replies");
        }

        Ok(Turn {
            board,
            rx: &slot.rx,
            _guard: guard,
        })
    }
}

/// Exclusive right to issue one conversion on a board and await its reply
pub struct Turn<'a> {
    board: Board,
    rx: &'a flume::Receiver<SelectionNotify>,
    _guard: MutexGuard<'a, ()>,
}

impl Turn<'_> {
    /// Wait for the reply to a conversion of `target` into `property`
    ///
    /// Replies for another target or another transfer property are late
    /// answers to abandoned requests and are skipped. A refusal (`NONE`)
    /// carries no property and is matched on the target alone. `closed`
    /// disconnects when the event loop exits.
    pub fn wait(
        &self,
        target: Atom,
        property: Atom,
        cancel: &CancelToken,
        closed: &flume::Receiver<()>,
    ) -> ClipboardResult<SelectionNotify> {
        loop {
            cancel.check()?;

            let selector = flume::Selector::new()
                .recv(self.rx, |r| r.map_or(Wake::Closed, Wake::Reply))
                .recv(cancel.signal(), |_| Wake::Cancelled)
                .recv(closed, |_| Wake::Closed);

            let wake = match cancel.deadline() {
                Some(deadline) => match selector.wait_deadline(deadline) {
                    Ok(wake) => wake,
                    Err(_) => return Err(ClipboardError::DeadlineExceeded),
                },
                None => selector.wait(),
            };

            match wake {
                Wake::Reply(notify)
                    if notify.target == target
                        && (notify.property == property || notify.property == NONE) =>
                {
                    return Ok(notify)
                }
                Wake::Reply(notify) => {
                    debug!(
                        board = %self.board,
                        target = notify.target,
                        property = notify.property,
                        "skipping reply to an abandoned request"
                    );
                }
                Wake::Cancelled => return Err(ClipboardError::Cancelled),
                Wake::Closed => {
                    return Err(ClipboardError::ConnectionUnavailable(
                        "event loop stopped".into(),
                    ))
                }
            }
        }
    }
}
