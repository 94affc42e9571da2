/*!
 * Cancellation Tokens
 *
 * Explicit cancellation passed into every blocking wait. A token carries an
 * optional deadline plus a manual trigger; both are observable through a
 * flume receiver so waits can select on them alongside reply channels.
 */

use super::errors::{ClipboardError, ClipboardResult};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cancellation handle for blocking clipboard operations
///
/// Clones share the same trigger: cancelling one cancels all.
#[derive(Clone, Debug)]
pub struct CancelToken {
    deadline: Option<Instant>,
    signal: flume::Receiver<()>,
    // Dropping the sender disconnects `signal`, which is the cancel event
    trigger: Arc<Mutex<Option<flume::Sender<()>>>>,
}

impl CancelToken {
    /// Token without deadline, cancelled only manually
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = flume::bounded(1);
        Self {
            deadline: None,
            signal: rx,
            trigger: Arc::new(Mutex::new(Some(tx))),
        }
    }

    /// Token expiring at `deadline`
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..Self::new()
        }
    }

    /// Token expiring `timeout` from now
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Cancel every wait using this token
    pub fn cancel(&self) {
        self.trigger.lock().take();
    }

    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.signal.is_disconnected()
    }

    #[inline]
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline (`None` when unbounded)
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Fail fast if the token already fired
    pub fn check(&self) -> ClipboardResult<()> {
        if self.is_cancelled() {
            return Err(ClipboardError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ClipboardError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Receiver that disconnects on cancel, for use in selectors
    pub(crate) fn signal(&self) -> &flume::Receiver<()> {
        &self.signal
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
