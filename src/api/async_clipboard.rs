/*!
 * Async Clipboard
 * Tokio wrapper running blocking clipboard operations on the blocking pool
 */

use super::clipboard::Clipboard;
use crate::core::cancel::CancelToken;
use crate::core::errors::{ClipboardError, ClipboardResult};
use crate::core::types::Board;
use crate::data::{DataOption, Snapshot};
use crate::selection::Monitor;
use std::sync::Arc;
use std::time::Duration;

/// Cloneable async handle over a shared `Clipboard`
#[derive(Clone)]
pub struct AsyncClipboard {
    inner: Arc<Clipboard>,
}

impl AsyncClipboard {
    #[must_use]
    pub fn new(clipboard: Clipboard) -> Self {
        Self {
            inner: Arc::new(clipboard),
        }
    }

    #[must_use]
    pub fn from_shared(clipboard: Arc<Clipboard>) -> Self {
        Self { inner: clipboard }
    }

    /// Underlying blocking clipboard
    #[must_use]
    pub fn blocking(&self) -> &Arc<Clipboard> {
        &self.inner
    }

    pub async fn copy_to(&self, board: Board, snapshot: Snapshot) -> ClipboardResult<()> {
        let clipboard = Arc::clone(&self.inner);
        run_blocking(move || clipboard.copy_to(board, snapshot)).await
    }

    pub async fn copy_text(&self, text: impl Into<String>) -> ClipboardResult<()> {
        self.copy_to(Board::Default, Snapshot::text(text)).await
    }

    /// Snapshot of `board`, giving up after `timeout`
    pub async fn paste_from(&self, board: Board, timeout: Duration) -> ClipboardResult<Snapshot> {
        let clipboard = Arc::clone(&self.inner);
        let cancel = CancelToken::with_timeout(timeout);
        run_blocking(move || clipboard.paste_from(board, &cancel)).await
    }

    /// Text of `board`, with one deadline covering both round trips
    pub async fn paste_text(&self, board: Board, timeout: Duration) -> ClipboardResult<String> {
        let clipboard = Arc::clone(&self.inner);
        let cancel = CancelToken::with_timeout(timeout);
        run_blocking(move || clipboard.paste_from(board, &cancel)?.to_text(&cancel)).await
    }

    /// Bytes of one option, fetching deferred ones from the owner
    pub async fn data(&self, option: DataOption, timeout: Duration) -> ClipboardResult<Vec<u8>> {
        let cancel = CancelToken::with_timeout(timeout);
        run_blocking(move || option.data(&cancel)).await
    }

    pub async fn clear(&self, board: Board) -> ClipboardResult<()> {
        let clipboard = Arc::clone(&self.inner);
        run_blocking(move || clipboard.clear(board)).await
    }

    pub async fn owns(&self, board: Board) -> ClipboardResult<bool> {
        let clipboard = Arc::clone(&self.inner);
        run_blocking(move || clipboard.owns(board)).await
    }

    /// Monitor forwarding every change into an unbounded channel
    pub fn watch(&self) -> ClipboardResult<(Monitor, flume::Receiver<Snapshot>)> {
        let (tx, rx) = flume::unbounded();
        let monitor = self.inner.subscribe(move |snapshot| {
            tx.send(snapshot.clone())
                .map_err(|_| anyhow::anyhow!("watch receiver dropped"))
        })?;
        Ok((monitor, rx))
    }
}

async fn run_blocking<T, F>(f: F) -> ClipboardResult<T>
where
    F: FnOnce() -> ClipboardResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        if e.is_cancelled() {
            ClipboardError::Cancelled
        } else {
            ClipboardError::Protocol(format!("clipboard worker panicked: {e}"))
        }
    })?
}
