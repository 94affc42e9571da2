/*!
 * Clipboard Facade
 *
 * Process-facing entry point. The engine is created on first use by exactly
 * one caller; if that fails, the first caller sees the detailed reason and
 * every later call reports the clipboard as unavailable.
 */

use crate::core::cancel::CancelToken;
use crate::core::config::ClipboardConfig;
use crate::core::errors::{ClipboardError, ClipboardResult};
use crate::core::types::Board;
use crate::data::Snapshot;
use crate::monitoring::span_operation;
use crate::selection::{Monitor, SelectionEngine};
use crate::transport::Connector;
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::error;

/// Clipboard access for one process
pub struct Clipboard {
    config: ClipboardConfig,
    connector: Connector,
    engine: OnceCell<Result<Arc<SelectionEngine>, ClipboardError>>,
    failure_reported: AtomicBool,
}

impl Clipboard {
    /// Clipboard on the X display named by the config (or `$DISPLAY`)
    #[cfg(feature = "x11")]
    #[must_use]
    pub fn new(config: ClipboardConfig) -> Self {
        let connector = crate::transport::X11Transport::connector(config.display.clone());
        Self::with_connector(config, connector)
    }

    /// Clipboard over an arbitrary transport
    #[must_use]
    pub fn with_connector(config: ClipboardConfig, connector: Connector) -> Self {
        Self {
            config,
            connector,
            engine: OnceCell::new(),
            failure_reported: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClipboardConfig {
        &self.config
    }

    /// The running engine, starting it on first use
    pub fn engine(&self) -> ClipboardResult<Arc<SelectionEngine>> {
        let state = self.engine.get_or_init(|| {
            SelectionEngine::start(self.config.clone(), &self.connector).map_err(|e| {
                error!(error = %e, "Clipboard initialization failed");
                e
            })
        });

        match state {
            Ok(engine) if engine.is_running() => Ok(Arc::clone(engine)),
            Ok(_) => Err(ClipboardError::ConnectionUnavailable(
                "connection to display lost".into(),
            )),
            Err(e) if !self.failure_reported.swap(true, Ordering::AcqRel) => Err(e.clone()),
            Err(_) => Err(ClipboardError::ConnectionUnavailable(
                "clipboard system unavailable".into(),
            )),
        }
    }

    /// Claim the default board
    pub fn copy(&self, snapshot: Snapshot) -> ClipboardResult<()> {
        self.copy_to(Board::Default, snapshot)
    }

    /// Claim `board`; an empty snapshot releases it
    pub fn copy_to(&self, board: Board, snapshot: Snapshot) -> ClipboardResult<()> {
        let span = span_operation("copy");
        span.record("board", &board.to_string());
        let result = self.engine()?.claim(board, snapshot);
        span.record_result(result.is_ok());
        result
    }

    pub fn copy_text(&self, text: impl Into<String>) -> ClipboardResult<()> {
        self.copy(Snapshot::text(text))
    }

    /// Release `board` if we own it
    pub fn clear(&self, board: Board) -> ClipboardResult<()> {
        self.copy_to(board, Snapshot::empty(board))
    }

    /// Whether this process still owns `board`
    ///
    /// Turns false as soon as another client takes the board, whether or not
    /// a monitor ever sees the new owner's formats.
    pub fn owns(&self, board: Board) -> ClipboardResult<bool> {
        self.engine()?.owns(board)
    }

    /// Snapshot of the default board
    pub fn paste(&self, cancel: &CancelToken) -> ClipboardResult<Snapshot> {
        self.paste_from(Board::Default, cancel)
    }

    /// Snapshot of `board`, format bytes fetched on access
    pub fn paste_from(&self, board: Board, cancel: &CancelToken) -> ClipboardResult<Snapshot> {
        let span = span_operation("paste");
        span.record("board", &board.to_string());
        let result = self.engine()?.fetch_snapshot(board, cancel);
        if let Err(e) = &result {
            span.record_error(&e.to_string());
        }
        result
    }

    /// Text of `board`, bounded by the configured fetch timeout
    pub fn paste_text(&self, board: Board) -> ClipboardResult<String> {
        let cancel = CancelToken::with_timeout(self.config.fetch_timeout);
        self.paste_from(board, &cancel)?.to_text(&cancel)
    }

    /// New monitor with no callbacks; starts the event loop if needed
    pub fn monitor(&self) -> ClipboardResult<Monitor> {
        Ok(self.engine()?.monitor())
    }

    /// New monitor with one callback
    pub fn subscribe<F>(&self, callback: F) -> ClipboardResult<Monitor>
    where
        F: Fn(&Snapshot) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Ok(self.engine()?.subscribe(callback))
    }

    pub fn unsubscribe(&self, monitor: &Monitor) -> ClipboardResult<()> {
        self.engine()?.unsubscribe(monitor)
    }
}
