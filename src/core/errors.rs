/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use super::types::Board;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Operation-level clipboard errors returned to callers
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
#[non_exhaustive]
pub enum ClipboardError {
    #[error("Clipboard connection unavailable: {0}")]
    #[diagnostic(
        code(clipboard::connection_unavailable),
        help("Check that a display server is reachable (DISPLAY / CLIPSEL_DISPLAY). Clipboard access stays disabled until restart.")
    )]
    ConnectionUnavailable(String),

    #[error("Board not supported: {0}")]
    #[diagnostic(
        code(clipboard::board_unsupported),
        help("This platform surface does not expose the requested selection.")
    )]
    BoardUnsupported(Board),

    #[error("Format unavailable: {0}")]
    #[diagnostic(
        code(clipboard::format_unavailable),
        help("The current owner does not offer this format. Inspect the snapshot options first.")
    )]
    FormatUnavailable(String),

    #[error("Nothing found on the clipboard")]
    #[diagnostic(
        code(clipboard::not_found),
        help("The board has no owner, or the owner offers nothing usable.")
    )]
    NotFound,

    #[error("Operation cancelled")]
    #[diagnostic(code(clipboard::cancelled))]
    Cancelled,

    #[error("Deadline exceeded before the owner replied")]
    #[diagnostic(
        code(clipboard::deadline_exceeded),
        help("The owning process may be slow or hung. Re-issue with a longer timeout.")
    )]
    DeadlineExceeded,

    #[error("Decode failed: {0}")]
    #[diagnostic(
        code(clipboard::decode_failed),
        help("The payload bytes do not match the requested representation.")
    )]
    DecodeFailed(String),

    #[error("Protocol error: {0}")]
    #[diagnostic(
        code(clipboard::protocol),
        help("The display server rejected a request. See the event loop logs for details.")
    )]
    Protocol(String),
}

impl ClipboardError {
    /// True for the two cancellation outcomes
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

/// Result type for clipboard operations
pub type ClipboardResult<T> = Result<T, ClipboardError>;
