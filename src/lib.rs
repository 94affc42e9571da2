/*!
 * clipsel
 * Selection-ownership clipboard engine with change monitoring
 *
 * The engine owns one connection to a windowing server and one event loop
 * thread. Copying asserts ownership of a board and answers conversion
 * requests from other clients; pasting asks the current owner for its
 * format list and fetches format bytes on demand.
 */

pub mod api;
pub mod core;
pub mod data;
pub mod monitoring;
pub mod selection;
pub mod transport;

// Re-exports
pub use crate::api::{AsyncClipboard, Clipboard};
pub use crate::core::{
    Board, CancelToken, ClipboardConfig, ClipboardError, ClipboardResult,
};
pub use crate::data::{DataKind, DataOption, Snapshot, SnapshotBuilder};
pub use crate::monitoring::init_tracing;
pub use crate::selection::{Monitor, SelectionEngine, SelectionReply};
pub use crate::transport::{Connector, MemoryDisplay};
#[cfg(feature = "x11")]
pub use crate::transport::X11Transport;
