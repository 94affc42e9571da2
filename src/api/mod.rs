/*!
 * API Module
 * Blocking and async clipboard entry points
 */

pub mod async_clipboard;
pub mod clipboard;

pub use async_clipboard::AsyncClipboard;
pub use clipboard::Clipboard;
