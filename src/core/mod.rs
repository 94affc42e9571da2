/*!
 * Core Module
 * Fundamental clipboard types, configuration and error handling
 */

pub mod cancel;
pub mod config;
pub mod errors;
pub mod limits;
pub mod types;

// Re-export for convenience
pub use cancel::CancelToken;
pub use config::ClipboardConfig;
pub use errors::*;
pub use types::*;
