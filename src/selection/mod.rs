/*!
 * Selection Module
 *
 * Selection ownership and transfer over a windowing transport:
 * - Atom cache: memoised name/atom translation
 * - Pending replies: per-board correlation of conversion replies
 * - Ownership: claiming boards and answering conversion requests
 * - Fetch: requesting and reading content from other owners
 * - Monitor: observers of ownership changes
 */

pub mod atoms;
pub mod engine;
pub mod fetch;
pub mod monitor;
pub mod owner;
pub mod pending;

pub use atoms::AtomCache;
pub use engine::{SelectionEngine, WellKnownAtoms, TRANSFER_PROPERTY};
pub use monitor::{Monitor, MonitorCallback};
pub use owner::SelectionReply;
pub use pending::PendingReplies;
