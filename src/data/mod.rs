/*!
 * Data Module
 * Clipboard payload model: format options, snapshots and file lists
 */

pub mod format;
pub mod snapshot;
pub mod types;
pub mod uri_list;

pub use format::DataKind;
pub use snapshot::{Snapshot, SnapshotBuilder};
pub use types::{DataOption, FetchKey, FormatSource};
pub use uri_list::{encode_uri_list, parse_uri_list};
