/*!
 * URI List Codec
 * `text/uri-list` payloads to filesystem paths and back
 */

use crate::core::errors::{ClipboardError, ClipboardResult};
use std::path::{Path, PathBuf};

const FILE_SCHEME: &str = "file://";

/// Decode a `text/uri-list` payload into local paths
///
/// Blank lines and `#` comments are skipped, only `file://` entries are
/// kept. An empty result is `NotFound`.
pub fn parse_uri_list(bytes: &[u8]) -> ClipboardResult<Vec<PathBuf>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ClipboardError::DecodeFailed(format!("uri list is not UTF-8: {e}")))?;

    let paths: Vec<PathBuf> = text
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.strip_prefix(FILE_SCHEME))
        .map(PathBuf::from)
        .collect();

    if paths.is_empty() {
        return Err(ClipboardError::NotFound);
    }
    Ok(paths)
}

/// Encode paths as a `text/uri-list` payload
#[must_use]
pub fn encode_uri_list<P: AsRef<Path>>(paths: &[P]) -> Vec<u8> {
    let mut out = String::new();
    for path in paths {
        out.push_str(FILE_SCHEME);
        out.push_str(&path.as_ref().to_string_lossy());
        out.push('\n');
    }
    out.into_bytes()
}
