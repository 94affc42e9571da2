/*!
 * Format Classification
 * Well-known format names, coarse kinds and MIME matching helpers
 */

use serde::{Deserialize, Serialize};

/// Canonical text MIME type served for legacy text aliases
pub const TEXT_PLAIN: &str = "text/plain";

/// MIME type used for text copied from strings
pub const TEXT_PLAIN_UTF8: &str = "text/plain;charset=utf-8";

/// File list MIME type
pub const URI_LIST: &str = "text/uri-list";

/// GNOME file list format
pub const GNOME_COPIED_FILES: &str = "x-special/gnome-copied-files";

/// Legacy, non-MIME text target names
pub const LEGACY_TEXT_ALIASES: [&str; 4] = ["UTF8_STRING", "COMPOUND_TEXT", "TEXT", "STRING"];

/// Protocol markers that never carry clipboard data
pub const PROTOCOL_MARKERS: [&str; 6] = [
    "TARGETS",
    "SAVE_TARGETS",
    "MULTIPLE",
    "TIMESTAMP",
    "DELETE",
    "INCR",
];

/// Coarse classification of a clipboard payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    #[default]
    Invalid,
    Text,
    Image,
    FileList,
}

/// Static table of well-known format names
const KNOWN_FORMATS: [(&str, DataKind); 14] = [
    ("UTF8_STRING", DataKind::Text),
    ("text/plain;charset=utf-8", DataKind::Text),
    ("STRING", DataKind::Text),
    ("TEXT", DataKind::Text),
    ("text/plain", DataKind::Text),
    ("image/png", DataKind::Image),
    ("image/bmp", DataKind::Image),
    ("image/x-bmp", DataKind::Image),
    ("image/x-MS-bmp", DataKind::Image),
    ("image/x-win-bitmap", DataKind::Image),
    ("image/tiff", DataKind::Image),
    ("image/jpeg", DataKind::Image),
    ("text/uri-list", DataKind::FileList),
    ("x-special/gnome-copied-files", DataKind::FileList),
];

impl DataKind {
    /// Classify a format name: table first, then the MIME top-level type
    #[must_use]
    pub fn of_format(name: &str) -> Self {
        KNOWN_FORMATS
            .iter()
            .find(|(known, _)| *known == name)
            .map_or_else(|| Self::of_mime(name), |(_, kind)| *kind)
    }

    /// Classify by MIME top-level type only
    #[must_use]
    pub fn of_mime(mime: &str) -> Self {
        let Some((top, _)) = mime.split_once('/') else {
            return Self::Invalid;
        };
        match top.to_ascii_lowercase().as_str() {
            "image" => Self::Image,
            "text" => Self::Text,
            _ => Self::Invalid,
        }
    }
}

/// MIME type without its `;parameters` suffix
#[inline]
#[must_use]
pub fn bare_mime(mime: &str) -> &str {
    mime.split_once(';').map_or(mime, |(bare, _)| bare)
}

/// Whether `mime` carries a parameter suffix
#[inline]
#[must_use]
pub fn has_parameters(mime: &str) -> bool {
    mime.contains(';')
}

#[inline]
#[must_use]
pub fn is_legacy_text_alias(name: &str) -> bool {
    LEGACY_TEXT_ALIASES.contains(&name)
}

#[inline]
#[must_use]
pub fn is_protocol_marker(name: &str) -> bool {
    PROTOCOL_MARKERS.contains(&name)
}

/// `text/plain` with or without parameters
#[inline]
#[must_use]
pub fn is_plain_text(name: &str) -> bool {
    bare_mime(name).trim().eq_ignore_ascii_case(TEXT_PLAIN)
}

/// Requested format as looked up in a snapshot
#[must_use]
pub fn normalize_requested(name: &str) -> &str {
    if is_legacy_text_alias(name) {
        TEXT_PLAIN
    } else {
        name
    }
}

/// Drop capability-list entries that duplicate or do not describe data
///
/// Markers go away, legacy text aliases go away when a `text/plain` variant
/// is offered, and a bare MIME type goes away when a parameterised form of
/// it is offered. Order is preserved.
#[must_use]
pub fn normalize_offered(names: &[String]) -> Vec<String> {
    let has_plain_text = names.iter().any(|n| is_plain_text(n));

    let mut kept: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if name.is_empty() || is_protocol_marker(name) {
            continue;
        }
        if has_plain_text && is_legacy_text_alias(name) {
            continue;
        }
        if !has_parameters(name)
            && names
                .iter()
                .any(|other| has_parameters(other) && bare_mime(other) == name)
        {
            continue;
        }
        if !kept.contains(name) {
            kept.push(name.clone());
        }
    }
    kept
}
