/*!
 * Core Types
 * Protocol handles and the board enumeration shared across the crate
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Interned name handle used by the windowing protocol
pub type Atom = u32;

/// Window (resource) identifier
pub type Window = u32;

/// Server timestamp in milliseconds
pub type Timestamp = u32;

/// The `None` atom / window
pub const NONE: u32 = 0;

/// `AnyPropertyType` for property reads
pub const ANY_PROPERTY_TYPE: Atom = 0;

/// `CurrentTime` for selection requests
pub const CURRENT_TIME: Timestamp = 0;

/// Predefined `ATOM` atom
pub const ATOM_ATOM: Atom = 4;

/// Predefined `STRING` atom
pub const ATOM_STRING: Atom = 31;

/// Predefined `WM_NAME` atom
pub const ATOM_WM_NAME: Atom = 39;

/// Predefined `WM_CLASS` atom
pub const ATOM_WM_CLASS: Atom = 67;

/// Highest predefined atom; interned atoms are allocated above it
pub const LAST_PREDEFINED_ATOM: Atom = 68;

/// A clipboard selection channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Board {
    /// Sentinel for selections this crate does not know about
    #[default]
    Invalid,
    /// The standard clipboard (`CLIPBOARD`)
    Default,
    /// The primary selection (`PRIMARY`)
    PrimarySelection,
    /// The secondary selection (`SECONDARY`)
    SecondarySelection,
}

impl Board {
    /// Every real board, in slot order
    pub const ALL: [Board; 3] = [
        Board::Default,
        Board::PrimarySelection,
        Board::SecondarySelection,
    ];

    /// Protocol selection name for this board
    #[must_use]
    pub const fn selection_name(self) -> Option<&'static str> {
        match self {
            Self::Default => Some("CLIPBOARD"),
            Self::PrimarySelection => Some("PRIMARY"),
            Self::SecondarySelection => Some("SECONDARY"),
            Self::Invalid => None,
        }
    }

    /// Fixed slot index used by the per-board arenas
    #[inline]
    #[must_use]
    pub const fn slot(self) -> Option<usize> {
        match self {
            Self::Default => Some(0),
            Self::PrimarySelection => Some(1),
            Self::SecondarySelection => Some(2),
            Self::Invalid => None,
        }
    }

    /// Parse a CLI-style board name
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "default" | "clipboard" => Self::Default,
            "primary" => Self::PrimarySelection,
            "secondary" => Self::SecondarySelection,
            _ => Self::Invalid,
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Invalid => "Invalid",
            Self::Default => "Default",
            Self::PrimarySelection => "Primary Selection",
            Self::SecondarySelection => "Secondary Selection",
        };
        f.write_str(name)
    }
}
