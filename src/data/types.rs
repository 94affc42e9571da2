/*!
 * Data Option Types
 * Named byte payloads, either materialized or bound to a pending fetch
 */

use super::format::DataKind;
use crate::core::cancel::CancelToken;
use crate::core::errors::ClipboardResult;
use crate::core::types::{Atom, Board};
use std::fmt;
use std::sync::Arc;

/// Anything able to fetch one format of a board on demand
pub trait FormatSource: Send + Sync {
    fn fetch_format(
        &self,
        board: Board,
        format: Atom,
        cancel: &CancelToken,
    ) -> ClipboardResult<Vec<u8>>;
}

/// Identity of a deferred payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub board: Board,
    pub format: Atom,
}

/// A single named payload
#[derive(Clone)]
pub enum DataOption {
    /// Bytes already in hand
    Eager { mime: String, bytes: Vec<u8> },
    /// Bytes fetched from the current owner on access
    Deferred {
        mime: String,
        key: FetchKey,
        source: Arc<dyn FormatSource>,
    },
}

impl DataOption {
    #[must_use]
    pub fn eager(mime: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::Eager {
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    #[must_use]
    pub fn deferred(mime: impl Into<String>, key: FetchKey, source: Arc<dyn FormatSource>) -> Self {
        Self::Deferred {
            mime: mime.into(),
            key,
            source,
        }
    }

    /// Format name; never performs I/O
    #[inline]
    #[must_use]
    pub fn mime(&self) -> &str {
        match self {
            Self::Eager { mime, .. } | Self::Deferred { mime, .. } => mime,
        }
    }

    #[must_use]
    pub fn kind(&self) -> DataKind {
        DataKind::of_format(self.mime())
    }

    /// Payload bytes, fetching deferred options from their owner
    pub fn data(&self, cancel: &CancelToken) -> ClipboardResult<Vec<u8>> {
        match self {
            Self::Eager { bytes, .. } => Ok(bytes.clone()),
            Self::Deferred { key, source, .. } => source.fetch_format(key.board, key.format, cancel),
        }
    }

    /// Bytes of an eager option without copying
    #[inline]
    #[must_use]
    pub fn eager_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Eager { bytes, .. } => Some(bytes),
            Self::Deferred { .. } => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn fetch_key(&self) -> Option<FetchKey> {
        match self {
            Self::Eager { .. } => None,
            Self::Deferred { key, .. } => Some(*key),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred { .. })
    }

    /// Eager copy of this option
    pub fn materialize(&self, cancel: &CancelToken) -> ClipboardResult<Self> {
        match self {
            Self::Eager { .. } => Ok(self.clone()),
            Self::Deferred { mime, .. } => Ok(Self::eager(mime.clone(), self.data(cancel)?)),
        }
    }
}

impl fmt::Debug for DataOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eager { mime, bytes } => f
                .debug_struct("Eager")
                .field("mime", mime)
                .field("len", &bytes.len())
                .finish(),
            Self::Deferred { mime, key, .. } => f
                .debug_struct("Deferred")
                .field("mime", mime)
                .field("key", key)
                .finish(),
        }
    }
}
