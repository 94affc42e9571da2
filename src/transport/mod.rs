/*!
 * Transport Module
 *
 * The seam between the selection engine and a windowing server. The engine
 * only speaks the handful of requests and events below; `x11` maps them onto
 * a live X server, `memory` implements them in-process.
 *
 * Requests may be issued from any thread. Events are read by exactly one
 * thread: the engine's event loop.
 */

pub mod memory;
#[cfg(feature = "x11")]
pub mod x11;

use crate::core::errors::ClipboardError;
use crate::core::types::{Atom, Timestamp, Window};
use std::sync::Arc;
use thiserror::Error;

pub use memory::{MemoryConnection, MemoryDisplay};
#[cfg(feature = "x11")]
pub use x11::X11Transport;

/// Transport-level failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("connection lost")]
    ConnectionLost,

    #[error("request failed: {0}")]
    Request(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

impl From<TransportError> for ClipboardError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Connect(reason) => Self::ConnectionUnavailable(reason),
            TransportError::ConnectionLost => {
                Self::ConnectionUnavailable("connection to display lost".into())
            }
            TransportError::Request(reason) => Self::Protocol(reason),
        }
    }
}

/// Events the engine reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Another client wants the content of a selection we own
    SelectionRequest(SelectionRequest),
    /// Reply to one of our conversion requests
    SelectionNotify(SelectionNotify),
    /// We lost ownership of a selection
    SelectionClear {
        time: Timestamp,
        owner: Window,
        selection: Atom,
    },
    /// XFIXES notification: a watched selection changed owner
    OwnerChange {
        window: Window,
        owner: Window,
        selection: Atom,
        timestamp: Timestamp,
        selection_timestamp: Timestamp,
    },
    /// A property on one of our windows changed
    PropertyNotify {
        window: Window,
        atom: Atom,
        deleted: bool,
    },
    /// Protocol error reported asynchronously
    Error {
        code: u8,
        major: u8,
        minor: u16,
    },
    /// Anything else, by response type
    Other(u8),
}

/// Conversion request delivered to a selection owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionRequest {
    pub time: Timestamp,
    pub owner: Window,
    pub requestor: Window,
    pub selection: Atom,
    pub target: Atom,
    pub property: Atom,
}

/// Conversion outcome delivered to a requestor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionNotify {
    pub time: Timestamp,
    pub requestor: Window,
    pub selection: Atom,
    pub target: Atom,
    /// `NONE` when the conversion was refused
    pub property: Atom,
}

/// One GetProperty reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyReply {
    /// Actual type of the property (`NONE` when absent)
    pub type_: Atom,
    /// 8, 16 or 32; 0 when absent
    pub format: u8,
    /// Bytes left after this read
    pub bytes_after: u32,
    pub value: Vec<u8>,
}

/// Connection to a windowing server
pub trait Transport: Send + Sync {
    /// Intern `name`, creating it when absent
    fn intern_atom(&self, name: &str) -> TransportResult<Atom>;

    /// Name of an interned atom
    fn atom_name(&self, atom: Atom) -> TransportResult<String>;

    /// Create the invisible coordination window
    fn create_window(&self, title: &str) -> TransportResult<Window>;

    /// Subscribe `window` to owner-change notifications for `selection`
    fn watch_selection(&self, window: Window, selection: Atom) -> TransportResult<()>;

    /// Assert (or with `NONE`, release) ownership
    fn set_selection_owner(&self, owner: Window, selection: Atom) -> TransportResult<()>;

    /// Current owner of `selection`, `NONE` when unowned
    fn selection_owner(&self, selection: Atom) -> TransportResult<Window>;

    /// Ask the owner of `selection` to convert to `target` into `property` on `requestor`
    fn convert_selection(
        &self,
        requestor: Window,
        selection: Atom,
        target: Atom,
        property: Atom,
        time: Timestamp,
    ) -> TransportResult<()>;

    /// Replace a property value
    fn change_property(
        &self,
        window: Window,
        property: Atom,
        type_: Atom,
        format: u8,
        data: &[u8],
    ) -> TransportResult<()>;

    /// Read part of a property; offset and length count 32-bit units
    fn get_property(
        &self,
        delete: bool,
        window: Window,
        property: Atom,
        type_: Atom,
        long_offset: u32,
        long_length: u32,
    ) -> TransportResult<PropertyReply>;

    /// Send the completion event of a conversion to its requestor
    fn send_selection_notify(&self, notify: &SelectionNotify) -> TransportResult<()>;

    /// Block until the next event
    fn wait_for_event(&self) -> TransportResult<Event>;

    fn flush(&self) -> TransportResult<()>;
}

/// Factory producing the single connection of an engine
pub type Connector = Arc<dyn Fn() -> TransportResult<Arc<dyn Transport>> + Send + Sync>;

/// Encode atoms for a format-32 property
#[must_use]
pub fn encode_atoms(atoms: &[Atom]) -> Vec<u8> {
    atoms.iter().flat_map(|a| a.to_ne_bytes()).collect()
}

/// Decode a format-32 property into atoms; trailing partial units are ignored
#[must_use]
pub fn decode_atoms(bytes: &[u8]) -> Vec<Atom> {
    bytes
        .chunks_exact(4)
        .map(|c| Atom::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
