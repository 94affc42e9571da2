/*!
 * Ownership
 * Claiming boards and serving conversion requests from the records we own
 */

use super::engine::SelectionEngine;
use crate::core::cancel::CancelToken;
use crate::core::errors::ClipboardResult;
use crate::core::types::{Atom, Board, ATOM_ATOM, NONE};
use crate::data::format::{bare_mime, has_parameters, normalize_requested};
use crate::data::{DataKind, Snapshot};
use crate::transport::{encode_atoms, SelectionNotify, SelectionRequest};
use ahash::HashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Snapshots we currently own, one per board
pub struct OwnershipTable {
    records: RwLock<HashMap<Board, Arc<Snapshot>>>,
}

impl OwnershipTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::default()),
        }
    }

    #[must_use]
    pub fn get(&self, board: Board) -> Option<Arc<Snapshot>> {
        self.records.read().get(&board).cloned()
    }

    #[must_use]
    pub fn contains(&self, board: Board) -> bool {
        self.records.read().contains_key(&board)
    }

    pub fn insert(&self, board: Board, snapshot: Arc<Snapshot>) -> Option<Arc<Snapshot>> {
        self.records.write().insert(board, snapshot)
    }

    pub fn remove(&self, board: Board) -> Option<Arc<Snapshot>> {
        self.records.write().remove(&board)
    }
}

impl Default for OwnershipTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of serving one conversion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionReply {
    /// Capability list, written as format-32 ATOM data
    Targets(Vec<Atom>),
    /// Payload, written as format-8 data typed with the requested target
    Data { type_: Atom, bytes: Vec<u8> },
    /// Refuse the conversion
    NoData,
}

impl SelectionEngine {
    /// Take ownership of `board` with `snapshot`; an empty snapshot releases it
    ///
    /// Deferred options are fetched before the claim so the record only
    /// holds bytes in hand.
    pub fn claim(&self, board: Board, snapshot: Snapshot) -> ClipboardResult<()> {
        let selection = self.ensure_board(board)?;
        self.ensure_running()?;

        if snapshot.is_empty() {
            self.owned.remove(board);
            self.transport.set_selection_owner(NONE, selection)?;
            self.transport.flush()?;
            info!(board = %board, "Selection released");
            return Ok(());
        }

        let snapshot = if snapshot.options().iter().any(|o| o.is_deferred()) {
            snapshot.materialize(&CancelToken::with_timeout(self.config.fetch_timeout))?
        } else {
            snapshot
        };

        // Intern now so serving TARGETS never waits on the server
        for mime in snapshot.mimes() {
            self.atoms.intern(mime)?;
            if has_parameters(mime) {
                self.atoms.intern(bare_mime(mime))?;
            }
        }

        let formats = snapshot.len();
        self.owned.insert(board, Arc::new(snapshot.with_board(board)));
        self.transport.set_selection_owner(self.window, selection)?;
        self.transport.flush()?;
        debug!(board = %board, formats, "selection claimed");
        Ok(())
    }

    /// Whether we still hold `board`; cleared when another client takes it
    pub fn owns(&self, board: Board) -> ClipboardResult<bool> {
        self.ensure_board(board)?;
        Ok(self.owned.contains(board))
    }

    /// Snapshot we currently own on `board`
    #[must_use]
    pub fn owned_snapshot(&self, board: Board) -> Option<Arc<Snapshot>> {
        self.owned.get(board)
    }

    /// Decide how to answer a conversion of `target` on `board`
    pub fn service_request(&self, target: Atom, board: Board) -> ClipboardResult<SelectionReply> {
        self.ensure_board(board)?;
        let Some(snapshot) = self.owned.get(board) else {
            return Ok(SelectionReply::NoData);
        };

        if target == self.well_known.targets {
            return Ok(SelectionReply::Targets(self.capability_list(&snapshot)?));
        }

        let name = self.atoms.resolve(target)?;
        let found = snapshot
            .find_format(&name)
            .or_else(|| snapshot.find_format(normalize_requested(&name)));
        let Some(option) = found else {
            debug!(board = %board, format = %name, "requested format not offered");
            return Ok(SelectionReply::NoData);
        };

        match option.eager_bytes() {
            Some(bytes) => Ok(SelectionReply::Data {
                type_: target,
                bytes: bytes.to_vec(),
            }),
            None => {
                warn!(board = %board, format = %name, "owned record holds a deferred option");
                Ok(SelectionReply::NoData)
            }
        }
    }

    /// TARGETS answer for a snapshot: protocol markers, text aliases, then each format
    pub fn capability_list(&self, snapshot: &Snapshot) -> ClipboardResult<Vec<Atom>> {
        let wk = &self.well_known;
        let mut atoms = vec![wk.targets, wk.save_targets];

        if snapshot.kind() == DataKind::Text {
            for alias in wk.text_aliases() {
                push_unique(&mut atoms, alias);
            }
        }

        for mime in snapshot.mimes().filter(|m| !m.is_empty()) {
            push_unique(&mut atoms, self.atoms.intern(mime)?);
            if has_parameters(mime) {
                push_unique(&mut atoms, self.atoms.intern(bare_mime(mime))?);
            }
        }
        Ok(atoms)
    }

    /// Answer a SelectionRequest event on the requestor's window
    pub(super) fn answer_request(&self, request: &SelectionRequest) {
        let board = self.well_known.board(request.selection);
        // Obsolete requestors leave the property unset; reply on the target
        let property = if request.property == NONE {
            request.target
        } else {
            request.property
        };

        let written = match self.service_request(request.target, board) {
            Ok(SelectionReply::Targets(atoms)) => self
                .transport
                .change_property(request.requestor, property, ATOM_ATOM, 32, &encode_atoms(&atoms))
                .map(|()| true),
            Ok(SelectionReply::Data { type_, bytes }) => self
                .transport
                .change_property(request.requestor, property, type_, 8, &bytes)
                .map(|()| true),
            Ok(SelectionReply::NoData) => Ok(false),
            Err(e) => {
                debug!(board = %board, target = request.target, error = %e, "refusing request");
                Ok(false)
            }
        };

        let written = written.unwrap_or_else(|e| {
            warn!(requestor = request.requestor, error = %e, "failed to write reply property");
            false
        });

        let notify = SelectionNotify {
            time: request.time,
            requestor: request.requestor,
            selection: request.selection,
            target: request.target,
            property: if written { property } else { NONE },
        };
        if let Err(e) = self.transport.send_selection_notify(&notify) {
            warn!(requestor = request.requestor, error = %e, "failed to notify requestor");
        }
    }
}

fn push_unique(atoms: &mut Vec<Atom>, atom: Atom) {
    if !atoms.contains(&atom) {
        atoms.push(atom);
    }
}
