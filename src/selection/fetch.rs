/*!
 * Fetch Path
 *
 * Requesting content from whoever owns a board. A fetch takes the board's
 * turn, asks for a conversion into a fresh transfer property and waits for
 * the reply naming that property. Property contents are read in bounded chunks until the
 * server reports nothing left, deleting the property with the last read.
 */

use super::engine::SelectionEngine;
use crate::core::cancel::CancelToken;
use crate::core::errors::{ClipboardError, ClipboardResult};
use crate::core::types::{Atom, Board, ANY_PROPERTY_TYPE, CURRENT_TIME, NONE};
use crate::data::format::normalize_offered;
use crate::data::{DataOption, FetchKey, FormatSource, Snapshot};
use crate::monitoring::span_operation;
use crate::transport::decode_atoms;
use std::sync::Arc;
use tracing::{debug, warn};

impl SelectionEngine {
    /// Capability list of `board`'s owner as a snapshot of deferred options
    pub fn fetch_snapshot(
        self: &Arc<Self>,
        board: Board,
        cancel: &CancelToken,
    ) -> ClipboardResult<Snapshot> {
        let span = span_operation("fetch_snapshot");
        span.record("board", &board.to_string());

        cancel.check()?;
        let selection = self.ensure_board(board)?;
        self.ensure_running()?;

        let targets = self.well_known.targets;
        let atoms = {
            let turn = self.pending.begin(board, cancel)?;
            let property = self.transfers.next();
            self.transport
                .convert_selection(self.window, selection, targets, property, CURRENT_TIME)?;
            self.transport.flush()?;

            let reply = turn.wait(targets, property, cancel, &self.closed_rx)?;
            if reply.property == NONE {
                debug!(board = %board, "no owner or owner refused TARGETS");
                return Err(ClipboardError::NotFound);
            }
            self.read_atoms(reply.property)?
        };

        let snapshot = self.snapshot_from_targets(board, &atoms);
        span.record_items_processed(snapshot.len());
        if snapshot.is_empty() {
            return Err(ClipboardError::NotFound);
        }
        Ok(snapshot)
    }

    /// Bytes of one format from `board`'s current owner
    pub fn fetch_format(
        &self,
        board: Board,
        format: Atom,
        cancel: &CancelToken,
    ) -> ClipboardResult<Vec<u8>> {
        let span = span_operation("fetch_format");
        span.record_debug("format", format);

        cancel.check()?;
        let selection = self.ensure_board(board)?;
        self.ensure_running()?;

        let turn = self.pending.begin(board, cancel)?;
        let property = self.transfers.next();
        self.transport
            .convert_selection(self.window, selection, format, property, CURRENT_TIME)?;
        self.transport.flush()?;

        let reply = turn.wait(format, property, cancel, &self.closed_rx)?;
        if reply.property == NONE {
            let name = self
                .atoms
                .resolve(format)
                .unwrap_or_else(|_| format.to_string());
            return Err(ClipboardError::FormatUnavailable(name));
        }

        let bytes = self.read_property(reply.property, ANY_PROPERTY_TYPE)?;
        span.record_items_processed(bytes.len());
        Ok(bytes)
    }

    /// Read a property on our window in chunks, deleting it with the final read
    pub(super) fn read_property(&self, property: Atom, type_: Atom) -> ClipboardResult<Vec<u8>> {
        let units = self.config.chunk_units();
        let mut data = Vec::new();
        let mut offset = 0u32;

        loop {
            let reply = self
                .transport
                .get_property(true, self.window, property, type_, offset, units)?;

            if reply.type_ == self.well_known.incr {
                return Err(ClipboardError::FormatUnavailable(
                    "incremental transfers are not supported".into(),
                ));
            }
            if reply.bytes_after > 0 && reply.value.is_empty() {
                return Err(ClipboardError::DecodeFailed(format!(
                    "property {property} has type {} and cannot be read",
                    reply.type_
                )));
            }

            offset += (reply.value.len() / 4) as u32;
            data.extend_from_slice(&reply.value);

            if reply.bytes_after == 0 {
                return Ok(data);
            }
        }
    }

    /// Read a format-32 atom list; some owners type TARGETS replies as TARGETS
    pub(super) fn read_atoms(&self, property: Atom) -> ClipboardResult<Vec<Atom>> {
        Ok(decode_atoms(&self.read_property(property, ANY_PROPERTY_TYPE)?))
    }

    /// Normalised deferred options for a list of offered targets
    pub(super) fn snapshot_from_targets(self: &Arc<Self>, board: Board, atoms: &[Atom]) -> Snapshot {
        let names: Vec<String> = atoms
            .iter()
            .filter(|a| **a != NONE)
            .filter_map(|a| match self.atoms.resolve(*a) {
                Ok(name) => Some(name),
                Err(e) => {
                    warn!(atom = *a, error = %e, "skipping unnamed target");
                    None
                }
            })
            .collect();

        let source: Arc<dyn FormatSource> = Arc::clone(self) as Arc<dyn FormatSource>;
        let options = normalize_offered(&names)
            .into_iter()
            .filter_map(|name| {
                let format = self.atoms.lookup(&name)?;
                Some(DataOption::deferred(
                    name,
                    FetchKey { board, format },
                    Arc::clone(&source),
                ))
            })
            .collect();

        Snapshot::new(board, options)
    }
}

impl FormatSource for SelectionEngine {
    fn fetch_format(
        &self,
        board: Board,
        format: Atom,
        cancel: &CancelToken,
    ) -> ClipboardResult<Vec<u8>> {
        SelectionEngine::fetch_format(self, board, format, cancel)
    }
}
