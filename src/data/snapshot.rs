/*!
 * Clipboard Snapshot
 * Ordered format options of one paste result or one copy payload
 */

use super::format::{bare_mime, DataKind, GNOME_COPIED_FILES, TEXT_PLAIN_UTF8, URI_LIST};
use super::types::DataOption;
use super::uri_list::{encode_uri_list, parse_uri_list};
use crate::core::cancel::CancelToken;
use crate::core::errors::{ClipboardError, ClipboardResult};
use crate::core::types::Board;
use std::fmt;
use std::path::{Path, PathBuf};

/// Clipboard content: a board plus its format options, in preference order
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    board: Board,
    options: Vec<DataOption>,
}

impl Snapshot {
    #[must_use]
    pub fn new(board: Board, options: Vec<DataOption>) -> Self {
        Self { board, options }
    }

    /// Snapshot with nothing in it ("nothing available" / clear request)
    #[must_use]
    pub fn empty(board: Board) -> Self {
        Self::new(board, Vec::new())
    }

    /// Single UTF-8 text option
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::builder().text(text).build()
    }

    #[must_use]
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    #[must_use]
    pub fn with_board(mut self, board: Board) -> Self {
        self.board = board;
        self
    }

    #[inline]
    #[must_use]
    pub fn board(&self) -> Board {
        self.board
    }

    #[inline]
    #[must_use]
    pub fn options(&self) -> &[DataOption] {
        &self.options
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Primary kind, taken from the first option
    #[must_use]
    pub fn kind(&self) -> DataKind {
        self.options.first().map_or(DataKind::Invalid, DataOption::kind)
    }

    /// Format names in order
    pub fn mimes(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(DataOption::mime)
    }

    /// Exact format match
    #[must_use]
    pub fn has_format(&self, mime: &str) -> bool {
        self.options.iter().any(|o| o.mime() == mime)
    }

    /// Exact match first, then `text/plain` matching `text/plain;charset=...`
    #[must_use]
    pub fn find_format(&self, mime: &str) -> Option<&DataOption> {
        self.options
            .iter()
            .find(|o| o.mime() == mime)
            .or_else(|| {
                self.options
                    .iter()
                    .find(|o| o.mime().contains(';') && bare_mime(o.mime()) == mime)
            })
    }

    /// Bytes of one format
    pub fn get_format(&self, mime: &str, cancel: &CancelToken) -> ClipboardResult<Vec<u8>> {
        self.find_format(mime)
            .ok_or_else(|| ClipboardError::FormatUnavailable(mime.to_string()))?
            .data(cancel)
    }

    /// First text option as a string
    pub fn to_text(&self, cancel: &CancelToken) -> ClipboardResult<String> {
        let option = self
            .options
            .iter()
            .find(|o| o.kind() == DataKind::Text)
            .ok_or(ClipboardError::NotFound)?;
        String::from_utf8(option.data(cancel)?)
            .map_err(|e| ClipboardError::DecodeFailed(format!("{}: {e}", option.mime())))
    }

    /// First image option that decodes
    pub fn to_image(&self, cancel: &CancelToken) -> ClipboardResult<image::DynamicImage> {
        let mut last_error = None;

        for option in self.options.iter().filter(|o| o.kind() == DataKind::Image) {
            let bytes = match option.data(cancel) {
                Ok(bytes) => bytes,
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) => {
                    last_error = Some(e);
                    continue;
                }
            };
            match image::load_from_memory(&bytes) {
                Ok(img) => return Ok(img),
                Err(e) => {
                    last_error = Some(ClipboardError::DecodeFailed(format!(
                        "{}: {e}",
                        option.mime()
                    )))
                }
            }
        }

        Err(last_error.unwrap_or(ClipboardError::NotFound))
    }

    /// Local paths from the first file-list option
    pub fn file_list(&self, cancel: &CancelToken) -> ClipboardResult<Vec<PathBuf>> {
        let option = self
            .options
            .iter()
            .find(|o| o.mime() == URI_LIST || o.mime() == GNOME_COPIED_FILES)
            .ok_or(ClipboardError::NotFound)?;
        parse_uri_list(&option.data(cancel)?)
    }

    /// Fetch every deferred option now
    pub fn materialize(&self, cancel: &CancelToken) -> ClipboardResult<Self> {
        let options = self
            .options
            .iter()
            .map(|o| o.materialize(cancel))
            .collect::<ClipboardResult<Vec<_>>>()?;
        Ok(Self::new(self.board, options))
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.board)?;
        for (i, mime) in self.mimes().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(mime)?;
        }
        f.write_str("]")
    }
}

/// Builder for copy payloads
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    board: Option<Board>,
    options: Vec<DataOption>,
}

impl SnapshotBuilder {
    #[must_use]
    pub fn board(mut self, board: Board) -> Self {
        self.board = Some(board);
        self
    }

    #[must_use]
    pub fn text(self, text: impl Into<String>) -> Self {
        self.bytes(TEXT_PLAIN_UTF8, text.into().into_bytes())
    }

    #[must_use]
    pub fn bytes(mut self, mime: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.options.push(DataOption::eager(mime, bytes));
        self
    }

    #[must_use]
    pub fn files<P: AsRef<Path>>(self, paths: &[P]) -> Self {
        self.bytes(URI_LIST, encode_uri_list(paths))
    }

    /// Append every option of another snapshot
    #[must_use]
    pub fn extend(mut self, other: &Snapshot) -> Self {
        self.options.extend(other.options().iter().cloned());
        self
    }

    #[must_use]
    pub fn build(self) -> Snapshot {
        Snapshot::new(self.board.unwrap_or(Board::Default), self.options)
    }
}
