/*!
 * Clipboard Configuration
 * Runtime knobs with defaults, builder-style overrides and env loading
 */

use super::limits::{
    DEFAULT_CHUNK_SIZE, DEFAULT_FETCH_TIMEOUT, DEFAULT_REPLY_QUEUE_DEPTH, DEFAULT_WINDOW_TITLE,
    MIN_CHUNK_SIZE,
};
use super::types::Board;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Clipboard engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardConfig {
    /// Display to connect to (`None` uses the transport default, e.g. `$DISPLAY`)
    pub display: Option<String>,
    /// Bytes requested per property read
    pub chunk_size: usize,
    /// Replies buffered per board
    pub reply_queue_depth: usize,
    /// Default wait for owner replies
    pub fetch_timeout: Duration,
    /// Boards this surface exposes
    pub boards: Vec<Board>,
    /// Title of the coordination window
    pub window_title: String,
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            display: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            reply_queue_depth: DEFAULT_REPLY_QUEUE_DEPTH,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            boards: Board::ALL.to_vec(),
            window_title: DEFAULT_WINDOW_TITLE.to_string(),
        }
    }
}

impl ClipboardConfig {
    /// Load configuration from the environment
    ///
    /// Environment variables:
    /// - CLIPSEL_DISPLAY: display name override
    /// - CLIPSEL_CHUNK_SIZE: bytes per property read
    /// - CLIPSEL_TIMEOUT_MS: default fetch timeout
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(display) = std::env::var("CLIPSEL_DISPLAY") {
            if !display.is_empty() {
                config.display = Some(display);
            }
        }
        if let Some(size) = env_number("CLIPSEL_CHUNK_SIZE") {
            config = config.with_chunk_size(size as usize);
        }
        if let Some(ms) = env_number("CLIPSEL_TIMEOUT_MS") {
            config.fetch_timeout = Duration::from_millis(ms);
        }

        config
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// Set the read chunk, rounded down to whole 32-bit units
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = (size / MIN_CHUNK_SIZE * MIN_CHUNK_SIZE).max(MIN_CHUNK_SIZE);
        self
    }

    pub fn with_reply_queue_depth(mut self, depth: usize) -> Self {
        self.reply_queue_depth = depth.max(1);
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_boards(mut self, boards: Vec<Board>) -> Self {
        self.boards = boards;
        self
    }

    pub fn with_window_title(mut self, title: impl Into<String>) -> Self {
        self.window_title = title.into();
        self
    }

    /// Whether `board` is exposed by this surface
    #[inline]
    #[must_use]
    pub fn supports(&self, board: Board) -> bool {
        board != Board::Invalid && self.boards.contains(&board)
    }

    /// Chunk size in 32-bit units, as the protocol counts it
    #[inline]
    #[must_use]
    pub fn chunk_units(&self) -> u32 {
        (self.chunk_size / MIN_CHUNK_SIZE).max(1) as u32
    }
}

fn env_number(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.trim().parse().ok()
}
