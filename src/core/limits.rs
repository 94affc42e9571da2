/*!
 * Limits and Constants
 *
 * Centralized location for protocol sizes, queue depths and timeouts.
 */

use std::time::Duration;

// =============================================================================
// PROPERTY TRANSFER
// =============================================================================

/// Bytes requested per property read (16 KiB)
/// The transport caps a single GetProperty reply, larger payloads are paged
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Smallest usable chunk (one 32-bit unit)
pub const MIN_CHUNK_SIZE: usize = 4;

/// Transfer properties rotated across requests
/// A late reply names the property of its own request, so it cannot be
/// taken for the answer to a newer one until the rotation wraps
pub const TRANSFER_SLOTS: usize = 8;

// =============================================================================
// CORRELATION
// =============================================================================

/// Pending replies buffered per board
/// Bounds memory when replies arrive for requests nobody waits on anymore
pub const DEFAULT_REPLY_QUEUE_DEPTH: usize = 4;

// =============================================================================
// TIMEOUTS
// =============================================================================

/// Default wait for an owner to answer
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Operations slower than this log a warning
pub const SLOW_OPERATION_THRESHOLD: Duration = Duration::from_millis(250);

// =============================================================================
// IDENTITY
// =============================================================================

/// WM_NAME / WM_CLASS of the coordination window
pub const DEFAULT_WINDOW_TITLE: &str = "clipsel";

/// Name of the event loop thread
pub const EVENT_LOOP_THREAD_NAME: &str = "clipsel-events";

/// Name prefix of monitor dispatch threads
pub const MONITOR_THREAD_NAME: &str = "clipsel-monitor";
