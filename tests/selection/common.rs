/*!
 * Shared fixtures for selection tests
 */

use clipsel::transport::{Event, MemoryConnection, SelectionNotify, SelectionRequest, Transport};
use clipsel::{Clipboard, ClipboardConfig, MemoryDisplay};
use std::time::{Duration, Instant};

/// Two clipboard "processes" on one loopback display
pub struct Desk {
    pub display: MemoryDisplay,
    pub owner: Clipboard,
    pub reader: Clipboard,
}

impl Desk {
    pub fn new() -> Self {
        Self::with_config(ClipboardConfig::default())
    }

    pub fn with_config(config: ClipboardConfig) -> Self {
        let display = MemoryDisplay::new();
        let owner = Clipboard::with_connector(config.clone(), display.connector());
        let reader = Clipboard::with_connector(config, display.connector());
        Self {
            display,
            owner,
            reader,
        }
    }
}

impl Drop for Desk {
    fn drop(&mut self) {
        // Stops both event loops
        self.display.shutdown();
    }
}

/// Block until the next SelectionNotify on a raw connection
pub fn next_notify(conn: &MemoryConnection) -> SelectionNotify {
    loop {
        match conn.wait_for_event().expect("connection closed") {
            Event::SelectionNotify(notify) => return notify,
            _ => continue,
        }
    }
}

/// Block until the next SelectionRequest on a raw connection
pub fn next_request(conn: &MemoryConnection) -> Option<SelectionRequest> {
    loop {
        match conn.wait_for_event() {
            Ok(Event::SelectionRequest(request)) => return Some(request),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
}

/// Poll `cond` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
