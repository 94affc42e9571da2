/*!
 * Atom Cache Tests
 * Round-trip counting against a mocked transport
 */

use clipsel::core::types::{Atom, Timestamp, Window};
use clipsel::selection::AtomCache;
use clipsel::transport::{
    Connector, Event, PropertyReply, SelectionNotify, Transport, TransportError, TransportResult,
};
use clipsel::{ClipboardConfig, ClipboardError, SelectionEngine};
use mockall::mock;
use mockall::predicate::eq;
use pretty_assertions::assert_eq;
use std::sync::Arc;

mock! {
    pub Server {}

    impl Transport for Server {
        fn intern_atom(&self, name: &str) -> TransportResult<Atom>;
        fn atom_name(&self, atom: Atom) -> TransportResult<String>;
        fn create_window(&self, title: &str) -> TransportResult<Window>;
        fn watch_selection(&self, window: Window, selection: Atom) -> TransportResult<()>;
        fn set_selection_owner(&self, owner: Window, selection: Atom) -> TransportResult<()>;
        fn selection_owner(&self, selection: Atom) -> TransportResult<Window>;
        fn convert_selection(
            &self,
            requestor: Window,
            selection: Atom,
            target: Atom,
            property: Atom,
            time: Timestamp,
        ) -> TransportResult<()>;
        fn change_property(
            &self,
            window: Window,
            property: Atom,
            type_: Atom,
            format: u8,
            data: &[u8],
        ) -> TransportResult<()>;
        fn get_property(
            &self,
            delete: bool,
            window: Window,
            property: Atom,
            type_: Atom,
            long_offset: u32,
            long_length: u32,
        ) -> TransportResult<PropertyReply>;
        fn send_selection_notify(&self, notify: &SelectionNotify) -> TransportResult<()>;
        fn wait_for_event(&self) -> TransportResult<Event>;
        fn flush(&self) -> TransportResult<()>;
    }
}

#[test]
fn test_intern_round_trips_once() {
    let mut server = MockServer::new();
    server
        .expect_intern_atom()
        .with(eq("image/png"))
        .times(1)
        .returning(|_| Ok(300));
    server.expect_atom_name().never();

    let cache = AtomCache::new(Arc::new(server));
    for _ in 0..5 {
        assert_eq!(cache.intern("image/png").unwrap(), 300);
    }
    // The reverse direction was learned from the intern
    assert_eq!(cache.resolve(300).unwrap(), "image/png");
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_resolve_round_trips_once() {
    let mut server = MockServer::new();
    server
        .expect_atom_name()
        .with(eq(301))
        .times(1)
        .returning(|_| Ok("text/html".to_string()));
    server.expect_intern_atom().never();

    let cache = AtomCache::new(Arc::new(server));
    assert_eq!(cache.resolve(301).unwrap(), "text/html");
    assert_eq!(cache.resolve(301).unwrap(), "text/html");
    assert_eq!(cache.intern("text/html").unwrap(), 301);
    assert_eq!(cache.lookup("text/html"), Some(301));
}

#[test]
fn test_failed_lookup_is_retried() {
    let mut server = MockServer::new();
    let mut calls = 0;
    server.expect_atom_name().times(2).returning(move |_| {
        calls += 1;
        if calls == 1 {
            Err(TransportError::Request("BadAtom".into()))
        } else {
            Ok("late".to_string())
        }
    });

    let cache = AtomCache::new(Arc::new(server));
    assert_eq!(
        cache.resolve(999),
        Err(ClipboardError::Protocol("BadAtom".into()))
    );
    assert!(cache.is_empty());
    assert_eq!(cache.resolve(999).unwrap(), "late");
}

#[test]
fn test_engine_start_reports_unreachable_display() {
    let connector: Connector =
        Arc::new(|| Err(TransportError::Connect("no display :42".into())));
    assert_eq!(
        SelectionEngine::start(ClipboardConfig::default(), &connector).err(),
        Some(ClipboardError::ConnectionUnavailable("no display :42".into()))
    );
}

#[test]
fn test_engine_start_fails_when_window_creation_fails() {
    let mut server = MockServer::new();
    let mut next: Atom = 100;
    server.expect_intern_atom().returning(move |_| {
        next += 1;
        Ok(next)
    });
    server
        .expect_create_window()
        .times(1)
        .returning(|_| Err(TransportError::ConnectionLost));
    server.expect_watch_selection().never();

    let server: Arc<dyn Transport> = Arc::new(server);
    let connector: Connector = Arc::new(move || Ok(Arc::clone(&server)));
    assert!(matches!(
        SelectionEngine::start(ClipboardConfig::default(), &connector),
        Err(ClipboardError::ConnectionUnavailable(_))
    ));
}
