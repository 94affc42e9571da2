/*!
 * Loopback Display
 *
 * In-process display server implementing the selection subset of the
 * protocol: atoms, windows with properties, selection ownership, conversion
 * requests and XFIXES-style owner-change notifications. Several
 * `MemoryConnection`s on one `MemoryDisplay` behave like separate client
 * processes, which makes the whole owner/requestor dance runnable headless.
 *
 * Property reads follow GetProperty paging rules: offset and length count
 * 32-bit units, `bytes_after` reports the remainder, a delete request only
 * takes effect once the remainder is zero, and a type mismatch returns the
 * actual type with no data.
 */

use super::{
    Connector, Event, PropertyReply, SelectionNotify, SelectionRequest, Transport, TransportError,
    TransportResult,
};
use crate::core::types::{
    Atom, Timestamp, Window, ANY_PROPERTY_TYPE, ATOM_ATOM, ATOM_STRING, ATOM_WM_CLASS,
    ATOM_WM_NAME, LAST_PREDEFINED_ATOM, NONE,
};
use ahash::HashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

type ClientId = u32;

/// First resource id handed out to windows
const RESOURCE_BASE: Window = 0x0020_0000;

struct Property {
    type_: Atom,
    format: u8,
    data: Vec<u8>,
}

struct WindowState {
    client: ClientId,
    properties: HashMap<Atom, Property>,
}

struct SelectionOwner {
    window: Window,
    client: ClientId,
}

struct Watch {
    client: ClientId,
    window: Window,
    selection: Atom,
}

struct AtomTable {
    by_name: HashMap<String, Atom>,
    by_atom: HashMap<Atom, String>,
    next: Atom,
}

impl AtomTable {
    fn new() -> Self {
        let mut table = Self {
            by_name: HashMap::default(),
            by_atom: HashMap::default(),
            next: LAST_PREDEFINED_ATOM + 1,
        };
        for (name, atom) in [
            ("PRIMARY", 1),
            ("SECONDARY", 2),
            ("ATOM", ATOM_ATOM),
            ("STRING", ATOM_STRING),
            ("WM_NAME", ATOM_WM_NAME),
            ("WM_CLASS", ATOM_WM_CLASS),
        ] {
            table.by_name.insert(name.to_string(), atom);
            table.by_atom.insert(atom, name.to_string());
        }
        table
    }
}

struct DisplayState {
    atoms: RwLock<AtomTable>,
    windows: RwLock<HashMap<Window, WindowState>>,
    selections: Mutex<HashMap<Atom, SelectionOwner>>,
    clients: RwLock<HashMap<ClientId, flume::Sender<Event>>>,
    watches: RwLock<Vec<Watch>>,
    next_client: AtomicU32,
    next_resource: AtomicU32,
    clock: AtomicU32,
    atom_round_trips: AtomicU64,
    closed: AtomicBool,
}

impl DisplayState {
    fn tick(&self) -> Timestamp {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn ensure_open(&self) -> TransportResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(TransportError::ConnectionLost)
        } else {
            Ok(())
        }
    }

    fn deliver(&self, client: ClientId, event: Event) {
        if let Some(tx) = self.clients.read().get(&client) {
            // A dropped receiver just means the client went away
            let _ = tx.send(event);
        }
    }

    fn window_client(&self, window: Window) -> TransportResult<ClientId> {
        self.windows
            .read()
            .get(&window)
            .map(|w| w.client)
            .ok_or_else(|| TransportError::Request(format!("BadWindow: {window:#x}")))
    }

    /// Tear down a client: its windows, watches and selections go away
    fn disconnect(&self, client: ClientId) {
        if self.clients.write().remove(&client).is_none() {
            return;
        }
        self.windows.write().retain(|_, w| w.client != client);
        self.watches.write().retain(|w| w.client != client);

        let released: Vec<Atom> = {
            let mut selections = self.selections.lock();
            let owned: Vec<Atom> = selections
                .iter()
                .filter(|(_, o)| o.client == client)
                .map(|(s, _)| *s)
                .collect();
            for selection in &owned {
                selections.remove(selection);
            }
            owned
        };

        // Client close releases its selections like SELECTION_CLIENT_CLOSE
        let time = self.tick();
        for selection in released {
            self.notify_watchers(selection, NONE, time);
        }
        debug!(client, "loopback client disconnected");
    }

    fn notify_watchers(&self, selection: Atom, owner: Window, time: Timestamp) {
        let targets: Vec<(ClientId, Window)> = self
            .watches
            .read()
            .iter()
            .filter(|w| w.selection == selection)
            .map(|w| (w.client, w.window))
            .collect();

        for (client, window) in targets {
            self.deliver(
                client,
                Event::OwnerChange {
                    window,
                    owner,
                    selection,
                    timestamp: time,
                    selection_timestamp: time,
                },
            );
        }
    }
}

/// Shared in-process display; clone freely
#[derive(Clone)]
pub struct MemoryDisplay {
    state: Arc<DisplayState>,
}

impl MemoryDisplay {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(DisplayState {
                atoms: RwLock::new(AtomTable::new()),
                windows: RwLock::new(HashMap::default()),
                selections: Mutex::new(HashMap::default()),
                clients: RwLock::new(HashMap::default()),
                watches: RwLock::new(Vec::new()),
                next_client: AtomicU32::new(1),
                next_resource: AtomicU32::new(RESOURCE_BASE),
                clock: AtomicU32::new(0),
                atom_round_trips: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Open a new client connection
    pub fn connect(&self) -> TransportResult<MemoryConnection> {
        if self.state.closed.load(Ordering::Acquire) {
            return Err(TransportError::Connect("display is shut down".into()));
        }

        let id = self.state.next_client.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = flume::unbounded();
        self.state.clients.write().insert(id, tx);
        debug!(client = id, "loopback client connected");

        Ok(MemoryConnection {
            id,
            state: Arc::clone(&self.state),
            events: rx,
        })
    }

    /// Connector opening a fresh client per engine
    #[must_use]
    pub fn connector(&self) -> Connector {
        let display = self.clone();
        Arc::new(move || {
            let conn: Arc<dyn Transport> = Arc::new(display.connect()?);
            Ok(conn)
        })
    }

    /// Drop every client; their event loops observe connection loss
    pub fn shutdown(&self) {
        self.state.closed.store(true, Ordering::Release);
        self.state.clients.write().clear();
        debug!("loopback display shut down");
    }

    /// Disconnect the client owning `window`, as if its process exited
    pub fn kill_client(&self, window: Window) -> TransportResult<()> {
        let client = self.state.window_client(window)?;
        self.state.disconnect(client);
        Ok(())
    }

    /// Deliver a protocol error event to every client
    pub fn broadcast_error(&self, code: u8, major: u8) {
        let clients: Vec<ClientId> = self.state.clients.read().keys().copied().collect();
        for client in clients {
            self.state.deliver(
                client,
                Event::Error {
                    code,
                    major,
                    minor: 0,
                },
            );
        }
    }

    /// Number of intern/name-lookup round trips served so far
    #[must_use]
    pub fn atom_round_trips(&self) -> u64 {
        self.state.atom_round_trips.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn client_count(&self) -> usize {
        self.state.clients.read().len()
    }
}

impl Default for MemoryDisplay {
    fn default() -> Self {
        Self::new()
    }
}

/// One client of a `MemoryDisplay`
pub struct MemoryConnection {
    id: ClientId,
    state: Arc<DisplayState>,
    events: flume::Receiver<Event>,
}

impl MemoryConnection {
    #[must_use]
    pub fn client_id(&self) -> u32 {
        self.id
    }
}

impl Transport for MemoryConnection {
    fn intern_atom(&self, name: &str) -> TransportResult<Atom> {
        self.state.ensure_open()?;
        self.state.atom_round_trips.fetch_add(1, Ordering::Relaxed);
        if name.is_empty() {
            return Err(TransportError::Request("BadValue: empty atom name".into()));
        }

        if let Some(atom) = self.state.atoms.read().by_name.get(name) {
            return Ok(*atom);
        }

        let mut table = self.state.atoms.write();
        if let Some(atom) = table.by_name.get(name) {
            return Ok(*atom);
        }
        let atom = table.next;
        table.next += 1;
        table.by_name.insert(name.to_string(), atom);
        table.by_atom.insert(atom, name.to_string());
        trace!(atom, name, "atom interned");
        Ok(atom)
    }

    fn atom_name(&self, atom: Atom) -> TransportResult<String> {
        self.state.ensure_open()?;
        self.state.atom_round_trips.fetch_add(1, Ordering::Relaxed);
        self.state
            .atoms
            .read()
            .by_atom
            .get(&atom)
            .cloned()
            .ok_or_else(|| TransportError::Request(format!("BadAtom: {atom}")))
    }

    fn create_window(&self, title: &str) -> TransportResult<Window> {
        self.state.ensure_open()?;
        let window = self.state.next_resource.fetch_add(1, Ordering::Relaxed);

        let mut properties = HashMap::default();
        properties.insert(
            ATOM_WM_NAME,
            Property {
                type_: ATOM_STRING,
                format: 8,
                data: title.as_bytes().to_vec(),
            },
        );
        self.state.windows.write().insert(
            window,
            WindowState {
                client: self.id,
                properties,
            },
        );
        debug!(client = self.id, window, "loopback window created");
        Ok(window)
    }

    fn watch_selection(&self, window: Window, selection: Atom) -> TransportResult<()> {
        self.state.ensure_open()?;
        self.state.window_client(window)?;
        self.state.watches.write().push(Watch {
            client: self.id,
            window,
            selection,
        });
        Ok(())
    }

    fn set_selection_owner(&self, owner: Window, selection: Atom) -> TransportResult<()> {
        self.state.ensure_open()?;
        if owner != NONE {
            self.state.window_client(owner)?;
        }
        let time = self.state.tick();

        let previous = {
            let mut selections = self.state.selections.lock();
            if owner == NONE {
                selections.remove(&selection)
            } else {
                selections.insert(
                    selection,
                    SelectionOwner {
                        window: owner,
                        client: self.id,
                    },
                )
            }
        };

        if let Some(previous) = previous {
            if previous.window != owner {
                self.state.deliver(
                    previous.client,
                    Event::SelectionClear {
                        time,
                        owner: previous.window,
                        selection,
                    },
                );
            }
        }

        self.state.notify_watchers(selection, owner, time);
        Ok(())
    }

    fn selection_owner(&self, selection: Atom) -> TransportResult<Window> {
        self.state.ensure_open()?;
        Ok(self
            .state
            .selections
            .lock()
            .get(&selection)
            .map_or(NONE, |o| o.window))
    }

    fn convert_selection(
        &self,
        requestor: Window,
        selection: Atom,
        target: Atom,
        property: Atom,
        time: Timestamp,
    ) -> TransportResult<()> {
        self.state.ensure_open()?;
        let requestor_client = self.state.window_client(requestor)?;
        let owner = self
            .state
            .selections
            .lock()
            .get(&selection)
            .map(|o| (o.window, o.client));

        match owner {
            Some((window, client)) => self.state.deliver(
                client,
                Event::SelectionRequest(SelectionRequest {
                    time,
                    owner: window,
                    requestor,
                    selection,
                    target,
                    property,
                }),
            ),
            None => self.state.deliver(
                requestor_client,
                Event::SelectionNotify(SelectionNotify {
                    time,
                    requestor,
                    selection,
                    target,
                    property: NONE,
                }),
            ),
        }
        Ok(())
    }

    fn change_property(
        &self,
        window: Window,
        property: Atom,
        type_: Atom,
        format: u8,
        data: &[u8],
    ) -> TransportResult<()> {
        self.state.ensure_open()?;
        if !matches!(format, 8 | 16 | 32) || data.len() % usize::from(format / 8) != 0 {
            return Err(TransportError::Request(format!(
                "BadValue: format {format} with {} bytes",
                data.len()
            )));
        }

        let client = {
            let mut windows = self.state.windows.write();
            let state = windows
                .get_mut(&window)
                .ok_or_else(|| TransportError::Request(format!("BadWindow: {window:#x}")))?;
            state.properties.insert(
                property,
                Property {
                    type_,
                    format,
                    data: data.to_vec(),
                },
            );
            state.client
        };

        self.state.deliver(
            client,
            Event::PropertyNotify {
                window,
                atom: property,
                deleted: false,
            },
        );
        Ok(())
    }

    fn get_property(
        &self,
        delete: bool,
        window: Window,
        property: Atom,
        type_: Atom,
        long_offset: u32,
        long_length: u32,
    ) -> TransportResult<PropertyReply> {
        self.state.ensure_open()?;

        let (reply, deleted_for) = {
            let mut windows = self.state.windows.write();
            let state = windows
                .get_mut(&window)
                .ok_or_else(|| TransportError::Request(format!("BadWindow: {window:#x}")))?;

            let Some(prop) = state.properties.get(&property) else {
                return Ok(PropertyReply::default());
            };

            if type_ != ANY_PROPERTY_TYPE && type_ != prop.type_ {
                return Ok(PropertyReply {
                    type_: prop.type_,
                    format: prop.format,
                    bytes_after: prop.data.len() as u32,
                    value: Vec::new(),
                });
            }

            let total = prop.data.len();
            let start = (long_offset as usize).saturating_mul(4);
            if start > total {
                return Err(TransportError::Request(format!(
                    "BadValue: offset {long_offset} beyond {total} bytes"
                )));
            }
            let take = (total - start).min((long_length as usize).saturating_mul(4));
            let after = total - start - take;

            let reply = PropertyReply {
                type_: prop.type_,
                format: prop.format,
                bytes_after: after as u32,
                value: prop.data[start..start + take].to_vec(),
            };

            let deleted_for = if delete && after == 0 {
                state.properties.remove(&property);
                Some(state.client)
            } else {
                None
            };
            (reply, deleted_for)
        };

        if let Some(client) = deleted_for {
            self.state.deliver(
                client,
                Event::PropertyNotify {
                    window,
                    atom: property,
                    deleted: true,
                },
            );
        }
        Ok(reply)
    }

    fn send_selection_notify(&self, notify: &SelectionNotify) -> TransportResult<()> {
        self.state.ensure_open()?;
        let client = self.state.window_client(notify.requestor)?;
        self.state.deliver(client, Event::SelectionNotify(*notify));
        Ok(())
    }

    fn wait_for_event(&self) -> TransportResult<Event> {
        self.events
            .recv()
            .map_err(|_| TransportError::ConnectionLost)
    }

    fn flush(&self) -> TransportResult<()> {
        self.state.ensure_open()
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        if !self.state.closed.load(Ordering::Acquire) {
            self.state.disconnect(self.id);
        }
    }
}
