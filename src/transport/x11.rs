/*!
 * X11 Transport
 * Live X server connection over x11rb with the XFIXES selection extension
 */

use super::{
    Connector, Event, PropertyReply, SelectionNotify, SelectionRequest, Transport, TransportError,
    TransportResult,
};
use crate::core::types::{Atom, Timestamp, Window, ATOM_STRING, ATOM_WM_CLASS, ATOM_WM_NAME};
use std::sync::Arc;
use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xfixes::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{
    self, ConnectionExt as _, CreateWindowAux, EventMask, PropMode, WindowClass,
};
use x11rb::protocol::Event as XEvent;
use x11rb::rust_connection::RustConnection;

/// XFIXES version the engine relies on
const XFIXES_VERSION: (u32, u32) = (1, 0);

fn request_error(err: impl std::fmt::Display) -> TransportError {
    TransportError::Request(err.to_string())
}

/// Map a reply failure, treating a broken connection as connection loss
fn reply_error(err: x11rb::errors::ReplyError) -> TransportError {
    match err {
        x11rb::errors::ReplyError::ConnectionError(_) => TransportError::ConnectionLost,
        other => request_error(other),
    }
}

fn connection_error(err: x11rb::errors::ConnectionError) -> TransportError {
    match err {
        x11rb::errors::ConnectionError::UnknownError
        | x11rb::errors::ConnectionError::IoError(_) => TransportError::ConnectionLost,
        other => request_error(other),
    }
}

/// Transport backed by a live X server
pub struct X11Transport {
    conn: RustConnection,
    screen: usize,
}

impl X11Transport {
    /// Connect to `display` (or `$DISPLAY`) and negotiate XFIXES
    pub fn connect(display: Option<&str>) -> TransportResult<Self> {
        let (conn, screen) =
            x11rb::connect(display).map_err(|e| TransportError::Connect(e.to_string()))?;

        let version = conn
            .xfixes_query_version(XFIXES_VERSION.0, XFIXES_VERSION.1)
            .map_err(|e| TransportError::Connect(e.to_string()))?
            .reply()
            .map_err(|e| TransportError::Connect(format!("XFIXES unavailable: {e}")))?;
        debug!(
            major = version.major_version,
            minor = version.minor_version,
            screen,
            "connected to X server"
        );

        Ok(Self { conn, screen })
    }

    /// Connector for engines configured with a display name
    #[must_use]
    pub fn connector(display: Option<String>) -> Connector {
        Arc::new(move || {
            let transport: Arc<dyn Transport> = Arc::new(Self::connect(display.as_deref())?);
            Ok(transport)
        })
    }
}

impl Transport for X11Transport {
    fn intern_atom(&self, name: &str) -> TransportResult<Atom> {
        Ok(self
            .conn
            .intern_atom(false, name.as_bytes())
            .map_err(connection_error)?
            .reply()
            .map_err(reply_error)?
            .atom)
    }

    fn atom_name(&self, atom: Atom) -> TransportResult<String> {
        let reply = self
            .conn
            .get_atom_name(atom)
            .map_err(connection_error)?
            .reply()
            .map_err(reply_error)?;
        Ok(String::from_utf8_lossy(&reply.name).into_owned())
    }

    fn create_window(&self, title: &str) -> TransportResult<Window> {
        let screen = self
            .conn
            .setup()
            .roots
            .get(self.screen)
            .ok_or_else(|| TransportError::Connect(format!("screen {} missing", self.screen)))?;

        let window = self.conn.generate_id().map_err(request_error)?;
        let aux = CreateWindowAux::new()
            .background_pixel(screen.black_pixel)
            .override_redirect(1)
            .event_mask(EventMask::PROPERTY_CHANGE);
        self.conn
            .create_window(
                screen.root_depth,
                window,
                screen.root,
                -10,
                -10,
                1,
                1,
                0,
                WindowClass::INPUT_OUTPUT,
                screen.root_visual,
                &aux,
            )
            .map_err(connection_error)?
            .check()
            .map_err(reply_error)?;

        let class = format!("{title}\0{title}\0");
        self.change_property(window, ATOM_WM_CLASS, ATOM_STRING, 8, class.as_bytes())?;
        self.change_property(window, ATOM_WM_NAME, ATOM_STRING, 8, title.as_bytes())?;
        Ok(window)
    }

    fn watch_selection(&self, window: Window, selection: Atom) -> TransportResult<()> {
        let mask = xfixes::SelectionEventMask::SET_SELECTION_OWNER
            | xfixes::SelectionEventMask::SELECTION_WINDOW_DESTROY
            | xfixes::SelectionEventMask::SELECTION_CLIENT_CLOSE;
        self.conn
            .xfixes_select_selection_input(window, selection, mask)
            .map_err(connection_error)?;
        Ok(())
    }

    fn set_selection_owner(&self, owner: Window, selection: Atom) -> TransportResult<()> {
        self.conn
            .set_selection_owner(owner, selection, x11rb::CURRENT_TIME)
            .map_err(connection_error)?;
        Ok(())
    }

    fn selection_owner(&self, selection: Atom) -> TransportResult<Window> {
        Ok(self
            .conn
            .get_selection_owner(selection)
            .map_err(connection_error)?
            .reply()
            .map_err(reply_error)?
            .owner)
    }

    fn convert_selection(
        &self,
        requestor: Window,
        selection: Atom,
        target: Atom,
        property: Atom,
        time: Timestamp,
    ) -> TransportResult<()> {
        self.conn
            .convert_selection(requestor, selection, target, property, time)
            .map_err(connection_error)?;
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
        let unit = usize::from(format / 8).max(1);
        self.conn
            .change_property(
                PropMode::REPLACE,
                window,
                property,
                type_,
                format,
                (data.len() / unit) as u32,
                data,
            )
            .map_err(connection_error)?;
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
        let reply = self
            .conn
            .get_property(delete, window, property, type_, long_offset, long_length)
            .map_err(connection_error)?
            .reply()
            .map_err(reply_error)?;
        Ok(PropertyReply {
            type_: reply.type_,
            format: reply.format,
            bytes_after: reply.bytes_after,
            value: reply.value,
        })
    }

    fn send_selection_notify(&self, notify: &SelectionNotify) -> TransportResult<()> {
        let event = xproto::SelectionNotifyEvent {
            response_type: xproto::SELECTION_NOTIFY_EVENT,
            sequence: 0,
            time: notify.time,
            requestor: notify.requestor,
            selection: notify.selection,
            target: notify.target,
            property: notify.property,
        };
        self.conn
            .send_event(false, notify.requestor, EventMask::NO_EVENT, event)
            .map_err(connection_error)?;
        Ok(())
    }

    fn wait_for_event(&self) -> TransportResult<Event> {
        let event = self.conn.wait_for_event().map_err(connection_error)?;
        Ok(match event {
            XEvent::SelectionRequest(e) => Event::SelectionRequest(SelectionRequest {
                time: e.time,
                owner: e.owner,
                requestor: e.requestor,
                selection: e.selection,
                target: e.target,
                property: e.property,
            }),
            XEvent::SelectionNotify(e) => Event::SelectionNotify(SelectionNotify {
                time: e.time,
                requestor: e.requestor,
                selection: e.selection,
                target: e.target,
                property: e.property,
            }),
            XEvent::SelectionClear(e) => Event::SelectionClear {
                time: e.time,
                owner: e.owner,
                selection: e.selection,
            },
            XEvent::XfixesSelectionNotify(e) => Event::OwnerChange {
                window: e.window,
                owner: e.owner,
                selection: e.selection,
                timestamp: e.timestamp,
                selection_timestamp: e.selection_timestamp,
            },
            XEvent::PropertyNotify(e) => Event::PropertyNotify {
                window: e.window,
                atom: e.atom,
                deleted: e.state == xproto::Property::DELETE,
            },
            XEvent::Error(e) => Event::Error {
                code: e.error_code,
                major: e.major_opcode,
                minor: e.minor_opcode,
            },
            other => {
                let code = other.response_type();
                if code == 0 {
                    warn!("event without response type");
                }
                Event::Other(code)
            }
        })
    }

    fn flush(&self) -> TransportResult<()> {
        self.conn.flush().map_err(connection_error)
    }
}
