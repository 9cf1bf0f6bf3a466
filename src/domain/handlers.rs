//! Event handler table and the built-in handlers.
//!
//! A [`HandlerTable`] is assembled once before the [`Hub`] is built and is
//! immutable afterwards. Each handler decodes its own payload schema, so a
//! payload that does not match its declared type fails only that message.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::payloads::{ChangeRoom, NewMessage, SendMessage, Typing, UserList};
use super::{Connection, Event, EventKind, Hub, SendOutcome};
use crate::error::ProtocolError;

/// A function bound to one event kind, invoked with the hub, the
/// originating connection, and the event.
pub type EventHandler = fn(&Hub, &Arc<Connection>, &Event) -> Result<(), ProtocolError>;

/// Mapping from event kind to handler.
#[derive(Debug, Clone, Default)]
pub struct HandlerTable {
    handlers: HashMap<EventKind, EventHandler>,
}

impl HandlerTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the table with every client-originated kind bound to its
    /// built-in handler.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .with(EventKind::SendMessage, send_message)
            .with(EventKind::ChangeRoom, change_room)
            .with(EventKind::Typing, relay_typing)
            .with(EventKind::StopTyping, relay_typing)
            .with(EventKind::UserList, user_list)
    }

    /// Binds `handler` to `kind`, replacing any previous binding.
    #[must_use]
    pub fn with(mut self, kind: EventKind, handler: EventHandler) -> Self {
        let _ = self.handlers.insert(kind, handler);
        self
    }

    /// Looks up the handler for `kind`.
    #[must_use]
    pub fn get(&self, kind: &EventKind) -> Option<EventHandler> {
        self.handlers.get(kind).copied()
    }

    /// Number of bound kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no kinds are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// `send_message` → `new_message` to every connection in the sender's room,
/// the sender included.
fn send_message(hub: &Hub, source: &Arc<Connection>, event: &Event) -> Result<(), ProtocolError> {
    let request: SendMessage = event.payload_as()?;
    let outgoing = Event::new(
        EventKind::NewMessage,
        &NewMessage::stamped(request, Utc::now()),
    )?;
    let _ = hub.broadcast_to_room(outgoing, &source.room());
    Ok(())
}

/// `change_room` moves the source to another room and tells both rooms.
fn change_room(hub: &Hub, source: &Arc<Connection>, event: &Event) -> Result<(), ProtocolError> {
    let ChangeRoom { room_name } = event.payload_as()?;
    let previous = source.set_room(room_name.clone());
    if previous == room_name {
        return Ok(());
    }

    info!(
        conn_id = %source.id(),
        from = previous,
        to = room_name,
        "client changed room"
    );
    let subject = source.subject().to_string();
    hub.announce(EventKind::UserLeft, subject.clone(), previous);
    hub.announce(EventKind::UserJoined, subject, room_name);
    Ok(())
}

/// `typing` / `stop_typing` go to room peers, not back to the sender.
fn relay_typing(hub: &Hub, source: &Arc<Connection>, event: &Event) -> Result<(), ProtocolError> {
    let typing: Typing = event.payload_as()?;
    let outgoing = Event::new(event.kind.clone(), &typing)?;
    let _ = hub.broadcast_to_room_except(outgoing, &source.room(), source.id());
    Ok(())
}

/// `user_list` is answered to the requester only.
fn user_list(hub: &Hub, source: &Arc<Connection>, _event: &Event) -> Result<(), ProtocolError> {
    let room = source.room();
    let users = hub.room_subjects(&room);
    let reply = Event::new(EventKind::UserList, &UserList { room, users })?;
    if source.send(Arc::new(reply)) != SendOutcome::Queued {
        warn!(conn_id = %source.id(), "failed to enqueue user list reply");
    }
    Ok(())
}
