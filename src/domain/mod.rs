//! Domain layer: connections, the event protocol, and the hub.
//!
//! This module contains the relay's core model: connection identity and
//! handles, the wire envelope with its typed payloads, the handler table,
//! and the [`Hub`] that registers connections and fans events out to rooms.

pub mod connection;
pub mod connection_id;
pub mod event;
pub mod handlers;
pub mod hub;
pub mod payloads;

pub use connection::{Connection, DEFAULT_ROOM, OutboundReceiver, SendOutcome};
pub use connection_id::ConnectionId;
pub use event::{Event, EventKind};
pub use handlers::{EventHandler, HandlerTable};
pub use hub::{BroadcastReport, Hub};
