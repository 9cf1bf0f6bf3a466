//! Wire envelope and the closed set of event kinds.
//!
//! Every frame in both directions is `{"type": "<tag>", "payload": <json>}`.
//! The envelope is decoded eagerly; the payload stays opaque until the
//! handler for its kind asks for a concrete schema via
//! [`Event::payload_as`].

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Discriminator for relay events.
///
/// Tags outside the known set decode to [`EventKind::Unknown`] so that the
/// router, not the decoder, reports them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// Client → Server chat message.
    SendMessage,
    /// Server → Client chat message with server timestamp.
    NewMessage,
    /// Client → Server request to move to another room.
    ChangeRoom,
    /// Server → Client presence: someone entered the room.
    UserJoined,
    /// Server → Client presence: someone left the room.
    UserLeft,
    /// Client typing indicator, relayed to room peers.
    Typing,
    /// Client stopped typing, relayed to room peers.
    StopTyping,
    /// Client request / server reply listing room members.
    UserList,
    /// Any tag not listed above.
    Unknown(String),
}

impl EventKind {
    /// Returns the wire tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::SendMessage => "send_message",
            Self::NewMessage => "new_message",
            Self::ChangeRoom => "change_room",
            Self::UserJoined => "user_joined",
            Self::UserLeft => "user_left",
            Self::Typing => "typing",
            Self::StopTyping => "stop_typing",
            Self::UserList => "user_list",
            Self::Unknown(tag) => tag,
        }
    }
}

impl From<String> for EventKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "send_message" => Self::SendMessage,
            "new_message" => Self::NewMessage,
            "change_room" | "change_chatroom" => Self::ChangeRoom,
            "user_joined" => Self::UserJoined,
            "user_left" => Self::UserLeft,
            "typing" => Self::Typing,
            "stop_typing" => Self::StopTyping,
            "user_list" => Self::UserList,
            _ => Self::Unknown(tag),
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Unknown(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event type discriminator.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Kind-specific payload. Absent payloads decode as `null`.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Event {
    /// Builds an event from a typed payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidPayload`] if the payload cannot be
    /// represented as JSON.
    pub fn new<T: Serialize>(kind: EventKind, payload: &T) -> Result<Self, ProtocolError> {
        let payload = serde_json::to_value(payload).map_err(|e| ProtocolError::InvalidPayload {
            event_type: kind.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { kind, payload })
    }

    /// Decodes an envelope from a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedEnvelope`] if the text is not a
    /// JSON object with a string `type`.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedEnvelope(e.to_string()))
    }

    /// Encodes the envelope to its wire form.
    ///
    /// # Errors
    ///
    /// Returns the underlying serializer error.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decodes the payload into the schema for this event's kind.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidPayload`] if the payload shape does
    /// not match `T`.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        T::deserialize(&self.payload).map_err(|e| ProtocolError::InvalidPayload {
            event_type: self.kind.to_string(),
            reason: e.to_string(),
        })
    }
}
