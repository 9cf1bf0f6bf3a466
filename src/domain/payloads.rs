//! Typed payload schemas, one per [`super::EventKind`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload of `send_message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessage {
    /// Message text.
    pub message: String,
    /// Sender label chosen by the client.
    pub from: String,
}

/// Payload of `new_message`: a relayed [`SendMessage`] plus the server's
/// send time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    /// Message text.
    pub message: String,
    /// Sender label.
    pub from: String,
    /// When the server relayed the message.
    pub sent_at: DateTime<Utc>,
}

impl NewMessage {
    /// Stamps an inbound message with the relay time.
    #[must_use]
    pub fn stamped(request: SendMessage, sent_at: DateTime<Utc>) -> Self {
        Self {
            message: request.message,
            from: request.from,
            sent_at,
        }
    }
}

/// Payload of `change_room`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRoom {
    /// Room to move into.
    pub room_name: String,
}

/// Payload of `user_joined` and `user_left`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    /// Token subject of the connection that moved.
    pub subject: String,
    /// Room that was entered or left.
    pub room: String,
}

/// Payload of `typing` and `stop_typing`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Typing {
    /// Sender label chosen by the client.
    pub from: String,
}

/// Server reply to `user_list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserList {
    /// Room the listing is for.
    pub room: String,
    /// Subjects currently in the room, sorted.
    pub users: Vec<String>,
}
