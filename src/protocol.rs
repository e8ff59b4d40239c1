//! Streaming protocol definitions.
//!
//! The room stream carries one JSON object per text frame, shaped
//! `{"event": ..., "data": ...}`. Client-to-server events are `username`,
//! `joinRoom`, and `send`; the server answers with `messages`, a full
//! snapshot of the room state rather than a per-message delta.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ChatUser, Message};

/// Client-to-server stream events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientCommand {
    /// Announce the display name to attach to subsequent sends.
    Username(String),
    /// Join a room. The server replies with a `messages` snapshot, so this
    /// doubles as an explicit snapshot request.
    JoinRoom(String),
    /// Send a message into a room.
    Send { message: String, room: String },
}

/// Server-to-client stream events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Full snapshot of all messages known to the server. Replaces the
    /// local message set wholesale.
    Messages(Vec<WireMessage>),
    Connect,
    Disconnect,
}

/// A message as it appears on the wire: no id, just routing and content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    pub room: String,
    pub text: String,
    pub user: ChatUser,
}

impl From<WireMessage> for Message {
    fn from(w: WireMessage) -> Self {
        Message {
            id: Uuid::new_v4(),
            user: w.user,
            text: w.text,
            room: w.room,
        }
    }
}
