//! JSON frames exchanged over the chat WebSocket.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};

use crate::relay::{ChatMessage, PresenceEntry};

/// Client -> server. Anything else fails to decode and is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum InboundFrame {
    /// Explicit logout; ends the connection.
    Left,
    /// Private message to `receiver`.
    Broadcast { message: String, receiver: String },
}

/// Server -> client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OutboundFrame {
    Welcome { message: String },
    ListUsers { connected_users: Vec<PresenceEntry> },
    Broadcast { new_message: ChatMessage },
    Error { message: String },
}

pub fn decode_inbound(text: &str) -> Result<InboundFrame, serde_json::Error> {
    serde_json::from_str(text)
}

impl OutboundFrame {
    pub fn to_message(&self) -> Result<Message, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(Message::Text(json.into()))
    }
}
