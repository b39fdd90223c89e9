//! In-memory stand-ins for connections and storage used by relay unit tests.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::{
    ChatMessage, Connection, ConnectionId, Correspondent, Directory, MessageStore, RelayError,
    SendError,
};
use crate::ws::protocol::OutboundFrame;

pub struct RecordingConnection {
    id: ConnectionId,
    frames: Mutex<Vec<OutboundFrame>>,
    closed: AtomicBool,
    broken: AtomicBool,
}

impl RecordingConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::now_v7(),
            frames: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            broken: AtomicBool::new(false),
        })
    }

    /// Make every later send fail as if the socket died.
    pub fn break_connection(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn frames(&self) -> Vec<OutboundFrame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn presence_views(&self) -> Vec<Vec<crate::relay::PresenceEntry>> {
        self.frames()
            .into_iter()
            .filter_map(|frame| match frame {
                OutboundFrame::ListUsers { connected_users } => Some(connected_users),
                _ => None,
            })
            .collect()
    }

    pub fn broadcasts(&self) -> Vec<ChatMessage> {
        self.frames()
            .into_iter()
            .filter_map(|frame| match frame {
                OutboundFrame::Broadcast { new_message } => Some(new_message),
                _ => None,
            })
            .collect()
    }
}

impl Connection for RecordingConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, frame: &OutboundFrame) -> Result<(), SendError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(SendError::Closed);
        }
        self.frames.lock().unwrap().push(frame.clone());
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Message log and user directory over plain vectors. Each saved message is
/// stamped one second after the previous one so ordering is deterministic.
pub struct MemoryStore {
    users: Vec<(String, String)>,
    messages: Mutex<Vec<ChatMessage>>,
    epoch: DateTime<Utc>,
}

impl MemoryStore {
    pub fn with_users(logins: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            users: logins
                .iter()
                .enumerate()
                .map(|(i, login)| (login.to_string(), format!("id-{}", i)))
                .collect(),
            messages: Mutex::new(Vec::new()),
            epoch: Utc::now(),
        })
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().unwrap().clone()
    }

    fn knows(&self, login: &str) -> bool {
        self.users.iter().any(|(l, _)| l == login)
    }
}

impl MessageStore for MemoryStore {
    fn save(&self, from: &str, to: &str, text: &str) -> Result<DateTime<Utc>, RelayError> {
        for login in [from, to] {
            if !self.knows(login) {
                return Err(RelayError::UnknownUser(login.to_string()));
            }
        }
        let mut messages = self.messages.lock().unwrap();
        let sent_at = self.epoch + TimeDelta::seconds(messages.len() as i64);
        messages.push(ChatMessage {
            from: from.to_string(),
            to: to.to_string(),
            text: text.to_string(),
            sent_at,
        });
        Ok(sent_at)
    }

    fn query(&self, a: &str, b: &str, skip: u32, limit: u32) -> Result<Vec<ChatMessage>, RelayError> {
        let messages = self.messages.lock().unwrap();
        Ok(messages
            .iter()
            .rev()
            .filter(|m| (m.from == a && m.to == b) || (m.from == b && m.to == a))
            .skip(skip as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

impl Directory for MemoryStore {
    fn correspondents(&self, viewer: &str) -> Result<Vec<Correspondent>, RelayError> {
        let messages = self.messages.lock().unwrap();
        Ok(self
            .users
            .iter()
            .filter(|(login, _)| login != viewer)
            .map(|(login, id)| Correspondent {
                login: login.clone(),
                id: id.clone(),
                last_message_at: messages
                    .iter()
                    .filter(|m| {
                        (m.from == *login && m.to == viewer) || (m.from == viewer && m.to == *login)
                    })
                    .map(|m| m.sent_at)
                    .max(),
            })
            .collect())
    }
}
