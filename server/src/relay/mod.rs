//! Relay core: who is connected, the single worker that applies send and
//! disconnect events, per-viewer presence fan-out and message persistence.
//!
//! Storage is reached through the [`MessageStore`] and [`Directory`] traits so
//! the relay never sees SQL. Both are synchronous; the relay calls them from
//! `spawn_blocking` the same way the HTTP handlers do.

pub mod event_loop;
pub mod messages;
pub mod presence;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use event_loop::{Event, EventLoop, RelayHandle};
pub use messages::MessageRelay;
pub use presence::PresenceBroadcaster;
pub use registry::{Connection, ConnectionHandle, ConnectionId, ConnectionRegistry, Delivery, SendError};

/// A persisted private message. Written once, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub from: String,
    pub to: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// One row of a viewer's presence list, as sent in `list_users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEntry {
    #[serde(rename = "user_login")]
    pub login: String,
    #[serde(rename = "user_id")]
    pub id: String,
    #[serde(rename = "online_status")]
    pub online: bool,
}

/// A known user other than the viewer, with the time of the latest message
/// exchanged between the two (if any).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correspondent {
    pub login: String,
    pub id: String,
    pub last_message_at: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("unknown user '{0}'")]
    UnknownUser(String),
    #[error("database error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable message log.
pub trait MessageStore: Send + Sync {
    /// Persist a message and return its timestamp. Fails with
    /// [`RelayError::UnknownUser`] if either endpoint is not a known login.
    fn save(&self, from: &str, to: &str, text: &str) -> Result<DateTime<Utc>, RelayError>;

    /// Messages between `a` and `b` in either direction, newest first,
    /// skipping the `skip` most recent and returning at most `limit`.
    fn query(&self, a: &str, b: &str, skip: u32, limit: u32) -> Result<Vec<ChatMessage>, RelayError>;
}

/// Enumerates known users relative to a viewer.
pub trait Directory: Send + Sync {
    /// Every known user except `viewer`, most recent correspondence first.
    fn correspondents(&self, viewer: &str) -> Result<Vec<Correspondent>, RelayError>;
}

/// Run synchronous storage work on the blocking pool.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, RelayError>
where
    F: FnOnce() -> Result<T, RelayError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| RelayError::Unavailable(format!("blocking task failed: {}", e)))?
}
