use std::sync::Arc;

use crate::chat::store::SqliteChatStore;
use crate::db::DbPool;
use crate::relay::{
    ConnectionRegistry, EventLoop, MessageRelay, PresenceBroadcaster, RelayHandle,
};

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// Live WebSocket connection per identity
    pub connections: ConnectionRegistry,
    /// Submission side of the relay event loop
    pub relay: RelayHandle,
    pub messages: MessageRelay,
    pub presence: PresenceBroadcaster,
    /// Greeting sent in the `welcome` frame
    pub welcome_message: String,
}

impl AppState {
    /// Wire the relay over `db`. The returned event loop must be spawned
    /// before any connection is accepted.
    pub fn build(db: DbPool, welcome_message: String) -> (Self, EventLoop) {
        let store = Arc::new(SqliteChatStore::new(db.clone()));
        let connections = ConnectionRegistry::new();
        let messages = MessageRelay::new(store.clone());
        let presence = PresenceBroadcaster::new(store, connections.clone());
        let (event_loop, relay) =
            EventLoop::new(connections.clone(), messages.clone(), presence.clone());

        let state = Self {
            db,
            connections,
            relay,
            messages,
            presence,
            welcome_message,
        };
        (state, event_loop)
    }
}
