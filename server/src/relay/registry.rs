use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::ws::protocol::OutboundFrame;

/// Distinguishes successive connections made under the same identity.
pub type ConnectionId = Uuid;

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The connection's writer is gone; the socket is dead.
    #[error("connection closed")]
    Closed,
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Write side of a live connection. The relay only ever sees this capability,
/// never the socket itself.
pub trait Connection: Send + Sync {
    fn id(&self) -> ConnectionId;
    fn send(&self, frame: &OutboundFrame) -> Result<(), SendError>;
    fn close(&self);
}

pub type ConnectionHandle = Arc<dyn Connection>;

/// Outcome of a delivery attempt to one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Nobody is connected under that identity.
    Offline,
    /// The write failed and the connection was deregistered.
    Failed,
}

/// identity -> live connection, at most one entry per identity.
///
/// Cheap to clone; all clones share the same map. Safe to use from every
/// connection task and the event loop at once.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<DashMap<String, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `conn` under `identity`. A connection it replaces is closed so
    /// its read loop ends instead of lingering unaddressable.
    pub fn store(&self, identity: &str, conn: ConnectionHandle) {
        let new_id = conn.id();
        if let Some(previous) = self.inner.insert(identity.to_string(), conn) {
            if previous.id() != new_id {
                tracing::info!(
                    identity = %identity,
                    connection_id = %previous.id(),
                    "Closing superseded connection"
                );
                previous.close();
            }
        }
    }

    pub fn load(&self, identity: &str) -> Option<ConnectionHandle> {
        self.inner.get(identity).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.inner.contains_key(identity)
    }

    /// Unconditionally drop the entry for `identity`.
    pub fn delete(&self, identity: &str) -> Option<ConnectionHandle> {
        self.inner.remove(identity).map(|(_, conn)| conn)
    }

    /// Drop the entry for `identity` only if it is still connection `id`.
    pub fn remove_if_current(&self, identity: &str, id: ConnectionId) -> bool {
        self.inner
            .remove_if(identity, |_, conn| conn.id() == id)
            .is_some()
    }

    /// Point-in-time copy of every entry. Entries added or removed while the
    /// caller walks the copy are not reflected.
    pub fn snapshot(&self) -> Vec<(String, ConnectionHandle)> {
        self.inner
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Write `frame` to whoever is connected as `identity`.
    /// A closed connection is deregistered on the spot.
    pub fn deliver(&self, identity: &str, frame: &OutboundFrame) -> Delivery {
        let Some(conn) = self.load(identity) else {
            return Delivery::Offline;
        };

        match conn.send(frame) {
            Ok(()) => Delivery::Delivered,
            Err(SendError::Closed) => {
                tracing::warn!(
                    identity = %identity,
                    connection_id = %conn.id(),
                    "Write to closed connection, deregistering"
                );
                self.remove_if_current(identity, conn.id());
                Delivery::Failed
            }
            Err(e) => {
                tracing::warn!(identity = %identity, error = %e, "Frame not delivered");
                Delivery::Failed
            }
        }
    }
}
