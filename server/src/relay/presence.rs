//! Personalized presence lists.
//!
//! Each connected viewer gets its own `list_users` frame: every other known
//! user, most recent correspondent first, flagged online if currently
//! registered. There is no global broadcast frame.

use std::sync::Arc;

use super::{run_blocking, Correspondent, Delivery, Directory, PresenceEntry, RelayError};
use super::registry::ConnectionRegistry;
use crate::ws::protocol::OutboundFrame;

#[derive(Clone)]
pub struct PresenceBroadcaster {
    directory: Arc<dyn Directory>,
    registry: ConnectionRegistry,
}

impl PresenceBroadcaster {
    pub fn new(directory: Arc<dyn Directory>, registry: ConnectionRegistry) -> Self {
        Self {
            directory,
            registry,
        }
    }

    /// Presence list as seen by `viewer`.
    pub async fn compute_view(&self, viewer: &str) -> Result<Vec<PresenceEntry>, RelayError> {
        let directory = self.directory.clone();
        let v = viewer.to_string();
        let mut candidates = run_blocking(move || directory.correspondents(&v)).await?;
        order_correspondents(&mut candidates);

        Ok(candidates
            .into_iter()
            .map(|c| PresenceEntry {
                online: self.registry.contains(&c.login),
                login: c.login,
                id: c.id,
            })
            .collect())
    }

    /// Send every registered identity its own view.
    ///
    /// Returns `true` if some write failed; that identity has already been
    /// deregistered and the others now hold a stale view of it.
    pub async fn refresh(&self) -> bool {
        let mut failed = false;

        for (viewer, _) in self.registry.snapshot() {
            let view = match self.compute_view(&viewer).await {
                Ok(view) => view,
                Err(e) => {
                    tracing::warn!(viewer = %viewer, error = %e, "Failed to compute presence view");
                    continue;
                }
            };
            let frame = OutboundFrame::ListUsers {
                connected_users: view,
            };
            if self.registry.deliver(&viewer, &frame) == Delivery::Failed {
                failed = true;
            }
        }

        failed
    }
}

/// Most recent correspondence first, never-contacted users last,
/// ties broken by case-insensitive login.
fn order_correspondents(candidates: &mut [Correspondent]) {
    candidates.sort_by(|a, b| {
        b.last_message_at
            .cmp(&a.last_message_at)
            .then_with(|| a.login.to_lowercase().cmp(&b.login.to_lowercase()))
    });
}
