//! The single worker that applies relay events one at a time.
//!
//! Every relay-originated write (presence lists, broadcasts, error frames)
//! happens on this task, so a connection never sees two relay writers at once
//! and a sender's messages are persisted and delivered in submission order.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::messages::MessageRelay;
use super::presence::PresenceBroadcaster;
use super::registry::{ConnectionId, ConnectionRegistry, Delivery};
use crate::ws::protocol::OutboundFrame;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Persist a message and deliver it to both endpoints.
    Send { from: String, to: String, text: String },
    /// Deregister `identity` and refresh presence. With a connection id the
    /// entry is only removed if it still belongs to that connection.
    Disconnect {
        identity: String,
        connection: Option<ConnectionId>,
    },
    /// Recompute and deliver everyone's presence list.
    Refresh,
}

/// Submission side of the event channel. Cheap to clone.
#[derive(Clone)]
pub struct RelayHandle {
    tx: mpsc::UnboundedSender<Event>,
}

impl RelayHandle {
    pub fn submit(&self, event: Event) {
        if let Err(e) = self.tx.send(event) {
            tracing::error!(event = ?e.0, "Event loop is gone, event dropped");
        }
    }

    /// A handle whose events land on the returned receiver instead of a loop.
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

pub struct EventLoop {
    registry: ConnectionRegistry,
    messages: MessageRelay,
    presence: PresenceBroadcaster,
    rx: mpsc::UnboundedReceiver<Event>,
    refresh_pending: bool,
}

impl EventLoop {
    pub fn new(
        registry: ConnectionRegistry,
        messages: MessageRelay,
        presence: PresenceBroadcaster,
    ) -> (Self, RelayHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_loop = Self {
            registry,
            messages,
            presence,
            rx,
            refresh_pending: false,
        };
        (event_loop, RelayHandle { tx })
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process events until every [`RelayHandle`] is dropped.
    pub async fn run(mut self) {
        while let Some(event) = self.rx.recv().await {
            self.handle(event).await;

            // A failed write deregisters someone, which changes what the
            // remaining viewers should see.
            while std::mem::take(&mut self.refresh_pending) {
                self.refresh_presence().await;
            }
        }
        tracing::debug!("Event loop stopped");
    }

    async fn handle(&mut self, event: Event) {
        match event {
            Event::Send { from, to, text } => self.relay_message(from, to, text).await,
            Event::Disconnect {
                identity,
                connection,
            } => {
                let removed = match connection {
                    Some(id) => self.registry.remove_if_current(&identity, id),
                    None => self.registry.delete(&identity).is_some(),
                };
                tracing::debug!(identity = %identity, removed, "Disconnect processed");
                self.refresh_pending = true;
            }
            Event::Refresh => self.refresh_pending = true,
        }
    }

    async fn relay_message(&mut self, from: String, to: String, text: String) {
        let message = match self.messages.persist(&from, &to, &text).await {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(from = %from, to = %to, error = %e, "Message not persisted");
                let frame = OutboundFrame::Error {
                    message: format!("Message was not saved: {}", e),
                };
                self.deliver(&from, &frame);
                return;
            }
        };

        self.refresh_presence().await;

        let frame = OutboundFrame::Broadcast {
            new_message: message,
        };
        self.deliver(&from, &frame);
        if to != from {
            self.deliver(&to, &frame);
        }
    }

    fn deliver(&mut self, identity: &str, frame: &OutboundFrame) {
        if self.registry.deliver(identity, frame) == Delivery::Failed {
            self.refresh_pending = true;
        }
    }

    async fn refresh_presence(&mut self) {
        if self.presence.refresh().await {
            self.refresh_pending = true;
        }
    }
}
