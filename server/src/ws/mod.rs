pub mod actor;
pub mod connection;
pub mod handler;
pub mod protocol;

use axum::extract::ws::Message;
use tokio::sync::mpsc;

/// Sender half of a connection's outbound queue, drained by its writer task.
pub type ConnectionSender = mpsc::UnboundedSender<Message>;
