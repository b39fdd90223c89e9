use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use super::protocol::OutboundFrame;
use super::ConnectionSender;
use crate::relay::{Connection, ConnectionId, SendError};

/// Close code sent to a socket replaced by a newer login of the same user.
pub const CLOSE_SUPERSEDED: u16 = 4000;

/// A WebSocket as the relay sees it: an outbound queue plus an id.
///
/// `superseded` flips to `true` when the relay closes the connection, which
/// ends the owning read loop without waiting for the client.
pub struct WsConnection {
    id: ConnectionId,
    tx: ConnectionSender,
    superseded: watch::Sender<bool>,
}

impl WsConnection {
    pub fn new(tx: ConnectionSender) -> Self {
        Self {
            id: Uuid::now_v7(),
            tx,
            superseded: watch::Sender::new(false),
        }
    }

    /// Watch for [`Connection::close`] being called on this connection.
    pub fn superseded(&self) -> watch::Receiver<bool> {
        self.superseded.subscribe()
    }

    /// Queue a close frame. The writer task stops after sending it.
    pub fn send_close(&self, code: u16, reason: &'static str) {
        let _ = self.tx.send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })));
    }
}

impl Connection for WsConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, frame: &OutboundFrame) -> Result<(), SendError> {
        let msg = frame.to_message()?;
        self.tx.send(msg).map_err(|_| SendError::Closed)
    }

    fn close(&self) {
        self.send_close(CLOSE_SUPERSEDED, "superseded by a newer connection");
        self.superseded.send_replace(true);
    }
}

/// Writer task: receives messages from the queue and forwards them to the
/// WebSocket sink. Ends on the first failed write or after a close frame.
pub async fn writer_task(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if ws_sender.send(msg).await.is_err() || closing {
            break;
        }
    }
}
