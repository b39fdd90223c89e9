use axum::extract::ws::{close_code, Message, WebSocket};
use futures_util::stream::SplitStream;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::relay::{Connection, ConnectionId, Event, RelayHandle};
use crate::state::AppState;
use crate::ws::connection::{writer_task, WsConnection};
use crate::ws::protocol::{self, InboundFrame, OutboundFrame};

/// Why a connection's read loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The client sent `{"action":"left"}`.
    Logout,
    /// The client sent a close frame.
    ClientClosed,
    /// A newer connection for the same identity replaced this one.
    Superseded,
    /// The stream ended without a close frame.
    StreamEnded,
    ReceiveError,
}

/// Submits the disconnect for a connection when dropped, so cleanup runs
/// exactly once on every exit path, unwinding included.
struct Teardown {
    relay: RelayHandle,
    identity: String,
    connection_id: ConnectionId,
}

impl Drop for Teardown {
    fn drop(&mut self) {
        self.relay.submit(Event::Disconnect {
            identity: std::mem::take(&mut self.identity),
            connection: Some(self.connection_id),
        });
    }
}

/// Run one authenticated connection from upgrade to teardown.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards frames queued by the relay
/// - Reader loop: decodes frames and submits them to the event loop
pub async fn run_connection(socket: WebSocket, state: AppState, identity: String) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    let conn = Arc::new(WsConnection::new(tx));
    let connection_id = conn.id();
    let mut superseded = conn.superseded();

    // Written before registration, so it precedes any event-loop write.
    let welcome = OutboundFrame::Welcome {
        message: state.welcome_message.clone(),
    };
    if let Err(e) = conn.send(&welcome) {
        tracing::warn!(identity = %identity, error = %e, "Failed to send welcome frame");
        writer_handle.abort();
        return;
    }

    state.connections.store(&identity, conn.clone());
    let teardown = Teardown {
        relay: state.relay.clone(),
        identity: identity.clone(),
        connection_id,
    };
    state.relay.submit(Event::Refresh);

    tracing::info!(
        identity = %identity,
        connection_id = %connection_id,
        "Connection opened"
    );

    let reason = read_loop(&mut ws_receiver, &mut superseded, &state.relay, &identity).await;
    drop(teardown);

    match reason {
        // close() already queued the 4000 frame
        CloseReason::Superseded => {
            let _ = writer_handle.await;
        }
        CloseReason::Logout => {
            conn.send_close(close_code::NORMAL, "logged out");
            let _ = writer_handle.await;
        }
        CloseReason::ClientClosed | CloseReason::StreamEnded | CloseReason::ReceiveError => {
            writer_handle.abort();
        }
    }

    tracing::info!(
        identity = %identity,
        connection_id = %connection_id,
        reason = ?reason,
        "Connection closed"
    );
}

async fn read_loop(
    ws_receiver: &mut SplitStream<WebSocket>,
    superseded: &mut watch::Receiver<bool>,
    relay: &RelayHandle,
    identity: &str,
) -> CloseReason {
    loop {
        // Supersession wins over frames already buffered on the old socket.
        let next = tokio::select! {
            biased;
            Ok(_) = superseded.wait_for(|closed| *closed) => return CloseReason::Superseded,
            next = ws_receiver.next() => next,
        };

        match next {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => match protocol::decode_inbound(text.as_str()) {
                    Ok(InboundFrame::Left) => return CloseReason::Logout,
                    Ok(InboundFrame::Broadcast { message, receiver }) => {
                        relay.submit(Event::Send {
                            from: identity.to_string(),
                            to: receiver,
                            text: message,
                        });
                    }
                    Err(e) => {
                        tracing::warn!(
                            identity = %identity,
                            error = %e,
                            "Discarding malformed frame"
                        );
                    }
                },
                Message::Binary(data) => {
                    tracing::debug!(
                        identity = %identity,
                        bytes = data.len(),
                        "Ignoring binary frame"
                    );
                }
                // axum answers pings itself
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Close(frame) => {
                    tracing::debug!(identity = %identity, frame = ?frame, "Client initiated close");
                    return CloseReason::ClientClosed;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    identity = %identity,
                    error = %e,
                    "WebSocket receive error"
                );
                return CloseReason::ReceiveError;
            }
            None => return CloseReason::StreamEnded,
        }
    }
}
