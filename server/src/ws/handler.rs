use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
};

use crate::auth::session::SessionUser;
use crate::state::AppState;
use crate::ws::actor;

/// GET /ws
/// The session extractor runs first, so an unauthenticated request gets a
/// plain 401 and is never upgraded.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    user: SessionUser,
    ws: WebSocketUpgrade,
) -> Response {
    tracing::info!(
        identity = %user.login,
        user_id = %user.user_id,
        "WebSocket connection authenticated"
    );
    ws.on_upgrade(move |socket| actor::run_connection(socket, state, user.login))
}
