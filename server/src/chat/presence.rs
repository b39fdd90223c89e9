//! REST view of the caller's presence list.

use axum::{extract::State, http::StatusCode, Json};

use crate::auth::session::SessionUser;
use crate::relay::PresenceEntry;
use crate::state::AppState;

/// GET /api/presence: the same list the caller receives in `list_users`.
pub async fn get_presence(
    State(state): State<AppState>,
    user: SessionUser,
) -> Result<Json<Vec<PresenceEntry>>, StatusCode> {
    state
        .presence
        .compute_view(&user.login)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!(identity = %user.login, error = %e, "Presence query failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}
