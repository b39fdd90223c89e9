//! REST endpoint for private message history.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::auth::session::SessionUser;
use crate::relay::ChatMessage;
use crate::state::AppState;

/// Default page size for message history.
const DEFAULT_LIMIT: u32 = 50;
/// Maximum page size for message history.
const MAX_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Login of the other participant.
    pub with: Option<String>,
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

/// GET /chat?with={login}&skip={n}&limit={n}
/// Conversation between the caller and `with`, oldest first. Session required.
pub async fn get_history(
    State(state): State<AppState>,
    user: SessionUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ChatMessage>>, StatusCode> {
    let with = query
        .with
        .filter(|w| !w.is_empty())
        .ok_or(StatusCode::BAD_REQUEST)?;
    let skip = query.skip.unwrap_or(0);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

    let messages = state
        .messages
        .history(&user.login, &with, skip, limit)
        .await
        .map_err(|e| {
            tracing::error!(identity = %user.login, with = %with, error = %e, "History query failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    tracing::debug!(
        identity = %user.login,
        with = %with,
        count = messages.len(),
        "Served message history"
    );

    Ok(Json(messages))
}
