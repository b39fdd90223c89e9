//! Identity resolution from the `session` cookie.
//!
//! Sessions are issued elsewhere; this module only checks them. The cookie
//! value is `<sessionKey>|<userID>` and must match a live row in `sessions`.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
};
use chrono::Utc;
use rusqlite::OptionalExtension;

use crate::db::{format_timestamp, DbPool};
use crate::relay::RelayError;
use crate::state::AppState;

const SESSION_COOKIE: &str = "session";

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub user_id: String,
    pub login: String,
}

impl FromRequestParts<AppState> for SessionUser {
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let cookie = session_cookie(&parts.headers).ok_or(StatusCode::UNAUTHORIZED)?;
        let (session_key, user_id) =
            parse_session_value(&cookie).ok_or(StatusCode::UNAUTHORIZED)?;

        let db = state.db.clone();
        let user = tokio::task::spawn_blocking(move || lookup_session(&db, &session_key, &user_id))
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .map_err(|e| {
                tracing::error!(error = %e, "Session lookup failed");
                StatusCode::INTERNAL_SERVER_ERROR
            })?;

        user.ok_or(StatusCode::UNAUTHORIZED)
    }
}

/// Value of the `session` cookie, if the request carries one.
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

/// Split `<sessionKey>|<userID>`. Both halves must be non-empty.
fn parse_session_value(value: &str) -> Option<(String, String)> {
    let (key, user_id) = value.split_once('|')?;
    if key.is_empty() || user_id.is_empty() {
        return None;
    }
    Some((key.to_string(), user_id.to_string()))
}

/// Resolve a session to its user. `Ok(None)` for unknown or expired sessions.
pub fn lookup_session(
    db: &DbPool,
    session_key: &str,
    user_id: &str,
) -> Result<Option<SessionUser>, RelayError> {
    let conn = db
        .lock()
        .map_err(|_| RelayError::Unavailable("database lock poisoned".to_string()))?;

    let user = conn
        .query_row(
            "SELECT u.id, u.login FROM sessions s
             INNER JOIN users u ON u.id = s.user_id
             WHERE s.session_key = ?1 AND s.user_id = ?2 AND s.expires_at > ?3",
            rusqlite::params![session_key, user_id, format_timestamp(Utc::now())],
            |row| {
                Ok(SessionUser {
                    user_id: row.get(0)?,
                    login: row.get(1)?,
                })
            },
        )
        .optional()?;

    Ok(user)
}
