use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::chat::{messages, presence};
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // WebSocket endpoint (auth via session cookie)
    let ws_routes = Router::new().route("/ws", get(ws_handler::ws_upgrade));

    // Session-authenticated REST routes
    let chat_routes = Router::new()
        .route("/chat", get(messages::get_history))
        .route("/api/presence", get(presence::get_presence));

    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(ws_routes)
        .merge(chat_routes)
        .merge(health)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
