use std::sync::Arc;

use axum::routing::{delete, get};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::server::handlers::{chat, health};
use crate::state::AppState;

/// Creates the application router:
/// - the chat page and the `/get` chat endpoint
/// - session reset
/// - health check
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(chat::index))
        .route("/get", get(chat::chat_query).post(chat::chat_form))
        .route("/api/session", delete(chat::reset_session))
        .route("/health", get(health::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
