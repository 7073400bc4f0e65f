use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = (Utc::now() - state.started_at).num_seconds().max(0);
    Json(json!({
        "status": "ok",
        "vector_store": state.store.name(),
        "active_sessions": state.chat.active_sessions().await,
        "fallback_enabled": state.config.fallback.enabled,
        "uptime_secs": uptime,
    }))
}
