use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{Html, IntoResponse, Response};
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::core::errors::ApiError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "docchat_session";

const CHAT_PAGE: &str = include_str!("../../../templates/chat.html");

#[derive(Debug, Default, Deserialize)]
pub struct ChatForm {
    #[serde(default)]
    pub msg: String,
}

pub async fn index() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

pub async fn chat_form(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<ChatForm>,
) -> Result<Response, ApiError> {
    respond(&state, &headers, &form.msg).await
}

pub async fn chat_query(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(form): Query<ChatForm>,
) -> Result<Response, ApiError> {
    respond(&state, &headers, &form.msg).await
}

pub async fn reset_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let cleared = match session_from_headers(&headers) {
        Some(id) => state.chat.reset(&id).await,
        None => false,
    };
    Ok(Json(json!({ "cleared": cleared })))
}

async fn respond(state: &AppState, headers: &HeaderMap, msg: &str) -> Result<Response, ApiError> {
    let (session_id, issued) = match session_from_headers(headers) {
        Some(id) => (id, false),
        None => (Uuid::new_v4().to_string(), true),
    };

    let reply = state.chat.ask(&session_id, msg).await?;
    let mut response = reply.text.into_response();

    if issued {
        let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, session_id);
        let value = HeaderValue::from_str(&cookie).map_err(ApiError::internal)?;
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    Ok(response)
}

/// Session id from the `Cookie` header, if it carries a plausible one.
fn session_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty() && value.len() <= 64)
}
