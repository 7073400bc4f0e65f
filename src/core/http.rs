//! Shared outbound HTTP plumbing: JSON requests with bounded retry.

use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpFailure {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("invalid JSON body: {0}")]
    Decode(String),
}

impl HttpFailure {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, HttpFailure::Status { status, .. } if *status == StatusCode::TOO_MANY_REQUESTS)
    }
}

/// Sends the request built by `build`, retrying up to `max_retries` times on
/// transport errors, 429 and 5xx. Successful empty bodies decode to `Null`.
pub async fn send_json_with_retry<F>(max_retries: usize, build: F) -> Result<Value, HttpFailure>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0usize;
    loop {
        match build().send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    let text = resp.text().await?;
                    if text.trim().is_empty() {
                        return Ok(Value::Null);
                    }
                    return serde_json::from_str(&text)
                        .map_err(|err| HttpFailure::Decode(err.to_string()));
                }

                let body = resp
                    .text()
                    .await
                    .unwrap_or_else(|_| "<body unavailable>".to_string());
                if should_retry(status) && attempt < max_retries {
                    attempt += 1;
                    tracing::debug!(%status, attempt, "retrying request");
                    tokio::time::sleep(retry_backoff(attempt)).await;
                    continue;
                }
                return Err(HttpFailure::Status { status, body });
            }
            Err(err) => {
                if is_retryable_error(&err) && attempt < max_retries {
                    attempt += 1;
                    tracing::debug!(error = %err, attempt, "retrying request");
                    tokio::time::sleep(retry_backoff(attempt)).await;
                    continue;
                }
                return Err(HttpFailure::Transport(err));
            }
        }
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(250 * (1 << capped))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::http::StatusCode as AxumStatus;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;
    use crate::test_support::serve;

    fn flaky_app(failures: usize, status: AxumStatus) -> (Router, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let app = Router::new().route(
            "/",
            post(move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n < failures {
                        (status, Json(json!({"error": "busy"})))
                    } else {
                        (AxumStatus::OK, Json(json!({"ok": true})))
                    }
                }
            }),
        );
        (app, calls)
    }

    #[tokio::test]
    async fn retries_rate_limited_requests() {
        let (app, calls) = flaky_app(1, AxumStatus::TOO_MANY_REQUESTS);
        let base = serve(app).await;
        let client = reqwest::Client::new();

        let value = send_json_with_retry(2, || client.post(&base).json(&json!({})))
            .await
            .unwrap();

        assert_eq!(value, json!({"ok": true}));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let (app, calls) = flaky_app(5, AxumStatus::BAD_REQUEST);
        let base = serve(app).await;
        let client = reqwest::Client::new();

        let err = send_json_with_retry(3, || client.post(&base).json(&json!({})))
            .await
            .unwrap_err();

        assert!(matches!(err, HttpFailure::Status { status, .. } if status == StatusCode::BAD_REQUEST));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_retries_gives_up_after_one_attempt() {
        let (app, calls) = flaky_app(5, AxumStatus::TOO_MANY_REQUESTS);
        let base = serve(app).await;
        let client = reqwest::Client::new();

        let err = send_json_with_retry(0, || client.post(&base).json(&json!({})))
            .await
            .unwrap_err();

        assert!(err.is_rate_limited());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
