use async_trait::async_trait;
use thiserror::Error;

use super::types::ChatRequest;
use crate::core::http::HttpFailure;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    #[error("provider returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl From<HttpFailure> for LlmError {
    fn from(failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::Transport(err) => LlmError::Transport(err.to_string()),
            HttpFailure::Status { status, body } if status.as_u16() == 429 => {
                LlmError::RateLimited(body)
            }
            HttpFailure::Status { status, body } => LlmError::Upstream {
                status: status.as_u16(),
                body,
            },
            HttpFailure::Decode(message) => LlmError::Malformed(message),
        }
    }
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// provider name used in logs
    fn name(&self) -> &str;

    /// chat completion (non-streaming)
    async fn chat(&self, request: ChatRequest) -> Result<String, LlmError>;
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// one vector per input, in input order
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;
}
