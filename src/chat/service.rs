use std::time::Duration;

use super::fallback::{FallbackDispatcher, Route};
use super::retrieval::RetrievalAnswerPipeline;
use crate::context::SessionStore;
use crate::core::errors::ApiError;
use crate::rag::ScoredRecord;

#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    pub route: Route,
    pub sources: Vec<ScoredRecord>,
}

/// Entry point for one chat turn: retrieval answer, then fallback routing.
pub struct ChatService {
    sessions: SessionStore,
    retrieval: RetrievalAnswerPipeline,
    fallback: FallbackDispatcher,
}

impl ChatService {
    pub fn new(retrieval: RetrievalAnswerPipeline, fallback: FallbackDispatcher) -> Self {
        Self {
            sessions: SessionStore::new(),
            retrieval,
            fallback,
        }
    }

    pub async fn ask(&self, session_id: &str, message: &str) -> Result<ChatReply, ApiError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ApiError::BadRequest("message must not be empty".to_string()));
        }

        let session = self.sessions.get_or_create(session_id).await;
        let mut state = session.lock().await;

        let answer = self.retrieval.answer(message, &mut state).await?;
        let outcome = self.fallback.dispatch(message, answer.text).await;
        tracing::info!(
            session = %session_id,
            route = ?outcome.route,
            sources = answer.sources.len(),
            "chat turn complete"
        );

        Ok(ChatReply {
            text: outcome.text,
            route: outcome.route,
            sources: answer.sources,
        })
    }

    /// Forgets the session's conversation. Returns false for unknown ids.
    pub async fn reset(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).await
    }

    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        self.sessions.evict_idle(ttl).await
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.len().await
    }
}
