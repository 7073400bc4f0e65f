//! Retrieval-augmented answering over the document index.

use std::sync::Arc;

use thiserror::Error;

use crate::context::prompt::{build_answer_messages, build_condense_prompt, build_summary_prompt};
use crate::context::ConversationState;
use crate::core::config::{LlmConfig, RetrievalConfig};
use crate::llm::{ChatMessage, ChatRequest, CompletionProvider, LlmError};
use crate::rag::{EmbeddingClient, EmbeddingServiceError, ScoredRecord, VectorStore, VectorStoreError};

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("failed to embed question: {0}")]
    Embedding(#[from] EmbeddingServiceError),

    #[error("vector store query failed: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("completion failed: {0}")]
    Completion(#[from] LlmError),
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// Records placed into the prompt, best match first.
    pub sources: Vec<ScoredRecord>,
    /// The question the index was searched with.
    pub standalone_question: String,
}

pub struct RetrievalAnswerPipeline {
    llm: Arc<dyn CompletionProvider>,
    embedder: EmbeddingClient,
    store: Arc<dyn VectorStore>,
    llm_config: LlmConfig,
    config: RetrievalConfig,
}

impl RetrievalAnswerPipeline {
    pub fn new(
        llm: Arc<dyn CompletionProvider>,
        embedder: EmbeddingClient,
        store: Arc<dyn VectorStore>,
        llm_config: LlmConfig,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            llm,
            embedder,
            store,
            llm_config,
            config,
        }
    }

    pub async fn answer(
        &self,
        query: &str,
        state: &mut ConversationState,
    ) -> Result<Answer, RetrievalError> {
        let standalone_question = self.standalone_question(query, state).await?;

        let vector = self.embedder.embed_query(&standalone_question).await?;
        let sources = self.store.query(&vector, self.config.top_k).await?;
        tracing::debug!(
            hits = sources.len(),
            best = sources.first().map(|s| s.score).unwrap_or_default(),
            "retrieved context"
        );

        let messages = build_answer_messages(&standalone_question, &sources, state);
        let text = self.complete(messages).await?;

        state.record_exchange(query, &text);
        self.summarize_overflow(state).await;

        Ok(Answer {
            text,
            sources,
            standalone_question,
        })
    }

    async fn standalone_question(
        &self,
        query: &str,
        state: &ConversationState,
    ) -> Result<String, RetrievalError> {
        if !self.config.condense_question || !state.has_history() {
            return Ok(query.to_string());
        }

        let prompt = build_condense_prompt(query, state);
        let condensed = self.complete(vec![ChatMessage::user(prompt)]).await?;
        let condensed = condensed.trim();
        if condensed.is_empty() {
            return Ok(query.to_string());
        }
        tracing::debug!(question = %condensed, "condensed follow-up question");
        Ok(condensed.to_string())
    }

    /// Folds messages past the token limit into the summary. Failures are
    /// logged and the messages stay for the next turn.
    async fn summarize_overflow(&self, state: &mut ConversationState) {
        let overflow = state.overflow(self.config.memory_token_limit).to_vec();
        if overflow.is_empty() {
            return;
        }

        let prompt = build_summary_prompt(state.summary.as_deref(), &overflow);
        match self.complete(vec![ChatMessage::user(prompt)]).await {
            Ok(summary) => {
                state.apply_summary(summary.trim().to_string(), overflow.len());
                tracing::debug!(pruned = overflow.len(), "conversation summary updated");
            }
            Err(err) => {
                tracing::warn!("conversation summary failed, keeping raw messages: {}", err);
            }
        }
    }

    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError> {
        let request = ChatRequest::new(messages).with_config(&self.llm_config);
        self.llm.chat(request).await
    }
}
