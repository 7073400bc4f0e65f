//! Conversation memory for one chat session.
//!
//! Keeps recent messages verbatim and folds older ones into a rolling
//! summary once the buffer grows past the token limit:
//! - Estimating token counts
//! - Selecting the oldest messages to summarize
//! - Rendering the memory as chat messages

use serde::{Deserialize, Serialize};

use crate::llm::ChatMessage;

/// A message in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMessage {
    /// Role: "user" or "assistant"
    pub role: String,
    /// Message content
    pub content: String,
    /// Estimated token count (cached)
    pub token_count: Option<usize>,
}

impl ContextMessage {
    /// Create a new message.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        let content_str = content.into();
        let estimated_tokens = estimate_tokens(&content_str);
        Self {
            role: role.into(),
            content: content_str,
            token_count: Some(estimated_tokens),
        }
    }

    /// Get the estimated token count.
    pub fn tokens(&self) -> usize {
        self.token_count.unwrap_or_else(|| estimate_tokens(&self.content))
    }

    fn speaker(&self) -> &str {
        match self.role.as_str() {
            "user" => "Human",
            "assistant" => "AI",
            other => other,
        }
    }
}

/// Rolling summary plus recent raw messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    pub summary: Option<String>,
    pub messages: Vec<ContextMessage>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_history(&self) -> bool {
        self.summary.is_some() || !self.messages.is_empty()
    }

    pub fn record_exchange(&mut self, question: &str, answer: &str) {
        self.messages.push(ContextMessage::new("user", question));
        self.messages.push(ContextMessage::new("assistant", answer));
    }

    /// Estimated tokens held in raw messages. The summary is not counted.
    pub fn buffer_tokens(&self) -> usize {
        self.messages.iter().map(|m| m.tokens()).sum()
    }

    /// The oldest messages that must be folded into the summary for the
    /// buffer to fit within `limit` tokens. Empty when it already fits.
    pub fn overflow(&self, limit: usize) -> &[ContextMessage] {
        let mut tokens = self.buffer_tokens();
        let mut count = 0;
        while tokens > limit && count < self.messages.len() {
            tokens -= self.messages[count].tokens();
            count += 1;
        }
        &self.messages[..count]
    }

    /// Replace the summary and drop the `pruned` oldest messages it now covers.
    pub fn apply_summary(&mut self, summary: String, pruned: usize) {
        let pruned = pruned.min(self.messages.len());
        self.messages.drain(..pruned);
        self.summary = Some(summary);
    }

    /// Recent messages as chat messages, oldest first.
    pub fn chat_messages(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .map(|m| ChatMessage::new(m.role.clone(), m.content.clone()))
            .collect()
    }

    /// "Human: ..." / "AI: ..." transcript lines.
    pub fn transcript(&self) -> String {
        render_transcript(&self.messages)
    }

    pub fn clear(&mut self) {
        self.summary = None;
        self.messages.clear();
    }
}

pub fn render_transcript(messages: &[ContextMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.speaker(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Estimate token count from text.
///
/// This is a simple estimation: ~4 characters per token for English text.
pub fn estimate_tokens(text: &str) -> usize {
    (text.len() + 3) / 4
}
