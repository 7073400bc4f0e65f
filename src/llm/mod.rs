pub mod openai;
pub mod provider;
pub mod types;

pub use openai::OpenAiProvider;
pub use provider::{CompletionProvider, EmbeddingProvider, LlmError};
pub use types::{ChatMessage, ChatRequest};
