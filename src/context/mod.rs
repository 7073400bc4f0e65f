pub mod prompt;
pub mod session;
pub mod window;

pub use session::{Session, SessionStore};
pub use window::{estimate_tokens, ContextMessage, ConversationState};
