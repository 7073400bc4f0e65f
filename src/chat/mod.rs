pub mod fallback;
pub mod retrieval;
pub mod service;

pub use fallback::{AnswerClassifier, DispatchOutcome, FallbackDispatcher, RefusalMarkerClassifier, Route};
pub use retrieval::{Answer, RetrievalAnswerPipeline, RetrievalError};
pub use service::{ChatReply, ChatService};
