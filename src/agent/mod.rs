pub mod search_agent;

pub use search_agent::{AgentError, AgentOutcome, SearchAgent};
