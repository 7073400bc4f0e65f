pub mod search;

pub use search::{render_observation, SearchError, SearchResult, WebSearch, WebSearchClient};
