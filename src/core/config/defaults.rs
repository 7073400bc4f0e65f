pub const SERVER_HOST: &str = "127.0.0.1";
pub const SERVER_PORT: u16 = 8080;

pub const PINECONE_CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
pub const PINECONE_API_VERSION: &str = "2024-07";
pub const PINECONE_CLOUD: &str = "aws";
pub const PINECONE_METRIC: &str = "cosine";

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const CHAT_MODEL: &str = "gpt-3.5-turbo";
pub const EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const CHAT_TEMPERATURE: f64 = 0.7;

pub const HTTP_TIMEOUT_SECS: u64 = 30;
pub const LLM_TIMEOUT_SECS: u64 = 60;
pub const MAX_RETRIES: usize = 2;

pub const SEARCH_MAX_RESULTS: usize = 3;

pub const DATA_DIR: &str = "data";
pub const CHUNK_SIZE: usize = 500;
pub const CHUNK_OVERLAP: usize = 20;
pub const UPSERT_BATCH_SIZE: usize = 100;
pub const EMBED_BATCH_SIZE: usize = 100;
pub const EMBED_CONCURRENCY: usize = 4;

pub const TOP_K: usize = 3;
pub const MEMORY_TOKEN_LIMIT: usize = 2000;
pub const SESSION_TTL_SECS: u64 = 3600;

pub const REFUSAL_MARKERS: [&str; 2] = ["I don't", "I'm sorry"];
pub const WEB_SEARCH_PREFIX: &str = "Websearch : ";
pub const MAX_AGENT_ITERATIONS: usize = 5;
