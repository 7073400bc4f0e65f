//! Typed application configuration.
//!
//! Built once at startup by [`ConfigService::load`](super::ConfigService::load)
//! and shared read-only (`Arc<AppConfig>`) with every component.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::defaults;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub vector_store: VectorStoreConfig,
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub ingest: IngestConfig,
    pub retrieval: RetrievalConfig,
    pub fallback: FallbackConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::SERVER_HOST.to_string(),
            port: defaults::SERVER_PORT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreProvider {
    #[default]
    Pinecone,
    /// In-process brute-force store. Nothing survives a restart.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub provider: VectorStoreProvider,
    pub api_key: Option<String>,
    /// Pinecone environment; used as the serverless region when an index is created.
    pub environment: Option<String>,
    pub index_name: Option<String>,
    pub cloud: String,
    pub metric: String,
    pub namespace: Option<String>,
    pub control_plane_url: String,
    pub api_version: String,
    pub timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            provider: VectorStoreProvider::default(),
            api_key: None,
            environment: None,
            index_name: None,
            cloud: defaults::PINECONE_CLOUD.to_string(),
            metric: defaults::PINECONE_METRIC.to_string(),
            namespace: None,
            control_plane_url: defaults::PINECONE_CONTROL_PLANE_URL.to_string(),
            api_version: defaults::PINECONE_API_VERSION.to_string(),
            timeout_secs: defaults::HTTP_TIMEOUT_SECS,
            max_retries: defaults::MAX_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    /// Expected embedding width. When unset, the first response decides.
    pub embedding_dimension: Option<usize>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i32>,
    pub timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: defaults::OPENAI_BASE_URL.to_string(),
            chat_model: defaults::CHAT_MODEL.to_string(),
            embedding_model: defaults::EMBEDDING_MODEL.to_string(),
            embedding_dimension: None,
            temperature: Some(defaults::CHAT_TEMPERATURE),
            max_tokens: None,
            timeout_secs: defaults::LLM_TIMEOUT_SECS,
            max_retries: defaults::MAX_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SearchProvider {
    #[default]
    #[serde(rename = "serpapi")]
    SerpApi,
    #[serde(rename = "google")]
    Google,
    #[serde(rename = "duckduckgo")]
    DuckDuckGo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub provider: SearchProvider,
    pub api_key: Option<String>,
    /// Google Custom Search engine id (`cx`).
    pub engine_id: Option<String>,
    pub base_url: Option<String>,
    pub max_results: usize,
    pub timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: SearchProvider::default(),
            api_key: None,
            engine_id: None,
            base_url: None,
            max_results: defaults::SEARCH_MAX_RESULTS,
            timeout_secs: defaults::HTTP_TIMEOUT_SECS,
            max_retries: defaults::MAX_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategy {
    /// Ordinal of the chunk within one ingestion run.
    Positional,
    /// SHA-256 over source, page and text.
    #[default]
    ContentHash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub data_dir: PathBuf,
    pub recursive: bool,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
    pub embed_batch_size: usize,
    pub embed_concurrency: usize,
    pub id_strategy: IdStrategy,
    /// Clear the index before upserting.
    pub recreate_index: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(defaults::DATA_DIR),
            recursive: false,
            chunk_size: defaults::CHUNK_SIZE,
            chunk_overlap: defaults::CHUNK_OVERLAP,
            batch_size: defaults::UPSERT_BATCH_SIZE,
            embed_batch_size: defaults::EMBED_BATCH_SIZE,
            embed_concurrency: defaults::EMBED_CONCURRENCY,
            id_strategy: IdStrategy::default(),
            recreate_index: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub condense_question: bool,
    pub memory_token_limit: usize,
    pub session_ttl_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: defaults::TOP_K,
            condense_question: true,
            memory_token_limit: defaults::MEMORY_TOKEN_LIMIT,
            session_ttl_secs: defaults::SESSION_TTL_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enabled: bool,
    pub markers: Vec<String>,
    pub prefix: String,
    pub max_agent_iterations: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            markers: defaults::REFUSAL_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            prefix: defaults::WEB_SEARCH_PREFIX.to_string(),
            max_agent_iterations: defaults::MAX_AGENT_ITERATIONS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}
