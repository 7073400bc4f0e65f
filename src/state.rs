use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};

use crate::agent::SearchAgent;
use crate::chat::{ChatService, FallbackDispatcher, RetrievalAnswerPipeline};
use crate::core::config::{AppConfig, AppPaths, VectorStoreProvider};
use crate::llm::OpenAiProvider;
use crate::rag::{EmbeddingClient, MemoryVectorStore, PineconeStore, VectorStore};
use crate::tools::WebSearchClient;

pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn VectorStore>,
    pub chat: ChatService,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wires the providers named in `config` into the chat service.
    pub fn initialize(paths: Arc<AppPaths>, config: Arc<AppConfig>) -> anyhow::Result<Arc<Self>> {
        let openai = Arc::new(
            OpenAiProvider::new(&config.llm).context("Failed to build OpenAI client")?,
        );
        let store = build_vector_store(&config)?;
        let embedder = EmbeddingClient::from_config(openai.clone(), &config.llm, &config.ingest);

        let retrieval = RetrievalAnswerPipeline::new(
            openai.clone(),
            embedder,
            store.clone(),
            config.llm.clone(),
            config.retrieval.clone(),
        );

        let agent = if config.fallback.enabled {
            let search = WebSearchClient::new(&config.search)
                .context("Failed to build web search client")?;
            Some(SearchAgent::new(
                openai,
                Arc::new(search),
                config.llm.clone(),
                config.fallback.max_agent_iterations,
            ))
        } else {
            None
        };
        let fallback = FallbackDispatcher::from_config(&config.fallback, agent);

        Ok(Self::from_parts(paths, config, store, ChatService::new(retrieval, fallback)))
    }

    pub fn from_parts(
        paths: Arc<AppPaths>,
        config: Arc<AppConfig>,
        store: Arc<dyn VectorStore>,
        chat: ChatService,
    ) -> Arc<Self> {
        Arc::new(AppState {
            paths,
            config,
            store,
            chat,
            started_at: Utc::now(),
        })
    }
}

pub fn build_vector_store(config: &AppConfig) -> anyhow::Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match config.vector_store.provider {
        VectorStoreProvider::Pinecone => Arc::new(
            PineconeStore::new(&config.vector_store).context("Failed to build Pinecone client")?,
        ),
        VectorStoreProvider::Memory => {
            tracing::warn!("using the in-memory vector store; the index is empty until ingested in-process");
            Arc::new(MemoryVectorStore::new())
        }
    };
    Ok(store)
}
