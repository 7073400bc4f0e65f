//! Offline ingestion: load PDFs, chunk, embed and upsert into the index.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use super::chunker::{Chunker, ChunkerConfig};
use super::embedding::{EmbeddingClient, EmbeddingServiceError};
use super::loader::load_directory;
use super::store::{VectorStore, VectorStoreError};
use super::upsert::{IndexUpsertPipeline, UpsertReport};
use crate::core::config::IngestConfig;

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("data directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("no PDF documents found in {}", .0.display())]
    NoDocuments(PathBuf),

    #[error("documents in {} contain no extractable text", .0.display())]
    NoText(PathBuf),

    #[error("failed to parse PDF {}: {message}", path.display())]
    Pdf { path: PathBuf, message: String },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("background task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Embedding(#[from] EmbeddingServiceError),

    #[error(transparent)]
    VectorStore(#[from] VectorStoreError),

    #[error("{chunks} chunks but {vectors} embedding vectors")]
    LengthMismatch { chunks: usize, vectors: usize },
}

#[derive(Debug)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub upsert: UpsertReport,
}

pub struct IngestionPipeline {
    config: IngestConfig,
    chunker: Chunker,
    embedder: EmbeddingClient,
    store: Arc<dyn VectorStore>,
    upserter: IndexUpsertPipeline,
}

impl IngestionPipeline {
    pub fn new(config: IngestConfig, embedder: EmbeddingClient, store: Arc<dyn VectorStore>) -> Self {
        let chunker = Chunker::new(ChunkerConfig::from(&config));
        let upserter = IndexUpsertPipeline::new(store.clone(), config.batch_size, config.id_strategy);
        Self {
            config,
            chunker,
            embedder,
            store,
            upserter,
        }
    }

    pub async fn run(&self) -> Result<IngestReport, IngestionError> {
        let data_dir = &self.config.data_dir;
        let documents = load_directory(data_dir, self.config.recursive).await?;
        let chunks = self.chunker.chunk_documents(&documents);
        tracing::info!(
            documents = documents.len(),
            chunks = chunks.len(),
            chunk_size = self.chunker.config().chunk_size,
            "chunked documents"
        );
        if chunks.is_empty() {
            return Err(IngestionError::NoText(data_dir.clone()));
        }

        let vectors = self.embedder.embed_chunks(&chunks).await?;
        let dimension = vectors.first().map(Vec::len).unwrap_or_default();
        tracing::info!(vectors = vectors.len(), dimension, "embedded chunks");

        self.store.ensure_index(dimension).await?;
        if self.config.recreate_index {
            tracing::warn!(store = self.store.name(), "clearing index before upsert");
            self.store.clear().await?;
        }

        let upsert = self.upserter.upsert(&chunks, &vectors).await?;
        tracing::info!(
            batches = upsert.batches.len(),
            upserted = upsert.upserted_records(),
            total = upsert.total_records(),
            "upsert finished"
        );

        Ok(IngestReport {
            documents: documents.len(),
            chunks: chunks.len(),
            upsert,
        })
    }
}
