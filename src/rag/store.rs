//! VectorStore trait: abstract interface for the similarity index.
//!
//! Backends: [`PineconeStore`](super::pinecone::PineconeStore) for the hosted
//! index and [`MemoryVectorStore`](super::memory_store::MemoryVectorStore) for
//! local runs and tests.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::core::http::HttpFailure;

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("vector store transport error: {0}")]
    Transport(String),

    #[error("vector store rate limited: {0}")]
    RateLimited(String),

    #[error("vector store returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("malformed vector store response: {0}")]
    Malformed(String),

    #[error("index is not ready: {0}")]
    IndexNotReady(String),

    #[error("vector dimension mismatch: index holds {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl From<HttpFailure> for VectorStoreError {
    fn from(failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::Transport(err) => VectorStoreError::Transport(err.to_string()),
            HttpFailure::Status { status, body } if status.as_u16() == 429 => {
                VectorStoreError::RateLimited(body)
            }
            HttpFailure::Status { status, body } => VectorStoreError::Upstream {
                status: status.as_u16(),
                body,
            },
            HttpFailure::Decode(message) => VectorStoreError::Malformed(message),
        }
    }
}

/// Metadata stored next to every vector. Key names are part of the index format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub source: String,
    #[serde(deserialize_with = "page_number_from_number")]
    pub page_number: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: RecordMetadata,
}

/// Result of a similarity query. `record.values` may be empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub record: IndexRecord,
    /// Similarity score (higher = better).
    pub score: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    fn name(&self) -> &str;

    /// Create the index if it does not exist yet.
    async fn ensure_index(&self, dimension: usize) -> Result<(), VectorStoreError>;

    /// Insert or overwrite records by id. Returns the number written.
    async fn upsert(&self, records: &[IndexRecord]) -> Result<usize, VectorStoreError>;

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>, VectorStoreError>;

    async fn count(&self) -> Result<u64, VectorStoreError>;

    /// Delete every record.
    async fn clear(&self) -> Result<(), VectorStoreError>;
}

// Hosted stores keep numeric metadata as floats.
fn page_number_from_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value < 0.0 || value > u32::MAX as f64 || value.fract() != 0.0 {
        return Err(serde::de::Error::custom(format!(
            "invalid page_number: {}",
            value
        )));
    }
    Ok(value as u32)
}
