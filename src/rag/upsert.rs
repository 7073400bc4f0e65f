//! Batched upsert of embedded chunks into the vector store.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use thiserror::Error;

use super::chunker::TextChunk;
use super::embedding::EmbeddingVector;
use super::ingest::IngestionError;
use super::store::{IndexRecord, RecordMetadata, VectorStore, VectorStoreError};
use crate::core::config::IdStrategy;

#[derive(Debug, Error)]
#[error("upsert batch {ordinal} ({record_count} records) failed: {source}")]
pub struct UpsertBatchError {
    pub ordinal: usize,
    pub record_count: usize,
    #[source]
    pub source: VectorStoreError,
}

#[derive(Debug)]
pub struct BatchOutcome {
    /// 1-based position of the batch in the run
    pub ordinal: usize,
    pub record_count: usize,
    /// Number of records the store acknowledged.
    pub result: Result<usize, UpsertBatchError>,
}

#[derive(Debug, Default)]
pub struct UpsertReport {
    pub batches: Vec<BatchOutcome>,
}

impl UpsertReport {
    pub fn total_records(&self) -> usize {
        self.batches.iter().map(|b| b.record_count).sum()
    }

    pub fn upserted_records(&self) -> usize {
        self.batches
            .iter()
            .filter(|b| b.result.is_ok())
            .map(|b| b.record_count)
            .sum()
    }

    pub fn failed_batches(&self) -> impl Iterator<Item = &BatchOutcome> {
        self.batches.iter().filter(|b| b.result.is_err())
    }

    pub fn is_complete(&self) -> bool {
        self.failed_batches().next().is_none()
    }
}

pub struct IndexUpsertPipeline {
    store: Arc<dyn VectorStore>,
    batch_size: usize,
    id_strategy: IdStrategy,
}

impl IndexUpsertPipeline {
    pub fn new(store: Arc<dyn VectorStore>, batch_size: usize, id_strategy: IdStrategy) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            id_strategy,
        }
    }

    /// Issues `ceil(N / batch_size)` upserts. A failed batch is recorded in the
    /// report and the remaining batches still run.
    pub async fn upsert(
        &self,
        chunks: &[TextChunk],
        vectors: &[EmbeddingVector],
    ) -> Result<UpsertReport, IngestionError> {
        if chunks.len() != vectors.len() {
            return Err(IngestionError::LengthMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }

        let records: Vec<IndexRecord> = chunks
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(ordinal, (chunk, values))| IndexRecord {
                id: record_id(self.id_strategy, ordinal, chunk),
                values: values.clone(),
                metadata: RecordMetadata {
                    source: chunk.source_path.clone(),
                    page_number: chunk.page_number,
                    text: chunk.text.clone(),
                },
            })
            .collect();

        let mut report = UpsertReport::default();
        for (index, batch) in records.chunks(self.batch_size).enumerate() {
            let ordinal = index + 1;
            let record_count = batch.len();
            let result = match self.store.upsert(batch).await {
                Ok(written) => {
                    tracing::debug!(batch = ordinal, records = written, "upserted batch");
                    Ok(written)
                }
                Err(source) => {
                    tracing::error!(batch = ordinal, records = record_count, "upsert failed: {}", source);
                    Err(UpsertBatchError {
                        ordinal,
                        record_count,
                        source,
                    })
                }
            };
            report.batches.push(BatchOutcome {
                ordinal,
                record_count,
                result,
            });
        }

        Ok(report)
    }
}

/// Record id for the chunk at `ordinal` within the ingestion run.
pub fn record_id(strategy: IdStrategy, ordinal: usize, chunk: &TextChunk) -> String {
    match strategy {
        IdStrategy::Positional => ordinal.to_string(),
        IdStrategy::ContentHash => {
            let mut hasher = Sha256::new();
            hasher.update(chunk.source_path.as_bytes());
            hasher.update([0u8]);
            hasher.update(chunk.page_number.to_le_bytes());
            hasher.update([0u8]);
            hasher.update(chunk.text.as_bytes());
            hex::encode(hasher.finalize())
        }
    }
}
