//! In-process vector store with brute-force cosine similarity search.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::store::{IndexRecord, ScoredRecord, VectorStore, VectorStoreError};

#[derive(Default)]
pub struct MemoryVectorStore {
    inner: RwLock<MemoryIndex>,
}

#[derive(Default)]
struct MemoryIndex {
    dimension: Option<usize>,
    records: BTreeMap<String, IndexRecord>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn ensure_index(&self, dimension: usize) -> Result<(), VectorStoreError> {
        let mut index = self.inner.write().await;
        match index.dimension {
            Some(expected) if expected != dimension => Err(VectorStoreError::DimensionMismatch {
                expected,
                actual: dimension,
            }),
            _ => {
                index.dimension = Some(dimension);
                Ok(())
            }
        }
    }

    async fn upsert(&self, records: &[IndexRecord]) -> Result<usize, VectorStoreError> {
        let mut index = self.inner.write().await;
        for record in records {
            let expected = *index.dimension.get_or_insert(record.values.len());
            if record.values.len() != expected {
                return Err(VectorStoreError::DimensionMismatch {
                    expected,
                    actual: record.values.len(),
                });
            }
        }
        for record in records {
            index.records.insert(record.id.clone(), record.clone());
        }
        Ok(records.len())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>, VectorStoreError> {
        let index = self.inner.read().await;
        if let Some(expected) = index.dimension {
            if vector.len() != expected {
                return Err(VectorStoreError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }

        let mut scored: Vec<ScoredRecord> = index
            .records
            .values()
            .map(|record| ScoredRecord {
                score: cosine_similarity(vector, &record.values),
                record: record.clone(),
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn count(&self) -> Result<u64, VectorStoreError> {
        Ok(self.inner.read().await.records.len() as u64)
    }

    async fn clear(&self) -> Result<(), VectorStoreError> {
        self.inner.write().await.records.clear();
        Ok(())
    }
}
