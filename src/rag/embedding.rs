//! Batched, bounded-concurrency embedding of chunk texts.

use std::sync::Arc;

use futures_util::{stream, StreamExt, TryStreamExt};
use thiserror::Error;

use super::chunker::TextChunk;
use crate::core::config::{IngestConfig, LlmConfig};
use crate::llm::{EmbeddingProvider, LlmError};

pub type EmbeddingVector = Vec<f32>;

#[derive(Debug, Error)]
pub enum EmbeddingServiceError {
    #[error("embedding transport error: {0}")]
    Transport(String),

    #[error("embedding provider rate limited: {0}")]
    RateLimited(String),

    #[error("embedding provider returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("malformed embedding response: {0}")]
    MalformedResponse(String),

    #[error("expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("expected embedding dimension {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl From<LlmError> for EmbeddingServiceError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Transport(msg) => EmbeddingServiceError::Transport(msg),
            LlmError::RateLimited(msg) => EmbeddingServiceError::RateLimited(msg),
            LlmError::Upstream { status, body } => EmbeddingServiceError::Upstream { status, body },
            LlmError::Malformed(msg) => EmbeddingServiceError::MalformedResponse(msg),
        }
    }
}

#[derive(Clone)]
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    concurrency: usize,
    dimension: Option<usize>,
}

impl EmbeddingClient {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            batch_size: 100,
            concurrency: 1,
            dimension: None,
        }
    }

    pub fn from_config(
        provider: Arc<dyn EmbeddingProvider>,
        llm: &LlmConfig,
        ingest: &IngestConfig,
    ) -> Self {
        Self::new(provider)
            .with_batching(ingest.embed_batch_size, ingest.embed_concurrency)
            .with_dimension(llm.embedding_dimension)
    }

    pub fn with_batching(mut self, batch_size: usize, concurrency: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_dimension(mut self, dimension: Option<usize>) -> Self {
        self.dimension = dimension;
        self
    }

    /// One vector per input, in input order.
    pub async fn embed_texts(
        &self,
        texts: &[String],
    ) -> Result<Vec<EmbeddingVector>, EmbeddingServiceError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let batches: Vec<Vec<String>> = texts
            .chunks(self.batch_size)
            .map(<[String]>::to_vec)
            .collect();
        let provider = self.provider.clone();
        let embedded: Vec<Vec<EmbeddingVector>> = stream::iter(batches)
            .map(move |batch| embed_batch(provider.clone(), batch))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let vectors: Vec<EmbeddingVector> = embedded.into_iter().flatten().collect();
        self.check_dimensions(&vectors)?;
        tracing::debug!(
            provider = self.provider.name(),
            count = vectors.len(),
            "embedded texts"
        );
        Ok(vectors)
    }

    pub async fn embed_chunks(
        &self,
        chunks: &[TextChunk],
    ) -> Result<Vec<EmbeddingVector>, EmbeddingServiceError> {
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        self.embed_texts(&texts).await
    }

    pub async fn embed_query(&self, query: &str) -> Result<EmbeddingVector, EmbeddingServiceError> {
        let mut vectors = self.embed_texts(&[query.to_string()]).await?;
        vectors.pop().ok_or(EmbeddingServiceError::CountMismatch {
            expected: 1,
            actual: 0,
        })
    }

    fn check_dimensions(&self, vectors: &[EmbeddingVector]) -> Result<(), EmbeddingServiceError> {
        let Some(expected) = self.dimension.or_else(|| vectors.first().map(Vec::len)) else {
            return Ok(());
        };
        match vectors.iter().find(|v| v.len() != expected) {
            Some(bad) => Err(EmbeddingServiceError::DimensionMismatch {
                expected,
                actual: bad.len(),
            }),
            None => Ok(()),
        }
    }
}

async fn embed_batch(
    provider: Arc<dyn EmbeddingProvider>,
    batch: Vec<String>,
) -> Result<Vec<EmbeddingVector>, EmbeddingServiceError> {
    let vectors = provider.embed(&batch).await?;
    if vectors.len() != batch.len() {
        return Err(EmbeddingServiceError::CountMismatch {
            expected: batch.len(),
            actual: vectors.len(),
        });
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;

    /// Echoes each input's numeric suffix so ordering is observable.
    struct CountingProvider {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        drop_last: bool,
    }

    impl CountingProvider {
        fn new(drop_last: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                drop_last,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let numbers: Vec<f32> = inputs
                .iter()
                .map(|text| text.trim_start_matches('t').parse().unwrap_or(-1.0))
                .collect();
            // Later batches finish first.
            let first = numbers.first().copied().unwrap_or(0.0).max(0.0) as u64;
            let delay = 40u64.saturating_sub(first * 4);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let mut vectors: Vec<Vec<f32>> = numbers.into_iter().map(|n| vec![n, 1.0]).collect();
            if self.drop_last {
                vectors.pop();
            }
            Ok(vectors)
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("t{}", i)).collect()
    }

    #[tokio::test]
    async fn preserves_input_order_across_concurrent_batches() {
        let provider = Arc::new(CountingProvider::new(false));
        let client = EmbeddingClient::new(provider.clone()).with_batching(4, 3);

        let vectors = client.embed_texts(&texts(10)).await.unwrap();

        assert_eq!(vectors.len(), 10);
        for (i, v) in vectors.iter().enumerate() {
            assert_eq!(v[0], i as f32);
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert!(provider.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn embedding_runs_inside_spawned_tasks() {
        let client = EmbeddingClient::new(Arc::new(CountingProvider::new(false))).with_batching(2, 2);

        let handle = tokio::spawn(async move {
            let inputs = texts(5);
            client.embed_texts(&inputs).await
        });

        let vectors = handle.await.unwrap().unwrap();
        assert_eq!(vectors.len(), 5);
        assert_eq!(vectors[4][0], 4.0);
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let provider = Arc::new(CountingProvider::new(false));
        let client = EmbeddingClient::new(provider.clone()).with_batching(1, 2);

        client.embed_texts(&texts(8)).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 8);
        assert!(provider.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn short_responses_are_count_mismatches() {
        let client = EmbeddingClient::new(Arc::new(CountingProvider::new(true)));

        let err = client.embed_texts(&texts(3)).await.unwrap_err();

        assert!(matches!(err, EmbeddingServiceError::CountMismatch { expected: 3, actual: 2 }));
    }

    #[tokio::test]
    async fn configured_dimension_is_enforced() {
        let client = EmbeddingClient::new(Arc::new(CountingProvider::new(false)))
            .with_dimension(Some(1536));

        let err = client.embed_query("t1").await.unwrap_err();

        assert!(matches!(
            err,
            EmbeddingServiceError::DimensionMismatch { expected: 1536, actual: 2 }
        ));
    }

    #[tokio::test]
    async fn empty_input_makes_no_calls() {
        let provider = Arc::new(CountingProvider::new(false));
        let client = EmbeddingClient::new(provider.clone());

        assert!(client.embed_texts(&[]).await.unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
