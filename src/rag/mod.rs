pub mod chunker;
pub mod embedding;
pub mod ingest;
pub mod loader;
pub mod memory_store;
pub mod pinecone;
pub mod store;
pub mod upsert;

pub use chunker::{Chunker, ChunkerConfig, TextChunk};
pub use embedding::{EmbeddingClient, EmbeddingServiceError, EmbeddingVector};
pub use ingest::{IngestReport, IngestionError, IngestionPipeline};
pub use loader::{load_directory, SourceDocument};
pub use memory_store::MemoryVectorStore;
pub use pinecone::PineconeStore;
pub use store::{IndexRecord, RecordMetadata, ScoredRecord, VectorStore, VectorStoreError};
pub use upsert::{BatchOutcome, IndexUpsertPipeline, UpsertBatchError, UpsertReport};
