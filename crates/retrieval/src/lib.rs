//! Document chunking and scoped retrieval for case vaults.
//!
//! Documents are split into overlapping chunks, embedded, and stored in a
//! per-vault namespace of a vector index. At query time the [`Retriever`]
//! embeds the query and returns the most similar chunks from an allowlist of
//! documents, ready to ground generated text.

pub mod chunker;
pub mod context;
pub mod embeddings;
pub mod ingest;
pub mod retriever;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

pub use chunker::{chunk_text, Chunk, ChunkConfig, Chunks};
pub use context::{build_context, source_refs, SourceRef};
pub use embeddings::{create_provider, EmbeddingProvider};
pub use ingest::{IngestJob, IngestQueue, Ingestor, QueueStats, RetryPolicy};
pub use retriever::{RetrievalOptions, Retriever};
pub use types::{
    ChunkMetadata, DocumentInput, IngestReport, MetadataValue, RetrievedChunk, VectorMatch,
    VectorRecord,
};
pub use vector_index::{create_index, vault_namespace, vector_id, MetadataFilter, VectorIndex};
