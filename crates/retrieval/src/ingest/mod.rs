//! Document ingestion: chunk, embed, store.
//!
//! Each document costs one batched embedding call and `ceil(n / batch_size)`
//! upserts. Vector ids are derived from `(document_id, chunk_index)`, so
//! re-ingesting a document overwrites its previous vectors in place.

pub mod queue;

pub use queue::{IngestJob, IngestQueue, QueueStats, RetryPolicy};

use crate::chunker::{Chunk, ChunkConfig};
use crate::embeddings::EmbeddingProvider;
use crate::types::{ChunkMetadata, DocumentInput, IngestReport, VectorRecord};
use crate::vector_index::{vault_namespace, vector_id, VectorIndex};
use casevault_core::{AppError, AppResult};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Default number of vectors per upsert request.
pub const DEFAULT_UPSERT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct Ingestor {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            batch_size: DEFAULT_UPSERT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Chunk, embed and store one document in its vault's namespace.
    ///
    /// A document without any non-blank text yields an empty report and makes
    /// no embedding or index calls.
    pub async fn ingest_document(
        &self,
        vault_id: &str,
        document: &DocumentInput,
        config: &ChunkConfig,
    ) -> AppResult<IngestReport> {
        require_id("vault id", vault_id)?;
        require_id("document id", &document.document_id)?;
        if self.batch_size == 0 {
            return Err(AppError::InvalidInput(
                "Upsert batch size must be greater than zero".to_string(),
            ));
        }

        let started = Instant::now();
        let namespace = vault_namespace(vault_id);
        let chunks: Vec<Chunk> = config.chunks(&document.text)?.collect();

        if chunks.is_empty() {
            info!(
                "Document {} has no text to index, nothing ingested",
                document.document_id
            );
            return Ok(build_report(document, namespace, Vec::new(), 0, started));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(AppError::Ingest(format!(
                "Embedding provider returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let records: Vec<VectorRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, values)| VectorRecord {
                id: vector_id(&document.document_id, chunk.chunk_index),
                values,
                metadata: ChunkMetadata {
                    document_id: document.document_id.clone(),
                    chunk_index: chunk.chunk_index,
                    text: chunk.text,
                    document_name: document.document_name.clone(),
                    document_type: document.document_type.clone(),
                    extra: document.extra.clone(),
                },
            })
            .collect();

        let mut batch_count = 0;
        for batch in records.chunks(self.batch_size) {
            self.index.upsert(&namespace, batch).await?;
            batch_count += 1;
            debug!(
                "Upserted batch {} ({} vectors) for {}",
                batch_count,
                batch.len(),
                document.document_id
            );
        }

        let vector_ids: Vec<String> = records.into_iter().map(|r| r.id).collect();
        let report = build_report(document, namespace, vector_ids, batch_count, started);

        info!(
            "Ingested {} chunks of {} into {} in {:.2}s",
            report.chunk_count, document.document_id, report.namespace, report.duration_secs
        );

        Ok(report)
    }

    /// Re-ingest a document and remove vectors left over from a longer
    /// previous version.
    pub async fn replace_document(
        &self,
        vault_id: &str,
        document: &DocumentInput,
        config: &ChunkConfig,
        previous_chunk_count: usize,
    ) -> AppResult<IngestReport> {
        let mut report = self.ingest_document(vault_id, document, config).await?;

        if previous_chunk_count > report.chunk_count {
            let stale = chunk_ids(
                &document.document_id,
                report.chunk_count..previous_chunk_count,
            )?;
            self.delete_ids(&report.namespace, &stale).await?;
            report.stale_deleted = stale.len();

            info!(
                "Removed {} stale chunks of {}",
                report.stale_deleted, document.document_id
            );
        }

        Ok(report)
    }

    /// Delete every vector of a document that had `chunk_count` chunks.
    ///
    /// Returns the number of ids submitted for deletion.
    pub async fn delete_document(
        &self,
        vault_id: &str,
        document_id: &str,
        chunk_count: usize,
    ) -> AppResult<usize> {
        require_id("vault id", vault_id)?;
        require_id("document id", document_id)?;

        let ids = chunk_ids(document_id, 0..chunk_count)?;
        self.delete_ids(&vault_namespace(vault_id), &ids).await?;

        info!("Deleted {} vectors of {}", ids.len(), document_id);
        Ok(ids.len())
    }

    /// Delete every vector belonging to a vault.
    pub async fn delete_vault(&self, vault_id: &str) -> AppResult<()> {
        require_id("vault id", vault_id)?;
        let namespace = vault_namespace(vault_id);
        self.index.delete_namespace(&namespace).await?;

        info!("Deleted namespace {}", namespace);
        Ok(())
    }

    async fn delete_ids(&self, namespace: &str, ids: &[String]) -> AppResult<()> {
        let batch_size = self.batch_size.max(1);
        for batch in ids.chunks(batch_size) {
            self.index.delete_by_ids(namespace, batch).await?;
        }
        Ok(())
    }
}

fn require_id(what: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidInput(format!("{} must not be empty", what)));
    }
    Ok(())
}

fn chunk_ids(document_id: &str, range: std::ops::Range<usize>) -> AppResult<Vec<String>> {
    range
        .map(|i| {
            let index = u32::try_from(i).map_err(|_| {
                AppError::InvalidInput(format!("Chunk index {} out of range", i))
            })?;
            Ok(vector_id(document_id, index))
        })
        .collect()
}

fn build_report(
    document: &DocumentInput,
    namespace: String,
    vector_ids: Vec<String>,
    batch_count: usize,
    started: Instant,
) -> IngestReport {
    IngestReport {
        document_id: document.document_id.clone(),
        namespace,
        chunk_count: vector_ids.len(),
        batch_count,
        vector_ids,
        stale_deleted: 0,
        ingested_at: Utc::now(),
        duration_secs: started.elapsed().as_secs_f64(),
    }
}
