//! Query-time retrieval over one vault's documents.

use crate::embeddings::EmbeddingProvider;
use crate::types::RetrievedChunk;
use crate::vector_index::{MetadataFilter, VectorIndex};
use casevault_core::{AppError, AppResult};
use std::collections::HashSet;
use std::sync::Arc;

/// Default number of chunks returned per query.
pub const DEFAULT_TOP_K: usize = 10;

/// Candidates fetched per returned chunk when keeping one chunk per document.
pub const ONE_PER_DOCUMENT_FETCH_FACTOR: usize = 5;

/// Per-query retrieval settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalOptions {
    /// Maximum number of chunks returned
    pub top_k: usize,

    /// Namespace to search; nothing is searched when unset
    pub namespace_key: Option<String>,

    /// Keep only the best chunk of each document. The index is asked for
    /// `top_k * ONE_PER_DOCUMENT_FETCH_FACTOR` candidates, so a document whose
    /// best chunk ranks below that window is still left out.
    pub one_per_document: bool,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            namespace_key: None,
            one_per_document: false,
        }
    }
}

impl RetrievalOptions {
    pub fn new(namespace_key: impl Into<String>) -> Self {
        Self {
            namespace_key: Some(namespace_key.into()),
            ..Default::default()
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_one_per_document(mut self, enabled: bool) -> Self {
        self.one_per_document = enabled;
        self
    }
}

/// Finds the chunks most relevant to a query within an allowlist of documents.
///
/// Holds no mutable state, so one instance can serve concurrent queries.
#[derive(Debug, Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Return up to `top_k` chunks from `document_ids`, highest score first.
    ///
    /// An unset namespace or an empty allowlist yields no results without
    /// contacting the embedder or the index. Errors from either collaborator
    /// are returned as they were raised.
    pub async fn query_relevant_chunks(
        &self,
        query: &str,
        document_ids: &[String],
        options: &RetrievalOptions,
    ) -> AppResult<Vec<RetrievedChunk>> {
        let namespace = match options.namespace_key.as_deref() {
            Some(namespace) if !document_ids.is_empty() => namespace,
            _ => {
                tracing::debug!("Empty retrieval scope, skipping query");
                return Ok(Vec::new());
            }
        };

        if query.trim().is_empty() {
            return Err(AppError::InvalidInput("Query must not be empty".to_string()));
        }
        if options.top_k == 0 {
            return Err(AppError::InvalidInput(
                "top_k must be greater than zero".to_string(),
            ));
        }

        let vector = self.embedder.embed(query).await?;
        let filter = MetadataFilter::document_ids(document_ids.iter().cloned());
        let fetch_k = if options.one_per_document {
            options.top_k.saturating_mul(ONE_PER_DOCUMENT_FETCH_FACTOR)
        } else {
            options.top_k
        };
        let matches = self
            .index
            .query(namespace, &vector, fetch_k, &filter)
            .await?;

        let total = matches.len();
        let mut chunks: Vec<RetrievedChunk> = matches
            .into_iter()
            .filter_map(|m| match m.metadata {
                Some(metadata) => Some(RetrievedChunk::from_metadata(metadata, m.score)),
                None => {
                    tracing::warn!("Dropping match {} without metadata", m.id);
                    None
                }
            })
            .collect();

        chunks.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if options.one_per_document {
            let mut seen = HashSet::new();
            chunks.retain(|c| seen.insert(c.document_id.clone()));
        }

        chunks.truncate(options.top_k);

        tracing::info!(
            "Retrieved {} of {} matches from {} ({} documents in scope)",
            chunks.len(),
            total,
            namespace,
            document_ids.len()
        );
        if let Some(best) = chunks.first() {
            tracing::debug!("Top score {:.4} ({})", best.score, best.document_name);
        }

        Ok(chunks)
    }
}
