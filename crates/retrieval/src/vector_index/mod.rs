//! Vector index abstraction.
//!
//! Every operation is scoped to a namespace; a vault's vectors live in
//! exactly one namespace and never leak into another.

pub mod pinecone;
pub mod sqlite;

pub use pinecone::PineconeIndex;
pub use sqlite::SqliteIndex;

use crate::types::{VectorMatch, VectorRecord};
use casevault_core::config::IndexSettings;
use casevault_core::{AppError, AppResult};
use serde_json::{json, Value};
use std::sync::Arc;

/// Trait for vector index backends.
///
/// Implementations must support:
/// - Upserting records (an existing id is overwritten)
/// - Top-k similarity queries restricted by a metadata filter
/// - Deleting records by id or a whole namespace
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync + std::fmt::Debug {
    /// Backend name (e.g., "sqlite", "pinecone")
    fn backend_name(&self) -> &str;

    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> AppResult<()>;

    /// Return at most `top_k` matches for `vector`, most similar first.
    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
    ) -> AppResult<Vec<VectorMatch>>;

    async fn delete_by_ids(&self, namespace: &str, ids: &[String]) -> AppResult<()>;

    async fn delete_namespace(&self, namespace: &str) -> AppResult<()>;
}

/// Restriction applied to query candidates.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum MetadataFilter {
    /// Every record in the namespace is a candidate
    #[default]
    All,

    /// Only records whose `documentId` is in the list
    DocumentIn(Vec<String>),
}

impl MetadataFilter {
    pub fn document_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MetadataFilter::DocumentIn(ids.into_iter().map(Into::into).collect())
    }

    /// Managed-index filter expression, `None` when nothing is filtered.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            MetadataFilter::All => None,
            MetadataFilter::DocumentIn(ids) => Some(json!({ "documentId": { "$in": ids } })),
        }
    }
}

/// Namespace holding one vault's vectors.
pub fn vault_namespace(vault_id: &str) -> String {
    format!("vault-{}", vault_id)
}

/// Id of the vector holding one chunk of a document.
pub fn vector_id(document_id: &str, chunk_index: u32) -> String {
    format!("{}#{}", document_id, chunk_index)
}

/// Create a vector index from configuration.
///
/// For the SQLite backend `settings.path` is opened as-is; when unset the index
/// lives in memory. The managed backend needs `settings.host` and `api_key`.
pub fn create_index(
    settings: &IndexSettings,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn VectorIndex>> {
    match settings.backend.as_str() {
        "sqlite" => {
            let index = match settings.path {
                Some(ref path) => SqliteIndex::open(path)?,
                None => SqliteIndex::in_memory()?,
            };
            Ok(Arc::new(index))
        }

        "pinecone" => {
            let host = settings.host.as_deref().ok_or_else(|| {
                AppError::Config("The pinecone index backend requires index.host".to_string())
            })?;
            let api_key = api_key.ok_or_else(|| {
                AppError::Config("The pinecone index backend requires an API key".to_string())
            })?;
            Ok(Arc::new(PineconeIndex::new(
                host,
                api_key,
                settings.timeout_secs,
            )?))
        }

        other => Err(AppError::Config(format!(
            "Unknown index backend: '{}'. Supported backends: sqlite, pinecone",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_and_ids() {
        assert_eq!(vault_namespace("v1"), "vault-v1");
        assert_eq!(vector_id("doc-7", 12), "doc-7#12");
    }

    #[test]
    fn test_filter_json() {
        assert_eq!(MetadataFilter::All.to_json(), None);

        let filter = MetadataFilter::document_ids(["a", "b"]);
        assert_eq!(
            filter.to_json(),
            Some(json!({ "documentId": { "$in": ["a", "b"] } }))
        );
    }

    #[test]
    fn test_create_index_defaults_to_memory_sqlite() {
        let index = create_index(&IndexSettings::default(), None).unwrap();
        assert_eq!(index.backend_name(), "sqlite");
    }

    #[test]
    fn test_create_pinecone_requires_host_and_key() {
        let mut settings = IndexSettings {
            backend: "pinecone".to_string(),
            ..Default::default()
        };
        let err = create_index(&settings, Some("key")).unwrap_err();
        assert!(err.to_string().contains("index.host"));

        settings.host = Some("https://example-index.svc.pinecone.io".to_string());
        let err = create_index(&settings, None).unwrap_err();
        assert!(err.to_string().contains("API key"));

        let index = create_index(&settings, Some("key")).unwrap();
        assert_eq!(index.backend_name(), "pinecone");
    }

    #[test]
    fn test_create_unknown_backend() {
        let settings = IndexSettings {
            backend: "faiss".to_string(),
            ..Default::default()
        };
        assert!(create_index(&settings, None).is_err());
    }
}
