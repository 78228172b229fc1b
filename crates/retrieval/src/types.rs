//! Retrieval type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A caller-defined scalar stored alongside the fixed chunk metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::String(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Number(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// Metadata persisted with every embedded chunk.
///
/// The five named fields are always present; anything else a caller wants to
/// attach goes into `extra`, restricted to scalar values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub document_id: String,
    pub chunk_index: u32,
    pub text: String,
    pub document_name: String,
    pub document_type: String,

    #[serde(flatten)]
    pub extra: BTreeMap<String, MetadataValue>,
}

/// The persisted unit of a vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Unique per chunk, see [`crate::vector_index::vector_id`]
    pub id: String,

    /// Embedding values; dimensionality is fixed per index
    pub values: Vec<f32>,

    pub metadata: ChunkMetadata,
}

/// A raw hit returned by a vector index query.
///
/// Both score and metadata are optional because managed indexes may omit
/// them; the retriever decides how to treat incomplete matches.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub id: String,
    pub score: Option<f32>,
    pub metadata: Option<ChunkMetadata>,
}

/// A ranked retrieval result, attributable to its source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedChunk {
    pub document_id: String,
    pub document_name: String,
    pub document_type: String,
    pub chunk_index: u32,
    pub text: String,

    /// Similarity score, higher is more relevant
    pub score: f32,
}

impl RetrievedChunk {
    /// Project index metadata into a result, defaulting a missing score to zero.
    pub fn from_metadata(metadata: ChunkMetadata, score: Option<f32>) -> Self {
        Self {
            document_id: metadata.document_id,
            document_name: metadata.document_name,
            document_type: metadata.document_type,
            chunk_index: metadata.chunk_index,
            text: metadata.text,
            score: score.unwrap_or(0.0),
        }
    }
}

/// A document handed to the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInput {
    pub document_id: String,
    pub document_name: String,
    pub document_type: String,

    /// Extracted plain text
    pub text: String,

    /// Scalar fields copied onto every chunk's metadata
    #[serde(default)]
    pub extra: BTreeMap<String, MetadataValue>,
}

impl DocumentInput {
    pub fn new(
        document_id: impl Into<String>,
        document_name: impl Into<String>,
        document_type: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            document_name: document_name.into(),
            document_type: document_type.into(),
            text: text.into(),
            extra: BTreeMap::new(),
        }
    }

    /// Attach a caller-defined scalar field.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Statistics from one document ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub document_id: String,

    /// Namespace the vectors were written to
    pub namespace: String,

    /// Number of chunks embedded and upserted
    pub chunk_count: usize,

    /// Number of upsert requests issued
    pub batch_count: usize,

    /// Ids of the written vectors, in chunk order
    pub vector_ids: Vec<String>,

    /// Vectors removed because a previous version had more chunks
    pub stale_deleted: usize,

    pub ingested_at: DateTime<Utc>,

    pub duration_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_metadata() -> ChunkMetadata {
        ChunkMetadata {
            document_id: "doc-1".to_string(),
            chunk_index: 3,
            text: "Recommendation letter excerpt".to_string(),
            document_name: "letter.pdf".to_string(),
            document_type: "recommendation".to_string(),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn test_metadata_serializes_flat_camel_case() {
        let mut metadata = sample_metadata();
        metadata
            .extra
            .insert("caseId".to_string(), MetadataValue::from("case-9"));
        metadata
            .extra
            .insert("pageCount".to_string(), MetadataValue::from(4.0));

        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["documentId"], "doc-1");
        assert_eq!(value["chunkIndex"], 3);
        assert_eq!(value["caseId"], "case-9");
        assert_eq!(value["pageCount"], 4.0);
    }

    #[test]
    fn test_metadata_unknown_keys_land_in_extra() {
        let metadata: ChunkMetadata = serde_json::from_value(json!({
            "documentId": "doc-1",
            "chunkIndex": 0,
            "text": "t",
            "documentName": "n",
            "documentType": "cv",
            "confidential": true,
        }))
        .unwrap();

        assert_eq!(
            metadata.extra.get("confidential"),
            Some(&MetadataValue::Bool(true))
        );
    }

    #[test]
    fn test_retrieved_chunk_defaults_missing_score() {
        let chunk = RetrievedChunk::from_metadata(sample_metadata(), None);
        assert_eq!(chunk.score, 0.0);
        assert_eq!(chunk.chunk_index, 3);
        assert_eq!(chunk.document_name, "letter.pdf");
    }

    #[test]
    fn test_document_input_with_extra() {
        let doc = DocumentInput::new("d", "cv.pdf", "cv", "text").with_extra("lang", "en");
        assert_eq!(doc.extra.get("lang"), Some(&MetadataValue::from("en")));
    }
}
