//! Managed vector index client for the Pinecone data-plane REST API.

use super::{MetadataFilter, VectorIndex};
use crate::types::{ChunkMetadata, MetadataValue, VectorMatch, VectorRecord};
use async_trait::async_trait;
use casevault_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone)]
pub struct PineconeIndex {
    client: Client,
    host: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<WireVector<'a>>,
    namespace: &'a str,
}

#[derive(Debug, Serialize)]
struct WireVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: &'a ChunkMetadata,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    namespace: &'a str,
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<WireMatch>,
}

#[derive(Debug, Deserialize)]
struct WireMatch {
    id: String,
    score: Option<f32>,
    metadata: Option<Map<String, Value>>,
}

impl PineconeIndex {
    /// Create a client for the index served at `host`.
    ///
    /// A host without a scheme is assumed to be HTTPS.
    pub fn new(host: &str, api_key: impl Into<String>, timeout_secs: u64) -> AppResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AppError::Config(
                "Vector index API key must not be empty".to_string(),
            ));
        }

        let host = host.trim_end_matches('/');
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::VectorIndex(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            host,
            api_key,
        })
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> AppResult<Value> {
        let url = format!("{}{}", self.host, path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::VectorIndex(format!("Request to {} failed: {}", path, e)))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            AppError::VectorIndex(format!(
                "Failed to read response from {} ({}): {}",
                path, status, e
            ))
        })?;

        if !status.is_success() {
            let detail = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
                .unwrap_or(text);
            return Err(AppError::VectorIndex(format!(
                "Index API error ({}) on {}: {}",
                status, path, detail
            )));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| {
            AppError::VectorIndex(format!("Failed to parse response from {}: {}", path, e))
        })
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn backend_name(&self) -> &str {
        "pinecone"
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> AppResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let request = UpsertRequest {
            vectors: records
                .iter()
                .map(|r| WireVector {
                    id: &r.id,
                    values: &r.values,
                    metadata: &r.metadata,
                })
                .collect(),
            namespace,
        };

        self.post("/vectors/upsert", &request).await?;
        Ok(())
    }

    #[instrument(skip(self, vector, filter), fields(dims = vector.len()))]
    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
    ) -> AppResult<Vec<VectorMatch>> {
        let request = QueryRequest {
            namespace,
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
            filter: filter.to_json(),
        };

        let body = self.post("/query", &request).await?;
        let response: QueryResponse = serde_json::from_value(body).map_err(|e| {
            AppError::VectorIndex(format!("Unexpected query response shape: {}", e))
        })?;

        Ok(response
            .matches
            .into_iter()
            .map(|m| {
                let metadata = m.metadata.and_then(|map| {
                    let parsed = metadata_from_wire(map);
                    if parsed.is_none() {
                        warn!("Match {} carries incomplete metadata", m.id);
                    }
                    parsed
                });
                VectorMatch {
                    id: m.id,
                    score: m.score,
                    metadata,
                }
            })
            .collect())
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn delete_by_ids(&self, namespace: &str, ids: &[String]) -> AppResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        self.post(
            "/vectors/delete",
            &json!({ "ids": ids, "namespace": namespace }),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_namespace(&self, namespace: &str) -> AppResult<()> {
        self.post(
            "/vectors/delete",
            &json!({ "deleteAll": true, "namespace": namespace }),
        )
        .await?;
        Ok(())
    }
}

/// Rebuild chunk metadata from the flat map the index returns.
///
/// The index stores every number as a float, so `chunkIndex` may come back
/// as `3.0`. Non-scalar extra fields are skipped.
fn metadata_from_wire(mut map: Map<String, Value>) -> Option<ChunkMetadata> {
    let mut take_string = |key: &str| match map.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    };

    let document_id = take_string("documentId")?;
    let text = take_string("text")?;
    let document_name = take_string("documentName")?;
    let document_type = take_string("documentType")?;

    let chunk_index = match map.remove("chunkIndex")? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))?,
        _ => return None,
    };

    let extra: BTreeMap<String, MetadataValue> = map
        .into_iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::String(s) => MetadataValue::String(s),
                Value::Bool(b) => MetadataValue::Bool(b),
                Value::Number(n) => MetadataValue::Number(n.as_f64()?),
                _ => return None,
            };
            Some((key, value))
        })
        .collect();

    Some(ChunkMetadata {
        document_id,
        chunk_index: u32::try_from(chunk_index).ok()?,
        text,
        document_name,
        document_type,
        extra,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(document_id: &str, chunk_index: u32) -> VectorRecord {
        let mut extra = BTreeMap::new();
        extra.insert("caseId".to_string(), MetadataValue::from("c-1"));
        VectorRecord {
            id: format!("{}#{}", document_id, chunk_index),
            values: vec![0.5, 0.5],
            metadata: ChunkMetadata {
                document_id: document_id.to_string(),
                chunk_index,
                text: "Offer letter".to_string(),
                document_name: "offer.pdf".to_string(),
                document_type: "employment".to_string(),
                extra,
            },
        }
    }

    fn index(server: &MockServer) -> PineconeIndex {
        PineconeIndex::new(&server.uri(), "pc-key", 5).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_sends_flat_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .and(header("Api-Key", "pc-key"))
            .and(body_json(json!({
                "vectors": [{
                    "id": "doc-1#0",
                    "values": [0.5, 0.5],
                    "metadata": {
                        "documentId": "doc-1",
                        "chunkIndex": 0,
                        "text": "Offer letter",
                        "documentName": "offer.pdf",
                        "documentType": "employment",
                        "caseId": "c-1",
                    },
                }],
                "namespace": "vault-v1",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "upsertedCount": 1 })))
            .expect(1)
            .mount(&server)
            .await;

        index(&server)
            .upsert("vault-v1", &[record("doc-1", 0)])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_query_parses_matches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_partial_json(json!({
                "namespace": "vault-v1",
                "topK": 3,
                "includeMetadata": true,
                "filter": { "documentId": { "$in": ["doc-1"] } },
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "matches": [
                    {
                        "id": "doc-1#2",
                        "score": 0.82,
                        "metadata": {
                            "documentId": "doc-1",
                            "chunkIndex": 2.0,
                            "text": "Salary and title",
                            "documentName": "offer.pdf",
                            "documentType": "employment",
                            "pageCount": 3.0,
                        },
                    },
                    { "id": "doc-1#5", "score": 0.4 },
                    { "id": "doc-1#6", "metadata": { "documentId": "doc-1" } },
                ],
                "namespace": "vault-v1",
            })))
            .mount(&server)
            .await;

        let matches = index(&server)
            .query(
                "vault-v1",
                &[0.1, 0.2],
                3,
                &MetadataFilter::document_ids(["doc-1"]),
            )
            .await
            .unwrap();

        assert_eq!(matches.len(), 3);
        let first = matches[0].metadata.as_ref().unwrap();
        assert_eq!(first.chunk_index, 2);
        assert_eq!(first.text, "Salary and title");
        assert_eq!(first.extra.get("pageCount"), Some(&MetadataValue::Number(3.0)));
        assert_eq!(matches[0].score, Some(0.82));

        assert!(matches[1].metadata.is_none());
        assert!(matches[2].metadata.is_none());
        assert_eq!(matches[2].score, None);
    }

    #[tokio::test]
    async fn test_delete_by_ids_and_namespace() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vectors/delete"))
            .and(body_json(json!({ "ids": ["doc-1#3"], "namespace": "vault-v1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/vectors/delete"))
            .and(body_json(json!({ "deleteAll": true, "namespace": "vault-v1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let index = index(&server);
        index
            .delete_by_ids("vault-v1", &["doc-1#3".to_string()])
            .await
            .unwrap();
        index.delete_by_ids("vault-v1", &[]).await.unwrap();
        index.delete_namespace("vault-v1").await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "code": 7,
                "message": "Invalid API Key",
            })))
            .mount(&server)
            .await;

        let err = index(&server)
            .query("vault-v1", &[0.1], 1, &MetadataFilter::All)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::VectorIndex(_)));
        assert!(err.to_string().contains("Invalid API Key"));
    }

    #[tokio::test]
    async fn test_unreadable_success_body_fails_upsert() {
        let host = crate::tests::http::truncated_body_server("HTTP/1.1 200 OK").await;
        let index = PineconeIndex::new(&host, "pc-key", 5).unwrap();

        let err = index
            .upsert("vault-v1", &[record("doc-1", 0)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::VectorIndex(_)));
        assert!(err.to_string().contains("Failed to read response from /vectors/upsert"));
    }

    #[test]
    fn test_host_without_scheme() {
        let index = PineconeIndex::new("my-index.svc.pinecone.io/", "k", 5).unwrap();
        assert_eq!(index.host, "https://my-index.svc.pinecone.io");
    }

    #[test]
    fn test_metadata_rejects_negative_index() {
        let map = json!({
            "documentId": "d",
            "chunkIndex": -1.0,
            "text": "t",
            "documentName": "n",
            "documentType": "x",
        });
        let Value::Object(map) = map else { unreachable!() };
        assert!(metadata_from_wire(map).is_none());
    }
}
