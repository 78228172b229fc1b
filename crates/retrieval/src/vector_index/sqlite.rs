//! SQLite-backed vector index.

use super::{MetadataFilter, VectorIndex};
use crate::types::{ChunkMetadata, VectorMatch, VectorRecord};
use casevault_core::{AppError, AppResult};
use rusqlite::{params, params_from_iter, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS vectors (
        namespace TEXT NOT NULL,
        id TEXT NOT NULL,
        document_id TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        embedding BLOB NOT NULL,
        metadata TEXT NOT NULL,
        PRIMARY KEY (namespace, id)
    );

    CREATE INDEX IF NOT EXISTS idx_vectors_document ON vectors(namespace, document_id);
"#;

/// Local index storing vectors in a single SQLite table.
///
/// Similarity is computed in process by brute-force cosine over the
/// candidate rows, which is adequate for per-vault corpora.
#[derive(Debug)]
pub struct SqliteIndex {
    conn: Mutex<Connection>,
}

impl SqliteIndex {
    /// Open (or create) an index database at `db_path`.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::VectorIndex(format!("Failed to create index directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::VectorIndex(format!("Failed to open SQLite index: {}", e)))?;
        let index = Self::init(conn)?;

        tracing::debug!("Opened SQLite index at {:?}", db_path);
        Ok(index)
    }

    /// Create a throwaway index that lives only as long as the value.
    pub fn in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            AppError::VectorIndex(format!("Failed to open in-memory SQLite index: {}", e))
        })?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| AppError::VectorIndex(format!("Failed to create tables: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::VectorIndex("SQLite connection lock poisoned".to_string()))
    }

    /// Number of vectors stored in `namespace`.
    pub fn count(&self, namespace: &str) -> AppResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM vectors WHERE namespace = ?1",
                params![namespace],
                |row| row.get(0),
            )
            .map_err(|e| AppError::VectorIndex(format!("Failed to count vectors: {}", e)))?;
        Ok(count as usize)
    }
}

#[async_trait::async_trait]
impl VectorIndex for SqliteIndex {
    fn backend_name(&self) -> &str {
        "sqlite"
    }

    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> AppResult<()> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::VectorIndex(format!("Failed to begin transaction: {}", e)))?;

        for record in records {
            let metadata = serde_json::to_string(&record.metadata)?;
            tx.execute(
                "INSERT OR REPLACE INTO vectors (namespace, id, document_id, chunk_index, embedding, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    namespace,
                    record.id,
                    record.metadata.document_id,
                    record.metadata.chunk_index as i64,
                    embedding_to_bytes(&record.values),
                    metadata,
                ],
            )
            .map_err(|e| AppError::VectorIndex(format!("Failed to upsert vector: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| AppError::VectorIndex(format!("Failed to commit upsert: {}", e)))?;

        tracing::debug!("Upserted {} vectors into {}", records.len(), namespace);
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
    ) -> AppResult<Vec<VectorMatch>> {
        let mut sql =
            String::from("SELECT id, embedding, metadata FROM vectors WHERE namespace = ?1");
        let mut bindings = vec![namespace.to_string()];

        if let MetadataFilter::DocumentIn(ids) = filter {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders: Vec<String> =
                (0..ids.len()).map(|i| format!("?{}", i + 2)).collect();
            sql.push_str(&format!(" AND document_id IN ({})", placeholders.join(", ")));
            bindings.extend(ids.iter().cloned());
        }

        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AppError::VectorIndex(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params_from_iter(bindings.iter()), |row| {
                let id: String = row.get(0)?;
                let bytes: Vec<u8> = row.get(1)?;
                let metadata: String = row.get(2)?;
                Ok((id, bytes, metadata))
            })
            .map_err(|e| AppError::VectorIndex(format!("Failed to query vectors: {}", e)))?;

        let mut matches = Vec::new();
        for row in rows {
            let (id, bytes, metadata) =
                row.map_err(|e| AppError::VectorIndex(format!("Failed to read vector: {}", e)))?;
            let values = bytes_to_embedding(&bytes)?;
            let metadata = match serde_json::from_str::<ChunkMetadata>(&metadata) {
                Ok(metadata) => Some(metadata),
                Err(e) => {
                    tracing::warn!("Unreadable metadata on vector {}: {}", id, e);
                    None
                }
            };

            matches.push(VectorMatch {
                id,
                score: Some(cosine_similarity(vector, &values)),
                metadata,
            });
        }

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);

        tracing::debug!(
            "Retrieved {} vectors from {} (requested top-{})",
            matches.len(),
            namespace,
            top_k
        );

        Ok(matches)
    }

    async fn delete_by_ids(&self, namespace: &str, ids: &[String]) -> AppResult<()> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::VectorIndex(format!("Failed to begin transaction: {}", e)))?;

        for id in ids {
            tx.execute(
                "DELETE FROM vectors WHERE namespace = ?1 AND id = ?2",
                params![namespace, id],
            )
            .map_err(|e| AppError::VectorIndex(format!("Failed to delete vector: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| AppError::VectorIndex(format!("Failed to commit delete: {}", e)))?;
        Ok(())
    }

    async fn delete_namespace(&self, namespace: &str) -> AppResult<()> {
        let conn = self.lock()?;
        let deleted = conn
            .execute("DELETE FROM vectors WHERE namespace = ?1", params![namespace])
            .map_err(|e| AppError::VectorIndex(format!("Failed to delete namespace: {}", e)))?;

        tracing::info!("Deleted {} vectors from {}", deleted, namespace);
        Ok(())
    }
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::VectorIndex(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Cosine similarity; zero for mismatched lengths or zero vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
