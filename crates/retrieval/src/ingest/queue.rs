//! Background ingestion queue.
//!
//! Jobs are submitted explicitly and processed in order by a single tokio
//! worker. Transient failures are retried with exponential backoff; a job that
//! still fails is logged and counted, never dropped silently.

use super::Ingestor;
use crate::chunker::ChunkConfig;
use crate::types::DocumentInput;
use casevault_core::{AppError, AppResult};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How often and how patiently a failing job is retried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per job, including the first
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles for each later attempt
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, failed_attempts: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2_u32.saturating_pow(failed_attempts.saturating_sub(1)))
    }
}

/// A unit of work for the queue.
#[derive(Debug, Clone)]
pub enum IngestJob {
    /// Ingest a document; with `previous_chunk_count` the stale tail of an
    /// older version is removed as well
    Ingest {
        vault_id: String,
        document: DocumentInput,
        config: ChunkConfig,
        previous_chunk_count: Option<usize>,
    },

    DeleteDocument {
        vault_id: String,
        document_id: String,
        chunk_count: usize,
    },

    DeleteVault {
        vault_id: String,
    },
}

impl IngestJob {
    fn describe(&self) -> String {
        match self {
            IngestJob::Ingest {
                vault_id, document, ..
            } => format!("ingest {} into vault {}", document.document_id, vault_id),
            IngestJob::DeleteDocument {
                vault_id,
                document_id,
                ..
            } => format!("delete {} from vault {}", document_id, vault_id),
            IngestJob::DeleteVault { vault_id } => format!("delete vault {}", vault_id),
        }
    }

    async fn run(&self, ingestor: &Ingestor) -> AppResult<()> {
        match self {
            IngestJob::Ingest {
                vault_id,
                document,
                config,
                previous_chunk_count,
            } => {
                match previous_chunk_count {
                    Some(previous) => {
                        ingestor
                            .replace_document(vault_id, document, config, *previous)
                            .await?
                    }
                    None => ingestor.ingest_document(vault_id, document, config).await?,
                };
            }
            IngestJob::DeleteDocument {
                vault_id,
                document_id,
                chunk_count,
            } => {
                ingestor
                    .delete_document(vault_id, document_id, *chunk_count)
                    .await?;
            }
            IngestJob::DeleteVault { vault_id } => ingestor.delete_vault(vault_id).await?,
        }
        Ok(())
    }
}

/// Outcome counters reported when the queue shuts down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub succeeded: usize,
    pub failed: usize,
    pub retries: usize,
}

/// Handle to a running ingestion worker.
#[derive(Debug)]
pub struct IngestQueue {
    sender: mpsc::Sender<IngestJob>,
    worker: JoinHandle<QueueStats>,
}

impl IngestQueue {
    /// Start a worker holding at most `capacity` pending jobs.
    pub fn spawn(ingestor: Arc<Ingestor>, policy: RetryPolicy, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(ingestor, policy, receiver));
        Self { sender, worker }
    }

    /// Enqueue a job, waiting for room if the queue is full.
    pub async fn submit(&self, job: IngestJob) -> AppResult<()> {
        debug!("Queueing job: {}", job.describe());
        self.sender
            .send(job)
            .await
            .map_err(|_| AppError::Ingest("Ingest queue worker has stopped".to_string()))
    }

    /// Stop accepting jobs, finish the queued ones and report the totals.
    pub async fn shutdown(self) -> AppResult<QueueStats> {
        drop(self.sender);
        self.worker
            .await
            .map_err(|e| AppError::Ingest(format!("Ingest queue worker failed: {}", e)))
    }
}

async fn run_worker(
    ingestor: Arc<Ingestor>,
    policy: RetryPolicy,
    mut receiver: mpsc::Receiver<IngestJob>,
) -> QueueStats {
    let mut stats = QueueStats::default();
    let max_attempts = policy.max_attempts.max(1);

    while let Some(job) = receiver.recv().await {
        let description = job.describe();
        let mut attempt = 1;

        loop {
            match job.run(&ingestor).await {
                Ok(()) => {
                    stats.succeeded += 1;
                    debug!("Completed job: {}", description);
                    break;
                }
                Err(e) if attempt < max_attempts && is_retryable(&e) => {
                    let delay = policy.backoff(attempt);
                    warn!(
                        "Job '{}' failed (attempt {}/{}): {}. Retrying in {:?}",
                        description, attempt, max_attempts, e, delay
                    );
                    stats.retries += 1;
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    stats.failed += 1;
                    error!(
                        "Job '{}' failed after {} attempt(s): {}",
                        description, attempt, e
                    );
                    break;
                }
            }
        }
    }

    info!(
        "Ingest queue drained: {} succeeded, {} failed, {} retries",
        stats.succeeded, stats.failed, stats.retries
    );
    stats
}

/// Bad input fails the same way every time.
fn is_retryable(error: &AppError) -> bool {
    !matches!(error, AppError::InvalidInput(_) | AppError::Config(_))
}
