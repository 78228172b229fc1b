//! Hosted embedding provider speaking the OpenAI embeddings API.
//!
//! Any service exposing `POST {endpoint}/embeddings` with the same request and
//! response shape works, which lets tests point the provider at a local mock.
//!
//! Transport failures, rate limiting (429) and server errors (5xx) are retried
//! with exponential backoff; every other failure is returned immediately.

use crate::embeddings::EmbeddingProvider;
use async_trait::async_trait;
use casevault_core::config::EmbeddingSettings;
use casevault_core::{AppError, AppResult};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

const INITIAL_BACKOFF_MS: u64 = 200;

/// Upper bound on a single retry delay.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimensions: usize,
    max_retries: u32,
    initial_backoff: Duration,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Outcome of a single failed request.
enum Failure {
    Transient(AppError),
    Permanent(AppError),
}

impl OpenAiProvider {
    pub fn new(settings: &EmbeddingSettings, api_key: impl Into<String>) -> AppResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AppError::Config(
                "Embedding API key must not be empty".to_string(),
            ));
        }
        if settings.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| AppError::Embedding(format!("Failed to create HTTP client: {}", e)))?;

        let endpoint = settings
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_ENDPOINT)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            endpoint,
            api_key,
            model: settings.model.clone(),
            dimensions: settings.dimensions,
            max_retries: settings.max_retries,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Override the first retry delay; later delays double from it.
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Delay before retry number `attempt + 1`, doubling and capped.
    fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2_u32.saturating_pow(attempt))
            .min(MAX_BACKOFF)
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), model = %self.model))]
    async fn embed_with_retries(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut attempt = 0;
        loop {
            match self.request_embeddings(texts).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(Failure::Permanent(e)) => return Err(e),
                Err(Failure::Transient(e)) => {
                    if attempt >= self.max_retries {
                        return Err(e);
                    }
                    let backoff = self.backoff(attempt);
                    attempt += 1;
                    warn!(
                        "Embedding request failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempt,
                        self.max_retries.saturating_add(1),
                        e,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, Failure> {
        let url = format!("{}/embeddings", self.endpoint);
        debug!("Sending embedding request to {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| {
                Failure::Transient(AppError::Embedding(format!(
                    "Failed to send embedding request: {}",
                    e
                )))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => format!("failed to read error body: {}", e),
            };
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            let error = AppError::Embedding(format!(
                "Embedding API error ({}): {}",
                status, detail
            ));

            return Err(
                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    Failure::Transient(error)
                } else {
                    Failure::Permanent(error)
                },
            );
        }

        let body: EmbeddingResponse = response.json().await.map_err(|e| {
            Failure::Permanent(AppError::Embedding(format!(
                "Failed to parse embedding response: {}",
                e
            )))
        })?;

        self.order_embeddings(body.data, texts.len())
            .map_err(Failure::Permanent)
    }

    /// Put returned vectors back into input order and check their shape.
    fn order_embeddings(
        &self,
        mut data: Vec<EmbeddingData>,
        expected: usize,
    ) -> AppResult<Vec<Vec<f32>>> {
        if data.len() != expected {
            return Err(AppError::Embedding(format!(
                "Embedding API returned {} vectors for {} inputs",
                data.len(),
                expected
            )));
        }

        data.sort_by_key(|d| d.index);
        data.into_iter()
            .enumerate()
            .map(|(position, d)| {
                if d.index != position {
                    return Err(AppError::Embedding(format!(
                        "Embedding API returned unexpected index {}",
                        d.index
                    )));
                }
                if d.embedding.len() != self.dimensions {
                    return Err(AppError::Embedding(format!(
                        "Unexpected embedding dimensions: got {}, expected {}",
                        d.embedding.len(),
                        self.dimensions
                    )));
                }
                Ok(d.embedding)
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(AppError::InvalidInput("Cannot embed empty text".to_string()));
        }

        self.embed_with_retries(texts).await
    }
}
