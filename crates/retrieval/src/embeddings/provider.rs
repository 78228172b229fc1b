//! Embedding provider trait and factory.

use casevault_core::config::EmbeddingSettings;
use casevault_core::{AppError, AppResult};
use std::sync::Arc;

use super::providers::{HashingProvider, OpenAiProvider};

/// Trait for embedding providers.
///
/// Every vector a provider returns has exactly [`dimensions`](Self::dimensions)
/// components. Failures are reported as [`AppError::Embedding`].
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "hashing", "openai")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in one call, preserving order.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text.
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }
}

/// Create an embedding provider from configuration.
///
/// Hosted providers need `api_key`; the hashing provider ignores it.
pub fn create_provider(
    settings: &EmbeddingSettings,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match settings.provider.as_str() {
        "hashing" => Ok(Arc::new(HashingProvider::new(settings.dimensions)?)),

        "openai" => {
            let api_key = api_key.ok_or_else(|| {
                AppError::Config("The openai embedding provider requires an API key".to_string())
            })?;
            Ok(Arc::new(OpenAiProvider::new(settings, api_key)?))
        }

        other => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: hashing, openai",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_hashing_provider() {
        let settings = EmbeddingSettings::default();
        let provider = create_provider(&settings, None).unwrap();
        assert_eq!(provider.provider_name(), "hashing");
        assert_eq!(provider.model_name(), "hashing-v1");
        assert_eq!(provider.dimensions(), 384);
    }

    #[test]
    fn test_create_openai_requires_key() {
        let settings = EmbeddingSettings {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            ..Default::default()
        };

        let err = create_provider(&settings, None).unwrap_err();
        assert!(err.to_string().contains("requires an API key"));

        let provider = create_provider(&settings, Some("sk-test")).unwrap();
        assert_eq!(provider.provider_name(), "openai");
        assert_eq!(provider.dimensions(), 1536);
    }

    #[test]
    fn test_create_unknown_provider() {
        let settings = EmbeddingSettings {
            provider: "unknown".to_string(),
            ..Default::default()
        };

        let err = create_provider(&settings, None).unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[tokio::test]
    async fn test_default_embed_uses_batch() {
        let provider = create_provider(&EmbeddingSettings::default(), None).unwrap();
        let single = provider.embed("visa petition").await.unwrap();
        let batch = provider
            .embed_batch(&["visa petition".to_string()])
            .await
            .unwrap();
        assert_eq!(single, batch[0]);
    }
}
