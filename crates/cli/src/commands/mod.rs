//! Command handlers for the Casevault CLI.

pub mod chunk;
pub mod delete;
pub mod ingest;
pub mod query;

pub use chunk::ChunkCommand;
pub use delete::{DeleteDocumentCommand, DeleteVaultCommand};
pub use ingest::IngestCommand;
pub use query::QueryCommand;

use casevault_core::{config::AppConfig, AppResult};
use casevault_retrieval::{create_index, create_provider, EmbeddingProvider, VectorIndex};
use serde::Serialize;
use std::sync::Arc;

/// Build the embedding provider and vector index named by the configuration.
pub(crate) fn open_collaborators(
    config: &AppConfig,
) -> AppResult<(Arc<dyn EmbeddingProvider>, Arc<dyn VectorIndex>)> {
    config.validate()?;

    let embedder = create_provider(&config.embedding, config.embedding_api_key().as_deref())?;

    let mut index_settings = config.index.clone();
    if index_settings.backend == "sqlite" {
        index_settings.path = Some(config.index_path());
    }
    let index = create_index(&index_settings, config.index_api_key().as_deref())?;

    tracing::debug!(
        "Using {} embeddings with {} index",
        embedder.provider_name(),
        index.backend_name()
    );

    Ok((embedder, index))
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
