//! Deletion command handlers.

use super::open_collaborators;
use casevault_core::{config::AppConfig, AppResult};
use casevault_retrieval::Ingestor;
use clap::Args;

/// Remove one document's vectors from a vault
#[derive(Args, Debug)]
pub struct DeleteDocumentCommand {
    /// Vault the document belongs to
    #[arg(long)]
    pub vault: String,

    /// Document whose vectors are removed
    #[arg(long)]
    pub document_id: String,

    /// Number of chunks the document was ingested with
    #[arg(long)]
    pub chunks: usize,
}

impl DeleteDocumentCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let (embedder, index) = open_collaborators(config)?;
        let ingestor = Ingestor::new(embedder, index);

        let deleted = ingestor
            .delete_document(&self.vault, &self.document_id, self.chunks)
            .await?;

        println!(
            "Deleted {} vectors of '{}' from vault '{}'",
            deleted, self.document_id, self.vault
        );
        Ok(())
    }
}

/// Remove every vector of a vault
#[derive(Args, Debug)]
pub struct DeleteVaultCommand {
    /// Vault to clear
    #[arg(long)]
    pub vault: String,
}

impl DeleteVaultCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let (embedder, index) = open_collaborators(config)?;
        let ingestor = Ingestor::new(embedder, index);

        ingestor.delete_vault(&self.vault).await?;

        println!("Vault '{}' cleared", self.vault);
        Ok(())
    }
}
