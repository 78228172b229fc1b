//! Query command handler.

use super::{open_collaborators, print_json};
use casevault_core::{config::AppConfig, AppResult};
use casevault_retrieval::context::DEFAULT_SNIPPET_CHARS;
use casevault_retrieval::{
    build_context, source_refs, vault_namespace, RetrievalOptions, Retriever,
};
use clap::Args;

/// Retrieve the chunks most relevant to a query
#[derive(Args, Debug)]
pub struct QueryCommand {
    /// Vault to search
    #[arg(long)]
    pub vault: String,

    /// Document ids in scope (repeatable); nothing is searched without one
    #[arg(long = "document")]
    pub documents: Vec<String>,

    /// Query text
    pub query: String,

    /// Number of chunks to retrieve (default from config)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Keep only the best chunk of each document
    #[arg(long)]
    pub one_per_document: bool,

    /// Print the formatted grounding context instead of a result list
    #[arg(long)]
    pub context: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl QueryCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let (embedder, index) = open_collaborators(config)?;
        let retriever = Retriever::new(embedder, index);

        let namespace = vault_namespace(&self.vault);
        let options = RetrievalOptions::new(namespace.clone())
            .with_top_k(self.top_k.unwrap_or(config.retrieval.top_k))
            .with_one_per_document(self.one_per_document);

        let chunks = retriever
            .query_relevant_chunks(&self.query, &self.documents, &options)
            .await?;

        if self.json {
            let mut output = serde_json::json!({
                "query": self.query,
                "namespace": namespace,
                "results": chunks,
                "sources": source_refs(&chunks, DEFAULT_SNIPPET_CHARS),
            });
            if self.context {
                output["context"] = serde_json::Value::String(build_context(&chunks));
            }
            return print_json(&output);
        }

        if chunks.is_empty() {
            if self.documents.is_empty() {
                println!("No documents in scope; pass --document to search");
            } else {
                println!("No matching chunks");
            }
            return Ok(());
        }

        if self.context {
            println!("{}", build_context(&chunks));
            return Ok(());
        }

        for (rank, source) in source_refs(&chunks, DEFAULT_SNIPPET_CHARS)
            .iter()
            .enumerate()
        {
            println!(
                "{}. {} (chunk {}) score {:.3}",
                rank + 1,
                source.document_name,
                source.chunk_index,
                source.score
            );
            println!("   {}", source.snippet.replace('\n', " "));
        }

        Ok(())
    }
}
