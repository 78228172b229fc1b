//! Chunk command handler.

use super::print_json;
use casevault_core::{config::AppConfig, AppResult};
use casevault_retrieval::ChunkConfig;
use clap::Args;
use std::path::PathBuf;

/// Split a text file into chunks and print them
#[derive(Args, Debug)]
pub struct ChunkCommand {
    /// Text file to chunk
    pub file: PathBuf,

    /// Chunk size in approximate tokens (default from config)
    #[arg(long)]
    pub chunk_tokens: Option<usize>,

    /// Overlap between consecutive chunks in approximate tokens (default from config)
    #[arg(long)]
    pub overlap_tokens: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ChunkCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let chunk_config = ChunkConfig::new(
            self.chunk_tokens.unwrap_or(config.chunking.chunk_tokens),
            self.overlap_tokens.unwrap_or(config.chunking.overlap_tokens),
        )?;

        let text = std::fs::read_to_string(&self.file)?;
        let chunks: Vec<_> = chunk_config.chunks(&text)?.collect();

        tracing::info!("Split {:?} into {} chunks", self.file, chunks.len());

        if self.json {
            return print_json(&chunks);
        }

        if chunks.is_empty() {
            println!("No chunks (file has no text)");
            return Ok(());
        }

        for chunk in &chunks {
            println!(
                "--- chunk {} [{}..{}] ({} chars)",
                chunk.chunk_index,
                chunk.start,
                chunk.end,
                chunk.text.chars().count()
            );
            println!("{}", chunk.text);
        }

        Ok(())
    }
}
