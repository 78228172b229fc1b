//! Ingest command handler.

use super::{open_collaborators, print_json};
use casevault_core::{config::AppConfig, AppError, AppResult};
use casevault_retrieval::{ChunkConfig, DocumentInput, Ingestor};
use clap::Args;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Chunk, embed and store documents in a vault
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Vault receiving the documents
    #[arg(long)]
    pub vault: String,

    /// Files or directories to ingest (directories are walked recursively)
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Document id to use (single file only; default is the file's path)
    #[arg(long)]
    pub document_id: Option<String>,

    /// Document type stored with every chunk
    #[arg(long, default_value = "document")]
    pub document_type: String,

    /// Chunk count of the previously ingested version, to remove stale chunks
    #[arg(long)]
    pub previous_chunks: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// A file selected for ingestion.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SourceFile {
    pub path: PathBuf,
    pub document_id: String,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let files = collect_files(&self.paths)?;
        if self.document_id.is_some() && files.len() != 1 {
            return Err(AppError::InvalidInput(format!(
                "--document-id needs exactly one file, found {}",
                files.len()
            )));
        }
        if self.previous_chunks.is_some() && files.len() != 1 {
            return Err(AppError::InvalidInput(
                "--previous-chunks applies to a single document".to_string(),
            ));
        }

        let chunk_config =
            ChunkConfig::new(config.chunking.chunk_tokens, config.chunking.overlap_tokens)?;
        let (embedder, index) = open_collaborators(config)?;
        let ingestor =
            Ingestor::new(embedder, index).with_batch_size(config.index.upsert_batch_size);

        let mut reports = Vec::new();
        let mut skipped = Vec::new();

        for file in files {
            let text = match std::fs::read_to_string(&file.path) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Skipping {:?}: {}", file.path, e);
                    skipped.push(file.path.display().to_string());
                    continue;
                }
            };

            let document_id = self.document_id.clone().unwrap_or(file.document_id);
            let document_name = file
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| document_id.clone());
            let document = DocumentInput::new(
                document_id,
                document_name,
                self.document_type.clone(),
                text,
            );

            let report = match self.previous_chunks {
                Some(previous) => {
                    ingestor
                        .replace_document(&self.vault, &document, &chunk_config, previous)
                        .await?
                }
                None => {
                    ingestor
                        .ingest_document(&self.vault, &document, &chunk_config)
                        .await?
                }
            };

            if !self.json {
                println!(
                    "Ingested {}: {} chunks in {} batches{}",
                    report.document_id,
                    report.chunk_count,
                    report.batch_count,
                    if report.stale_deleted > 0 {
                        format!(", {} stale removed", report.stale_deleted)
                    } else {
                        String::new()
                    }
                );
            }
            reports.push(report);
        }

        if self.json {
            return print_json(&serde_json::json!({
                "vault": self.vault,
                "documents": reports,
                "skipped": skipped,
            }));
        }

        let total: usize = reports.iter().map(|r| r.chunk_count).sum();
        println!(
            "Ingested {} documents ({} chunks) into vault '{}'",
            reports.len(),
            total,
            self.vault
        );
        if !skipped.is_empty() {
            println!("Skipped {} unreadable files", skipped.len());
        }

        Ok(())
    }
}

/// Resolve paths to files, walking directories and skipping hidden entries.
///
/// A file given directly is identified by its file name; a file found in a
/// directory by its path relative to that directory.
pub(crate) fn collect_files(paths: &[PathBuf]) -> AppResult<Vec<SourceFile>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(SourceFile {
                path: path.clone(),
                document_id: file_name(path),
            });
        } else if path.is_dir() {
            let walker = WalkDir::new(path)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()));

            for entry in walker.filter_map(|e| e.ok()) {
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = entry.path().strip_prefix(path).unwrap_or(entry.path());
                let document_id = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                files.push(SourceFile {
                    path: entry.path().to_path_buf(),
                    document_id,
                });
            }
        } else {
            return Err(AppError::InvalidInput(format!(
                "Path does not exist: {:?}",
                path
            )));
        }
    }

    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}
