//! Casevault CLI
//!
//! Operator surface for chunking, ingesting and querying case documents.

mod commands;

use casevault_core::{config::AppConfig, logging, AppResult};
use clap::{Parser, Subcommand};
use commands::{
    ChunkCommand, DeleteDocumentCommand, DeleteVaultCommand, IngestCommand, QueryCommand,
};
use std::path::PathBuf;

/// Casevault - chunk, embed and retrieve case documents
#[derive(Parser, Debug)]
#[command(name = "casevault")]
#[command(about = "Chunk, embed and retrieve case documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "CASEVAULT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "CASEVAULT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Split a text file into chunks and print them
    Chunk(ChunkCommand),

    /// Chunk, embed and store documents in a vault
    Ingest(IngestCommand),

    /// Retrieve the chunks most relevant to a query
    Query(QueryCommand),

    /// Remove one document's vectors from a vault
    DeleteDocument(DeleteDocumentCommand),

    /// Remove every vector of a vault
    DeleteVault(DeleteVaultCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Chunk(_) => "chunk",
            Commands::Ingest(_) => "ingest",
            Commands::Query(_) => "query",
            Commands::DeleteDocument(_) => "delete-document",
            Commands::DeleteVault(_) => "delete-vault",
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load()?;
    if let Some(ref path) = cli.config {
        config = config.merge_yaml(path)?;
    }

    // CLI flags win over the config file and the environment
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!(
        "Embedding provider: {} ({}), index backend: {}",
        config.embedding.provider,
        config.embedding.model,
        config.index.backend
    );

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    let result = match cli.command {
        Commands::Chunk(cmd) => cmd.execute(&config).await,
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Query(cmd) => cmd.execute(&config).await,
        Commands::DeleteDocument(cmd) => cmd.execute(&config).await,
        Commands::DeleteVault(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::debug!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
