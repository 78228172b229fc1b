//! Configuration management for casevault.
//!
//! Configuration is layered, lowest precedence first:
//! - Built-in defaults
//! - Config file (`.casevault/config.yaml`, or `CASEVAULT_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric: local state (the SQLite vector
//! index, the config file) lives under `<workspace>/.casevault/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Name of the per-workspace state directory.
pub const STATE_DIR: &str = ".casevault";

/// Embedding providers understood by the provider factory.
pub const KNOWN_EMBEDDING_PROVIDERS: [&str; 2] = ["hashing", "openai"];

/// Vector index backends understood by the index factory.
pub const KNOWN_INDEX_BACKENDS: [&str; 2] = ["sqlite", "pinecone"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .casevault/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log filter override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    pub embedding: EmbeddingSettings,

    pub index: IndexSettings,

    pub chunking: ChunkingSettings,

    pub retrieval: RetrievalSettings,
}

/// Which embedding capability to use and how to reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbeddingSettings {
    /// "hashing" (local, deterministic) or "openai" (hosted, OpenAI-compatible)
    pub provider: String,

    /// Model identifier sent to the hosted provider
    pub model: String,

    /// Output dimensionality; every vector in an index must share it
    pub dimensions: usize,

    /// Base URL of the hosted API (e.g. "https://api.openai.com/v1")
    pub endpoint: Option<String>,

    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Retries after the first attempt (hosted providers only)
    pub max_retries: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "hashing".to_string(),
            model: "hashing-v1".to_string(),
            dimensions: 384,
            endpoint: None,
            api_key_env: None,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

/// Which vector index backend to use and how to reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IndexSettings {
    /// "sqlite" (local file) or "pinecone" (managed, REST)
    pub backend: String,

    /// SQLite database path; relative paths resolve against the workspace
    pub path: Option<PathBuf>,

    /// Index host URL for the managed backend
    pub host: Option<String>,

    /// Name of the environment variable holding the index API key
    pub api_key_env: Option<String>,

    /// Vectors per upsert request
    pub upsert_batch_size: usize,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            path: None,
            host: None,
            api_key_env: None,
            upsert_batch_size: 100,
            timeout_secs: 30,
        }
    }
}

/// Chunk sizing, in approximate tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChunkingSettings {
    pub chunk_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_tokens: 1000,
            overlap_tokens: 200,
        }
    }
}

/// Retrieval defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrievalSettings {
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 10 }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    embedding: Option<EmbeddingSettings>,
    index: Option<IndexSettings>,
    chunking: Option<ChunkingSettings>,
    retrieval: Option<RetrievalSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            embedding: EmbeddingSettings::default(),
            index: IndexSettings::default(),
            chunking: ChunkingSettings::default(),
            retrieval: RetrievalSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and the environment.
    ///
    /// Environment variables:
    /// - `CASEVAULT_WORKSPACE`: Override workspace path
    /// - `CASEVAULT_CONFIG`: Path to config file
    /// - `CASEVAULT_EMBEDDING_PROVIDER`: Embedding provider
    /// - `CASEVAULT_INDEX_BACKEND`: Vector index backend
    /// - `RUST_LOG`: Log filter
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use casevault_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("CASEVAULT_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("CASEVAULT_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.state_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override the config file
        if let Ok(provider) = std::env::var("CASEVAULT_EMBEDDING_PROVIDER") {
            config.embedding.provider = provider;
        }

        if let Ok(backend) = std::env::var("CASEVAULT_INDEX_BACKEND") {
            config.index.backend = backend;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into a copy of this config.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }
        if let Some(index) = config_file.index {
            result.index = index;
        }
        if let Some(chunking) = config_file.chunking {
            result.chunking = chunking;
        }
        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over the environment and the config file.
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .casevault directory.
    pub fn state_dir(&self) -> PathBuf {
        self.workspace.join(STATE_DIR)
    }

    /// Ensure the .casevault directory exists.
    pub fn ensure_state_dir(&self) -> AppResult<()> {
        let state_dir = self.state_dir();
        if !state_dir.exists() {
            std::fs::create_dir_all(&state_dir).map_err(|e| {
                AppError::Config(format!("Failed to create {} directory: {}", STATE_DIR, e))
            })?;
        }
        Ok(())
    }

    /// Resolved path of the local SQLite vector index.
    pub fn index_path(&self) -> PathBuf {
        match self.index.path {
            Some(ref p) if p.is_absolute() => p.clone(),
            Some(ref p) => self.workspace.join(p),
            None => self.state_dir().join("index.sqlite"),
        }
    }

    /// Read the embedding API key from the configured environment variable.
    pub fn embedding_api_key(&self) -> Option<String> {
        self.embedding
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
    }

    /// Read the vector index API key from the configured environment variable.
    pub fn index_api_key(&self) -> Option<String> {
        self.index
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
    }

    /// Validate the configuration before any collaborator is constructed.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.embedding.provider.as_str();
        if !KNOWN_EMBEDDING_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                provider,
                KNOWN_EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        let backend = self.index.backend.as_str();
        if !KNOWN_INDEX_BACKENDS.contains(&backend) {
            return Err(AppError::Config(format!(
                "Unknown index backend: {}. Supported: {}",
                backend,
                KNOWN_INDEX_BACKENDS.join(", ")
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "embedding.dimensions must be positive".to_string(),
            ));
        }

        if self.chunking.chunk_tokens == 0 {
            return Err(AppError::Config(
                "chunking.chunkTokens must be positive".to_string(),
            ));
        }

        if self.chunking.overlap_tokens >= self.chunking.chunk_tokens {
            return Err(AppError::Config(format!(
                "chunking.overlapTokens ({}) must be less than chunking.chunkTokens ({})",
                self.chunking.overlap_tokens, self.chunking.chunk_tokens
            )));
        }

        if self.index.upsert_batch_size == 0 {
            return Err(AppError::Config(
                "index.upsertBatchSize must be positive".to_string(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(AppError::Config(
                "retrieval.topK must be positive".to_string(),
            ));
        }

        if provider == "openai" {
            require_env("embedding.apiKeyEnv", self.embedding.api_key_env.as_deref())?;
        }

        if backend == "pinecone" {
            if self.index.host.is_none() {
                return Err(AppError::Config(
                    "index.host is required for the pinecone backend".to_string(),
                ));
            }
            require_env("index.apiKeyEnv", self.index.api_key_env.as_deref())?;
        }

        Ok(())
    }
}

/// Ensure a hosted backend names an API-key variable and that it is set.
fn require_env(setting: &str, var: Option<&str>) -> AppResult<()> {
    let var = var.ok_or_else(|| AppError::Config(format!("{} is required", setting)))?;
    if std::env::var(var).is_err() {
        return Err(AppError::Config(format!(
            "API key not found in environment variable: {}",
            var
        )));
    }
    Ok(())
}
