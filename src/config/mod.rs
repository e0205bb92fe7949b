//! Configuration management for archivist
//!
//! Handles loading, saving, and validating configuration from TOML files.
//! Secrets are never stored in the file; config fields name the environment
//! variables that hold them.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Remote archive API configuration
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Vector index configuration
    #[serde(default)]
    pub vector: VectorConfig,

    /// Embedding backend configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunk: ChunkConfig,

    /// Pre-insert validation configuration
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Remote archive API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL for document endpoints
    #[serde(default = "default_remote_base_url")]
    pub base_url: String,

    /// Token endpoint URL
    #[serde(default = "default_remote_auth_url")]
    pub auth_url: String,

    /// Environment variable holding the API username
    #[serde(default = "default_remote_username_env")]
    pub username_env: String,

    /// Environment variable holding the API password
    #[serde(default = "default_remote_password_env")]
    pub password_env: String,

    /// Seconds of lead time before token expiry forces a re-auth
    #[serde(default = "default_refresh_threshold_secs")]
    pub refresh_threshold_secs: u64,

    /// Request timeout in seconds
    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
}

impl RemoteConfig {
    /// Read the API username from the configured environment variable
    pub fn username(&self) -> Result<String> {
        std::env::var(&self.username_env)
            .map_err(|_| Error::Config(format!("Environment variable {} not set", self.username_env)))
    }

    /// Read the API password from the configured environment variable
    pub fn password(&self) -> Result<String> {
        std::env::var(&self.password_env)
            .map_err(|_| Error::Config(format!("Environment variable {} not set", self.password_env)))
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    /// Whether synced documents are projected into the vector index
    #[serde(default)]
    pub enabled: bool,

    /// Environment variable holding the index API key
    #[serde(default = "default_vector_api_key_env")]
    pub api_key_env: String,

    /// Control-plane URL (index listing and creation)
    #[serde(default = "default_vector_control_url")]
    pub control_url: String,

    /// Data-plane host override; resolved from the control plane when unset
    #[serde(default)]
    pub index_host: Option<String>,

    /// Index name
    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// Vector dimension; must match the embedding model
    #[serde(default = "default_vector_dimension")]
    pub dimension: usize,

    /// Distance metric
    #[serde(default = "default_vector_metric")]
    pub metric: String,

    /// Serverless cloud provider
    #[serde(default = "default_vector_cloud")]
    pub cloud: String,

    /// Serverless region
    #[serde(default = "default_vector_region")]
    pub region: String,

    /// Namespace that chunk vectors are upserted into
    #[serde(default = "default_vector_namespace")]
    pub namespace: String,

    /// Vectors per upsert request
    #[serde(default = "default_vector_batch_size")]
    pub batch_size: usize,
}

impl VectorConfig {
    /// Read the index API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .map_err(|_| Error::Config(format!("Environment variable {} not set", self.api_key_env)))
    }
}

/// Embedding backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// OpenAI-compatible API base URL
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_embedding_api_key_env")]
    pub api_key_env: String,

    /// Model name/identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension (must match model)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Batch size for embedding requests
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,
}

impl EmbeddingConfig {
    /// Read the embedding API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .map_err(|_| Error::Config(format!("Environment variable {} not set", self.api_key_env)))
    }
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum characters per chunk
    #[serde(default = "default_chunk_max_chars")]
    pub max_chars: usize,

    /// Minimum chunk size (don't create tiny chunks)
    #[serde(default = "default_chunk_min_chars")]
    pub min_chars: usize,

    /// Overlap characters between chunks
    #[serde(default = "default_chunk_overlap")]
    pub overlap_chars: usize,
}

/// Behavior when the pre-insert remote check cannot be completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckFailurePolicy {
    /// Treat the document as new (leave local_update at its default)
    AssumeNew,
    /// Treat the document as a pending update (set local_update)
    AssumeUpdate,
}

/// Pre-insert validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Whether to consult the remote before inserting a document
    #[serde(default = "default_check_remote_on_create")]
    pub check_remote_on_create: bool,

    /// Classification when the existence check itself fails
    #[serde(default = "ValidationConfig::default_on_check_failure")]
    pub on_check_failure: CheckFailurePolicy,
}

impl ValidationConfig {
    fn default_on_check_failure() -> CheckFailurePolicy {
        CheckFailurePolicy::AssumeNew
    }
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for archivist data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,

    /// Path to the event log appended by the file observer
    pub event_log: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote: RemoteConfig::default(),
            vector: VectorConfig::default(),
            embedding: EmbeddingConfig::default(),
            chunk: ChunkConfig::default(),
            validation: ValidationConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_remote_base_url(),
            auth_url: default_remote_auth_url(),
            username_env: default_remote_username_env(),
            password_env: default_remote_password_env(),
            refresh_threshold_secs: default_refresh_threshold_secs(),
            timeout_secs: default_remote_timeout_secs(),
        }
    }
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key_env: default_vector_api_key_env(),
            control_url: default_vector_control_url(),
            index_host: None,
            index_name: default_index_name(),
            dimension: default_vector_dimension(),
            metric: default_vector_metric(),
            cloud: default_vector_cloud(),
            region: default_vector_region(),
            namespace: default_vector_namespace(),
            batch_size: default_vector_batch_size(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_base_url(),
            api_key_env: default_embedding_api_key_env(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            batch_size: default_embedding_batch_size(),
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chars: default_chunk_max_chars(),
            min_chars: default_chunk_min_chars(),
            overlap_chars: default_chunk_overlap(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            check_remote_on_create: default_check_remote_on_create(),
            on_check_failure: Self::default_on_check_failure(),
        }
    }
}

impl Config {
    /// Get the default base directory for archivist (~/.archivist)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".archivist")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("archive.db"),
            event_log: base.join("events.log"),
            base_dir: base,
        };
    }

    /// Build a default config rooted at the given base directory
    pub fn with_base_dir(base_dir: Option<PathBuf>) -> Self {
        let mut config = Config::default();
        config.init_paths(base_dir);
        config
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("archive.db"),
            event_log: base.join("events.log"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunk.max_chars < self.chunk.min_chars {
            return Err(Error::Config(
                "chunk.max_chars must be >= chunk.min_chars".to_string(),
            ));
        }

        if self.chunk.overlap_chars >= self.chunk.max_chars {
            return Err(Error::Config(
                "chunk.overlap_chars must be < chunk.max_chars".to_string(),
            ));
        }

        if self.vector.batch_size == 0 {
            return Err(Error::Config(
                "vector.batch_size must be positive".to_string(),
            ));
        }

        if self.vector.enabled && self.vector.dimension != self.embedding.dimension {
            return Err(Error::Config(format!(
                "vector.dimension ({}) must match embedding.dimension ({})",
                self.vector.dimension, self.embedding.dimension
            )));
        }

        url::Url::parse(&self.remote.base_url)
            .map_err(|e| Error::Config(format!("remote.base_url is invalid: {}", e)))?;
        url::Url::parse(&self.remote.auth_url)
            .map_err(|e| Error::Config(format!("remote.auth_url is invalid: {}", e)))?;

        Ok(())
    }
}
