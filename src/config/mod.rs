// src/config/mod.rs
// Settings for the recall core: defaults, then ragbot.toml, then .env / environment

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{RecallError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    // ── Milvus Configuration
    pub milvus_host: String,
    pub milvus_port: u16,
    pub milvus_user: String,
    pub milvus_password: String,
    pub milvus_token: String,
    pub milvus_database: String,
    pub milvus_knowledge_collection: String,
    pub milvus_history_collection: String,
    pub milvus_faq_collection: String,
    pub milvus_connect_timeout_secs: u64,

    // ── Embedding Configuration
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub embedding_base_url: String,
    pub embedding_api_key: String,
    pub embedding_timeout_secs: u64,

    // ── Recall Configuration
    pub vector_top_k: usize,
    pub vector_score_threshold: f32,
    pub recall_timeout_ms: u64,
    pub search_nprobe: u32,

    // ── Knowledge Listing
    pub count_batch_size: usize,
    pub count_max_scan: usize,

    // ── Logging Configuration
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            milvus_host: "localhost".to_string(),
            milvus_port: 19530,
            milvus_user: String::new(),
            milvus_password: String::new(),
            milvus_token: String::new(),
            milvus_database: "default".to_string(),
            milvus_knowledge_collection: "knowledge_base".to_string(),
            milvus_history_collection: "conversation_history".to_string(),
            milvus_faq_collection: "faq".to_string(),
            milvus_connect_timeout_secs: 10,
            embedding_model: "text-embedding-ada-002".to_string(),
            embedding_dim: 1536,
            embedding_base_url: "https://api.openai.com".to_string(),
            embedding_api_key: String::new(),
            embedding_timeout_secs: 30,
            vector_top_k: 3,
            vector_score_threshold: 0.7,
            recall_timeout_ms: 3000,
            search_nprobe: 16,
            count_batch_size: 16384,
            count_max_scan: 1_000_000,
            log_level: "info".to_string(),
        }
    }
}

// Values may carry trailing comments and whitespace in .env files.
fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            let clean_val = val.split('#').next().unwrap_or("").trim();
            match clean_val.parse::<T>() {
                Ok(parsed) => {
                    debug!(key, value = clean_val, "Config value from environment");
                    parsed
                }
                Err(_) => {
                    warn!(key, value = %val, "Config value failed to parse, using default");
                    default
                }
            }
        }
        Err(_) => default,
    }
}

impl Settings {
    /// Load settings: defaults, then the TOML file (if any), then `.env` and environment.
    pub fn load() -> Result<Self> {
        if dotenvy::dotenv().is_err() {
            debug!(".env file not found, using environment variables and defaults");
        }

        Self::load_from(Self::config_path().as_deref())
    }

    /// Defaults or `path`, then environment overrides. Invalid values are an error,
    /// never a silent reset to defaults.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        let settings = base.with_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    /// Parse a TOML settings file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RecallError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            RecallError::Config(format!("cannot parse {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Loaded settings from file");
        Ok(settings)
    }

    // RAGBOT_CONFIG wins; otherwise ./ragbot.toml when present.
    fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("RAGBOT_CONFIG") {
            let path = path.trim();
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        let local = PathBuf::from("ragbot.toml");
        local.exists().then_some(local)
    }

    /// Apply environment overrides on top of the current values
    pub fn with_env_overrides(self) -> Self {
        Self {
            milvus_host: env_var_or("MILVUS_HOST", self.milvus_host),
            milvus_port: env_var_or("MILVUS_PORT", self.milvus_port),
            milvus_user: env_var_or("MILVUS_USER", self.milvus_user),
            milvus_password: env_var_or("MILVUS_PASSWORD", self.milvus_password),
            milvus_token: env_var_or("MILVUS_TOKEN", self.milvus_token),
            milvus_database: env_var_or("MILVUS_DATABASE", self.milvus_database),
            milvus_knowledge_collection: env_var_or(
                "MILVUS_KNOWLEDGE_COLLECTION",
                self.milvus_knowledge_collection,
            ),
            milvus_history_collection: env_var_or(
                "MILVUS_HISTORY_COLLECTION",
                self.milvus_history_collection,
            ),
            milvus_faq_collection: env_var_or("MILVUS_FAQ_COLLECTION", self.milvus_faq_collection),
            milvus_connect_timeout_secs: env_var_or(
                "MILVUS_CONNECT_TIMEOUT_SECS",
                self.milvus_connect_timeout_secs,
            ),
            embedding_model: env_var_or("EMBEDDING_MODEL", self.embedding_model),
            embedding_dim: env_var_or("EMBEDDING_DIM", self.embedding_dim),
            embedding_base_url: env_var_or("EMBEDDING_BASE_URL", self.embedding_base_url),
            embedding_api_key: env_var_or("EMBEDDING_API_KEY", self.embedding_api_key),
            embedding_timeout_secs: env_var_or(
                "EMBEDDING_TIMEOUT_SECS",
                self.embedding_timeout_secs,
            ),
            vector_top_k: env_var_or("VECTOR_TOP_K", self.vector_top_k),
            vector_score_threshold: env_var_or(
                "VECTOR_SCORE_THRESHOLD",
                self.vector_score_threshold,
            ),
            recall_timeout_ms: env_var_or("RECALL_TIMEOUT_MS", self.recall_timeout_ms),
            search_nprobe: env_var_or("SEARCH_NPROBE", self.search_nprobe),
            count_batch_size: env_var_or("COUNT_BATCH_SIZE", self.count_batch_size),
            count_max_scan: env_var_or("COUNT_MAX_SCAN", self.count_max_scan),
            log_level: env_var_or("RAGBOT_LOG_LEVEL", self.log_level),
        }
    }

    /// Reject values the repositories cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.vector_score_threshold) {
            return Err(RecallError::Config(format!(
                "vector_score_threshold must be within [0, 1], got {}",
                self.vector_score_threshold
            )));
        }
        if self.embedding_dim == 0 {
            return Err(RecallError::Config("embedding_dim must be positive".into()));
        }
        if self.vector_top_k == 0 {
            return Err(RecallError::Config("vector_top_k must be at least 1".into()));
        }
        if self.count_batch_size == 0 {
            return Err(RecallError::Config("count_batch_size must be positive".into()));
        }
        if self.count_max_scan < self.count_batch_size {
            return Err(RecallError::Config(format!(
                "count_max_scan ({}) must not be smaller than count_batch_size ({})",
                self.count_max_scan, self.count_batch_size
            )));
        }
        Ok(())
    }

    // --- Convenience Methods ---

    /// Base URI of the Milvus REST endpoint
    pub fn milvus_uri(&self) -> String {
        format!("http://{}:{}", self.milvus_host, self.milvus_port)
    }

    /// Bearer credential for Milvus: explicit token, else `user:password`, else none
    pub fn milvus_credential(&self) -> Option<String> {
        if !self.milvus_token.trim().is_empty() {
            Some(self.milvus_token.trim().to_string())
        } else if !self.milvus_user.is_empty() {
            Some(format!("{}:{}", self.milvus_user, self.milvus_password))
        } else {
            None
        }
    }

    pub fn milvus_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.milvus_connect_timeout_secs)
    }

    /// Deadline applied to every recall-path engine search
    pub fn recall_timeout(&self) -> Duration {
        Duration::from_millis(self.recall_timeout_ms)
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding_timeout_secs)
    }
}
