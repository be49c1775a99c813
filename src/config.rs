//! Layered engine configuration.
//!
//! Sources are applied in order, later ones winning:
//!
//! 1. `.env` in the working directory (optional, via `dotenvy`)
//! 2. a config file in any format the `config` crate understands (optional)
//! 3. environment variables prefixed `TALENT_MATCH`, sections separated by `__`
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! embedding:
//!   mode: api
//!   api_provider: openai
//!   api_url: "https://api.openai.com/v1/embeddings"
//!   api_auth_header: "Bearer sk-..."
//!   model_name: "text-embedding-3-small"
//!   dimension: 1536
//!
//! scoring:
//!   mode: heuristic
//!
//! matching:
//!   default_params:
//!     vector_top_k: 20
//!     ai_top_k: 10
//!     min_vector_similarity: 0.3
//!     min_ai_score: 50
//!     language: "en"
//!   on_missing_embedding: generate
//!   default_max_concurrent: 4
//!
//! store:
//!   backend: redb
//!   path: "/var/lib/talent-match/embeddings.redb"
//!
//! logging:
//!   level: "info"
//!   format: json
//! ```
//!
//! The same knob from the environment:
//! `TALENT_MATCH__MATCHING__DEFAULT_PARAMS__AI_TOP_K=5`.

use std::path::Path;

use embedding::EmbeddingConfig;
use matcher::{MatchParams, MissingEmbeddingPolicy, ScoringConfig};
use serde::{Deserialize, Serialize};
use store::BackendConfig;
use thiserror::Error;

pub const ENV_PREFIX: &str = "TALENT_MATCH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub embedding: EmbeddingConfig,
    pub scoring: ScoringConfig,
    pub matching: MatchingConfig,
    pub store: BackendConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Used when a caller does not pass its own parameters.
    pub default_params: MatchParams,
    pub on_missing_embedding: MissingEmbeddingPolicy,
    pub default_max_concurrent: usize,
    /// Deadline for a single embedding call, in seconds.
    pub embedding_timeout_secs: u64,
    /// Default chunk size of `batch_generate`.
    pub default_batch_size: usize,
    /// Pending background generation jobs before `submit` waits.
    pub queue_capacity: usize,
    /// Finished background jobs whose status stays queryable.
    pub finished_jobs_retained: usize,
    /// `find_best_matches` calls retained for stats.
    pub history_capacity: usize,
    /// How long computed stats are reused; `0` recomputes on every call.
    pub stats_ttl_secs: u64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            default_params: MatchParams::default(),
            on_missing_embedding: MissingEmbeddingPolicy::Fail,
            default_max_concurrent: 4,
            embedding_timeout_secs: 30,
            default_batch_size: 50,
            queue_capacity: 16,
            finished_jobs_retained: 256,
            history_capacity: 1_000,
            stats_ttl_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `matcher=debug,info`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl EngineConfig {
    /// Load `.env`, then `path` (if given and present), then `TALENT_MATCH__*`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        // A missing .env is normal outside development.
        let _ = dotenvy::dotenv();
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// [`load`](Self::load) without `.env` and with a custom variable prefix.
    pub fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(env_prefix)
                .separator("__")
                .try_parsing(true),
        );

        let cfg: EngineConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let cfg: EngineConfig = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding
            .validate()
            .map_err(|e| ConfigError::Validation(format!("embedding: {e}")))?;
        self.scoring
            .validate()
            .map_err(|e| ConfigError::Validation(format!("scoring: {e}")))?;
        self.matching
            .default_params
            .validate()
            .map_err(|e| ConfigError::Validation(format!("matching.default_params: {e}")))?;

        let m = &self.matching;
        let positive = [
            ("default_max_concurrent", m.default_max_concurrent as u64),
            ("embedding_timeout_secs", m.embedding_timeout_secs),
            ("default_batch_size", m.default_batch_size as u64),
            ("queue_capacity", m.queue_capacity as u64),
            ("finished_jobs_retained", m.finished_jobs_retained as u64),
            ("history_capacity", m.history_capacity as u64),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Validation(format!(
                    "matching.{name} must be greater than zero"
                )));
            }
        }

        if let BackendConfig::Redb { path } = &self.store {
            if path.trim().is_empty() {
                return Err(ConfigError::Validation("store.path must not be empty".into()));
            }
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Validation("logging.level must not be empty".into()));
        }
        Ok(())
    }
}
