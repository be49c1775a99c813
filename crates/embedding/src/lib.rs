//! Embedding provider contract and clients.
//!
//! The matching engine depends only on [`EmbeddingProvider`]: given text,
//! return a fixed-length vector plus model metadata. Two implementations
//! ship here:
//!
//! * [`ApiEmbeddingProvider`] posts to a remote endpoint (OpenAI, Hugging Face
//!   or a custom shape) with retry and a circuit breaker.
//! * [`StubEmbeddingProvider`] feature-hashes tokens locally; deterministic and
//!   network-free, used for tests and offline runs.
//!
//! ```
//! use embedding::{provider_from_config, EmbeddingConfig};
//!
//! let provider = provider_from_config(&EmbeddingConfig::default()).unwrap();
//! assert_eq!(provider.dimension(), Some(384));
//! ```

use std::sync::Arc;

use async_trait::async_trait;

mod api;
mod config;
mod error;
mod normalize;
pub mod resilience;
mod stub;
mod types;

pub use api::ApiEmbeddingProvider;
pub use config::{ApiProviderKind, EmbeddingConfig, ProviderMode, DEFAULT_STUB_DIMENSION};
pub use error::EmbeddingError;
pub use normalize::l2_normalize_in_place;
pub use stub::StubEmbeddingProvider;
pub use types::{EmbeddingOutput, EmbeddingUsage};

/// Text-to-vector provider.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<EmbeddingOutput, EmbeddingError>;

    fn model_name(&self) -> &str;

    /// Fixed output dimensionality, when the provider knows it up front.
    fn dimension(&self) -> Option<usize> {
        None
    }
}

/// Build the provider described by `cfg`.
pub fn provider_from_config(
    cfg: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    cfg.validate()?;
    match cfg.mode {
        ProviderMode::Api => Ok(Arc::new(ApiEmbeddingProvider::new(cfg.clone())?)),
        ProviderMode::Stub => {
            let dimension = cfg.dimension.unwrap_or(DEFAULT_STUB_DIMENSION);
            Ok(Arc::new(StubEmbeddingProvider::new(
                cfg.model_name.clone(),
                dimension,
                cfg.normalize,
            )))
        }
    }
}
