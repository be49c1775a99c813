use serde::{Deserialize, Serialize};

use crate::resilience::{CircuitBreakerConfig, RetryConfig};
use crate::EmbeddingError;

/// Stub output size when `dimension` is left unset.
pub const DEFAULT_STUB_DIMENSION: usize = 384;

/// Which provider implementation backs the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderMode {
    /// Remote HTTP provider.
    Api,
    /// Deterministic offline feature-hashing provider.
    #[default]
    Stub,
}

/// Request/response shape spoken by the remote provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ApiProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "hf", alias = "huggingface")]
    HuggingFace,
    #[default]
    #[serde(rename = "custom")]
    Custom,
}

impl ApiProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiProviderKind::OpenAi => "openai",
            ApiProviderKind::HuggingFace => "hf",
            ApiProviderKind::Custom => "custom",
        }
    }
}

/// Embedding provider configuration.
///
/// ```
/// use embedding::{EmbeddingConfig, ProviderMode};
///
/// let cfg = EmbeddingConfig {
///     mode: ProviderMode::Stub,
///     dimension: Some(64),
///     ..Default::default()
/// };
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub mode: ProviderMode,
    /// Model label sent to the provider and stamped on every record.
    pub model_name: String,
    /// Endpoint used in [`ProviderMode::Api`].
    pub api_url: Option<String>,
    /// Full `Authorization` header value, e.g. `"Bearer sk-..."`.
    pub api_auth_header: Option<String>,
    pub api_provider: ApiProviderKind,
    /// Per-call deadline in seconds.
    pub timeout_secs: u64,
    /// Fixed dimensionality of the vectors. The stub falls back to
    /// [`DEFAULT_STUB_DIMENSION`]; in API mode, when set, vectors of any
    /// other length are rejected, and when unset any length is accepted.
    pub dimension: Option<usize>,
    pub normalize: bool,
    /// Enables retry and circuit breaking for API calls.
    pub enable_resilience: bool,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            mode: ProviderMode::Stub,
            model_name: "text-embedding-3-small".into(),
            api_url: None,
            api_auth_header: None,
            api_provider: ApiProviderKind::Custom,
            timeout_secs: 30,
            dimension: None,
            normalize: true,
            enable_resilience: true,
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<(), EmbeddingError> {
        if self.model_name.trim().is_empty() {
            return Err(EmbeddingError::InvalidConfig(
                "model_name must not be empty".into(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(EmbeddingError::InvalidConfig(
                "timeout_secs must be greater than zero".into(),
            ));
        }
        if self.dimension == Some(0) {
            return Err(EmbeddingError::InvalidConfig(
                "dimension must be greater than zero".into(),
            ));
        }
        match self.mode {
            ProviderMode::Api => {
                let has_url = self
                    .api_url
                    .as_deref()
                    .map(|u| !u.trim().is_empty())
                    .unwrap_or(false);
                if !has_url {
                    return Err(EmbeddingError::InvalidConfig(
                        "api_url is required for api mode".into(),
                    ));
                }
            }
            ProviderMode::Stub => {}
        }
        Ok(())
    }

    /// The dimension the configured provider will produce, if fixed.
    pub fn effective_dimension(&self) -> Option<usize> {
        match self.mode {
            ProviderMode::Stub => Some(self.dimension.unwrap_or(DEFAULT_STUB_DIMENSION)),
            ProviderMode::Api => self.dimension,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_stub() {
        let cfg = EmbeddingConfig::default();
        assert_eq!(cfg.mode, ProviderMode::Stub);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn api_mode_requires_url() {
        let cfg = EmbeddingConfig {
            mode: ProviderMode::Api,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(EmbeddingError::InvalidConfig(msg)) if msg.contains("api_url")
        ));
    }

    #[test]
    fn provider_kind_accepts_aliases() {
        let kind: ApiProviderKind = serde_json::from_str("\"huggingface\"").unwrap();
        assert_eq!(kind, ApiProviderKind::HuggingFace);
        let kind: ApiProviderKind = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(kind, ApiProviderKind::OpenAi);
    }

    #[test]
    fn partial_document_fills_defaults() {
        let cfg: EmbeddingConfig =
            serde_json::from_str(r#"{"mode":"api","api_url":"http://localhost/embed"}"#).unwrap();
        assert_eq!(cfg.timeout_secs, 30);
        assert!(cfg.normalize);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn api_mode_does_not_inherit_the_stub_dimension() {
        let stub = EmbeddingConfig::default();
        assert_eq!(stub.effective_dimension(), Some(DEFAULT_STUB_DIMENSION));

        let api = EmbeddingConfig {
            mode: ProviderMode::Api,
            api_url: Some("http://localhost/embed".into()),
            ..Default::default()
        };
        assert_eq!(api.effective_dimension(), None);

        let pinned = EmbeddingConfig {
            dimension: Some(1536),
            ..api
        };
        assert_eq!(pinned.effective_dimension(), Some(1536));
    }
}
