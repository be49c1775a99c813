use serde::{Deserialize, Serialize};

use super::ScoringError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// Deterministic rule-based scoring, no network.
    #[default]
    Heuristic,
    /// Remote model behind an HTTP endpoint.
    Api,
}

/// Wire contract of the remote scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScoringApiKind {
    /// OpenAI-compatible chat completion returning the score document as message content.
    #[serde(rename = "openai")]
    OpenAi,
    /// Endpoint answering the score document directly.
    #[default]
    #[serde(rename = "custom")]
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub mode: ScoringMode,
    pub api_url: Option<String>,
    pub api_auth_header: Option<String>,
    pub api_provider: ScoringApiKind,
    pub model_name: String,
    /// Per-candidate deadline in seconds.
    pub timeout_secs: u64,
    /// Scoring calls in flight per target.
    pub concurrency: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            mode: ScoringMode::Heuristic,
            api_url: None,
            api_auth_header: None,
            api_provider: ScoringApiKind::Custom,
            model_name: "gpt-4o-mini".into(),
            timeout_secs: 30,
            concurrency: 4,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), ScoringError> {
        if self.timeout_secs == 0 {
            return Err(ScoringError::InvalidConfig(
                "timeout_secs must be greater than zero".into(),
            ));
        }
        if self.concurrency == 0 {
            return Err(ScoringError::InvalidConfig(
                "concurrency must be greater than zero".into(),
            ));
        }
        if self.mode == ScoringMode::Api
            && self
                .api_url
                .as_deref()
                .map(|u| u.trim().is_empty())
                .unwrap_or(true)
        {
            return Err(ScoringError::InvalidConfig(
                "api_url is required for api mode".into(),
            ));
        }
        Ok(())
    }
}
