use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by embedding providers.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EmbeddingError {
    /// Provider configuration is inconsistent (e.g. api mode without a URL).
    #[error("invalid embedding config: {0}")]
    InvalidConfig(String),
    /// The text handed to the provider was empty after trimming.
    #[error("embedding input is empty")]
    EmptyInput,
    /// Transport-level failure (DNS, connect, reset).
    #[error("embedding request failed: {0}")]
    Transport(String),
    /// The call did not finish within its deadline.
    #[error("embedding request timed out after {0:?}")]
    Timeout(Duration),
    /// The provider answered with a non-success status.
    #[error("embedding provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// The provider answered but the payload could not be interpreted.
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
    /// The per-provider circuit breaker is open.
    #[error("circuit breaker is open for provider '{0}'")]
    CircuitOpen(String),
}

impl EmbeddingError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::Transport(_) | EmbeddingError::Timeout(_) => true,
            EmbeddingError::Status { status, .. } => {
                matches!(*status, 408 | 429 | 500 | 502 | 503 | 504)
            }
            EmbeddingError::InvalidConfig(_)
            | EmbeddingError::EmptyInput
            | EmbeddingError::InvalidResponse(_)
            | EmbeddingError::CircuitOpen(_) => false,
        }
    }
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EmbeddingError::Timeout(Duration::ZERO)
        } else if err.is_decode() {
            EmbeddingError::InvalidResponse(err.to_string())
        } else {
            EmbeddingError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_retry_classes() {
        let retryable = [408u16, 429, 500, 502, 503, 504];
        for status in retryable {
            let err = EmbeddingError::Status {
                status,
                body: String::new(),
            };
            assert!(err.is_retryable(), "{status} should be retryable");
        }

        for status in [400u16, 401, 403, 404, 422] {
            let err = EmbeddingError::Status {
                status,
                body: String::new(),
            };
            assert!(!err.is_retryable(), "{status} should not be retryable");
        }
    }

    #[test]
    fn timeouts_and_transport_are_retryable() {
        assert!(EmbeddingError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(EmbeddingError::Transport("connection reset".into()).is_retryable());
        assert!(!EmbeddingError::CircuitOpen("openai".into()).is_retryable());
        assert!(!EmbeddingError::InvalidResponse("bad shape".into()).is_retryable());
    }

    #[test]
    fn display_includes_context() {
        let err = EmbeddingError::Status {
            status: 503,
            body: "overloaded".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("overloaded"));
    }
}
