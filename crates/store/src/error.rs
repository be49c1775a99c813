use thiserror::Error;

/// Errors raised by the record store and its backends.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("failed to encode record '{key}': {reason}")]
    Encode { key: String, reason: String },
    #[error("failed to decode record '{key}': {reason}")]
    Decode { key: String, reason: String },
    #[error("invalid owner type '{0}' (expected 'job' or 'candidate')")]
    InvalidOwnerType(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        StoreError::Backend(msg.into())
    }
}
