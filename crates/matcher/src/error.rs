use embedding::EmbeddingError;
use store::{OwnerType, StoreError};
use thiserror::Error;

/// Errors produced by the matching engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MatchError {
    /// An embedding or scoring call failed or timed out.
    #[error("provider error: {0}")]
    Provider(String),
    /// The profile has no vector computed from its current text.
    #[error("no usable embedding for {owner_type} '{owner_id}'")]
    MissingEmbedding {
        owner_type: OwnerType,
        owner_id: String,
    },
    /// The profile's derived embedding text is empty.
    #[error("{owner_type} '{owner_id}' has no text to embed")]
    EmptyText {
        owner_type: OwnerType,
        owner_id: String,
    },
    /// A target vector does not have the provider's dimensionality.
    #[error("embedding for {owner_type} '{owner_id}' has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        owner_type: OwnerType,
        owner_id: String,
        expected: usize,
        actual: usize,
    },
    #[error("{owner_type} '{owner_id}' not found")]
    ProfileNotFound {
        owner_type: OwnerType,
        owner_id: String,
    },
    #[error("invalid match parameters: {0}")]
    InvalidParams(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("operation cancelled")]
    Cancelled,
    /// A worker task stopped without reporting (panic or shutdown).
    #[error("internal error: {0}")]
    Internal(String),
}

impl MatchError {
    /// Provider failures can be retried as-is; everything else needs a
    /// change of input or state first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MatchError::Provider(_))
    }
}

impl From<EmbeddingError> for MatchError {
    fn from(err: EmbeddingError) -> Self {
        MatchError::Provider(err.to_string())
    }
}
