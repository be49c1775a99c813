use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{OwnerType, Profile};

/// Persisted embedding state attached to a profile.
///
/// Serialised with the record-store column names (`embeddingText`,
/// `embedding`, `embeddingUpdatedAt`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingRecord {
    pub owner_id: String,
    pub owner_type: OwnerType,
    /// Snapshot of the text the vector was computed from.
    #[serde(rename = "embeddingText")]
    pub source_text: String,
    /// `None` until the profile has been embedded once.
    #[serde(rename = "embedding", default)]
    pub vector: Option<Vec<f32>>,
    #[serde(default)]
    pub model: String,
    #[serde(rename = "embeddingUpdatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl EmbeddingRecord {
    pub fn new(
        owner_id: impl Into<String>,
        owner_type: OwnerType,
        source_text: impl Into<String>,
        vector: Vec<f32>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            owner_type,
            source_text: source_text.into(),
            vector: Some(vector),
            model: model.into(),
            updated_at: Utc::now(),
        }
    }

    pub fn dimension(&self) -> Option<usize> {
        self.vector.as_ref().map(Vec::len)
    }

    /// Usable vector, if any.
    pub fn vector(&self) -> Option<&[f32]> {
        self.vector.as_deref().filter(|v| !v.is_empty())
    }

    /// A record is current when it carries a vector computed from the
    /// profile's present embedding text and, when `expected_dimension` is
    /// known, of that length. A vector from an older model of a different
    /// size is stale.
    pub fn is_current_for(&self, profile: &Profile, expected_dimension: Option<usize>) -> bool {
        self.owner_id == profile.id
            && self.owner_type == profile.owner_type
            && self
                .vector()
                .is_some_and(|v| expected_dimension.map_or(true, |d| v.len() == d))
            && self.source_text == profile.embedding_text()
    }
}
