use std::sync::Arc;

use crate::{
    BackendConfig, EmbeddingRecord, InMemoryBackend, OwnerType, Profile, StoreBackend, StoreError,
};

/// Embedding records keyed by owner type and id, JSON-encoded on the backend.
#[derive(Clone)]
pub struct EmbeddingStore {
    backend: Arc<dyn StoreBackend>,
}

impl EmbeddingStore {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackend::new()))
    }

    pub fn from_config(cfg: &BackendConfig) -> Result<Self, StoreError> {
        Ok(Self::new(cfg.build()?))
    }

    fn key(owner_type: OwnerType, owner_id: &str) -> String {
        format!("{owner_type}:{owner_id}")
    }

    fn decode(key: &str, bytes: &[u8]) -> Result<EmbeddingRecord, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Decode {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn get(
        &self,
        owner_type: OwnerType,
        owner_id: &str,
    ) -> Result<Option<EmbeddingRecord>, StoreError> {
        let key = Self::key(owner_type, owner_id);
        self.backend
            .get(&key)?
            .map(|bytes| Self::decode(&key, &bytes))
            .transpose()
    }

    /// Replace the record for its owner in a single backend write.
    pub fn put(&self, record: &EmbeddingRecord) -> Result<(), StoreError> {
        let key = Self::key(record.owner_type, &record.owner_id);
        let bytes = serde_json::to_vec(record).map_err(|e| StoreError::Encode {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        self.backend.put(&key, &bytes)
    }

    /// All records of one owner type, ordered by owner id.
    ///
    /// Undecodable entries are skipped with a warning so one corrupt row
    /// cannot hide the rest.
    pub fn scan(&self, owner_type: OwnerType) -> Result<Vec<EmbeddingRecord>, StoreError> {
        let prefix = format!("{owner_type}:");
        let mut records = Vec::new();
        self.backend.scan_prefix(&prefix, &mut |key, bytes| {
            match Self::decode(key, bytes) {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::warn!(%key, error = %err, "skipping undecodable embedding record")
                }
            }
            Ok(())
        })?;
        Ok(records)
    }

    /// True unless the stored record is current for `profile`, see
    /// [`EmbeddingRecord::is_current_for`].
    pub fn is_stale(
        &self,
        profile: &Profile,
        expected_dimension: Option<usize>,
    ) -> Result<bool, StoreError> {
        Ok(!self
            .get(profile.owner_type, &profile.id)?
            .is_some_and(|record| record.is_current_for(profile, expected_dimension)))
    }
}
