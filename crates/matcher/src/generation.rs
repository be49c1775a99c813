use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use embedding::EmbeddingProvider;
use futures::future::join_all;
use serde::Serialize;
use store::{EmbeddingRecord, EmbeddingStore, OwnerType, Profile, ProfileSource};
use tokio::sync::Mutex;

use crate::MatchError;

/// Summary of one `batch_generate` run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGenerateReport {
    pub owner_type: Option<OwnerType>,
    /// Profiles of the type in the record store.
    pub total: usize,
    /// Profiles that already had a current embedding.
    pub already_current: usize,
    pub succeeded: usize,
    /// `(owner_id, reason)` for every profile that could not be embedded.
    pub failed: Vec<(String, String)>,
}

/// Builds embedding text, calls the provider and persists the result.
pub struct EmbeddingGenerator {
    profiles: Arc<dyn ProfileSource>,
    store: EmbeddingStore,
    provider: Arc<dyn EmbeddingProvider>,
    timeout: Duration,
    key_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl EmbeddingGenerator {
    pub fn new(
        profiles: Arc<dyn ProfileSource>,
        store: EmbeddingStore,
        provider: Arc<dyn EmbeddingProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            profiles,
            store,
            provider,
            timeout,
            key_locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &EmbeddingStore {
        &self.store
    }

    pub fn provider_dimension(&self) -> Option<usize> {
        self.provider.dimension()
    }

    /// Generate (or overwrite) the embedding of one profile.
    pub async fn generate_embedding(
        &self,
        owner_type: OwnerType,
        owner_id: &str,
    ) -> Result<EmbeddingRecord, MatchError> {
        let profile = self.load_profile(owner_type, owner_id).await?;
        self.generate_for_profile(&profile).await
    }

    pub async fn generate_for_profile(
        &self,
        profile: &Profile,
    ) -> Result<EmbeddingRecord, MatchError> {
        self.with_key_lock(profile, |_| true).await
    }

    /// Whether `record` can be used for `profile` with the provider in use.
    pub fn is_current(&self, record: &EmbeddingRecord, profile: &Profile) -> bool {
        record.is_current_for(profile, self.provider.dimension())
    }

    /// Return the current record, generating one only when it is missing or stale.
    pub async fn ensure_current(&self, profile: &Profile) -> Result<EmbeddingRecord, MatchError> {
        if let Some(record) = self.store.get(profile.owner_type, &profile.id)? {
            if self.is_current(&record, profile) {
                return Ok(record);
            }
        }
        // Re-checked under the lock so concurrent callers embed only once.
        self.with_key_lock(profile, |existing| {
            !existing.is_some_and(|r| self.is_current(r, profile))
        })
        .await
    }

    pub fn get_embedding(
        &self,
        owner_type: OwnerType,
        owner_id: &str,
    ) -> Result<Option<EmbeddingRecord>, MatchError> {
        Ok(self.store.get(owner_type, owner_id)?)
    }

    /// Embed every profile of `owner_type` without a current record,
    /// `batch_size` at a time. Individual failures are recorded and skipped.
    pub async fn batch_generate(
        &self,
        owner_type: OwnerType,
        batch_size: usize,
    ) -> Result<BatchGenerateReport, MatchError> {
        if batch_size == 0 {
            return Err(MatchError::InvalidParams(
                "batch_size must be greater than zero".into(),
            ));
        }

        let profiles = self.profiles.list_profiles(owner_type).await?;
        let mut report = BatchGenerateReport {
            owner_type: Some(owner_type),
            total: profiles.len(),
            ..Default::default()
        };

        let mut pending = Vec::new();
        for profile in profiles {
            if self.store.is_stale(&profile, self.provider.dimension())? {
                pending.push(profile);
            } else {
                report.already_current += 1;
            }
        }

        for (chunk_idx, chunk) in pending.chunks(batch_size).enumerate() {
            let outcomes = join_all(chunk.iter().map(|p| self.generate_for_profile(p))).await;
            let mut chunk_ok = 0usize;
            for (profile, outcome) in chunk.iter().zip(outcomes) {
                match outcome {
                    Ok(_) => chunk_ok += 1,
                    Err(err) => {
                        tracing::warn!(
                            owner_type = %owner_type,
                            owner_id = %profile.id,
                            error = %err,
                            "embedding generation failed"
                        );
                        report.failed.push((profile.id.clone(), err.to_string()));
                    }
                }
            }
            report.succeeded += chunk_ok;
            tracing::debug!(
                chunk = chunk_idx,
                size = chunk.len(),
                succeeded = chunk_ok,
                "embedding chunk done"
            );
        }

        tracing::info!(
            owner_type = %owner_type,
            total = report.total,
            already_current = report.already_current,
            succeeded = report.succeeded,
            failed = report.failed.len(),
            "batch embedding generation finished"
        );
        Ok(report)
    }

    async fn load_profile(
        &self,
        owner_type: OwnerType,
        owner_id: &str,
    ) -> Result<Profile, MatchError> {
        self.profiles
            .get_profile(owner_type, owner_id)
            .await?
            .ok_or_else(|| MatchError::ProfileNotFound {
                owner_type,
                owner_id: owner_id.to_string(),
            })
    }

    /// Serialise work per owner key. `should_generate` sees the record
    /// stored at lock time; returning `false` reuses it.
    async fn with_key_lock<F>(
        &self,
        profile: &Profile,
        should_generate: F,
    ) -> Result<EmbeddingRecord, MatchError>
    where
        F: FnOnce(Option<&EmbeddingRecord>) -> bool,
    {
        let key = format!("{}:{}", profile.owner_type, profile.id);
        let lock = self
            .key_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = lock.lock().await;
            match self.store.get(profile.owner_type, &profile.id) {
                Err(err) => Err(err.into()),
                Ok(existing) => {
                    let generate = should_generate(existing.as_ref());
                    match existing {
                        Some(record) if !generate => Ok(record),
                        _ => self.embed_and_store(profile).await,
                    }
                }
            }
        };

        drop(lock);
        self.key_locks.remove_if(&key, |_, l| Arc::strong_count(l) == 1);
        result
    }

    async fn embed_and_store(&self, profile: &Profile) -> Result<EmbeddingRecord, MatchError> {
        let text = profile.embedding_text();
        if text.trim().is_empty() {
            return Err(MatchError::EmptyText {
                owner_type: profile.owner_type,
                owner_id: profile.id.clone(),
            });
        }

        let output = tokio::time::timeout(self.timeout, self.provider.embed(&text))
            .await
            .map_err(|_| {
                MatchError::Provider(format!(
                    "embedding {} '{}' timed out after {:?}",
                    profile.owner_type, profile.id, self.timeout
                ))
            })??;

        if output.vector.is_empty() || output.vector.iter().any(|v| !v.is_finite()) {
            return Err(MatchError::Provider(format!(
                "provider returned an unusable vector for {} '{}'",
                profile.owner_type, profile.id
            )));
        }
        if let Some(expected) = self.provider.dimension() {
            if output.vector.len() != expected {
                return Err(MatchError::DimensionMismatch {
                    owner_type: profile.owner_type,
                    owner_id: profile.id.clone(),
                    expected,
                    actual: output.vector.len(),
                });
            }
        }

        let record = EmbeddingRecord::new(
            profile.id.clone(),
            profile.owner_type,
            text,
            output.vector,
            output.model,
        );
        self.store.put(&record)?;
        tracing::debug!(
            owner_type = %profile.owner_type,
            owner_id = %profile.id,
            dimension = record.dimension().unwrap_or_default(),
            tokens = output.usage.total_tokens,
            "embedding stored"
        );
        Ok(record)
    }
}
