use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use store::{EmbeddingRecord, OwnerType, Profile, ProfileSource};

use crate::similarity::PoolEntry;
use crate::{
    EmbeddingGenerator, MatchCandidate, MatchError, MatchHistory, MatchParams, MatchResult,
    MatchType, ScoringEngine, TargetRef, VectorSearchEngine, VectorSearchOptions,
};

/// What to do when the target has no current embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingEmbeddingPolicy {
    /// Fail with `MissingEmbedding`.
    #[default]
    Fail,
    /// Generate it on demand, then continue.
    Generate,
}

/// Runs vector search then scoring for one target.
pub struct MatchingOrchestrator {
    profiles: Arc<dyn ProfileSource>,
    generator: Arc<EmbeddingGenerator>,
    search: VectorSearchEngine,
    scoring: ScoringEngine,
    policy: MissingEmbeddingPolicy,
    history: Arc<MatchHistory>,
}

struct PoolMember {
    profile: Profile,
    vector: Vec<f32>,
}

impl MatchingOrchestrator {
    pub fn new(
        profiles: Arc<dyn ProfileSource>,
        generator: Arc<EmbeddingGenerator>,
        scoring: ScoringEngine,
        policy: MissingEmbeddingPolicy,
        history: Arc<MatchHistory>,
    ) -> Self {
        Self {
            profiles,
            generator,
            search: VectorSearchEngine::new(),
            scoring,
            policy,
            history,
        }
    }

    pub fn history(&self) -> &Arc<MatchHistory> {
        &self.history
    }

    /// Ranked matches for `target`, best AI score first.
    ///
    /// At most `ai_top_k` results are returned and each clears both
    /// `min_vector_similarity` and `min_ai_score`. Candidates whose scoring
    /// fails are dropped and logged.
    pub async fn find_best_matches(
        &self,
        target: &TargetRef,
        params: &MatchParams,
    ) -> Result<Vec<MatchResult>, MatchError> {
        let started = Instant::now();
        params.validate()?;

        let profile = self.resolve_profile(target).await?;
        let query = self.target_vector(&profile).await?;
        let pool = self.build_pool(profile.owner_type.opposite(), false).await?;

        let entries: Vec<PoolEntry<'_>> = pool
            .iter()
            .map(|m| PoolEntry {
                owner_id: &m.profile.id,
                vector: &m.vector,
            })
            .collect();
        let survivors = self.search.search(
            &query,
            &entries,
            params.vector_top_k,
            params.min_vector_similarity,
        );

        let by_id: HashMap<&str, &Profile> = pool
            .iter()
            .map(|m| (m.profile.id.as_str(), &m.profile))
            .collect();
        let to_score: Vec<(MatchCandidate, Profile)> = survivors
            .into_iter()
            .filter_map(|c| {
                let profile = by_id.get(c.owner_id.as_str())?;
                Some((c, (*profile).clone()))
            })
            .collect();
        let survivor_count = to_score.len();

        let outcome = self
            .scoring
            .score_all(&profile, to_score, &params.language)
            .await;
        let scoring_failures = outcome.failures.len();

        let match_type = MatchType::for_source(profile.owner_type);
        let mut results: Vec<MatchResult> = outcome
            .scored
            .into_iter()
            .filter(|s| s.score.ai_score >= params.min_ai_score)
            .map(|s| MatchResult::new(profile.id.clone(), match_type, s.candidate, s.score))
            .collect();
        results.sort_by(|a, b| {
            b.ai_score()
                .total_cmp(&a.ai_score())
                .then_with(|| b.vector_similarity.total_cmp(&a.vector_similarity))
                .then_with(|| a.target_id.cmp(&b.target_id))
        });
        results.truncate(params.ai_top_k);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        for result in &mut results {
            result.processing_time_ms = elapsed_ms;
        }
        self.history.record(&results, elapsed_ms);

        tracing::info!(
            target = %target,
            pool = pool.len(),
            survivors = survivor_count,
            scoring_failures,
            returned = results.len(),
            elapsed_ms,
            scorer = self.scoring.provider_name(),
            "find_best_matches finished"
        );
        Ok(results)
    }

    /// Stage 1 only: similarity-ranked opposite-type profiles.
    pub async fn vector_search(
        &self,
        target: &TargetRef,
        options: &VectorSearchOptions,
    ) -> Result<Vec<MatchCandidate>, MatchError> {
        if !options.min_similarity.is_finite() || !(-1.0..=1.0).contains(&options.min_similarity) {
            return Err(MatchError::InvalidParams(
                "min_similarity must be within -1.0..=1.0".into(),
            ));
        }
        let profile = self.resolve_profile(target).await?;
        let query = self.target_vector(&profile).await?;
        let pool = self
            .build_pool(profile.owner_type.opposite(), options.include_inactive)
            .await?;
        let entries: Vec<PoolEntry<'_>> = pool
            .iter()
            .map(|m| PoolEntry {
                owner_id: &m.profile.id,
                vector: &m.vector,
            })
            .collect();
        Ok(self
            .search
            .search(&query, &entries, options.limit, options.min_similarity))
    }

    async fn resolve_profile(&self, target: &TargetRef) -> Result<Profile, MatchError> {
        self.profiles
            .get_profile(target.owner_type, &target.owner_id)
            .await?
            .ok_or_else(|| MatchError::ProfileNotFound {
                owner_type: target.owner_type,
                owner_id: target.owner_id.clone(),
            })
    }

    /// The target's vector, honouring the missing-embedding policy. Under
    /// `Fail`, a vector computed from the current text by a provider of
    /// another output size is reported as `DimensionMismatch`.
    async fn target_vector(&self, profile: &Profile) -> Result<Vec<f32>, MatchError> {
        let stored = self.generator.get_embedding(profile.owner_type, &profile.id)?;
        let record = match stored {
            Some(record) if self.generator.is_current(&record, profile) => record,
            stored => match self.policy {
                MissingEmbeddingPolicy::Fail => {
                    let expected = self.generator.provider_dimension();
                    return Err(Self::unusable(profile, stored, expected));
                }
                MissingEmbeddingPolicy::Generate => {
                    tracing::debug!(
                        owner_type = %profile.owner_type,
                        owner_id = %profile.id,
                        "generating target embedding on demand"
                    );
                    self.generator.ensure_current(profile).await?
                }
            },
        };

        record
            .vector
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Self::unusable(profile, None, None))
    }

    fn unusable(
        profile: &Profile,
        stored: Option<EmbeddingRecord>,
        expected: Option<usize>,
    ) -> MatchError {
        let resized = stored.filter(|r| r.is_current_for(profile, None));
        match (expected, resized.and_then(|r| r.dimension())) {
            (Some(expected), Some(actual)) if expected != actual => MatchError::DimensionMismatch {
                owner_type: profile.owner_type,
                owner_id: profile.id.clone(),
                expected,
                actual,
            },
            _ => MatchError::MissingEmbedding {
                owner_type: profile.owner_type,
                owner_id: profile.id.clone(),
            },
        }
    }

    /// Profiles of `owner_type` that have a current embedding.
    async fn build_pool(
        &self,
        owner_type: OwnerType,
        include_inactive: bool,
    ) -> Result<Vec<PoolMember>, MatchError> {
        let profiles = self.profiles.list_profiles(owner_type).await?;
        let mut records: BTreeMap<String, _> = self
            .generator
            .store()
            .scan(owner_type)?
            .into_iter()
            .map(|r| (r.owner_id.clone(), r))
            .collect();

        let mut skipped = 0usize;
        let mut pool = Vec::with_capacity(profiles.len());
        for profile in profiles {
            if !include_inactive && !profile.active {
                continue;
            }
            match records.remove(&profile.id) {
                Some(record) if self.generator.is_current(&record, &profile) => {
                    if let Some(vector) = record.vector {
                        pool.push(PoolMember { profile, vector });
                    }
                }
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::debug!(
                owner_type = %owner_type,
                skipped,
                "pool members without a current embedding left out"
            );
        }
        Ok(pool)
    }
}
