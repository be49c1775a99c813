use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use store::{EmbeddingStore, OwnerType, ProfileSource};

use crate::{MatchError, MatchResult, ScoreCategory};

#[derive(Debug, Clone)]
struct HistoryEntry {
    recorded_at: DateTime<Utc>,
    processing_time_ms: u64,
    /// `(vector_similarity, ai_score, category)` per returned match.
    results: Vec<(f32, f32, ScoreCategory)>,
}

/// Bounded ring buffer of recent `find_best_matches` calls.
#[derive(Debug)]
pub struct MatchHistory {
    capacity: usize,
    entries: Mutex<VecDeque<HistoryEntry>>,
}

impl MatchHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(&self, results: &[MatchResult], processing_time_ms: u64) {
        let entry = HistoryEntry {
            recorded_at: Utc::now(),
            processing_time_ms,
            results: results
                .iter()
                .map(|r| (r.vector_similarity, r.ai_score(), r.score_category()))
                .collect(),
        };
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

/// Aggregate health and quality figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingStats {
    pub embedded_jobs: usize,
    pub embedded_candidates: usize,
    pub total_jobs: usize,
    pub total_candidates: usize,
    /// Mean vector similarity of recently returned matches.
    pub avg_similarity: f32,
    pub avg_ai_score: f32,
    pub last_generated_at: Option<DateTime<Utc>>,
    pub calls_per_minute: f32,
    pub matches_per_minute: f32,
    pub avg_processing_time_ms: f32,
    pub category_distribution: BTreeMap<String, usize>,
    pub computed_at: DateTime<Utc>,
}

/// Read-only stats over the profile source, the embedding store and
/// the match history, cached for `ttl`.
pub struct StatsCollector {
    profiles: Arc<dyn ProfileSource>,
    store: EmbeddingStore,
    history: Arc<MatchHistory>,
    ttl: Duration,
    expected_dimension: Option<usize>,
    cache: Mutex<Option<(Instant, MatchingStats)>>,
}

impl StatsCollector {
    pub fn new(
        profiles: Arc<dyn ProfileSource>,
        store: EmbeddingStore,
        history: Arc<MatchHistory>,
        ttl: Duration,
    ) -> Self {
        Self {
            profiles,
            store,
            history,
            ttl,
            expected_dimension: None,
            cache: Mutex::new(None),
        }
    }

    /// Only count vectors of this length as embedded.
    pub fn with_expected_dimension(mut self, dimension: Option<usize>) -> Self {
        self.expected_dimension = dimension;
        self
    }

    pub async fn get_matching_stats(&self) -> Result<MatchingStats, MatchError> {
        if let Some(cached) = self.cached() {
            return Ok(cached);
        }
        let stats = self.compute().await?;
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((Instant::now(), stats.clone()));
        Ok(stats)
    }

    fn cached(&self) -> Option<MatchingStats> {
        if self.ttl.is_zero() {
            return None;
        }
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache
            .as_ref()
            .filter(|(at, _)| at.elapsed() < self.ttl)
            .map(|(_, stats)| stats.clone())
    }

    async fn compute(&self) -> Result<MatchingStats, MatchError> {
        let mut last_generated_at: Option<DateTime<Utc>> = None;
        let mut coverage = [(0usize, 0usize); 2];

        for (slot, owner_type) in [OwnerType::Job, OwnerType::Candidate].into_iter().enumerate() {
            let profiles = self.profiles.list_profiles(owner_type).await?;
            let records: BTreeMap<String, _> = self
                .store
                .scan(owner_type)?
                .into_iter()
                .map(|r| (r.owner_id.clone(), r))
                .collect();

            let mut embedded = 0usize;
            for profile in &profiles {
                if let Some(record) = records.get(&profile.id) {
                    if record.is_current_for(profile, self.expected_dimension) {
                        embedded += 1;
                        last_generated_at = last_generated_at.max(Some(record.updated_at));
                    }
                }
            }
            coverage[slot] = (embedded, profiles.len());
        }

        let history = self.history.snapshot();
        let mut sim_sum = 0.0f64;
        let mut score_sum = 0.0f64;
        let mut matches = 0usize;
        let mut time_sum = 0u64;
        let mut categories: BTreeMap<String, usize> = [
            ScoreCategory::Excellent,
            ScoreCategory::Good,
            ScoreCategory::Average,
            ScoreCategory::Poor,
        ]
        .into_iter()
        .map(|c| (c.as_str().to_string(), 0))
        .collect();

        for entry in &history {
            time_sum += entry.processing_time_ms;
            for (sim, score, category) in &entry.results {
                sim_sum += f64::from(*sim);
                score_sum += f64::from(*score);
                matches += 1;
                *categories.entry(category.as_str().to_string()).or_default() += 1;
            }
        }

        let now = Utc::now();
        let window_minutes = history
            .first()
            .map(|oldest| (now - oldest.recorded_at).num_milliseconds() as f64 / 60_000.0)
            .unwrap_or(1.0)
            .max(1.0);
        let mean = |sum: f64, n: usize| if n == 0 { 0.0 } else { (sum / n as f64) as f32 };

        Ok(MatchingStats {
            embedded_jobs: coverage[0].0,
            total_jobs: coverage[0].1,
            embedded_candidates: coverage[1].0,
            total_candidates: coverage[1].1,
            avg_similarity: mean(sim_sum, matches),
            avg_ai_score: mean(score_sum, matches),
            last_generated_at,
            calls_per_minute: (history.len() as f64 / window_minutes) as f32,
            matches_per_minute: (matches as f64 / window_minutes) as f32,
            avg_processing_time_ms: mean(time_sum as f64, history.len()),
            category_distribution: categories,
            computed_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MatchCandidate, MatchType, ScoreResult};
    use store::{EmbeddingRecord, InMemoryProfiles, Profile};

    fn result(sim: f32, score: f32) -> MatchResult {
        MatchResult::new(
            "job-1",
            MatchType::JobToCandidate,
            MatchCandidate {
                owner_id: "c".into(),
                vector_similarity: sim,
            },
            ScoreResult {
                ai_score: score,
                skills_match: 0.0,
                experience_match: 0.0,
                location_match: 0.0,
                salary_match: 0.0,
                reasoning: String::new(),
            },
        )
    }

    #[test]
    fn history_is_bounded() {
        let history = MatchHistory::new(2);
        for ms in [10, 20, 30] {
            history.record(&[], ms);
        }
        assert_eq!(history.len(), 2);
        let times: Vec<_> = history.snapshot().iter().map(|e| e.processing_time_ms).collect();
        assert_eq!(times, vec![20, 30]);
    }

    #[tokio::test]
    async fn stats_count_only_current_embeddings() {
        let job = Profile::new("j-1", OwnerType::Job, "Chef");
        let stale = Profile::new("c-1", OwnerType::Candidate, "Cook");
        let fresh = Profile::new("c-2", OwnerType::Candidate, "Baker");
        let profiles = Arc::new(InMemoryProfiles::with_profiles([
            job.clone(),
            stale.clone(),
            fresh.clone(),
        ]));
        let store = EmbeddingStore::in_memory();
        let text = job.embedding_text();
        store
            .put(&EmbeddingRecord::new("j-1", OwnerType::Job, text, vec![1.0], "m"))
            .unwrap();
        store
            .put(&EmbeddingRecord::new("c-1", OwnerType::Candidate, "old text", vec![1.0], "m"))
            .unwrap();
        store
            .put(&EmbeddingRecord::new(
                "c-2",
                OwnerType::Candidate,
                fresh.embedding_text(),
                vec![1.0],
                "m",
            ))
            .unwrap();

        let history = Arc::new(MatchHistory::new(8));
        history.record(&[result(0.9, 95.0), result(0.7, 75.0)], 40);
        history.record(&[result(0.5, 55.0)], 20);

        let stats = StatsCollector::new(profiles, store, history, Duration::ZERO)
            .get_matching_stats()
            .await
            .unwrap();
        assert_eq!((stats.embedded_jobs, stats.total_jobs), (1, 1));
        assert_eq!((stats.embedded_candidates, stats.total_candidates), (1, 2));
        assert!((stats.avg_similarity - 0.7).abs() < 1e-5);
        assert!((stats.avg_ai_score - 75.0).abs() < 1e-4);
        assert_eq!(stats.avg_processing_time_ms, 30.0);
        assert_eq!(stats.category_distribution["excellent"], 1);
        assert_eq!(stats.category_distribution["average"], 1);
        assert_eq!(stats.category_distribution["poor"], 1);
        assert_eq!(stats.category_distribution["good"], 0);
        assert!(stats.last_generated_at.is_some());
        assert!(stats.calls_per_minute <= 2.0);
    }

    #[tokio::test]
    async fn stats_are_cached_within_ttl() {
        let profiles = Arc::new(InMemoryProfiles::new());
        let history = Arc::new(MatchHistory::new(8));
        let collector = StatsCollector::new(
            profiles,
            EmbeddingStore::in_memory(),
            history.clone(),
            Duration::from_secs(60),
        );
        let first = collector.get_matching_stats().await.unwrap();
        history.record(&[result(0.9, 95.0)], 10);
        let second = collector.get_matching_stats().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn empty_engine_reports_zeroes() {
        let stats = StatsCollector::new(
            Arc::new(InMemoryProfiles::new()),
            EmbeddingStore::in_memory(),
            Arc::new(MatchHistory::new(4)),
            Duration::ZERO,
        )
        .get_matching_stats()
        .await
        .unwrap();
        assert_eq!(stats.total_jobs, 0);
        assert_eq!(stats.avg_ai_score, 0.0);
        assert_eq!(stats.calls_per_minute, 0.0);
        assert!(stats.last_generated_at.is_none());
    }

    #[tokio::test]
    async fn vectors_of_another_dimension_do_not_count_as_embedded() {
        let job = Profile::new("j-1", OwnerType::Job, "Chef");
        let profiles = Arc::new(InMemoryProfiles::with_profiles([job.clone()]));
        let store = EmbeddingStore::in_memory();
        let text = job.embedding_text();
        store
            .put(&EmbeddingRecord::new("j-1", OwnerType::Job, text, vec![1.0; 3], "old"))
            .unwrap();

        let stats = StatsCollector::new(
            profiles,
            store,
            Arc::new(MatchHistory::new(4)),
            Duration::ZERO,
        )
        .with_expected_dimension(Some(16))
        .get_matching_stats()
        .await
        .unwrap();
        assert_eq!((stats.embedded_jobs, stats.total_jobs), (0, 1));
    }
}
