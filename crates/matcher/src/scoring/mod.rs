//! Stage 2: re-rank vector-search survivors with a scoring provider.
//!
//! Scoring runs per candidate with its own timeout; each outcome is
//! collected as `Ok | Err` and failures are logged and removed without
//! affecting the other candidates.

mod api;
mod config;
mod heuristic;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use store::Profile;
use thiserror::Error;

use crate::{MatchCandidate, ScoreResult};

pub use api::ApiScoringProvider;
pub use config::{ScoringApiKind, ScoringConfig, ScoringMode};
pub use heuristic::{HeuristicScoringProvider, HeuristicWeights};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScoringError {
    #[error("scoring provider failed: {0}")]
    Provider(String),
    #[error("scoring timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed scoring response: {0}")]
    Malformed(String),
    #[error("invalid scoring config: {0}")]
    InvalidConfig(String),
}

impl From<reqwest::Error> for ScoringError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ScoringError::Malformed(err.to_string())
        } else {
            ScoringError::Provider(err.to_string())
        }
    }
}

/// Evaluates how well `candidate` fits `query`.
#[async_trait]
pub trait ScoringProvider: Send + Sync {
    async fn evaluate(
        &self,
        query: &Profile,
        candidate: &Profile,
        language: &str,
    ) -> Result<ScoreResult, ScoringError>;

    fn name(&self) -> &str;
}

/// Build the provider described by `cfg`.
pub fn scoring_provider_from_config(
    cfg: &ScoringConfig,
) -> Result<Arc<dyn ScoringProvider>, ScoringError> {
    cfg.validate()?;
    match cfg.mode {
        ScoringMode::Heuristic => Ok(Arc::new(HeuristicScoringProvider::default())),
        ScoringMode::Api => Ok(Arc::new(ApiScoringProvider::new(cfg.clone())?)),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: MatchCandidate,
    pub score: ScoreResult,
}

/// Per-candidate outcomes of one scoring pass, in input order.
#[derive(Debug, Clone, Default)]
pub struct ScoringOutcome {
    pub scored: Vec<ScoredCandidate>,
    pub failures: Vec<(String, ScoringError)>,
}

#[derive(Clone)]
pub struct ScoringEngine {
    provider: Arc<dyn ScoringProvider>,
    timeout: Duration,
    concurrency: usize,
}

impl ScoringEngine {
    pub fn new(provider: Arc<dyn ScoringProvider>, timeout: Duration, concurrency: usize) -> Self {
        Self {
            provider,
            timeout,
            concurrency: concurrency.max(1),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Score one pair, enforcing the timeout and validating the result.
    pub async fn score(
        &self,
        query: &Profile,
        candidate: &Profile,
        language: &str,
    ) -> Result<ScoreResult, ScoringError> {
        let result = tokio::time::timeout(
            self.timeout,
            self.provider.evaluate(query, candidate, language),
        )
        .await
        .map_err(|_| ScoringError::Timeout(self.timeout))??;
        result.validate().map_err(ScoringError::Malformed)?;
        Ok(result)
    }

    /// Score every candidate, at most `concurrency` calls in flight.
    pub async fn score_all(
        &self,
        query: &Profile,
        candidates: Vec<(MatchCandidate, Profile)>,
        language: &str,
    ) -> ScoringOutcome {
        let mut collected: Vec<(usize, MatchCandidate, Result<ScoreResult, ScoringError>)> =
            stream::iter(candidates.into_iter().enumerate())
                .map(|(idx, (candidate, profile))| async move {
                    let result = self.score(query, &profile, language).await;
                    (idx, candidate, result)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
        collected.sort_by_key(|(idx, _, _)| *idx);

        let mut outcome = ScoringOutcome::default();
        for (_, candidate, result) in collected {
            match result {
                Ok(score) => outcome.scored.push(ScoredCandidate { candidate, score }),
                Err(err) => {
                    tracing::warn!(
                        source_id = %query.id,
                        candidate_id = %candidate.owner_id,
                        provider = self.provider.name(),
                        error = %err,
                        "scoring failed, candidate dropped"
                    );
                    outcome.failures.push((candidate.owner_id, err));
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use store::OwnerType;

    struct ScriptedProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ScoringProvider for ScriptedProvider {
        async fn evaluate(
            &self,
            _query: &Profile,
            candidate: &Profile,
            _language: &str,
        ) -> Result<ScoreResult, ScoringError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let ai_score = match candidate.id.as_str() {
                "fail" => return Err(ScoringError::Provider("upstream 500".into())),
                "slow" => {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    90.0
                }
                "bogus" => 250.0,
                _ => 75.0,
            };
            Ok(ScoreResult {
                ai_score,
                skills_match: 50.0,
                experience_match: 50.0,
                location_match: 50.0,
                salary_match: 50.0,
                reasoning: String::new(),
            })
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn pair(id: &str) -> (MatchCandidate, Profile) {
        (
            MatchCandidate {
                owner_id: id.into(),
                vector_similarity: 0.9,
            },
            Profile::new(id, OwnerType::Candidate, "Engineer"),
        )
    }

    #[tokio::test]
    async fn failures_are_dropped_without_aborting_others() {
        let provider = Arc::new(ScriptedProvider {
            calls: AtomicUsize::new(0),
        });
        let engine = ScoringEngine::new(provider.clone(), Duration::from_millis(50), 2);
        let query = Profile::new("job-1", OwnerType::Job, "Engineer");

        let outcome = engine
            .score_all(
                &query,
                vec![pair("ok-1"), pair("fail"), pair("slow"), pair("bogus"), pair("ok-2")],
                "en",
            )
            .await;

        let ids: Vec<_> = outcome
            .scored
            .iter()
            .map(|s| s.candidate.owner_id.as_str())
            .collect();
        assert_eq!(ids, vec!["ok-1", "ok-2"]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 5);

        let failed: Vec<_> = outcome.failures.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(failed, vec!["fail", "slow", "bogus"]);
        assert!(matches!(outcome.failures[1].1, ScoringError::Timeout(_)));
        assert!(matches!(outcome.failures[2].1, ScoringError::Malformed(_)));
    }

    #[tokio::test]
    async fn empty_input_scores_nothing() {
        let engine = ScoringEngine::new(
            Arc::new(HeuristicScoringProvider::default()),
            Duration::from_secs(1),
            4,
        );
        let query = Profile::new("job-1", OwnerType::Job, "Engineer");
        let outcome = engine.score_all(&query, Vec::new(), "en").await;
        assert!(outcome.scored.is_empty());
        assert!(outcome.failures.is_empty());
    }
}
