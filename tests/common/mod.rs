#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use talent_match::embedding::{EmbeddingOutput, EmbeddingUsage};
use talent_match::store::InMemoryProfiles;
use talent_match::{
    EmbeddingError, EmbeddingProvider, EngineConfig, MatchingEngine, OwnerType, Profile,
    ScoreResult, ScoringError, ScoringProvider,
};

/// Embeds a profile by looking up its title; unknown titles fail with 503.
pub struct TitleVectors {
    vectors: HashMap<String, Vec<f32>>,
    dimension: usize,
}

impl TitleVectors {
    pub fn new(dimension: usize, entries: &[(&str, Vec<f32>)]) -> Self {
        Self {
            vectors: entries
                .iter()
                .map(|(title, v)| (title.to_string(), v.clone()))
                .collect(),
            dimension,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for TitleVectors {
    async fn embed(&self, text: &str) -> Result<EmbeddingOutput, EmbeddingError> {
        let title = text
            .lines()
            .find_map(|l| l.strip_prefix("Title: "))
            .unwrap_or_default();
        let vector = self
            .vectors
            .get(title)
            .cloned()
            .ok_or_else(|| EmbeddingError::Status {
                status: 503,
                body: format!("no vector for '{title}'"),
            })?;
        Ok(EmbeddingOutput {
            vector,
            model: "title-vectors".into(),
            usage: EmbeddingUsage::default(),
        })
    }

    fn model_name(&self) -> &str {
        "title-vectors"
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }
}

/// Scores by the id of the non-query profile. Unknown ids fail.
/// Tracks how many evaluations are in flight at once.
pub struct FixedScores {
    scores: HashMap<String, f32>,
    delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub calls: AtomicUsize,
}

impl FixedScores {
    pub fn new(entries: &[(&str, f32)]) -> Self {
        Self {
            scores: entries.iter().map(|(id, s)| (id.to_string(), *s)).collect(),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ScoringProvider for FixedScores {
    async fn evaluate(
        &self,
        _query: &Profile,
        candidate: &Profile,
        _language: &str,
    ) -> Result<ScoreResult, ScoringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let ai_score = *self
            .scores
            .get(&candidate.id)
            .ok_or_else(|| ScoringError::Provider(format!("no score for {}", candidate.id)))?;
        Ok(ScoreResult {
            ai_score,
            skills_match: ai_score,
            experience_match: ai_score,
            location_match: ai_score,
            salary_match: ai_score,
            reasoning: format!("fixed score for {}", candidate.id),
        })
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

pub fn job(id: &str, title: &str) -> Profile {
    Profile::new(id, OwnerType::Job, title)
}

pub fn candidate(id: &str, title: &str) -> Profile {
    Profile::new(id, OwnerType::Candidate, title)
}

pub fn engine(
    config: EngineConfig,
    profiles: Vec<Profile>,
    embedder: TitleVectors,
    scorer: Arc<FixedScores>,
) -> (MatchingEngine, Arc<InMemoryProfiles>) {
    let source = Arc::new(InMemoryProfiles::with_profiles(profiles));
    let engine = MatchingEngine::builder(config)
        .profiles(source.clone())
        .embedding_provider(Arc::new(embedder))
        .scoring_provider(scorer)
        .build()
        .expect("engine builds");
    (engine, source)
}

pub async fn embed_everything(engine: &MatchingEngine) {
    engine
        .batch_generate(OwnerType::Job, None)
        .await
        .expect("job embeddings");
    engine
        .batch_generate(OwnerType::Candidate, None)
        .await
        .expect("candidate embeddings");
}
