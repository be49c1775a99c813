//! Workspace umbrella crate for the talent matching engine.
//!
//! This crate wires the `embedding`, `store` and `matcher` crates into a
//! single [`MatchingEngine`] configured from an [`EngineConfig`], exposing
//! the operations a serving layer needs: embedding generation (inline or
//! queued), single-target and batch matching, vector-only search and stats.
//!
//! ```
//! use std::sync::Arc;
//! use talent_match::{EngineConfig, MatchingEngine, OwnerType, Profile, TargetRef};
//! use talent_match::store::InMemoryProfiles;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let profiles = Arc::new(InMemoryProfiles::with_profiles([
//!     Profile::new("job-1", OwnerType::Job, "Data Engineer").with_skills(["Python", "Spark"]),
//!     Profile::new("cand-1", OwnerType::Candidate, "Data Engineer")
//!         .with_skills(["Spark", "Python"]),
//! ]));
//!
//! let engine = MatchingEngine::builder(EngineConfig::default())
//!     .profiles(profiles)
//!     .build()
//!     .unwrap();
//! engine.batch_generate(OwnerType::Job, None).await.unwrap();
//! engine.batch_generate(OwnerType::Candidate, None).await.unwrap();
//!
//! let matches = engine.find_best_matches(&TargetRef::job("job-1"), None).await.unwrap();
//! assert_eq!(matches[0].target_id, "cand-1");
//! # });
//! ```

pub mod config;
mod logging;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

pub use embedding;
pub use matcher;
pub use store;

pub use crate::config::{ConfigError, EngineConfig, LogFormat, LoggingConfig, MatchingConfig};
pub use crate::logging::init_tracing;
pub use embedding::{EmbeddingError, EmbeddingProvider};
pub use matcher::{
    BatchGenerateReport, BatchPartialFailure, BatchRequest, BatchResult, CancelToken, JobHandle,
    JobStatus, MatchCandidate, MatchError, MatchParams, MatchResult, MatchType, MatchingStats,
    MissingEmbeddingPolicy, ScoreCategory, ScoreResult, ScoringError, ScoringProvider, TargetRef,
    VectorSearchOptions,
};
pub use store::{
    BackendConfig, EmbeddingRecord, EmbeddingStore, OwnerType, Profile, ProfileSource, StoreError,
};

use matcher::{
    BatchCoordinator, EmbeddingGenerator, GenerationQueue, MatchHistory, MatchingOrchestrator,
    ScoringEngine, StatsCollector,
};

/// Errors raised while assembling or initialising the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("embedding provider: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("scoring provider: {0}")]
    Scoring(#[from] ScoringError),

    #[error("embedding store: {0}")]
    Store(#[from] StoreError),

    #[error("a profile source is required")]
    MissingProfileSource,

    #[error("the engine must be built inside a tokio runtime")]
    NoRuntime,

    #[error("logging: {0}")]
    Logging(String),
}

/// Assembles a [`MatchingEngine`]. Anything not supplied explicitly is
/// built from the configuration.
pub struct MatchingEngineBuilder {
    config: EngineConfig,
    profiles: Option<Arc<dyn ProfileSource>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    scoring_provider: Option<Arc<dyn ScoringProvider>>,
    store: Option<EmbeddingStore>,
}

impl MatchingEngineBuilder {
    /// The external record store. Required.
    pub fn profiles(mut self, profiles: Arc<dyn ProfileSource>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    pub fn scoring_provider(mut self, provider: Arc<dyn ScoringProvider>) -> Self {
        self.scoring_provider = Some(provider);
        self
    }

    pub fn store(mut self, store: EmbeddingStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<MatchingEngine, EngineError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(EngineError::NoRuntime);
        }
        let config = self.config;
        config.validate()?;

        let profiles = self.profiles.ok_or(EngineError::MissingProfileSource)?;
        let embedding_provider = match self.embedding_provider {
            Some(provider) => provider,
            None => embedding::provider_from_config(&config.embedding)?,
        };
        let scoring_provider = match self.scoring_provider {
            Some(provider) => provider,
            None => matcher::scoring_provider_from_config(&config.scoring)?,
        };
        let store = match self.store {
            Some(store) => store,
            None => EmbeddingStore::from_config(&config.store)?,
        };

        let m = &config.matching;
        let generator = Arc::new(EmbeddingGenerator::new(
            Arc::clone(&profiles),
            store.clone(),
            embedding_provider,
            Duration::from_secs(m.embedding_timeout_secs),
        ));
        let history = Arc::new(MatchHistory::new(m.history_capacity));
        let scoring = ScoringEngine::new(
            scoring_provider,
            Duration::from_secs(config.scoring.timeout_secs),
            config.scoring.concurrency,
        );
        let orchestrator = Arc::new(MatchingOrchestrator::new(
            Arc::clone(&profiles),
            Arc::clone(&generator),
            scoring,
            m.on_missing_embedding,
            Arc::clone(&history),
        ));
        let stats = StatsCollector::new(
            Arc::clone(&profiles),
            store,
            history,
            Duration::from_secs(m.stats_ttl_secs),
        )
        .with_expected_dimension(generator.provider_dimension());
        let queue = GenerationQueue::start(
            Arc::clone(&generator),
            m.queue_capacity,
            m.finished_jobs_retained,
        );

        tracing::info!(
            embedding_mode = ?config.embedding.mode,
            scoring_mode = ?config.scoring.mode,
            on_missing_embedding = ?m.on_missing_embedding,
            "matching engine ready"
        );

        Ok(MatchingEngine {
            batch: BatchCoordinator::new(Arc::clone(&orchestrator)),
            config,
            generator,
            orchestrator,
            queue,
            stats,
        })
    }
}

/// Serving-layer entry point over the matching pipeline.
pub struct MatchingEngine {
    config: EngineConfig,
    generator: Arc<EmbeddingGenerator>,
    orchestrator: Arc<MatchingOrchestrator>,
    batch: BatchCoordinator,
    queue: GenerationQueue,
    stats: StatsCollector,
}

impl MatchingEngine {
    pub fn builder(config: EngineConfig) -> MatchingEngineBuilder {
        MatchingEngineBuilder {
            config,
            profiles: None,
            embedding_provider: None,
            scoring_provider: None,
            store: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Generate or refresh the embedding of one profile.
    pub async fn generate_embedding(
        &self,
        owner_type: OwnerType,
        owner_id: &str,
    ) -> Result<EmbeddingRecord, MatchError> {
        self.generator.generate_embedding(owner_type, owner_id).await
    }

    /// Embed every profile of `owner_type` lacking a current embedding.
    /// `None` uses `matching.default_batch_size`.
    pub async fn batch_generate(
        &self,
        owner_type: OwnerType,
        batch_size: Option<usize>,
    ) -> Result<BatchGenerateReport, MatchError> {
        let size = batch_size.unwrap_or(self.config.matching.default_batch_size);
        self.generator.batch_generate(owner_type, size).await
    }

    /// Queue a [`batch_generate`](Self::batch_generate) on the background worker.
    pub async fn submit_batch_generate(
        &self,
        owner_type: OwnerType,
        batch_size: Option<usize>,
    ) -> Result<JobHandle, MatchError> {
        let size = batch_size.unwrap_or(self.config.matching.default_batch_size);
        self.queue.submit(owner_type, size).await
    }

    pub fn job_status(&self, job_id: Uuid) -> Option<JobStatus> {
        self.queue.status(job_id)
    }

    pub fn get_embedding(
        &self,
        owner_type: OwnerType,
        owner_id: &str,
    ) -> Result<Option<EmbeddingRecord>, MatchError> {
        self.generator.get_embedding(owner_type, owner_id)
    }

    /// `None` uses `matching.default_params`.
    pub async fn find_best_matches(
        &self,
        target: &TargetRef,
        params: Option<&MatchParams>,
    ) -> Result<Vec<MatchResult>, MatchError> {
        let params = params.unwrap_or(&self.config.matching.default_params);
        self.orchestrator.find_best_matches(target, params).await
    }

    /// `None` uses `matching.default_max_concurrent`.
    pub async fn batch_match(
        &self,
        targets: Vec<TargetRef>,
        params: Option<MatchParams>,
        max_concurrent: Option<usize>,
    ) -> BatchResult {
        self.batch_match_with_cancel(targets, params, max_concurrent, &CancelToken::new())
            .await
    }

    pub async fn batch_match_with_cancel(
        &self,
        targets: Vec<TargetRef>,
        params: Option<MatchParams>,
        max_concurrent: Option<usize>,
        cancel: &CancelToken,
    ) -> BatchResult {
        let request = BatchRequest {
            targets,
            params: params.unwrap_or_else(|| self.config.matching.default_params.clone()),
            max_concurrent: max_concurrent.unwrap_or(self.config.matching.default_max_concurrent),
        };
        self.batch.batch_match_with_cancel(request, cancel).await
    }

    pub async fn vector_search(
        &self,
        target: &TargetRef,
        options: &VectorSearchOptions,
    ) -> Result<Vec<MatchCandidate>, MatchError> {
        self.orchestrator.vector_search(target, options).await
    }

    pub async fn get_matching_stats(&self) -> Result<MatchingStats, MatchError> {
        self.stats.get_matching_stats().await
    }
}
