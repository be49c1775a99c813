//! # Matching engine (`matcher`)
//!
//! ## Purpose
//!
//! `matcher` turns job and candidate profiles into ranked, explainable match
//! lists. It sits on top of `store` (profiles and persisted embeddings) and
//! `embedding` (vector providers) and runs matching in two stages:
//!
//! 1. **Vector search**: cosine similarity of the target's embedding against
//!    every active, currently-embedded profile of the opposite type, keeping
//!    the `vector_top_k` best above `min_vector_similarity`.
//! 2. **Scoring**: each survivor is evaluated by a [`ScoringProvider`]; those
//!    below `min_ai_score` are dropped and the rest are ranked by AI score
//!    and capped to `ai_top_k`.
//!
//! ## Core Types
//!
//! - [`EmbeddingGenerator`]: builds embedding text, calls the provider and
//!   persists records, serialising regeneration per owner.
//! - [`GenerationQueue`]: runs `batch_generate` jobs on a worker task and
//!   hands back a [`JobHandle`].
//! - [`VectorSearchEngine`]: stage 1.
//! - [`ScoringEngine`]: stage 2, with [`HeuristicScoringProvider`] and
//!   [`ApiScoringProvider`] implementations.
//! - [`MatchingOrchestrator`]: the single-target pipeline.
//! - [`BatchCoordinator`]: many targets under a concurrency cap, with
//!   per-target outcomes and optional cancellation.
//! - [`StatsCollector`]: coverage, quality and throughput figures.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use embedding::StubEmbeddingProvider;
//! use matcher::{
//!     EmbeddingGenerator, HeuristicScoringProvider, MatchHistory, MatchParams,
//!     MatchingOrchestrator, MissingEmbeddingPolicy, ScoringEngine, TargetRef,
//! };
//! use store::{EmbeddingStore, InMemoryProfiles, OwnerType, Profile};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let profiles = Arc::new(InMemoryProfiles::with_profiles([
//!     Profile::new("job-1", OwnerType::Job, "Rust Engineer").with_skills(["Rust"]),
//!     Profile::new("cand-1", OwnerType::Candidate, "Rust Engineer").with_skills(["Rust"]),
//! ]));
//! let generator = Arc::new(EmbeddingGenerator::new(
//!     profiles.clone(),
//!     EmbeddingStore::in_memory(),
//!     Arc::new(StubEmbeddingProvider::new("stub", 64, true)),
//!     Duration::from_secs(5),
//! ));
//! generator.batch_generate(OwnerType::Job, 16).await.unwrap();
//! generator.batch_generate(OwnerType::Candidate, 16).await.unwrap();
//!
//! let orchestrator = MatchingOrchestrator::new(
//!     profiles,
//!     generator,
//!     ScoringEngine::new(
//!         Arc::new(HeuristicScoringProvider::default()),
//!         Duration::from_secs(5),
//!         4,
//!     ),
//!     MissingEmbeddingPolicy::Fail,
//!     Arc::new(MatchHistory::new(64)),
//! );
//! let matches = orchestrator
//!     .find_best_matches(&TargetRef::job("job-1"), &MatchParams::default())
//!     .await
//!     .unwrap();
//! assert_eq!(matches[0].target_id, "cand-1");
//! # });
//! ```

mod batch;
mod error;
mod generation;
mod jobs;
mod orchestrator;
pub mod scoring;
mod similarity;
mod stats;
mod types;

pub use crate::batch::{
    BatchCoordinator, BatchPartialFailure, BatchRequest, BatchResult, CancelToken, TargetOutcome,
};
pub use crate::error::MatchError;
pub use crate::generation::{BatchGenerateReport, EmbeddingGenerator};
pub use crate::jobs::{GenerationQueue, JobHandle, JobStatus};
pub use crate::orchestrator::{MatchingOrchestrator, MissingEmbeddingPolicy};
pub use crate::scoring::{
    scoring_provider_from_config, ApiScoringProvider, HeuristicScoringProvider, HeuristicWeights,
    ScoredCandidate, ScoringApiKind, ScoringConfig, ScoringEngine, ScoringError, ScoringMode,
    ScoringOutcome, ScoringProvider,
};
pub use crate::similarity::{cosine_similarity, PoolEntry, VectorSearchEngine};
pub use crate::stats::{MatchHistory, MatchingStats, StatsCollector};
pub use crate::types::{
    MatchCandidate, MatchParams, MatchResult, MatchType, ScoreCategory, ScoreResult, TargetRef,
    VectorSearchOptions,
};
