use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use store::OwnerType;

use crate::MatchError;

/// Identifies a single job or candidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRef {
    pub owner_type: OwnerType,
    pub owner_id: String,
}

impl TargetRef {
    pub fn new(owner_type: OwnerType, owner_id: impl Into<String>) -> Self {
        Self {
            owner_type,
            owner_id: owner_id.into(),
        }
    }

    pub fn job(owner_id: impl Into<String>) -> Self {
        Self::new(OwnerType::Job, owner_id)
    }

    pub fn candidate(owner_id: impl Into<String>) -> Self {
        Self::new(OwnerType::Candidate, owner_id)
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner_type, self.owner_id)
    }
}

/// Stage-1 survivor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCandidate {
    pub owner_id: String,
    pub vector_similarity: f32,
}

/// Coarse bucket derived from the AI score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreCategory {
    Excellent,
    Good,
    Average,
    Poor,
}

impl ScoreCategory {
    pub fn from_score(ai_score: f32) -> Self {
        if ai_score >= 90.0 {
            ScoreCategory::Excellent
        } else if ai_score >= 80.0 {
            ScoreCategory::Good
        } else if ai_score >= 70.0 {
            ScoreCategory::Average
        } else {
            ScoreCategory::Poor
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScoreCategory::Excellent => "excellent",
            ScoreCategory::Good => "good",
            ScoreCategory::Average => "average",
            ScoreCategory::Poor => "poor",
        }
    }
}

/// Structured output of a scoring provider. Every number is on a 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    #[serde(alias = "ai_score", alias = "score")]
    pub ai_score: f32,
    #[serde(alias = "skills_match")]
    pub skills_match: f32,
    #[serde(alias = "experience_match")]
    pub experience_match: f32,
    #[serde(alias = "location_match")]
    pub location_match: f32,
    #[serde(alias = "salary_match")]
    pub salary_match: f32,
    #[serde(default)]
    pub reasoning: String,
}

impl ScoreResult {
    /// Reject non-finite or out-of-range numbers.
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("aiScore", self.ai_score),
            ("skillsMatch", self.skills_match),
            ("experienceMatch", self.experience_match),
            ("locationMatch", self.location_match),
            ("salaryMatch", self.salary_match),
        ];
        for (name, value) in fields {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(format!("{name} must be within 0-100, got {value}"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    JobToCandidate,
    CandidateToJob,
}

impl MatchType {
    pub fn for_source(source: OwnerType) -> Self {
        match source {
            OwnerType::Job => MatchType::JobToCandidate,
            OwnerType::Candidate => MatchType::CandidateToJob,
        }
    }
}

/// The five per-request tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchParams {
    /// Survivors kept from vector search and sent to scoring.
    pub vector_top_k: usize,
    /// Maximum results returned after scoring.
    pub ai_top_k: usize,
    pub min_vector_similarity: f32,
    pub min_ai_score: f32,
    /// Language for the scoring rationale.
    pub language: String,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            vector_top_k: 20,
            ai_top_k: 10,
            min_vector_similarity: 0.3,
            min_ai_score: 50.0,
            language: "en".into(),
        }
    }
}

impl MatchParams {
    pub fn validate(&self) -> Result<(), MatchError> {
        if self.vector_top_k == 0 {
            return Err(MatchError::InvalidParams(
                "vector_top_k must be greater than zero".into(),
            ));
        }
        if self.ai_top_k == 0 {
            return Err(MatchError::InvalidParams(
                "ai_top_k must be greater than zero".into(),
            ));
        }
        let similarity = self.min_vector_similarity;
        if !similarity.is_finite() || !(-1.0..=1.0).contains(&similarity) {
            return Err(MatchError::InvalidParams(
                "min_vector_similarity must be within -1.0..=1.0".into(),
            ));
        }
        if !self.min_ai_score.is_finite() || !(0.0..=100.0).contains(&self.min_ai_score) {
            return Err(MatchError::InvalidParams(
                "min_ai_score must be within 0..=100".into(),
            ));
        }
        if self.language.trim().is_empty() {
            return Err(MatchError::InvalidParams("language must not be empty".into()));
        }
        Ok(())
    }
}

/// Options for the stage-1-only search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorSearchOptions {
    pub min_similarity: f32,
    pub limit: usize,
    pub include_inactive: bool,
}

impl Default for VectorSearchOptions {
    fn default() -> Self {
        Self {
            min_similarity: 0.3,
            limit: 20,
            include_inactive: false,
        }
    }
}

/// A ranked, scored match returned to callers.
///
/// `score_category` is derived from `ai_score` at construction and both are
/// read-only, so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub source_id: String,
    pub target_id: String,
    pub match_type: MatchType,
    pub vector_similarity: f32,
    ai_score: f32,
    score_category: ScoreCategory,
    pub skills_match: f32,
    pub experience_match: f32,
    pub location_match: f32,
    pub salary_match: f32,
    pub reasoning: String,
    pub processing_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl MatchResult {
    pub fn new(
        source_id: impl Into<String>,
        match_type: MatchType,
        candidate: MatchCandidate,
        score: ScoreResult,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: candidate.owner_id,
            match_type,
            vector_similarity: candidate.vector_similarity,
            ai_score: score.ai_score,
            score_category: ScoreCategory::from_score(score.ai_score),
            skills_match: score.skills_match,
            experience_match: score.experience_match,
            location_match: score.location_match,
            salary_match: score.salary_match,
            reasoning: score.reasoning,
            processing_time_ms: 0,
            created_at: Utc::now(),
        }
    }

    pub fn ai_score(&self) -> f32 {
        self.ai_score
    }

    pub fn score_category(&self) -> ScoreCategory {
        self.score_category
    }
}
