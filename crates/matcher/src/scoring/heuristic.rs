use std::collections::HashSet;

use async_trait::async_trait;
use store::{OwnerType, Profile};

use super::{ScoringError, ScoringProvider};
use crate::ScoreResult;

/// Facet weights, summing to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicWeights {
    pub skills: f32,
    pub experience: f32,
    pub location: f32,
    pub salary: f32,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self {
            skills: 0.45,
            experience: 0.25,
            location: 0.15,
            salary: 0.15,
        }
    }
}

/// Unknown facets score neutral.
const UNKNOWN: f32 = 50.0;

/// Rule-based scorer over skills, experience, location and salary.
///
/// Pairs are always read as (job, candidate) regardless of which side is
/// the query, so scoring is symmetric in direction.
#[derive(Debug, Clone, Default)]
pub struct HeuristicScoringProvider {
    weights: HeuristicWeights,
}

impl HeuristicScoringProvider {
    pub fn new(weights: HeuristicWeights) -> Self {
        Self { weights }
    }

    pub fn score_pair(&self, job: &Profile, candidate: &Profile) -> ScoreResult {
        let (skills, skills_note) = skills_facet(job, candidate);
        let (experience, experience_note) = experience_facet(job, candidate);
        let (location, location_note) = location_facet(job, candidate);
        let (salary, salary_note) = salary_facet(job, candidate);

        let w = self.weights;
        let total = skills * w.skills
            + experience * w.experience
            + location * w.location
            + salary * w.salary;

        ScoreResult {
            ai_score: round1(total.clamp(0.0, 100.0)),
            skills_match: round1(skills),
            experience_match: round1(experience),
            location_match: round1(location),
            salary_match: round1(salary),
            reasoning: format!("{skills_note}; {experience_note}; {location_note}; {salary_note}."),
        }
    }
}

fn round1(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}

fn skills_facet(job: &Profile, candidate: &Profile) -> (f32, String) {
    let required: Vec<String> = job
        .normalized_skills()
        .into_iter()
        .map(str::to_lowercase)
        .collect();
    if required.is_empty() {
        return (100.0, "no required skills listed".into());
    }
    let have: HashSet<String> = candidate
        .normalized_skills()
        .into_iter()
        .map(str::to_lowercase)
        .collect();
    let matched: Vec<&str> = required
        .iter()
        .filter(|s| have.contains(*s))
        .map(String::as_str)
        .collect();
    let score = matched.len() as f32 / required.len() as f32 * 100.0;
    let note = if matched.is_empty() {
        format!("skills 0/{} matched", required.len())
    } else {
        format!(
            "skills {}/{} matched ({})",
            matched.len(),
            required.len(),
            matched.join(", ")
        )
    };
    (score, note)
}

fn experience_facet(job: &Profile, candidate: &Profile) -> (f32, String) {
    match (job.experience_years, candidate.experience_years) {
        (None, _) => (100.0, "no experience requirement".into()),
        (Some(req), _) if req <= 0.0 => (100.0, "no experience requirement".into()),
        (Some(req), None) => (
            UNKNOWN,
            format!("{req} years required, candidate experience unknown"),
        ),
        (Some(req), Some(have)) if have >= req => {
            (100.0, format!("{have} years meets the {req} year requirement"))
        }
        (Some(req), Some(have)) => (
            (have.max(0.0) / req * 100.0).clamp(0.0, 100.0),
            format!("{have} of {req} required years"),
        ),
    }
}

fn location_facet(job: &Profile, candidate: &Profile) -> (f32, String) {
    if job.remote {
        return (100.0, "remote role".into());
    }
    let job_loc = job.location.as_deref().map(str::trim).filter(|l| !l.is_empty());
    let cand_loc = candidate
        .location
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty());
    match (job_loc, cand_loc) {
        (Some(j), Some(c)) if j.eq_ignore_ascii_case(c) => (100.0, format!("both in {j}")),
        (Some(j), Some(c)) => (0.0, format!("on-site in {j}, candidate in {c}")),
        _ => (UNKNOWN, "location unknown".into()),
    }
}

fn salary_facet(job: &Profile, candidate: &Profile) -> (f32, String) {
    let (Some(offer), Some(ask)) = (&job.salary, &candidate.salary) else {
        return (UNKNOWN, "salary unknown".into());
    };
    if !offer.currency.trim().eq_ignore_ascii_case(ask.currency.trim()) {
        return (
            UNKNOWN,
            format!("salary in {} vs {}", offer.currency, ask.currency),
        );
    }
    if ask.min <= offer.max {
        return (100.0, "salary expectations within band".into());
    }
    let gap = (ask.min - offer.max) as f32;
    let ratio = if offer.max == 0 { 1.0 } else { gap / offer.max as f32 };
    (
        ((1.0 - ratio * 2.0) * 100.0).clamp(0.0, 100.0),
        format!("candidate asks {} above band", ask.min - offer.max),
    )
}

#[async_trait]
impl ScoringProvider for HeuristicScoringProvider {
    async fn evaluate(
        &self,
        query: &Profile,
        candidate: &Profile,
        _language: &str,
    ) -> Result<ScoreResult, ScoringError> {
        let (job, cand) = match query.owner_type {
            OwnerType::Job => (query, candidate),
            OwnerType::Candidate => (candidate, query),
        };
        Ok(self.score_pair(job, cand))
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}
