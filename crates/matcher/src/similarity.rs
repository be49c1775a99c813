//! Stage 1: cosine similarity over the full candidate pool.

use std::cmp::Ordering;

use crate::MatchCandidate;

/// Cosine similarity of two equal-length vectors.
///
/// Returns `None` when the lengths differ. A zero-norm side yields `0.0`,
/// and non-finite intermediate results collapse to `0.0` as well.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return Some(0.0);
    }
    let sim = dot / (norm_a.sqrt() * norm_b.sqrt());
    if sim.is_finite() {
        Some(sim.clamp(-1.0, 1.0) as f32)
    } else {
        Some(0.0)
    }
}

/// A pool member handed to the search.
#[derive(Debug, Clone, Copy)]
pub struct PoolEntry<'a> {
    pub owner_id: &'a str,
    pub vector: &'a [f32],
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VectorSearchEngine;

impl VectorSearchEngine {
    pub fn new() -> Self {
        Self
    }

    /// Top-`top_k` pool entries with similarity `>= min_similarity`, best first.
    ///
    /// Equal similarities are ordered by owner id ascending. Entries whose
    /// vector length differs from the query are left out.
    pub fn search(
        &self,
        query: &[f32],
        pool: &[PoolEntry<'_>],
        top_k: usize,
        min_similarity: f32,
    ) -> Vec<MatchCandidate> {
        if top_k == 0 || query.is_empty() {
            return Vec::new();
        }

        let mut mismatched = 0usize;
        let mut hits: Vec<(&str, f32)> = Vec::with_capacity(pool.len());
        for entry in pool {
            match cosine_similarity(query, entry.vector) {
                Some(sim) if sim >= min_similarity => hits.push((entry.owner_id, sim)),
                Some(_) => {}
                None => {
                    mismatched += 1;
                    tracing::debug!(
                        owner_id = entry.owner_id,
                        expected = query.len(),
                        actual = entry.vector.len(),
                        "excluding pool entry with mismatched dimensions"
                    );
                }
            }
        }

        hits.sort_by(|a, b| match b.1.total_cmp(&a.1) {
            Ordering::Equal => a.0.cmp(b.0),
            other => other,
        });
        hits.truncate(top_k);

        tracing::debug!(
            pool = pool.len(),
            mismatched,
            survivors = hits.len(),
            "vector search complete"
        );

        hits.into_iter()
            .map(|(owner_id, vector_similarity)| MatchCandidate {
                owner_id: owner_id.to_string(),
                vector_similarity,
            })
            .collect()
    }
}
