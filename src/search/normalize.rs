//! Score normalization and fusion.
//!
//! Keyword scores are unbounded and vector scores are bounded similarities;
//! everything here maps them onto a common 0-1 scale and merges ranked lists.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default steepness of [`sigmoid_normalize`]
pub const DEFAULT_SIGMOID_STEEPNESS: f64 = 5.0;

/// Default smoothing constant of reciprocal-rank fusion
pub const DEFAULT_RRF_K: f64 = 60.0;

/// A tool id with a score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredId {
    /// Tool id
    pub id: String,
    /// Score, higher is more relevant
    pub score: f64,
}

impl ScoredId {
    /// Creates a scored id
    pub fn new(id: impl Into<String>, score: f64) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// Relative weights of keyword and vector scores in hybrid search.
///
/// The weights need not sum to 1; fused scores are divided by their sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    /// Weight of the keyword score
    pub keyword: f64,
    /// Weight of the vector score
    pub vector: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            keyword: 0.5,
            vector: 0.5,
        }
    }
}

/// How hybrid search merges its two result lists
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FusionStrategy {
    /// Weighted average of normalized scores, missing modes count as 0
    WeightedSum,
    /// Reciprocal-rank fusion, rescaled so the top result is 1.0
    ReciprocalRank {
        /// Smoothing constant
        #[serde(default = "default_rrf_k")]
        k: f64,
    },
}

impl Default for FusionStrategy {
    fn default() -> Self {
        FusionStrategy::WeightedSum
    }
}

fn default_rrf_k() -> f64 {
    DEFAULT_RRF_K
}

/// Maps raw scores linearly onto [0, 1] using the list's own min and max.
///
/// A single score, or a list of equal scores, maps to 1.0 everywhere.
pub fn min_max_normalize(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }

    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    if range <= f64::EPSILON || !range.is_finite() {
        return vec![1.0; scores.len()];
    }

    scores.iter().map(|score| (score - min) / range).collect()
}

/// Squashes an unbounded score into (0, 1) with `1 / (1 + e^(-score/k))`
pub fn sigmoid_normalize(score: f64, steepness: f64) -> f64 {
    1.0 / (1.0 + (-score / steepness).exp())
}

/// Rescales a cosine similarity in [-1, 1] onto [0, 1]
pub fn similarity_to_unit(similarity: f64) -> f64 {
    (similarity + 1.0) / 2.0
}

/// Clamps a nominally normalized score into [0, 1]
pub fn clamp_unit(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Weighted average of a keyword and a vector score.
///
/// A mode the tool did not appear in contributes 0.
pub fn weighted_score(keyword: Option<f64>, vector: Option<f64>, weights: FusionWeights) -> f64 {
    let total = weights.keyword + weights.vector;
    if total <= 0.0 {
        return 0.0;
    }

    let combined =
        keyword.unwrap_or(0.0) * weights.keyword + vector.unwrap_or(0.0) * weights.vector;
    combined / total
}

/// Sum of `1 / (k + rank)` over the lists a tool appears in (ranks are 1-based)
pub fn reciprocal_rank_score(ranks: &[Option<usize>], k: f64) -> f64 {
    ranks
        .iter()
        .flatten()
        .map(|rank| 1.0 / (k + *rank as f64))
        .sum()
}

/// Merges keyword and vector results into one list sorted by fused score.
///
/// The union keeps first-appearance order (keyword list first) for ties.
pub fn merge_and_rank(
    keyword: &[ScoredId],
    vector: &[ScoredId],
    strategy: FusionStrategy,
    weights: FusionWeights,
) -> Vec<ScoredId> {
    let mut order: Vec<&str> = Vec::with_capacity(keyword.len() + vector.len());
    let mut keyword_hits: HashMap<&str, (usize, f64)> = HashMap::new();
    let mut vector_hits: HashMap<&str, (usize, f64)> = HashMap::new();

    for (rank, hit) in keyword.iter().enumerate() {
        if keyword_hits.contains_key(hit.id.as_str()) {
            continue;
        }
        keyword_hits.insert(&hit.id, (rank + 1, hit.score));
        order.push(&hit.id);
    }
    for (rank, hit) in vector.iter().enumerate() {
        if vector_hits.contains_key(hit.id.as_str()) {
            continue;
        }
        vector_hits.insert(&hit.id, (rank + 1, hit.score));
        if !keyword_hits.contains_key(hit.id.as_str()) {
            order.push(&hit.id);
        }
    }

    let mut fused: Vec<ScoredId> = order
        .into_iter()
        .map(|id| {
            let kw = keyword_hits.get(id);
            let vec = vector_hits.get(id);
            let score = match strategy {
                FusionStrategy::WeightedSum => {
                    weighted_score(kw.map(|hit| hit.1), vec.map(|hit| hit.1), weights)
                }
                FusionStrategy::ReciprocalRank { k } => {
                    reciprocal_rank_score(&[kw.map(|hit| hit.0), vec.map(|hit| hit.0)], k)
                }
            };
            ScoredId::new(id, score)
        })
        .collect();

    if let FusionStrategy::ReciprocalRank { .. } = strategy {
        rescale_to_max(&mut fused);
    }

    sort_descending(&mut fused);
    fused
}

/// Divides every score by the maximum so the top score is exactly 1.0
pub fn rescale_to_max(results: &mut [ScoredId]) {
    let max = results
        .iter()
        .map(|hit| hit.score)
        .fold(f64::NEG_INFINITY, f64::max);

    if max > 0.0 && max.is_finite() {
        for hit in results.iter_mut() {
            hit.score /= max;
        }
    }
}

/// Stable sort by descending score
pub fn sort_descending(results: &mut [ScoredId]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
