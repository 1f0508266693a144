//! Weighted score fusion of dense and lexical results
//!
//! Lexical (BM25) scores are unbounded and dense (cosine) scores live in
//! `[-1, 1]`, so both are brought onto `[0, 1]` before the weighted sum:
//! lexical by min-max over the batch, dense by clipping.

use super::provenance::{ScoreBreakdown, ScoreOrigin, ScoredPassage};
use ahash::AHashMap;
use std::sync::Arc;
use thiserror::Error;

/// Tolerance for the weight-sum check
const WEIGHT_SUM_TOLERANCE: f32 = 1e-6;

#[derive(Error, Debug, PartialEq)]
pub enum FusionError {
    #[error("Fusion weight out of range [0, 1]: {0}")]
    OutOfRange(f32),

    #[error("Fusion weights must sum to 1, got {0}")]
    InvalidSum(f32),
}

/// Relative contribution of the dense and lexical signals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeight {
    dense: f32,
    lexical: f32,
}

impl FusionWeight {
    /// Both weights must lie in `[0, 1]` and sum to 1
    pub fn new(dense: f32, lexical: f32) -> Result<Self, FusionError> {
        for w in [dense, lexical] {
            if !(0.0..=1.0).contains(&w) {
                return Err(FusionError::OutOfRange(w));
            }
        }

        let sum = dense + lexical;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(FusionError::InvalidSum(sum));
        }

        Ok(Self { dense, lexical })
    }

    pub fn dense(&self) -> f32 {
        self.dense
    }

    pub fn lexical(&self) -> f32 {
        self.lexical
    }
}

impl Default for FusionWeight {
    fn default() -> Self {
        Self {
            dense: 0.5,
            lexical: 0.5,
        }
    }
}

/// Min-max normalize scores onto `[0, 1]`. If every score is equal, all map
/// to 0.
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;

    scores
        .iter()
        .map(|&s| if range > 0.0 { (s - min) / range } else { 0.0 })
        .collect()
}

#[derive(Default)]
struct Entry {
    passage: Option<Arc<super::Passage>>,
    dense: Option<f32>,
    lexical: Option<f32>,
}

/// Fuse dense and lexical candidates into a single ranking
///
/// # Arguments
/// * `dense` - Candidates with cosine similarity scores
/// * `lexical` - Candidates with raw BM25 scores
/// * `weight` - Fusion weights
/// * `limit` - Maximum number of fused candidates to return
///
/// # Returns
/// Candidates with origin `Fused`, sorted by fused score descending and then by
/// passage id ascending
pub fn fuse(
    dense: Vec<ScoredPassage>,
    lexical: Vec<ScoredPassage>,
    weight: FusionWeight,
    limit: usize,
) -> Vec<ScoredPassage> {
    let mut entries: AHashMap<String, Entry> = AHashMap::new();

    for candidate in dense {
        let clipped = candidate.score.clamp(0.0, 1.0);
        let entry = entries.entry(candidate.passage.id.clone()).or_default();
        // Keep the best score if a side reports the same passage twice
        entry.dense = Some(entry.dense.map_or(clipped, |d| d.max(clipped)));
        entry.passage.get_or_insert(candidate.passage);
    }

    let lexical_scores: Vec<f32> = lexical.iter().map(|c| c.score).collect();
    let normalized = min_max_normalize(&lexical_scores);
    for (candidate, norm) in lexical.into_iter().zip(normalized) {
        let entry = entries.entry(candidate.passage.id.clone()).or_default();
        entry.lexical = Some(entry.lexical.map_or(norm, |l| l.max(norm)));
        entry.passage.get_or_insert(candidate.passage);
    }

    let mut fused: Vec<ScoredPassage> = entries
        .into_values()
        .filter_map(|entry| {
            let passage = entry.passage?;
            let score = weight.dense * entry.dense.unwrap_or(0.0)
                + weight.lexical * entry.lexical.unwrap_or(0.0);
            Some(ScoredPassage {
                passage,
                score,
                origin: ScoreOrigin::Fused,
                breakdown: ScoreBreakdown {
                    dense: entry.dense,
                    lexical: entry.lexical,
                    fused: Some(score),
                    reranked: None,
                },
            })
        })
        .collect();

    fused.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.passage.id.cmp(&b.passage.id))
    });
    fused.truncate(limit);
    fused
}
