//! Cross-encoder reranking stage with a minimum-quality cutoff

use super::blocking::run_blocking;
use super::error::{RetrievalError, Stage};
use super::provenance::ScoredPassage;
use crate::rerank::CrossEncoder;
use std::sync::Arc;
use std::time::Duration;

/// Default cutoff below which the best reranked passage means "no answer in
/// the corpus"
pub const DEFAULT_MIN_RERANK_SCORE: f32 = -0.5;

/// Result of the reranking stage
#[derive(Debug, Clone)]
pub enum RerankOutcome {
    /// Candidates in final order. `reranked` is false when the model was
    /// skipped because there were already few enough candidates.
    Ranked {
        passages: Vec<ScoredPassage>,
        reranked: bool,
    },

    /// The model ran and even the best passage scored below the cutoff
    LowRelevance { best_score: f32 },
}

/// Reorders candidates with a cross-encoder
pub struct Reranker {
    encoder: Arc<dyn CrossEncoder>,
    timeout: Duration,
}

impl Reranker {
    pub fn new(encoder: Arc<dyn CrossEncoder>, timeout: Duration) -> Self {
        Self { encoder, timeout }
    }

    pub fn model_name(&self) -> &str {
        self.encoder.model_name()
    }

    /// Rerank candidates and keep the best `k`
    ///
    /// # Arguments
    /// * `query` - Question text
    /// * `candidates` - Deduplicated candidates in fused order
    /// * `k` - Number of passages to keep
    /// * `min_score` - Cutoff for the best reranked score
    ///
    /// # Returns
    /// `Ranked` with origin `Reranked` passages sorted by score (ties by id),
    /// or `LowRelevance` when the best score is below `min_score`
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredPassage>,
        k: usize,
        min_score: f32,
    ) -> Result<RerankOutcome, RetrievalError> {
        if candidates.len() <= k {
            tracing::debug!(
                "Skipping rerank: {} candidates <= top_k {}",
                candidates.len(),
                k
            );
            return Ok(RerankOutcome::Ranked {
                passages: candidates,
                reranked: false,
            });
        }

        let encoder = Arc::clone(&self.encoder);
        let query = query.to_string();
        let texts: Vec<String> = candidates.iter().map(|c| c.text().to_string()).collect();

        let scores = run_blocking(Stage::Rerank, self.timeout, move || {
            encoder.score_batch(&query, &texts)
        })
        .await??;

        if scores.len() != candidates.len() {
            return Err(RetrievalError::Reranker(format!(
                "expected {} scores, got {}",
                candidates.len(),
                scores.len()
            )));
        }

        let mut reranked: Vec<ScoredPassage> = candidates
            .into_iter()
            .zip(scores)
            .map(|(candidate, score)| candidate.into_reranked(score))
            .collect();

        reranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id().cmp(b.id())));
        reranked.truncate(k);

        let best_score = reranked.first().map(|c| c.score).unwrap_or(f32::NEG_INFINITY);
        if best_score < min_score {
            tracing::info!(
                "Best reranked score {:.4} below cutoff {:.4}",
                best_score,
                min_score
            );
            return Ok(RerankOutcome::LowRelevance { best_score });
        }

        tracing::debug!("Reranked to {} passages, best {:.4}", reranked.len(), best_score);
        Ok(RerankOutcome::Ranked {
            passages: reranked,
            reranked: true,
        })
    }
}
