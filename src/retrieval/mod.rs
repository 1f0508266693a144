//! Hybrid retrieval and ranking
//!
//! Dense and lexical search run concurrently, their scores are fused,
//! near-duplicates are suppressed and a cross-encoder picks the final
//! passages. [`RetrievalPipeline`] chains the stages behind the relevance gate.

mod adaptive;
pub(crate) mod blocking;
mod compression;
mod deduplication;
mod dense;
mod error;
mod fusion;
mod hybrid;
mod lexical;
mod pipeline;
mod provenance;
mod reranker;

pub use adaptive::{
    adaptive_candidate_count, DEFAULT_CANDIDATES, EXPLANATORY_CANDIDATES, FACTUAL_CANDIDATES,
};
pub use compression::{compress_contexts, CompressedContext};
pub use deduplication::{Deduplicator, IdfTable, DEFAULT_DEDUP_THRESHOLD};
pub use dense::DenseRetriever;
pub use error::{RetrievalError, Stage, GENERIC_FAILURE_MESSAGE};
pub use fusion::{fuse, min_max_normalize, FusionError, FusionWeight};
pub use hybrid::{HybridCandidates, HybridSearcher};
pub use lexical::LexicalRetriever;
pub use pipeline::{RetrievalOutcome, RetrievalPipeline, RetrievalResult, StageCounts};
pub use provenance::{Passage, ScoreBreakdown, ScoreOrigin, ScoredPassage, SourceMetadata};
pub use reranker::{RerankOutcome, Reranker, DEFAULT_MIN_RERANK_SCORE};

use serde::{Deserialize, Serialize};

/// Per-request retrieval knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Weight of the dense signal in fusion
    pub dense_weight: f32,

    /// Weight of the lexical signal in fusion
    pub lexical_weight: f32,

    /// Similarity above which a candidate is a near-duplicate
    pub dedup_threshold: f32,

    /// Passages returned after reranking
    pub rerank_top_k: usize,

    /// Best reranked score below this means "no answer in the corpus"
    pub min_rerank_score: f32,

    /// Minimum reference-question similarity for the semantic gate
    pub semantic_threshold: f32,

    /// Fused candidates kept when adaptive selection is off
    pub candidate_k: usize,

    /// Each side is asked for `candidates * search_multiplier` results
    pub search_multiplier: usize,

    /// Choose the candidate count from the question's shape
    pub adaptive_candidates: bool,

    /// Fused candidates below this score are dropped before deduplication
    pub min_fused_score: f32,

    pub enable_reranking: bool,

    pub use_semantic_gate: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            dense_weight: 0.5,
            lexical_weight: 0.5,
            dedup_threshold: DEFAULT_DEDUP_THRESHOLD,
            rerank_top_k: 3,
            min_rerank_score: DEFAULT_MIN_RERANK_SCORE,
            semantic_threshold: 0.4,
            candidate_k: DEFAULT_CANDIDATES,
            search_multiplier: 2,
            adaptive_candidates: true,
            min_fused_score: 0.0,
            enable_reranking: true,
            use_semantic_gate: true,
        }
    }
}

impl RetrievalConfig {
    /// Validated fusion weights
    pub fn fusion_weight(&self) -> Result<FusionWeight, RetrievalError> {
        FusionWeight::new(self.dense_weight, self.lexical_weight)
            .map_err(|e| RetrievalError::InvalidConfig(e.to_string()))
    }

    /// Check every knob, reporting the first problem
    pub fn validate(&self) -> Result<(), RetrievalError> {
        self.fusion_weight()?;

        let invalid = |message: String| Err(RetrievalError::InvalidConfig(message));

        if !(self.dedup_threshold > 0.0 && self.dedup_threshold < 1.0) {
            return invalid(format!(
                "dedup_threshold must be in (0, 1), got {}",
                self.dedup_threshold
            ));
        }
        if self.rerank_top_k == 0 {
            return invalid("rerank_top_k must be positive".to_string());
        }
        if self.candidate_k == 0 {
            return invalid("candidate_k must be positive".to_string());
        }
        if self.search_multiplier == 0 {
            return invalid("search_multiplier must be positive".to_string());
        }
        if !self.min_rerank_score.is_finite() {
            return invalid("min_rerank_score must be finite".to_string());
        }
        if !(-1.0..=1.0).contains(&self.semantic_threshold) {
            return invalid(format!(
                "semantic_threshold must be in [-1, 1], got {}",
                self.semantic_threshold
            ));
        }
        if !self.min_fused_score.is_finite() {
            return invalid("min_fused_score must be finite".to_string());
        }
        Ok(())
    }

    /// Fused candidates to keep for `question`
    pub fn candidates_for(&self, question: &str) -> usize {
        if self.adaptive_candidates {
            adaptive_candidate_count(question)
        } else {
            self.candidate_k
        }
    }
}
