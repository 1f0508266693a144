//! End-to-end retrieval for one question

use super::deduplication::Deduplicator;
use super::error::RetrievalError;
use super::hybrid::HybridSearcher;
use super::provenance::ScoredPassage;
use super::reranker::{RerankOutcome, Reranker};
use super::RetrievalConfig;
use crate::cache::ResultCache;
use crate::gate::{RelevanceDecision, RelevanceGate};
use crate::index::{IndexHandle, IndexSet};
use crate::refusal::{Refusal, RefusalMessages, RefusalReason};
use serde::Serialize;
use std::sync::Arc;

/// Candidate counts after each stage
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StageCounts {
    /// Index generation the passages came from
    pub generation: u64,
    /// Fused candidates requested
    pub candidate_k: usize,
    pub dense: usize,
    pub lexical: usize,
    pub fused: usize,
    /// Left after the minimum fused score filter
    pub above_min_score: usize,
    pub deduplicated: usize,
    pub returned: usize,
    /// Whether the cross-encoder ran
    pub reranked: bool,
    /// Side skipped because its index was unavailable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

/// Ranked passages for an accepted question. `passages` is empty when
/// neither retrieval side found anything.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub passages: Vec<ScoredPassage>,
    pub decision: RelevanceDecision,
    pub counts: StageCounts,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalOutcome {
    Passages(RetrievalResult),
    Refused(Refusal),
}

impl RetrievalOutcome {
    pub fn passages(&self) -> &[ScoredPassage] {
        match self {
            RetrievalOutcome::Passages(result) => &result.passages,
            RetrievalOutcome::Refused(_) => &[],
        }
    }

    pub fn refusal(&self) -> Option<&Refusal> {
        match self {
            RetrievalOutcome::Refused(refusal) => Some(refusal),
            RetrievalOutcome::Passages(_) => None,
        }
    }
}

/// Gate, hybrid search, fusion, deduplication and reranking in sequence
///
/// Each request reads one [`IndexSet`] snapshot from `indexes`; a re-index
/// that installs a new set only affects requests that start afterwards.
pub struct RetrievalPipeline {
    gate: RelevanceGate,
    indexes: Arc<IndexHandle<IndexSet>>,
    searcher: HybridSearcher,
    reranker: Option<Reranker>,
    refusals: RefusalMessages,
    cache: Option<ResultCache>,
}

impl RetrievalPipeline {
    pub fn new(
        gate: RelevanceGate,
        indexes: Arc<IndexHandle<IndexSet>>,
        searcher: HybridSearcher,
    ) -> Self {
        Self {
            gate,
            indexes,
            searcher,
            reranker: None,
            refusals: RefusalMessages::default(),
            cache: None,
        }
    }

    pub fn with_reranker(mut self, reranker: Reranker) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn with_refusal_messages(mut self, refusals: RefusalMessages) -> Self {
        self.refusals = refusals;
        self
    }

    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn gate(&self) -> &RelevanceGate {
        &self.gate
    }

    pub fn cache(&self) -> Option<&ResultCache> {
        self.cache.as_ref()
    }

    pub fn indexes(&self) -> &Arc<IndexHandle<IndexSet>> {
        &self.indexes
    }

    /// Retrieve supporting passages for a question.
    ///
    /// # Returns
    /// `Passages` with the final ranking, or `Refused` when the gate rejects
    /// the question or the reranker finds nothing relevant enough
    ///
    /// # Errors
    /// `InvalidQuery` for a blank question, `InvalidConfig` for bad knobs or
    /// for a stage the pipeline was built without (cross-encoder, semantic
    /// gate), and an infrastructure error when a stage fails. Errors are never
    /// cached.
    pub async fn retrieve(
        &self,
        question: &str,
        config: &RetrievalConfig,
    ) -> Result<RetrievalOutcome, RetrievalError> {
        if question.trim().is_empty() {
            return Err(RetrievalError::InvalidQuery("question is empty".to_string()));
        }
        config.validate()?;
        if config.enable_reranking && self.reranker.is_none() {
            return Err(RetrievalError::InvalidConfig(
                "enable_reranking is set but no cross-encoder is loaded".to_string(),
            ));
        }
        if config.use_semantic_gate && !self.gate.has_semantic() {
            return Err(RetrievalError::InvalidConfig(
                "use_semantic_gate is set but the gate has no semantic matcher".to_string(),
            ));
        }

        let indexes = self.indexes.snapshot().await.unwrap_or_default();

        // Keys carry the generation, so an outcome computed on a replaced
        // index set can never be served after the swap
        let cache_key = match &self.cache {
            Some(_) => Some(ResultCache::key(question, config, indexes.generation)?),
            None => None,
        };
        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(outcome) = cache.get(key) {
                tracing::debug!("Serving cached outcome");
                return Ok(outcome);
            }
        }

        let outcome = self.run(question, config, &indexes).await?;

        if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
            cache.insert(key, outcome.clone());
        }
        Ok(outcome)
    }

    async fn run(
        &self,
        question: &str,
        config: &RetrievalConfig,
        indexes: &IndexSet,
    ) -> Result<RetrievalOutcome, RetrievalError> {
        let decision = self
            .gate
            .evaluate(question, config.use_semantic_gate, config.semantic_threshold)
            .await?;

        if !decision.accepted {
            tracing::info!(
                reason = %decision.reason,
                severity = %decision.severity,
                "Question rejected by relevance gate"
            );
            return Ok(RetrievalOutcome::Refused(
                self.refusals.refuse(RefusalReason::Rejected(decision)),
            ));
        }

        let candidate_k = config.candidates_for(question);
        let per_side = candidate_k.saturating_mul(config.search_multiplier);
        let hybrid = self
            .searcher
            .search(indexes, question, per_side, config.fusion_weight()?, candidate_k)
            .await?;

        let mut counts = StageCounts {
            generation: indexes.generation,
            candidate_k,
            dense: hybrid.dense_count,
            lexical: hybrid.lexical_count,
            fused: hybrid.candidates.len(),
            degraded: hybrid.degraded,
            ..StageCounts::default()
        };

        let filtered: Vec<ScoredPassage> = hybrid
            .candidates
            .into_iter()
            .filter(|c| c.score >= config.min_fused_score)
            .collect();
        counts.above_min_score = filtered.len();

        let deduplicator = match &indexes.dedup_idf {
            Some(idf) => Deduplicator::with_idf(config.dedup_threshold, Arc::clone(idf)),
            None => Deduplicator::new(config.dedup_threshold),
        };
        let unique = deduplicator.deduplicate(filtered);
        counts.deduplicated = unique.len();

        // A missing reranker with reranking enabled was rejected up front
        let reranker = self.reranker.as_ref().filter(|_| config.enable_reranking);
        let passages = match reranker {
            Some(reranker) => {
                match reranker
                    .rerank(question, unique, config.rerank_top_k, config.min_rerank_score)
                    .await?
                {
                    RerankOutcome::Ranked { passages, reranked } => {
                        counts.reranked = reranked;
                        passages
                    }
                    RerankOutcome::LowRelevance { best_score } => {
                        tracing::info!(best_score, "No passage passed the rerank cutoff");
                        return Ok(RetrievalOutcome::Refused(
                            self.refusals
                                .refuse(RefusalReason::LowRelevance { best_score }),
                        ));
                    }
                }
            }
            None => {
                let mut passages = unique;
                passages.truncate(config.rerank_top_k);
                passages
            }
        };
        counts.returned = passages.len();

        tracing::info!(
            generation = counts.generation,
            dense = counts.dense,
            lexical = counts.lexical,
            fused = counts.fused,
            deduplicated = counts.deduplicated,
            returned = counts.returned,
            "Retrieval complete"
        );

        Ok(RetrievalOutcome::Passages(RetrievalResult {
            passages,
            decision,
            counts,
        }))
    }
}
