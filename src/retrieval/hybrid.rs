//! Hybrid search combining dense and lexical retrieval

use super::dense::DenseRetriever;
use super::error::RetrievalError;
use super::fusion::{fuse, FusionWeight};
use super::lexical::LexicalRetriever;
use super::provenance::ScoredPassage;
use crate::index::IndexSet;

/// Fused candidates plus the per-side counts that produced them
#[derive(Debug, Clone)]
pub struct HybridCandidates {
    pub candidates: Vec<ScoredPassage>,
    pub dense_count: usize,
    pub lexical_count: usize,
    /// A side whose index failed and was skipped
    pub degraded: Option<String>,
}

/// Runs both retrieval sides concurrently and fuses their results
pub struct HybridSearcher {
    lexical: LexicalRetriever,
    dense: DenseRetriever,
}

impl HybridSearcher {
    pub fn new(lexical: LexicalRetriever, dense: DenseRetriever) -> Self {
        Self { lexical, dense }
    }

    /// Perform hybrid search
    ///
    /// # Arguments
    /// * `indexes` - Index snapshot both sides read from
    /// * `query` - Question text
    /// * `per_side_limit` - Candidates requested from each side
    /// * `weight` - Fusion weights
    /// * `limit` - Fused candidates to keep
    ///
    /// # Returns
    /// Fused candidates. If one side's index is unavailable the other side's
    /// ranking is used alone; if both are unavailable, or the query cannot be
    /// embedded, the request fails.
    pub async fn search(
        &self,
        indexes: &IndexSet,
        query: &str,
        per_side_limit: usize,
        weight: FusionWeight,
        limit: usize,
    ) -> Result<HybridCandidates, RetrievalError> {
        let (dense, lexical) = tokio::join!(
            self.dense
                .search(indexes.vector.clone(), query, per_side_limit),
            self.lexical
                .search(indexes.lexical.clone(), query, per_side_limit)
        );

        let (dense, lexical, degraded) = match (dense, lexical) {
            (Ok(d), Ok(l)) => (d, l, None),
            (Err(e), Ok(l)) if e.is_index_failure() => {
                tracing::warn!("Dense side unavailable, using lexical only: {}", e);
                (Vec::new(), l, Some(e.to_string()))
            }
            (Ok(d), Err(e)) if e.is_index_failure() => {
                tracing::warn!("Lexical side unavailable, using dense only: {}", e);
                (d, Vec::new(), Some(e.to_string()))
            }
            (Err(dense_err), Err(lexical_err)) => {
                tracing::error!(
                    "Both retrieval sides failed: dense: {}; lexical: {}",
                    dense_err,
                    lexical_err
                );
                return Err(dense_err);
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!("Retrieval failed: {}", e);
                return Err(e);
            }
        };

        let dense_count = dense.len();
        let lexical_count = lexical.len();
        let candidates = fuse(dense, lexical, weight, limit);

        tracing::debug!(
            "Hybrid search: {} dense + {} lexical -> {} fused",
            dense_count,
            lexical_count,
            candidates.len()
        );

        Ok(HybridCandidates {
            candidates,
            dense_count,
            lexical_count,
            degraded,
        })
    }
}
