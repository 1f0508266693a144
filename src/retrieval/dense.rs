//! Dense retrieval side

use super::blocking::run_blocking;
use super::error::{RetrievalError, Stage};
use super::provenance::ScoredPassage;
use crate::embedding::EmbeddingProvider;
use crate::index::{IndexError, VectorIndex};
use ahash::AHashMap;
use std::sync::Arc;
use std::time::Duration;

/// Encodes the query and searches the vector index of a request's index
/// snapshot
pub struct DenseRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    embed_timeout: Duration,
    search_timeout: Duration,
}

impl DenseRetriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        embed_timeout: Duration,
        search_timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            embed_timeout,
            search_timeout,
        }
    }

    /// Top `k` passages by cosine similarity. A missing index fails before the
    /// query is embedded.
    pub async fn search(
        &self,
        index: Option<Arc<dyn VectorIndex>>,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredPassage>, RetrievalError> {
        let index = index.ok_or_else(|| RetrievalError::index_unavailable(Stage::Dense, "index not built"))?;

        let embedder = Arc::clone(&self.embedder);
        let text = query.to_string();
        let vector = run_blocking(Stage::Embedding, self.embed_timeout, move || {
            embedder.embed(&text)
        })
        .await??;

        let results = run_blocking(Stage::Dense, self.search_timeout, move || {
            dense_hits(index.as_ref(), &vector, k)
        })
        .await?
        .map_err(|e| (Stage::Dense, e))?;

        tracing::debug!("Dense search returned {} passages", results.len());
        Ok(results)
    }
}

fn dense_hits(
    index: &dyn VectorIndex,
    vector: &[f32],
    k: usize,
) -> Result<Vec<ScoredPassage>, IndexError> {
    let hits = index.search(vector, k)?;
    let ids: Vec<String> = hits.iter().map(|(id, _)| id.clone()).collect();
    let mut passages: AHashMap<String, _> = index
        .get(&ids)?
        .into_iter()
        .map(|p| (p.id.clone(), Arc::new(p)))
        .collect();

    Ok(hits
        .into_iter()
        .filter_map(|(id, score)| {
            passages
                .remove(&id)
                .map(|passage| ScoredPassage::dense(passage, score))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingError;
    use crate::index::{HnswIndex, HnswParams};
    use crate::retrieval::{Passage, SourceMetadata};

    struct AxisEmbedder;

    impl EmbeddingProvider for AxisEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(if text.contains("нефть") {
                vec![1.0, 0.0]
            } else {
                vec![0.0, 1.0]
            })
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            texts.iter().map(|t| self.embed(t)).collect()
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "axis"
        }
    }

    struct BrokenEmbedder;

    impl EmbeddingProvider for BrokenEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::GenerationError("offline".to_string()))
        }

        fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::GenerationError("offline".to_string()))
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "broken"
        }
    }

    fn index() -> Option<Arc<dyn VectorIndex>> {
        let passages = vec![
            Passage::new("нефть", SourceMetadata::default()),
            Passage::new("газ", SourceMetadata::default()),
        ];
        let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        Some(Arc::new(
            HnswIndex::build(passages, vectors, HnswParams::default()).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_search() {
        let retriever = DenseRetriever::new(
            Arc::new(AxisEmbedder),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );

        let results = retriever
            .search(index(), "где добывают нефть", 1)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text(), "нефть");
        assert!(results[0].score > 0.99);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_not_index_failure() {
        let retriever = DenseRetriever::new(
            Arc::new(BrokenEmbedder),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );

        let err = retriever.search(index(), "нефть", 1).await.unwrap_err();
        assert!(matches!(err, RetrievalError::EmbeddingService(_)));
        assert!(!err.is_index_failure());
    }

    #[tokio::test]
    async fn test_missing_index_skips_embedding() {
        let retriever = DenseRetriever::new(
            Arc::new(BrokenEmbedder),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );

        let err = retriever.search(None, "нефть", 1).await.unwrap_err();
        assert!(err.is_index_failure());
    }
}
