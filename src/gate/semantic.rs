//! Similarity of a question to the reference in-domain questions

use crate::embedding::{cosine_similarity, EmbeddingError, EmbeddingProvider};
use crate::retrieval::blocking::run_blocking;
use crate::retrieval::{RetrievalError, Stage};
use std::sync::Arc;
use std::time::Duration;

/// Reference questions embedded once at construction
pub struct SemanticMatcher {
    embedder: Arc<dyn EmbeddingProvider>,
    references: Arc<Vec<Vec<f32>>>,
    timeout: Duration,
}

impl SemanticMatcher {
    /// Embed the reference questions. Blocks on the model.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        reference_queries: &[String],
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let references = if reference_queries.is_empty() {
            Vec::new()
        } else {
            embedder.embed_batch(reference_queries)?
        };

        tracing::info!(
            "Embedded {} reference questions with {}",
            references.len(),
            embedder.model_name()
        );

        Ok(Self {
            embedder,
            references: Arc::new(references),
            timeout,
        })
    }

    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    /// Maximum cosine similarity between `question` and any reference
    /// question, 0 when there are no references
    pub async fn best_similarity(&self, question: &str) -> Result<f32, RetrievalError> {
        if self.references.is_empty() {
            return Ok(0.0);
        }

        let embedder = Arc::clone(&self.embedder);
        let references = Arc::clone(&self.references);
        let text = question.to_string();

        let best = run_blocking(Stage::Embedding, self.timeout, move || {
            embedder.embed(&text).map(|vector| {
                references
                    .iter()
                    .map(|reference| cosine_similarity(&vector, reference))
                    .fold(f32::NEG_INFINITY, f32::max)
            })
        })
        .await??;

        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct KeywordEmbedder;

    impl EmbeddingProvider for KeywordEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let lowered = text.to_lowercase();
            Ok(vec![
                if lowered.contains("транснефт") { 1.0 } else { 0.0 },
                if lowered.contains("погод") { 1.0 } else { 0.0 },
                0.1,
            ])
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            texts.iter().map(|t| self.embed(t)).collect()
        }

        fn dimension(&self) -> usize {
            3
        }

        fn model_name(&self) -> &str {
            "keyword"
        }
    }

    #[tokio::test]
    async fn test_best_similarity() {
        let matcher = SemanticMatcher::new(
            Arc::new(KeywordEmbedder),
            &["Чем занимается ПАО Транснефть?".to_string()],
            Duration::from_secs(1),
        )
        .unwrap();

        assert_eq!(matcher.reference_count(), 1);
        let close = matcher.best_similarity("Где работает Транснефть").await.unwrap();
        let far = matcher.best_similarity("Какая погода").await.unwrap();
        assert!(close > 0.99);
        assert!(far < 0.1);
    }

    #[tokio::test]
    async fn test_no_references() {
        let matcher =
            SemanticMatcher::new(Arc::new(KeywordEmbedder), &[], Duration::from_secs(1)).unwrap();
        assert_eq!(matcher.best_similarity("что угодно").await.unwrap(), 0.0);
    }
}
