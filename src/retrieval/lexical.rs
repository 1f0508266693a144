//! Lexical retrieval side

use super::blocking::run_blocking;
use super::error::{RetrievalError, Stage};
use super::provenance::ScoredPassage;
use crate::index::{IndexError, LexicalIndex};
use crate::tokenize::casefold_whitespace;
use ahash::AHashMap;
use std::sync::Arc;
use std::time::Duration;

/// Queries the lexical index of a request's index snapshot
pub struct LexicalRetriever {
    timeout: Duration,
}

impl LexicalRetriever {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Top `k` passages by BM25 score. Scores are raw and unbounded.
    pub async fn search(
        &self,
        index: Option<Arc<dyn LexicalIndex>>,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredPassage>, RetrievalError> {
        let index = index
            .ok_or_else(|| RetrievalError::index_unavailable(Stage::Lexical, "index not built"))?;

        let tokens = casefold_whitespace(query);

        let results = run_blocking(Stage::Lexical, self.timeout, move || {
            lexical_hits(index.as_ref(), &tokens, k)
        })
        .await?
        .map_err(|e| (Stage::Lexical, e))?;

        tracing::debug!("Lexical search returned {} passages", results.len());
        Ok(results)
    }
}

fn lexical_hits(
    index: &dyn LexicalIndex,
    tokens: &[String],
    k: usize,
) -> Result<Vec<ScoredPassage>, IndexError> {
    let hits = index.search(tokens, k)?;
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
                .map(|passage| ScoredPassage::lexical(passage, score))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Bm25Index;
    use crate::retrieval::{Passage, SourceMetadata};

    fn index(texts: &[&str]) -> Option<Arc<dyn LexicalIndex>> {
        let passages = texts
            .iter()
            .map(|t| Passage::new(*t, SourceMetadata::default()))
            .collect();
        Some(Arc::new(Bm25Index::build(passages)))
    }

    #[tokio::test]
    async fn test_search_hydrates_passages() {
        let retriever = LexicalRetriever::new(Duration::from_secs(1));
        let corpus = index(&["выручка компании", "совет директоров", "магистральный нефтепровод"]);

        let results = retriever.search(corpus, "Выручка", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text(), "выручка компании");
        assert!(results[0].breakdown.lexical.is_some());
    }

    #[tokio::test]
    async fn test_missing_index() {
        let retriever = LexicalRetriever::new(Duration::from_secs(1));
        let err = retriever.search(None, "нефть", 5).await.unwrap_err();
        assert!(err.is_index_failure());
    }

    #[tokio::test]
    async fn test_empty_corpus_is_unavailable() {
        let retriever = LexicalRetriever::new(Duration::from_secs(1));
        assert!(matches!(
            retriever.search(index(&[]), "нефть", 5).await,
            Err(RetrievalError::IndexUnavailable {
                side: Stage::Lexical,
                ..
            })
        ));
    }
}
