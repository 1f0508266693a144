//! Near-duplicate suppression over ranked candidates
//!
//! Candidates are compared with cosine similarity of L2-normalized term
//! vectors. Term weights come from the candidate text alone (term frequency)
//! or from an IDF table fixed when the corpus is indexed, never from the batch
//! being deduplicated, so applying the deduplicator twice gives the same result.

use super::provenance::{Passage, ScoredPassage};
use crate::tokenize::word_tokens;
use ahash::{AHashMap, AHashSet};
use std::sync::Arc;

/// Default similarity above which a candidate is a duplicate
pub const DEFAULT_DEDUP_THRESHOLD: f32 = 0.85;

/// Corpus-level inverse document frequencies
#[derive(Debug, Clone, Default)]
pub struct IdfTable {
    idf: AHashMap<String, f32>,
    /// Weight for terms never seen in the corpus
    unseen: f32,
}

impl IdfTable {
    /// Smoothed IDF, `ln((1 + n) / (1 + df)) + 1`
    pub fn from_passages<'a>(passages: impl IntoIterator<Item = &'a Passage>) -> Self {
        let mut doc_freqs: AHashMap<String, u32> = AHashMap::new();
        let mut n = 0usize;

        for passage in passages {
            n += 1;
            let unique: AHashSet<String> = word_tokens(&passage.text).into_iter().collect();
            for term in unique {
                *doc_freqs.entry(term).or_insert(0) += 1;
            }
        }

        let smooth = |df: f32| ((1.0 + n as f32) / (1.0 + df)).ln() + 1.0;
        let idf = doc_freqs
            .into_iter()
            .map(|(term, df)| (term, smooth(df as f32)))
            .collect();

        Self {
            idf,
            unseen: smooth(0.0),
        }
    }

    pub fn weight(&self, term: &str) -> f32 {
        self.idf.get(term).copied().unwrap_or(self.unseen)
    }

    pub fn len(&self) -> usize {
        self.idf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idf.is_empty()
    }
}

/// Sparse, L2-normalized term vector
type TermVector = AHashMap<String, f32>;

/// Greedy near-duplicate filter
#[derive(Debug, Clone)]
pub struct Deduplicator {
    threshold: f32,
    idf: Option<Arc<IdfTable>>,
}

impl Deduplicator {
    /// Term-frequency weighting
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            idf: None,
        }
    }

    /// TF-IDF weighting with a fixed corpus table
    pub fn with_idf(threshold: f32, idf: Arc<IdfTable>) -> Self {
        Self {
            threshold,
            idf: Some(idf),
        }
    }

    fn vectorize(&self, text: &str) -> TermVector {
        let mut vector: TermVector = AHashMap::new();
        for token in word_tokens(text) {
            *vector.entry(token).or_insert(0.0) += 1.0;
        }

        if let Some(idf) = &self.idf {
            for (term, weight) in vector.iter_mut() {
                *weight *= idf.weight(term);
            }
        }

        let norm = vector.values().map(|w| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for weight in vector.values_mut() {
                *weight /= norm;
            }
        }
        vector
    }

    /// Cosine similarity of two passage texts under this weighting
    pub fn similarity(&self, a: &str, b: &str) -> f32 {
        dot(&self.vectorize(a), &self.vectorize(b))
    }

    /// Drop every candidate whose similarity with an earlier kept candidate
    /// is strictly greater than the threshold. Survivors keep their order.
    ///
    /// # Arguments
    /// * `candidates` - Candidates in rank order
    ///
    /// # Returns
    /// Deduplicated candidates
    pub fn deduplicate(&self, candidates: Vec<ScoredPassage>) -> Vec<ScoredPassage> {
        let threshold = self.threshold;
        let total = candidates.len();
        let mut kept: Vec<ScoredPassage> = Vec::with_capacity(total);
        let mut kept_vectors: Vec<TermVector> = Vec::with_capacity(total);

        for candidate in candidates {
            let vector = self.vectorize(candidate.text());
            let duplicate = kept_vectors
                .iter()
                .any(|other| dot(&vector, other) > threshold);

            if duplicate {
                tracing::debug!("Dropping near-duplicate passage {}", candidate.id());
                continue;
            }
            kept_vectors.push(vector);
            kept.push(candidate);
        }

        tracing::debug!(
            "Deduplication kept {} of {} candidates (threshold {})",
            kept.len(),
            total,
            threshold
        );
        kept
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_THRESHOLD)
    }
}

fn dot(a: &TermVector, b: &TermVector) -> f32 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(term, w)| large.get(term).map(|v| w * v))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::SourceMetadata;

    fn candidate(text: &str, score: f32) -> ScoredPassage {
        ScoredPassage::dense(Arc::new(Passage::new(text, SourceMetadata::default())), score)
    }

    fn texts(candidates: &[ScoredPassage]) -> Vec<&str> {
        candidates.iter().map(|c| c.text()).collect()
    }

    #[test]
    fn test_exact_duplicate_removed() {
        let dedup = Deduplicator::default();
        let result = dedup.deduplicate(vec![
            candidate("Выручка компании выросла на 5%", 0.9),
            candidate("Совет директоров утвердил план", 0.8),
            candidate("выручка КОМПАНИИ выросла на 5%!", 0.7),
        ]);

        assert_eq!(
            texts(&result),
            vec![
                "Выручка компании выросла на 5%",
                "Совет директоров утвердил план"
            ]
        );
    }

    #[test]
    fn test_similarity_at_threshold_is_kept() {
        // Identical vectors have similarity 1.0, which is not > 1.0
        let dedup = Deduplicator::new(1.0);
        let result = dedup.deduplicate(vec![candidate("нефть", 0.9), candidate("нефть нефть", 0.8)]);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_distinct_passages_survive_in_order() {
        let dedup = Deduplicator::default();
        let input = vec![
            candidate("магистральные нефтепроводы компании", 0.9),
            candidate("численность персонала предприятия", 0.8),
            candidate("инвестиционная программа на год", 0.7),
        ];
        let result = dedup.deduplicate(input);
        assert_eq!(result.len(), 3);
        assert!(result.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_idempotent() {
        let dedup = Deduplicator::new(0.5);
        let input = vec![
            candidate("нефть транспорт трубопровод", 0.9),
            candidate("нефть транспорт трубопровод магистраль", 0.8),
            candidate("совет директоров", 0.7),
            candidate("совет директоров акционеры", 0.6),
        ];

        let once = dedup.deduplicate(input);
        let twice = dedup.deduplicate(once.clone());
        assert_eq!(texts(&once), texts(&twice));
    }

    #[test]
    fn test_idf_weighting_discounts_common_terms() {
        let corpus: Vec<Passage> = [
            "компания нефть",
            "компания газ",
            "компания уголь",
            "компания торф",
        ]
        .iter()
        .map(|t| Passage::new(*t, SourceMetadata::default()))
        .collect();
        let idf = IdfTable::from_passages(&corpus);
        assert_eq!(idf.len(), 5);
        assert!(idf.weight("компания") < idf.weight("нефть"));

        let tf = Deduplicator::new(0.85);
        let tfidf = Deduplicator::with_idf(0.85, Arc::new(idf));
        let a = "компания нефть";
        let b = "компания газ";
        assert!(tfidf.similarity(a, b) < tf.similarity(a, b));
    }

    #[test]
    fn test_empty_text_never_duplicate() {
        let dedup = Deduplicator::default();
        let result = dedup.deduplicate(vec![candidate("?", 0.9), candidate("!", 0.8)]);
        assert_eq!(result.len(), 2);
    }
}
