//! In-memory BM25 Okapi index
//!
//! Scores follow the classic Okapi formulation used by `rank_bm25`:
//! `idf = ln((N - n + 0.5) / (n + 0.5))`, with negative IDF values floored to
//! `epsilon * mean_idf` so that very common terms still contribute a little.

use super::{IndexError, LexicalIndex, PassageStore};
use crate::retrieval::Passage;
use crate::tokenize::casefold_whitespace;
use ahash::AHashMap;

/// BM25 tuning parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term frequency saturation
    pub k1: f32,
    /// Length normalization
    pub b: f32,
    /// Floor for negative IDF, as a fraction of the mean IDF
    pub epsilon: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            epsilon: 0.25,
        }
    }
}

/// BM25 index over a fixed passage set
pub struct Bm25Index {
    params: Bm25Params,
    passages: Vec<Passage>,
    positions: AHashMap<String, usize>,
    term_freqs: Vec<AHashMap<String, u32>>,
    doc_lengths: Vec<usize>,
    avg_doc_length: f32,
    idf: AHashMap<String, f32>,
}

impl Bm25Index {
    /// Build with default parameters
    pub fn build(passages: Vec<Passage>) -> Self {
        Self::with_params(passages, Bm25Params::default())
    }

    /// Build the index. Passages with an id seen earlier are skipped.
    pub fn with_params(passages: Vec<Passage>, params: Bm25Params) -> Self {
        let mut kept = Vec::with_capacity(passages.len());
        let mut positions = AHashMap::with_capacity(passages.len());
        for passage in passages {
            if positions.contains_key(&passage.id) {
                tracing::debug!("Skipping duplicate passage id: {}", passage.id);
                continue;
            }
            positions.insert(passage.id.clone(), kept.len());
            kept.push(passage);
        }

        let mut term_freqs = Vec::with_capacity(kept.len());
        let mut doc_lengths = Vec::with_capacity(kept.len());
        let mut doc_freqs: AHashMap<String, u32> = AHashMap::new();

        for passage in &kept {
            let tokens = casefold_whitespace(&passage.text);
            doc_lengths.push(tokens.len());

            let mut freqs: AHashMap<String, u32> = AHashMap::new();
            for token in tokens {
                *freqs.entry(token).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
            term_freqs.push(freqs);
        }

        let total_length: usize = doc_lengths.iter().sum();
        let avg_doc_length = if kept.is_empty() {
            0.0
        } else {
            total_length as f32 / kept.len() as f32
        };

        let idf = compute_idf(&doc_freqs, kept.len(), params.epsilon);

        tracing::info!(
            "Built BM25 index: {} passages, {} terms",
            kept.len(),
            idf.len()
        );

        Self {
            params,
            passages: kept,
            positions,
            term_freqs,
            doc_lengths,
            avg_doc_length,
            idf,
        }
    }

    /// IDF of a term, 0 for unknown terms
    pub fn idf(&self, term: &str) -> f32 {
        self.idf.get(term).copied().unwrap_or(0.0)
    }

    fn score_document(&self, doc: usize, tokens: &[String]) -> f32 {
        let Bm25Params { k1, b, .. } = self.params;
        let length_ratio = if self.avg_doc_length > 0.0 {
            self.doc_lengths[doc] as f32 / self.avg_doc_length
        } else {
            0.0
        };
        let norm = k1 * (1.0 - b + b * length_ratio);

        tokens
            .iter()
            .map(|token| {
                let tf = self.term_freqs[doc].get(token).copied().unwrap_or(0) as f32;
                if tf == 0.0 {
                    return 0.0;
                }
                self.idf(token) * (tf * (k1 + 1.0)) / (tf + norm)
            })
            .sum()
    }
}

fn compute_idf(
    doc_freqs: &AHashMap<String, u32>,
    corpus_size: usize,
    epsilon: f32,
) -> AHashMap<String, f32> {
    let n = corpus_size as f32;
    let mut idf = AHashMap::with_capacity(doc_freqs.len());
    let mut idf_sum = 0.0f32;
    let mut negative = Vec::new();

    for (term, &df) in doc_freqs {
        let df = df as f32;
        let value = ((n - df + 0.5) / (df + 0.5)).ln();
        idf_sum += value;
        if value < 0.0 {
            negative.push(term.clone());
        }
        idf.insert(term.clone(), value);
    }

    if !idf.is_empty() {
        let floor = epsilon * idf_sum / idf.len() as f32;
        for term in negative {
            idf.insert(term, floor);
        }
    }

    idf
}

impl PassageStore for Bm25Index {
    fn get(&self, ids: &[String]) -> Result<Vec<Passage>, IndexError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.positions.get(id))
            .map(|&pos| self.passages[pos].clone())
            .collect())
    }
}

impl LexicalIndex for Bm25Index {
    fn search(&self, tokens: &[String], k: usize) -> Result<Vec<(String, f32)>, IndexError> {
        if self.passages.is_empty() {
            return Err(IndexError::NotBuilt("BM25 corpus is empty".to_string()));
        }
        if tokens.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(String, f32)> = (0..self.passages.len())
            .filter_map(|doc| {
                let score = self.score_document(doc, tokens);
                (score > 0.0).then(|| (self.passages[doc].id.clone(), score))
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    fn len(&self) -> usize {
        self.passages.len()
    }
}
