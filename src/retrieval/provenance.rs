//! Passages and scored passages with per-stage score provenance

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Where a passage came from in the source corpus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SourceMetadata {
    /// Identifier of the source document
    pub document_id: String,

    /// Section title the chunk belongs to
    #[serde(default)]
    pub section_title: String,

    /// Position of the chunk inside the document
    #[serde(default)]
    pub chunk_index: u64,
}

/// Immutable unit of retrievable text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    /// Stable, content-derived identifier
    pub id: String,

    /// Passage text
    pub text: String,

    /// Source document metadata
    pub source: SourceMetadata,

    /// Token count as measured at ingestion time
    #[serde(default)]
    pub token_count: usize,
}

impl Passage {
    /// Create a passage whose id is derived from its text
    pub fn new(text: impl Into<String>, source: SourceMetadata) -> Self {
        let text = text.into();
        let token_count = text.split_whitespace().count();
        Self {
            id: Self::content_id(&text),
            text,
            source,
            token_count,
        }
    }

    /// Content-derived id: first 16 hex chars of the BLAKE3 digest
    pub fn content_id(text: &str) -> String {
        let hash = blake3::hash(text.as_bytes()).to_hex();
        hash.as_str()[..16].to_string()
    }

    /// Get a short preview of the text (first N characters)
    pub fn preview(&self, max_chars: usize) -> String {
        if self.text.chars().count() <= max_chars {
            self.text.clone()
        } else {
            let head: String = self.text.chars().take(max_chars).collect();
            format!("{}...", head)
        }
    }
}

/// Which stage produced the current score of a [`ScoredPassage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOrigin {
    Dense,
    Lexical,
    Fused,
    Reranked,
}

/// Scores a passage received at each stage, each on its own scale
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Cosine similarity (clipped to [0,1] once fused)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dense: Option<f32>,

    /// Raw BM25 score, or the min-max normalized value once fused
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexical: Option<f32>,

    /// Weighted fusion score
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fused: Option<f32>,

    /// Cross-encoder relevance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reranked: Option<f32>,
}

/// A passage with its current score and the stage that assigned it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPassage {
    pub passage: Arc<Passage>,

    /// Score on the scale of `origin`
    pub score: f32,

    pub origin: ScoreOrigin,

    /// Per-stage scores, kept for observability
    pub breakdown: ScoreBreakdown,
}

impl ScoredPassage {
    /// Passage scored by the dense retriever
    pub fn dense(passage: Arc<Passage>, score: f32) -> Self {
        Self {
            passage,
            score,
            origin: ScoreOrigin::Dense,
            breakdown: ScoreBreakdown {
                dense: Some(score),
                ..Default::default()
            },
        }
    }

    /// Passage scored by the lexical retriever
    pub fn lexical(passage: Arc<Passage>, score: f32) -> Self {
        Self {
            passage,
            score,
            origin: ScoreOrigin::Lexical,
            breakdown: ScoreBreakdown {
                lexical: Some(score),
                ..Default::default()
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.passage.id
    }

    pub fn text(&self) -> &str {
        &self.passage.text
    }

    /// Replace the current score with a cross-encoder score
    pub fn into_reranked(mut self, score: f32) -> Self {
        self.score = score;
        self.origin = ScoreOrigin::Reranked;
        self.breakdown.reranked = Some(score);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_id_is_stable() {
        let a = Passage::new("ПАО Транснефть", SourceMetadata::default());
        let b = Passage::new("ПАО Транснефть", SourceMetadata::default());
        let c = Passage::new("Другой текст", SourceMetadata::default());

        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(a.id.len(), 16);
        assert_eq!(a.token_count, 2);
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        let p = Passage::new("нефтепровод", SourceMetadata::default());
        assert_eq!(p.preview(4), "нефт...");
        assert_eq!(p.preview(50), "нефтепровод");
    }

    #[test]
    fn test_into_reranked_keeps_earlier_scores() {
        let p = Arc::new(Passage::new("text", SourceMetadata::default()));
        let scored = ScoredPassage::dense(p, 0.8).into_reranked(2.5);

        assert_eq!(scored.origin, ScoreOrigin::Reranked);
        assert_eq!(scored.score, 2.5);
        assert_eq!(scored.breakdown.dense, Some(0.8));
        assert_eq!(scored.breakdown.reranked, Some(2.5));
    }
}
