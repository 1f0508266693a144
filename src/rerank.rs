//! Cross-encoder scoring using FastEmbed

use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RerankError {
    #[error("Reranker initialization failed: {0}")]
    InitializationError(String),

    #[error("Reranking failed: {0}")]
    RerankingError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Relevance model scoring `(query, passage)` pairs jointly
///
/// Scores are unbounded real numbers; higher means more relevant.
pub trait CrossEncoder: Send + Sync {
    /// Score a single pair
    fn score(&self, query: &str, passage: &str) -> Result<f32, RerankError> {
        self.score_batch(query, &[passage.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| RerankError::RerankingError("No score returned".to_string()))
    }

    /// Score many passages against one query. The output is aligned with
    /// `passages`.
    fn score_batch(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, RerankError>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

const SUPPORTED_MODELS: &[(&str, RerankerModel)] = &[
    ("bge-reranker-v2-m3", RerankerModel::BGERerankerV2M3),
    ("bge-reranker-base", RerankerModel::BGERerankerBase),
];

/// Multilingual cross-encoder, suitable for Russian passages
pub const DEFAULT_RERANKER_MODEL: &str = "bge-reranker-v2-m3";

/// FastEmbed `TextRerank` cross-encoder
pub struct FastEmbedCrossEncoder {
    model: Arc<TextRerank>,
    model_name: String,
}

impl FastEmbedCrossEncoder {
    /// Create a new cross-encoder with specified model
    ///
    /// # Arguments
    /// * `model_name` - Model name (e.g., "bge-reranker-v2-m3")
    pub fn new(model_name: &str) -> Result<Self, RerankError> {
        let (name, model) = SUPPORTED_MODELS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(model_name))
            .cloned()
            .ok_or_else(|| {
                RerankError::InitializationError(format!(
                    "Unsupported reranker model: {}. Supported: {}",
                    model_name,
                    SUPPORTED_MODELS
                        .iter()
                        .map(|(n, _)| *n)
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })?;

        tracing::info!("Initializing reranker model: {}", name);

        let init_options = RerankInitOptions::new(model).with_show_download_progress(true);

        let model = TextRerank::try_new(init_options)
            .map_err(|e| RerankError::InitializationError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: name.to_string(),
        })
    }

    /// Create cross-encoder with default model
    pub fn with_default_model() -> Result<Self, RerankError> {
        Self::new(DEFAULT_RERANKER_MODEL)
    }
}

impl CrossEncoder for FastEmbedCrossEncoder {
    fn score_batch(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, RerankError> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        if query.trim().is_empty() {
            return Err(RerankError::InvalidInput(
                "Query cannot be empty".to_string(),
            ));
        }

        let documents: Vec<&str> = passages.iter().map(|s| s.as_str()).collect();

        let results = self
            .model
            .rerank(query, documents, false, None)
            .map_err(|e| RerankError::RerankingError(e.to_string()))?;

        // fastembed returns results sorted by score; restore input order
        let mut scores = vec![f32::NAN; passages.len()];
        for result in results {
            if let Some(slot) = scores.get_mut(result.index) {
                *slot = result.score;
            }
        }

        if scores.iter().any(|s| s.is_nan()) {
            return Err(RerankError::RerankingError(
                "Missing score for some passages".to_string(),
            ));
        }

        Ok(scores)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LengthEncoder;

    impl CrossEncoder for LengthEncoder {
        fn score_batch(&self, _query: &str, passages: &[String]) -> Result<Vec<f32>, RerankError> {
            Ok(passages.iter().map(|p| p.len() as f32).collect())
        }

        fn model_name(&self) -> &str {
            "length"
        }
    }

    #[test]
    fn test_default_score_delegates_to_batch() {
        assert_eq!(LengthEncoder.score("q", "abcd").unwrap(), 4.0);
    }

    #[test]
    fn test_unsupported_model() {
        assert!(matches!(
            FastEmbedCrossEncoder::new("ms-marco-unknown"),
            Err(RerankError::InitializationError(_))
        ));
    }

    #[test]
    #[ignore] // Requires model download
    fn test_rerank_basic() {
        let encoder = FastEmbedCrossEncoder::with_default_model().unwrap();

        let passages = vec![
            "Погода в Москве сегодня солнечная.".to_string(),
            "ПАО «Транснефть» управляет системой магистральных нефтепроводов.".to_string(),
        ];
        let scores = encoder
            .score_batch("Чем занимается Транснефть?", &passages)
            .unwrap();

        assert_eq!(scores.len(), 2);
        assert!(scores[1] > scores[0]);
    }
}
