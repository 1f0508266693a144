/// Embedding provider trait and FastEmbed implementation
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitializationError(String),

    #[error("Embedding generation failed: {0}")]
    GenerationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Trait for embedding providers
///
/// The dense adapter and the relevance gate only ever encode queries through
/// this trait; passage vectors are produced on the ingestion side with the same
/// model.
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Generate embeddings for multiple texts (batched for efficiency)
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Supported models: config name, fastembed model, dimension, approximate download size
const SUPPORTED_MODELS: &[(&str, EmbeddingModel, usize, usize)] = &[
    ("multilingual-e5-small", EmbeddingModel::MultilingualE5Small, 384, 450),
    ("multilingual-e5-base", EmbeddingModel::MultilingualE5Base, 768, 1100),
    ("multilingual-e5-large", EmbeddingModel::MultilingualE5Large, 1024, 2200),
    ("all-MiniLM-L6-v2", EmbeddingModel::AllMiniLML6V2, 384, 90),
    ("bge-small-en-v1.5", EmbeddingModel::BGESmallENV15, 384, 130),
    ("bge-base-en-v1.5", EmbeddingModel::BGEBaseENV15, 768, 440),
];

/// Default model: multilingual, since the corpus and questions are Russian
pub const DEFAULT_EMBEDDING_MODEL: &str = "multilingual-e5-large";

/// Names accepted by [`FastEmbedProvider::new`]
pub fn supported_embedding_models() -> impl Iterator<Item = &'static str> {
    SUPPORTED_MODELS.iter().map(|(name, ..)| *name)
}

/// FastEmbed provider for local embedding generation
///
/// Runs the ONNX model in-process; no API calls.
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedProvider {
    /// Create a new FastEmbed provider with the specified model
    ///
    /// **Important**: Models are downloaded on-demand to the fastembed cache
    /// directory on first use. The multilingual E5 models range from ~450MB
    /// (small) to ~2.2GB (large).
    pub fn new(model_name: &str) -> Result<Self, EmbeddingError> {
        let (name, embedding_model, dimension, model_size_mb) = SUPPORTED_MODELS
            .iter()
            .find(|(name, ..)| name.eq_ignore_ascii_case(model_name))
            .cloned()
            .ok_or_else(|| {
                EmbeddingError::InitializationError(format!(
                    "Unsupported model: {}. Supported: {}",
                    model_name,
                    supported_embedding_models().collect::<Vec<_>>().join(", ")
                ))
            })?;

        tracing::info!(
            "Initializing embedding model: {} ({}D, ~{}MB download if not cached)",
            name,
            dimension,
            model_size_mb
        );

        let init_options = InitOptions::new(embedding_model).with_show_download_progress(true);

        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: name.to_string(),
            dimension,
        })
    }

    /// Create provider with the default multilingual model
    pub fn with_default_model() -> Result<Self, EmbeddingError> {
        Self::new(DEFAULT_EMBEDDING_MODEL)
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<(), EmbeddingError> {
        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        Ok(())
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        let embedding = self
            .model
            .embed(vec![text.to_string()], None)
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::GenerationError("No embeddings generated".to_string()))?;

        self.check_dimension(&embedding)?;
        Ok(embedding)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // Output must stay aligned with the input, so empty texts are an error
        if let Some(pos) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::InvalidInput(format!(
                "Empty text at position {}",
                pos
            )));
        }

        let embeddings = self
            .model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;

        for embedding in &embeddings {
            self.check_dimension(embedding)?;
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[test]
    fn test_unsupported_model() {
        let result = FastEmbedProvider::new("no-such-model");
        assert!(matches!(
            result,
            Err(EmbeddingError::InitializationError(_))
        ));
    }

    #[test]
    fn test_supported_models_listed() {
        let names: Vec<_> = supported_embedding_models().collect();
        assert!(names.contains(&DEFAULT_EMBEDDING_MODEL));
    }

    #[test]
    #[ignore] // Requires model download (~450MB) - run with: cargo test -- --ignored
    fn test_single_embedding() {
        let provider = FastEmbedProvider::new("multilingual-e5-small").unwrap();
        let embedding = provider.embed("Чем занимается ПАО Транснефть?").unwrap();
        assert_eq!(embedding.len(), 384);

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 0.1);
    }

    #[test]
    #[ignore] // Requires model download (~450MB) - run with: cargo test -- --ignored
    fn test_batch_embedding_rejects_empty_text() {
        let provider = FastEmbedProvider::new("multilingual-e5-small").unwrap();
        let texts = vec!["нефть".to_string(), " ".to_string()];
        assert!(provider.embed_batch(&texts).is_err());
    }

    #[test]
    #[ignore] // Requires model download (~450MB) - run with: cargo test -- --ignored
    fn test_semantic_similarity() {
        let provider = FastEmbedProvider::new("multilingual-e5-small").unwrap();

        let a = provider.embed("Какая выручка компании?").unwrap();
        let b = provider.embed("Каков доход предприятия за год?").unwrap();
        let c = provider.embed("Рецепт борща со сметаной").unwrap();

        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
    }
}
