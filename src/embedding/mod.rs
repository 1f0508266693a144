/// Query embedding
///
/// - EmbeddingProvider trait for abstraction
/// - FastEmbedProvider for local embedding (multilingual E5 by default)
mod provider;

pub use provider::{
    supported_embedding_models, EmbeddingError, EmbeddingProvider, FastEmbedProvider,
    DEFAULT_EMBEDDING_MODEL,
};

/// Cosine similarity of two vectors, 0 when either has zero norm or the
/// lengths differ
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}
