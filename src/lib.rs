//! ragrank - hybrid retrieval and ranking for document question answering
//!
//! A question first passes a layered relevance gate. Accepted questions are
//! searched concurrently against a dense (HNSW) and a lexical (BM25) index;
//! the candidates are fused, deduplicated and reranked by a cross-encoder.
//! The evaluation module measures ranking quality offline with NDCG, MRR
//! and MAP.

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod evaluation;
pub mod gate;
pub mod index;
pub mod refusal;
pub mod rerank;
pub mod retrieval;
pub mod tokenize;

pub use error::{RagrankError, Result};
