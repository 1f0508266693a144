//! Infrastructure failures of the online retrieval path
//!
//! Relevance refusals are not errors; they travel as
//! [`RetrievalOutcome::Refused`](crate::retrieval::RetrievalOutcome).

use crate::embedding::EmbeddingError;
use crate::index::IndexError;
use crate::rerank::RerankError;
use std::fmt;
use thiserror::Error;

/// Pipeline stage, used to attribute timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Embedding,
    Lexical,
    Dense,
    Rerank,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Embedding => "embedding",
            Stage::Lexical => "lexical",
            Stage::Dense => "dense",
            Stage::Rerank => "rerank",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The index for one retrieval side is not built or failed to answer
    #[error("Index unavailable ({side}): {message}")]
    IndexUnavailable { side: Stage, message: String },

    /// Query encoding failed
    #[error("Embedding service error: {0}")]
    EmbeddingService(String),

    /// Cross-encoder failed
    #[error("Reranker error: {0}")]
    Reranker(String),

    /// A blocking stage exceeded its deadline
    #[error("Stage {stage} timed out after {millis}ms")]
    Timeout { stage: Stage, millis: u64 },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid retrieval config: {0}")]
    InvalidConfig(String),
}

/// Message shown to end users for any infrastructure failure
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Извините, сервис временно недоступен. Пожалуйста, попробуйте ещё раз позже.";

impl RetrievalError {
    pub fn index_unavailable(side: Stage, err: impl fmt::Display) -> Self {
        Self::IndexUnavailable {
            side,
            message: err.to_string(),
        }
    }

    /// True for failures of a collaborator (index, embedding model,
    /// cross-encoder), as opposed to a malformed request
    pub fn is_infrastructure(&self) -> bool {
        !matches!(self, Self::InvalidQuery(_) | Self::InvalidConfig(_))
    }

    /// Failure of one retrieval side's index, after which the other side can
    /// still answer
    pub fn is_index_failure(&self) -> bool {
        matches!(
            self,
            Self::IndexUnavailable { .. }
                | Self::Timeout {
                    stage: Stage::Lexical | Stage::Dense,
                    ..
                }
        )
    }

    /// Stage the failure belongs to, if any. Timeouts map to the stage that
    /// timed out.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::IndexUnavailable { side, .. } => Some(*side),
            Self::EmbeddingService(_) => Some(Stage::Embedding),
            Self::Reranker(_) => Some(Stage::Rerank),
            Self::Timeout { stage, .. } => Some(*stage),
            Self::InvalidQuery(_) | Self::InvalidConfig(_) => None,
        }
    }

    /// Polite text for end users; never exposes internal details
    pub fn user_message(&self) -> &'static str {
        GENERIC_FAILURE_MESSAGE
    }
}

impl From<EmbeddingError> for RetrievalError {
    fn from(err: EmbeddingError) -> Self {
        Self::EmbeddingService(err.to_string())
    }
}

impl From<RerankError> for RetrievalError {
    fn from(err: RerankError) -> Self {
        Self::Reranker(err.to_string())
    }
}

impl From<(Stage, IndexError)> for RetrievalError {
    fn from((side, err): (Stage, IndexError)) -> Self {
        Self::index_unavailable(side, err)
    }
}
