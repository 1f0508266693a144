//! Index abstractions consumed by the retrieval core
//!
//! The core never builds or persists indexes for production use; ingestion
//! does. These traits are the narrow surface the adapters query:
//! - `LexicalIndex` for term-overlap (BM25) search over the whole corpus
//! - `VectorIndex` for nearest-neighbour search over passage embeddings
//! - `PassageStore` to hydrate ids back into passages
//!
//! `IndexSet` bundles everything built from one corpus, and an
//! `IndexHandle<IndexSet>` holds the current set so that re-indexing never
//! exposes a half-built or mixed structure to in-flight queries.

mod bm25;
mod corpus;
mod keyword;
mod vector;

pub use bm25::{Bm25Index, Bm25Params};
pub use corpus::{load_passages, parse_passages};
pub use keyword::KeywordIndex;
pub use vector::{HnswIndex, HnswParams};

use crate::retrieval::{IdfTable, Passage};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Index initialization failed: {0}")]
    InitializationError(String),

    #[error("Index not built: {0}")]
    NotBuilt(String),

    #[error("Insert failed: {0}")]
    InsertError(String),

    #[error("Search failed: {0}")]
    SearchError(String),

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Tantivy error: {0}")]
    TantivyError(#[from] tantivy::TantivyError),
}

/// Lookup of passages by id
pub trait PassageStore: Send + Sync {
    /// Fetch passages for the given ids. Unknown ids are skipped; the order of
    /// the result follows `ids`.
    fn get(&self, ids: &[String]) -> Result<Vec<Passage>, IndexError>;
}

/// Term-frequency ranking structure over the full corpus
pub trait LexicalIndex: PassageStore {
    /// Score passages against already tokenized query terms.
    ///
    /// Returns `(passage_id, score)` pairs with non-negative, unbounded scores,
    /// sorted by score descending.
    fn search(&self, tokens: &[String], k: usize) -> Result<Vec<(String, f32)>, IndexError>;

    /// Number of indexed passages
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Nearest-neighbour search over passage embeddings
pub trait VectorIndex: PassageStore {
    /// Return `(passage_id, cosine_similarity)` pairs sorted by similarity
    /// descending.
    fn search(&self, vector: &[f32], k: usize) -> Result<Vec<(String, f32)>, IndexError>;

    /// Vector dimension
    fn dimension(&self) -> usize;

    /// Number of indexed vectors
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The lexical index, the vector index and the deduplication IDF table built
/// from one corpus, tagged with the generation that built them.
///
/// A query reads every index from the same set, so it never combines results
/// from two corpora. Either index may be missing; the retrieval side that
/// needs it then reports `IndexUnavailable`.
#[derive(Clone, Default)]
pub struct IndexSet {
    pub lexical: Option<Arc<dyn LexicalIndex>>,
    pub vector: Option<Arc<dyn VectorIndex>>,
    pub dedup_idf: Option<Arc<IdfTable>>,
    pub generation: u64,
}

impl IndexSet {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            ..Self::default()
        }
    }

    pub fn with_lexical(mut self, index: Arc<dyn LexicalIndex>) -> Self {
        self.lexical = Some(index);
        self
    }

    pub fn with_vector(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector = Some(index);
        self
    }

    pub fn with_dedup_idf(mut self, idf: IdfTable) -> Self {
        self.dedup_idf = Some(Arc::new(idf));
        self
    }

    /// Passages behind the lexical index, or the vector index when there is
    /// no lexical one
    pub fn passage_count(&self) -> usize {
        match (&self.lexical, &self.vector) {
            (Some(lexical), _) => lexical.len(),
            (None, Some(vector)) => vector.len(),
            (None, None) => 0,
        }
    }
}

/// Shared, swappable reference to the current index snapshot.
///
/// Readers clone the inner `Arc` under a short read lock and then query
/// without holding any lock. A rebuilt index is installed with [`replace`],
/// which waits for the brief read sections to finish; queries that already
/// took a snapshot keep using the previous index until they complete.
///
/// [`replace`]: IndexHandle::replace
pub struct IndexHandle<T: ?Sized> {
    current: RwLock<Option<Arc<T>>>,
}

impl<T: ?Sized> IndexHandle<T> {
    /// Handle with no index installed yet
    pub fn empty() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    /// Handle serving the given index
    pub fn new(index: Arc<T>) -> Self {
        Self {
            current: RwLock::new(Some(index)),
        }
    }

    /// Current snapshot, or `None` if nothing has been installed
    pub async fn snapshot(&self) -> Option<Arc<T>> {
        self.current.read().await.clone()
    }

    /// Install a new index and return the previous one
    pub async fn replace(&self, index: Arc<T>) -> Option<Arc<T>> {
        let mut guard = self.current.write().await;
        tracing::info!("Installing rebuilt index snapshot");
        guard.replace(index)
    }

    /// Remove the installed index
    pub async fn clear(&self) -> Option<Arc<T>> {
        self.current.write().await.take()
    }
}

impl<T: ?Sized> Default for IndexHandle<T> {
    fn default() -> Self {
        Self::empty()
    }
}
