//! Composition root: builds models, indexes and the retrieval pipeline from
//! configuration

use crate::cache::ResultCache;
use crate::config::{expand_path, Config};
use crate::embedding::{EmbeddingProvider, FastEmbedProvider};
use crate::error::{RagrankError, Result};
use crate::gate::{GateRules, RelevanceGate, SemanticMatcher};
use crate::index::{
    load_passages, Bm25Index, Bm25Params, HnswIndex, HnswParams, IndexHandle, IndexSet, KeywordIndex,
    LexicalIndex, VectorIndex,
};
use crate::rerank::{CrossEncoder, FastEmbedCrossEncoder};
use crate::retrieval::{
    DenseRetriever, HybridSearcher, IdfTable, LexicalRetriever, Passage, Reranker,
    RetrievalPipeline,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Models shared by the pipeline and the indexer
#[derive(Clone)]
pub struct Models {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub cross_encoder: Option<Arc<dyn CrossEncoder>>,
}

impl Models {
    /// Load the configured fastembed models. Downloads on first use.
    pub fn load(config: &Config) -> Result<Self> {
        let embedder = FastEmbedProvider::new(&config.models.embedding_model)
            .map_err(anyhow::Error::from)?;

        let cross_encoder: Option<Arc<dyn CrossEncoder>> = if config.retrieval.enable_reranking {
            let encoder = FastEmbedCrossEncoder::new(&config.models.reranker_model)
                .map_err(anyhow::Error::from)?;
            Some(Arc::new(encoder))
        } else {
            None
        };

        Ok(Self {
            embedder: Arc::new(embedder),
            cross_encoder,
        })
    }
}

/// Everything the online path needs, wired together
pub struct Services {
    pub pipeline: RetrievalPipeline,
    config: Config,
    models: Models,
    /// Serializes re-indexing so generations are installed in order
    reindexing: Mutex<()>,
}

impl Services {
    /// Load the corpus named in the configuration, index it and build the
    /// pipeline
    pub async fn build(config: Config, models: Models) -> Result<Self> {
        let passages = load_corpus(&config)?;
        Self::from_passages(config, models, passages).await
    }

    /// Build indexes and the pipeline over the given passages
    pub async fn from_passages(config: Config, models: Models, passages: Vec<Passage>) -> Result<Self> {
        let indexes = build_index_set(&config, &models, passages, 1).await?;
        let indexes = Arc::new(IndexHandle::new(Arc::new(indexes)));

        let gate = build_gate(&config, Some(Arc::clone(&models.embedder))).await?;
        let timeouts = &config.timeouts;

        let searcher = HybridSearcher::new(
            LexicalRetriever::new(timeouts.lexical()),
            DenseRetriever::new(
                Arc::clone(&models.embedder),
                timeouts.embedding(),
                timeouts.dense(),
            ),
        );

        let mut pipeline = RetrievalPipeline::new(gate, indexes, searcher)
            .with_refusal_messages(config.gate.messages.clone());

        if let Some(encoder) = &models.cross_encoder {
            pipeline = pipeline.with_reranker(Reranker::new(Arc::clone(encoder), timeouts.rerank()));
        }

        if config.cache.enabled {
            pipeline = pipeline.with_cache(ResultCache::new(config.cache.max_entries, config.cache.ttl()));
        }

        Ok(Self {
            pipeline,
            config,
            models,
            reindexing: Mutex::new(()),
        })
    }

    /// Generation and passage count of the index set new queries will use
    pub async fn current_index(&self) -> (u64, usize) {
        match self.pipeline.indexes().snapshot().await {
            Some(set) => (set.generation, set.passage_count()),
            None => (0, 0),
        }
    }

    /// Re-index a new corpus and return the generation that now serves
    /// queries.
    ///
    /// Both indexes and the IDF table are rebuilt off-lock and installed as
    /// one set; in-flight queries finish on the set they started with.
    pub async fn reindex(&self, passages: Vec<Passage>) -> Result<u64> {
        let _guard = self.reindexing.lock().await;
        let (current, _) = self.current_index().await;
        let generation = current + 1;

        let set = build_index_set(&self.config, &self.models, passages, generation).await?;
        self.pipeline.indexes().replace(Arc::new(set)).await;

        // Entries of older generations can no longer be hit; drop them early
        if let Some(cache) = self.pipeline.cache() {
            cache.clear();
        }
        tracing::info!(generation, "Re-index complete");
        Ok(generation)
    }
}

fn load_corpus(config: &Config) -> Result<Vec<Passage>> {
    let corpus_path = expand_path(&config.corpus.passages_file)?;
    let passages = load_passages(&corpus_path)?;
    tracing::info!("Loaded {} passages from {:?}", passages.len(), corpus_path);
    Ok(passages)
}

/// Build the relevance gate. The semantic check is attached only when an
/// embedder is given and the configuration asks for it.
pub async fn build_gate(
    config: &Config,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
) -> Result<RelevanceGate> {
    let rules_path = config
        .gate
        .rules_file
        .as_deref()
        .map(expand_path)
        .transpose()?;
    let rules = GateRules::load_or_default(rules_path.as_deref())?;
    let gate = RelevanceGate::new(&rules)?;

    match embedder {
        Some(embedder) if config.retrieval.use_semantic_gate => {
            let references = rules.reference_queries.clone();
            let timeout = config.timeouts.embedding();
            let matcher = tokio::task::spawn_blocking(move || {
                SemanticMatcher::new(embedder, &references, timeout)
            })
            .await
            .map_err(|e| RagrankError::Other(anyhow::anyhow!("Gate setup task failed: {}", e)))?
            .map_err(anyhow::Error::from)?;
            Ok(gate.with_semantic(matcher))
        }
        _ => Ok(gate),
    }
}

async fn build_index_set(
    config: &Config,
    models: &Models,
    passages: Vec<Passage>,
    generation: u64,
) -> Result<IndexSet> {
    let backend = config.index.lexical_backend.clone();
    let bm25 = config.index.bm25_params();
    let tantivy_dir = expand_path(&config.index.tantivy_dir)?;
    let batch_size = config.index.embed_batch_size;
    let params = config.index.hnsw_params();
    let tfidf = config.index.dedup_weighting == "tfidf";
    let embedder = Arc::clone(&models.embedder);

    let set = tokio::task::spawn_blocking(move || {
        let dedup_idf = tfidf.then(|| IdfTable::from_passages(passages.iter()));
        // Each generation writes its own tantivy directory; the previous one
        // may still be read by in-flight queries
        let tantivy_dir = tantivy_dir.join(format!("generation-{}", generation));
        let lexical = build_lexical(&backend, bm25, tantivy_dir, &passages)?;
        let vector = build_vector(embedder.as_ref(), passages, batch_size, params)?;

        let mut set = IndexSet::new(generation)
            .with_lexical(lexical)
            .with_vector(vector);
        if let Some(idf) = dedup_idf {
            tracing::debug!("Built IDF table with {} terms", idf.len());
            set = set.with_dedup_idf(idf);
        }
        Ok::<_, RagrankError>(set)
    })
    .await
    .map_err(|e| RagrankError::Other(anyhow::anyhow!("Indexing task failed: {}", e)))??;

    tracing::info!(
        generation,
        passages = set.passage_count(),
        "Built index set"
    );
    Ok(set)
}

fn build_lexical(
    backend: &str,
    bm25: Bm25Params,
    tantivy_dir: PathBuf,
    passages: &[Passage],
) -> Result<Arc<dyn LexicalIndex>> {
    if backend == "tantivy" {
        let index = KeywordIndex::build(&tantivy_dir, passages).map_err(anyhow::Error::from)?;
        tracing::info!("Serving tantivy index from {:?}", index.path());
        Ok(Arc::new(index))
    } else {
        tracing::info!("Built in-memory BM25 index over {} passages", passages.len());
        Ok(Arc::new(Bm25Index::with_params(passages.to_vec(), bm25)))
    }
}

/// Embed passages in batches and build the HNSW index
pub fn build_vector(
    embedder: &dyn EmbeddingProvider,
    passages: Vec<Passage>,
    batch_size: usize,
    params: HnswParams,
) -> Result<Arc<dyn VectorIndex>> {
    let mut vectors = Vec::with_capacity(passages.len());

    for (i, batch) in passages.chunks(batch_size.max(1)).enumerate() {
        let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();
        let embeddings = embedder.embed_batch(&texts).map_err(anyhow::Error::from)?;
        vectors.extend(embeddings);
        tracing::debug!("Embedded batch {} ({} passages)", i + 1, batch.len());
    }

    let index = HnswIndex::build(passages, vectors, params).map_err(anyhow::Error::from)?;
    tracing::info!("Built HNSW index over {} passages", index.len());
    Ok(Arc::new(index))
}
