//! Configuration management for ragrank
//!
//! Configuration is a TOML file (by default `~/.config/ragrank/config.toml`)
//! with environment overrides of the form `RAGRANK_SECTION__KEY=value`.

use crate::error::{RagrankError, Result};
use crate::index::{Bm25Params, HnswParams};
use crate::refusal::RefusalMessages;
use crate::retrieval::RetrievalConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

mod validator;

pub use validator::ConfigValidator;

/// Schema version this build understands
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    pub models: ModelsConfig,
    pub index: IndexConfig,
    #[serde(default)]
    pub gate: GateConfig,
    pub cache: CacheConfig,
    pub timeouts: TimeoutsConfig,
    pub corpus: CorpusConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Embedding and cross-encoder models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub embedding_model: String,
    pub reranker_model: String,
}

/// Index construction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// "bm25" (in memory) or "tantivy" (on disk)
    pub lexical_backend: String,
    /// Directory of the tantivy index
    pub tantivy_dir: PathBuf,
    pub hnsw_max_connections: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_ef_search: usize,
    /// BM25 term frequency saturation for the in-memory backend
    #[serde(default = "default_bm25_k1")]
    pub bm25_k1: f32,
    /// BM25 length normalization, 0 disables it
    #[serde(default = "default_bm25_b")]
    pub bm25_b: f32,
    /// Deduplicator term weighting: "tf" or "tfidf"
    pub dedup_weighting: String,
    /// Passages embedded per model call while indexing
    pub embed_batch_size: usize,
}

fn default_bm25_k1() -> f32 {
    Bm25Params::default().k1
}

fn default_bm25_b() -> f32 {
    Bm25Params::default().b
}

impl IndexConfig {
    pub fn bm25_params(&self) -> Bm25Params {
        Bm25Params {
            k1: self.bm25_k1,
            b: self.bm25_b,
            ..Bm25Params::default()
        }
    }

    pub fn hnsw_params(&self) -> HnswParams {
        HnswParams {
            max_connections: self.hnsw_max_connections,
            ef_construction: self.hnsw_ef_construction,
            ef_search: self.hnsw_ef_search,
        }
    }
}

/// Relevance gate settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    /// Gate rule file; built-in rules when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_file: Option<PathBuf>,
    #[serde(default)]
    pub messages: RefusalMessages,
}

/// Result cache bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: u64,
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Deadlines for blocking stages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    pub embedding_ms: u64,
    pub lexical_ms: u64,
    pub dense_ms: u64,
    pub rerank_ms: u64,
}

impl TimeoutsConfig {
    pub fn embedding(&self) -> Duration {
        Duration::from_millis(self.embedding_ms)
    }

    pub fn lexical(&self) -> Duration {
        Duration::from_millis(self.lexical_ms)
    }

    pub fn dense(&self) -> Duration {
        Duration::from_millis(self.dense_ms)
    }

    pub fn rerank(&self) -> Duration {
        Duration::from_millis(self.rerank_ms)
    }
}

/// Passage source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// JSONL file with one passage per line
    pub passages_file: PathBuf,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RagrankError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| RagrankError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let config: Config = toml::from_str(&content)?;

        config.with_env_overrides()
    }

    /// Load `path` if it exists, otherwise start from the defaults.
    /// Environment overrides and validation apply either way.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }

        tracing::warn!(
            "Config file not found, using defaults. Run 'ragrank config init' to create one."
        );
        Self::default().with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Result<Self> {
        self.apply_env_overrides();
        ConfigValidator::validate(&self)?;
        Ok(self)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| RagrankError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: RAGRANK_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("RAGRANK_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    pub(crate) fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "RETRIEVAL__DENSE_WEIGHT" => self.retrieval.dense_weight = parse(path, value)?,
            "RETRIEVAL__LEXICAL_WEIGHT" => self.retrieval.lexical_weight = parse(path, value)?,
            "RETRIEVAL__DEDUP_THRESHOLD" => self.retrieval.dedup_threshold = parse(path, value)?,
            "RETRIEVAL__RERANK_TOP_K" => self.retrieval.rerank_top_k = parse(path, value)?,
            "RETRIEVAL__MIN_RERANK_SCORE" => self.retrieval.min_rerank_score = parse(path, value)?,
            "RETRIEVAL__SEMANTIC_THRESHOLD" => {
                self.retrieval.semantic_threshold = parse(path, value)?
            }
            "RETRIEVAL__CANDIDATE_K" => self.retrieval.candidate_k = parse(path, value)?,
            "RETRIEVAL__ADAPTIVE_CANDIDATES" => {
                self.retrieval.adaptive_candidates = parse(path, value)?
            }
            "RETRIEVAL__ENABLE_RERANKING" => self.retrieval.enable_reranking = parse(path, value)?,
            "RETRIEVAL__USE_SEMANTIC_GATE" => {
                self.retrieval.use_semantic_gate = parse(path, value)?
            }
            "MODELS__EMBEDDING_MODEL" => self.models.embedding_model = value.to_string(),
            "MODELS__RERANKER_MODEL" => self.models.reranker_model = value.to_string(),
            "INDEX__LEXICAL_BACKEND" => self.index.lexical_backend = value.to_string(),
            "INDEX__BM25_K1" => self.index.bm25_k1 = parse(path, value)?,
            "INDEX__BM25_B" => self.index.bm25_b = parse(path, value)?,
            "CACHE__ENABLED" => self.cache.enabled = parse(path, value)?,
            "CORPUS__PASSAGES_FILE" => self.corpus.passages_file = PathBuf::from(value),
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| RagrankError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("ragrank").join("config.toml"))
    }
}

fn parse<T: FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| RagrankError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

/// Expand a leading `~/` to the home directory
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| RagrankError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| RagrankError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = PathBuf::from("~/.ragrank");

        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            retrieval: RetrievalConfig::default(),
            models: ModelsConfig {
                embedding_model: crate::embedding::DEFAULT_EMBEDDING_MODEL.to_string(),
                reranker_model: crate::rerank::DEFAULT_RERANKER_MODEL.to_string(),
            },
            index: IndexConfig {
                lexical_backend: "bm25".to_string(),
                tantivy_dir: data_dir.join("tantivy"),
                hnsw_max_connections: 16,
                hnsw_ef_construction: 200,
                hnsw_ef_search: 64,
                bm25_k1: default_bm25_k1(),
                bm25_b: default_bm25_b(),
                dedup_weighting: "tf".to_string(),
                embed_batch_size: 32,
            },
            gate: GateConfig::default(),
            cache: CacheConfig {
                enabled: true,
                max_entries: 1024,
                ttl_secs: 3600,
            },
            timeouts: TimeoutsConfig {
                embedding_ms: 10_000,
                lexical_ms: 5_000,
                dense_ms: 5_000,
                rerank_ms: 30_000,
            },
            corpus: CorpusConfig {
                passages_file: data_dir.join("passages.jsonl"),
            },
        }
    }
}
