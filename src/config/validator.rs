use crate::config::{Config, SCHEMA_VERSION};
use crate::error::{RagrankError, Result, ValidationError};
use crate::retrieval::FusionWeight;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, reporting every problem at once
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_models(config, &mut errors);
        Self::validate_index(config, &mut errors);
        Self::validate_cache(config, &mut errors);
        Self::validate_timeouts(config, &mut errors);
        Self::validate_corpus(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RagrankError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if let Err(e) = FusionWeight::new(retrieval.dense_weight, retrieval.lexical_weight) {
            errors.push(ValidationError::new(
                "retrieval.dense_weight",
                e.to_string(),
            ));
        }

        let threshold = retrieval.dedup_threshold;
        if !(threshold > 0.0 && threshold < 1.0) {
            errors.push(ValidationError::new(
                "retrieval.dedup_threshold",
                format!("Dedup threshold must be in (0, 1), got {}", threshold),
            ));
        }

        if retrieval.rerank_top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.rerank_top_k",
                "rerank_top_k must be greater than 0",
            ));
        }

        if retrieval.candidate_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.candidate_k",
                "candidate_k must be greater than 0",
            ));
        }

        if retrieval.search_multiplier == 0 {
            errors.push(ValidationError::new(
                "retrieval.search_multiplier",
                "search_multiplier must be greater than 0",
            ));
        }

        if !(-1.0..=1.0).contains(&retrieval.semantic_threshold) {
            errors.push(ValidationError::new(
                "retrieval.semantic_threshold",
                format!(
                    "Semantic threshold must be between -1.0 and 1.0, got {}",
                    retrieval.semantic_threshold
                ),
            ));
        }

        if !retrieval.min_rerank_score.is_finite() {
            errors.push(ValidationError::new(
                "retrieval.min_rerank_score",
                "min_rerank_score must be a finite number",
            ));
        }
    }

    fn validate_models(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.models.embedding_model.is_empty() {
            errors.push(ValidationError::new(
                "models.embedding_model",
                "Model name cannot be empty",
            ));
        }

        if config.models.reranker_model.is_empty() {
            errors.push(ValidationError::new(
                "models.reranker_model",
                "Model name cannot be empty",
            ));
        }
    }

    fn validate_index(config: &Config, errors: &mut Vec<ValidationError>) {
        let backend = &config.index.lexical_backend;
        if backend != "bm25" && backend != "tantivy" {
            errors.push(ValidationError::new(
                "index.lexical_backend",
                format!("Backend must be 'bm25' or 'tantivy', got '{}'", backend),
            ));
        }

        if backend == "tantivy" && config.index.tantivy_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "index.tantivy_dir",
                "Tantivy index directory cannot be empty",
            ));
        }

        let k1 = config.index.bm25_k1;
        if !(k1.is_finite() && k1 >= 0.0) {
            errors.push(ValidationError::new(
                "index.bm25_k1",
                format!("BM25 k1 must be a non-negative number, got {}", k1),
            ));
        }

        let b = config.index.bm25_b;
        if !(0.0..=1.0).contains(&b) {
            errors.push(ValidationError::new(
                "index.bm25_b",
                format!("BM25 b must be in [0, 1], got {}", b),
            ));
        }

        let weighting = &config.index.dedup_weighting;
        if weighting != "tf" && weighting != "tfidf" {
            errors.push(ValidationError::new(
                "index.dedup_weighting",
                format!("Weighting must be 'tf' or 'tfidf', got '{}'", weighting),
            ));
        }

        if config.index.hnsw_max_connections == 0 {
            errors.push(ValidationError::new(
                "index.hnsw_max_connections",
                "HNSW max_connections must be greater than 0",
            ));
        }

        if config.index.hnsw_ef_construction == 0 {
            errors.push(ValidationError::new(
                "index.hnsw_ef_construction",
                "HNSW ef_construction must be greater than 0",
            ));
        }

        if config.index.hnsw_ef_search == 0 {
            errors.push(ValidationError::new(
                "index.hnsw_ef_search",
                "HNSW ef_search must be greater than 0",
            ));
        }

        if config.index.embed_batch_size == 0 {
            errors.push(ValidationError::new(
                "index.embed_batch_size",
                "Batch size must be greater than 0",
            ));
        }
    }

    fn validate_cache(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.cache.enabled && config.cache.max_entries == 0 {
            errors.push(ValidationError::new(
                "cache.max_entries",
                "Cache bound must be greater than 0 when the cache is enabled",
            ));
        }

        if config.cache.enabled && config.cache.ttl_secs == 0 {
            errors.push(ValidationError::new(
                "cache.ttl_secs",
                "Cache TTL must be greater than 0 when the cache is enabled",
            ));
        }
    }

    fn validate_timeouts(config: &Config, errors: &mut Vec<ValidationError>) {
        let timeouts = &config.timeouts;
        for (key, value) in [
            ("timeouts.embedding_ms", timeouts.embedding_ms),
            ("timeouts.lexical_ms", timeouts.lexical_ms),
            ("timeouts.dense_ms", timeouts.dense_ms),
            ("timeouts.rerank_ms", timeouts.rerank_ms),
        ] {
            if value == 0 {
                errors.push(ValidationError::new(key, "Timeout must be greater than 0"));
            }
        }
    }

    fn validate_corpus(config: &Config, errors: &mut Vec<ValidationError>) {
        // Existence is checked when the corpus is loaded; paths may hold `~`
        if config.corpus.passages_file.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "corpus.passages_file",
                "Passages file path cannot be empty",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_paths(config: &Config) -> Vec<String> {
        match ConfigValidator::validate(config) {
            Err(RagrankError::ConfigValidation { errors }) => {
                errors.into_iter().map(|e| e.path).collect()
            }
            Ok(()) => Vec::new(),
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_errors_accumulate() {
        let mut config = Config::default();
        config.retrieval.dense_weight = 0.9;
        config.retrieval.dedup_threshold = 1.2;
        config.index.lexical_backend = "elastic".to_string();
        config.timeouts.rerank_ms = 0;

        let paths = error_paths(&config);
        assert_eq!(
            paths,
            vec![
                "retrieval.dense_weight",
                "retrieval.dedup_threshold",
                "index.lexical_backend",
                "timeouts.rerank_ms",
            ]
        );
    }

    #[test]
    fn test_schema_version() {
        let mut config = Config::default();
        config.meta.schema_version = "0.9.0".to_string();
        assert_eq!(error_paths(&config), vec!["_meta.schema_version"]);
    }

    #[test]
    fn test_bm25_parameters() {
        let mut config = Config::default();
        config.index.bm25_k1 = -1.0;
        config.index.bm25_b = 1.5;
        assert_eq!(error_paths(&config), vec!["index.bm25_k1", "index.bm25_b"]);

        config.index.bm25_k1 = 0.0;
        config.index.bm25_b = 0.0;
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_disabled_cache_may_be_unbounded() {
        let mut config = Config::default();
        config.cache.enabled = false;
        config.cache.max_entries = 0;
        assert!(ConfigValidator::validate(&config).is_ok());
    }
}
