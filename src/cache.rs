//! Bounded in-memory cache of retrieval outcomes
//!
//! Keys are blake3 hashes of the normalized question, the retrieval
//! configuration and the index generation, so neither a config change nor a
//! re-index ever serves a stale ranking.

use crate::retrieval::{RetrievalConfig, RetrievalError, RetrievalOutcome};
use crate::tokenize::normalize_question;
use moka::sync::Cache;
use std::time::Duration;

pub struct ResultCache {
    cache: Cache<String, RetrievalOutcome>,
}

impl ResultCache {
    /// Create a cache holding at most `max_entries` outcomes for `ttl`
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    /// Cache key for a question under a configuration and index generation
    pub fn key(
        question: &str,
        config: &RetrievalConfig,
        generation: u64,
    ) -> Result<String, RetrievalError> {
        let fingerprint = serde_json::to_string(config).map_err(|e| {
            RetrievalError::InvalidConfig(format!("cannot fingerprint retrieval config: {}", e))
        })?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(normalize_question(question).as_bytes());
        hasher.update(&[0]);
        hasher.update(fingerprint.as_bytes());
        hasher.update(&[0]);
        hasher.update(&generation.to_le_bytes());
        Ok(hasher.finalize().to_hex().to_string())
    }

    pub fn get(&self, key: &str) -> Option<RetrievalOutcome> {
        self.cache.get(key)
    }

    pub fn insert(&self, key: String, outcome: RetrievalOutcome) {
        self.cache.insert(key, outcome);
    }

    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refusal::{RefusalMessages, RefusalReason};

    fn outcome() -> RetrievalOutcome {
        RetrievalOutcome::Refused(
            RefusalMessages::default().refuse(RefusalReason::LowRelevance { best_score: -1.0 }),
        )
    }

    #[test]
    fn test_key_normalizes_question() {
        let config = RetrievalConfig::default();
        assert_eq!(
            ResultCache::key("  Выручка   Транснефти ", &config, 1).unwrap(),
            ResultCache::key("выручка транснефти", &config, 1).unwrap()
        );
    }

    #[test]
    fn test_key_depends_on_config() {
        let config = RetrievalConfig::default();
        let other = RetrievalConfig {
            dedup_threshold: 0.9,
            ..RetrievalConfig::default()
        };
        assert_ne!(
            ResultCache::key("выручка", &config, 1).unwrap(),
            ResultCache::key("выручка", &other, 1).unwrap()
        );
    }

    #[test]
    fn test_key_depends_on_generation() {
        let config = RetrievalConfig::default();
        assert_ne!(
            ResultCache::key("выручка", &config, 1).unwrap(),
            ResultCache::key("выручка", &config, 2).unwrap()
        );
    }

    #[test]
    fn test_non_finite_knobs_get_distinct_keys() {
        // serde_json writes non-finite floats as null, so every knob value
        // still yields its own fingerprint
        let nan = RetrievalConfig {
            min_fused_score: f32::NAN,
            ..RetrievalConfig::default()
        };
        let key = ResultCache::key("выручка", &nan, 1).unwrap();
        assert_ne!(key, ResultCache::key("выручка", &RetrievalConfig::default(), 1).unwrap());
        assert_eq!(key.len(), 64);
    }

    #[test]
    fn test_insert_and_get() {
        let cache = ResultCache::new(16, Duration::from_secs(60));
        let key = ResultCache::key("выручка", &RetrievalConfig::default(), 1).unwrap();
        cache.insert(key.clone(), outcome());
        assert!(cache.get(&key).is_some());
        assert!(cache.get("missing").is_none());
    }
}
