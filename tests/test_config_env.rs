//! Environment overrides on the no-file configuration path
//!
//! Kept in its own test binary: it sets process-wide environment variables.

use ragrank::config::Config;
use ragrank::error::RagrankError;
use tempfile::TempDir;

#[test]
fn test_defaults_with_bad_env_override_are_rejected() {
    let temp = TempDir::new().unwrap();
    let absent = temp.path().join("absent.toml");

    std::env::set_var("RAGRANK_RETRIEVAL__DEDUP_THRESHOLD", "1.5");
    let result = Config::load_or_default(&absent);
    std::env::remove_var("RAGRANK_RETRIEVAL__DEDUP_THRESHOLD");

    match result {
        Err(RagrankError::ConfigValidation { errors }) => {
            assert!(errors.iter().any(|e| e.path == "retrieval.dedup_threshold"));
        }
        other => panic!("expected a validation error, got {:?}", other.map(|_| ())),
    }

    std::env::set_var("RAGRANK_RETRIEVAL__RERANK_TOP_K", "5");
    let config = Config::load_or_default(&absent).unwrap();
    std::env::remove_var("RAGRANK_RETRIEVAL__RERANK_TOP_K");
    assert_eq!(config.retrieval.rerank_top_k, 5);
}
