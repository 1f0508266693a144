//! Relevance gate driven by rule files on disk

use proptest::prelude::*;
use ragrank::config::Config;
use ragrank::gate::{GateRules, ReasonCode, RelevanceGate, Severity};
use ragrank::index::Bm25Params;
use std::path::PathBuf;
use tempfile::TempDir;

fn template(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("config-templates")
        .join(name)
}

#[test]
fn test_shipped_rules_match_builtin_defaults() {
    let rules = GateRules::load(&template("gate_rules.toml")).unwrap();
    assert_eq!(rules, GateRules::default());
}

#[test]
fn test_shipped_config_template_is_valid() {
    let config = Config::load(&template("config.toml")).unwrap();
    assert_eq!(config.retrieval.rerank_top_k, 3);
    assert_eq!(config.index.lexical_backend, "bm25");
    assert_eq!(config.index.bm25_params(), Bm25Params::default());
}

#[test]
fn test_custom_rule_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("gate_rules.toml");
    std::fs::write(
        &path,
        r#"
toxic_patterns = ['drop\s+table']
business_keywords = ["тариф"]
question_words = ["какой"]

[[blacklist]]
name = "музыка"
keywords = ["концерт", "песня"]

[[blacklist]]
name = "погода"
keywords = ["погода"]
"#,
    )
    .unwrap();

    let gate = RelevanceGate::new(&GateRules::load(&path).unwrap()).unwrap();

    let decision = gate.evaluate_lexical("Когда концерт, если погода плохая?");
    assert!(!decision.accepted);
    assert_eq!(decision.reason, ReasonCode::Blacklist("музыка".to_string()));

    let decision = gate.evaluate_lexical("please DROP  TABLE passages");
    assert_eq!(decision.reason, ReasonCode::ToxicPattern);
    assert_eq!(decision.severity, Severity::Critical);

    let decision = gate.evaluate_lexical("Тарифы на прокачку нефти");
    assert!(decision.accepted);
    assert_eq!(decision.reason, ReasonCode::BusinessKeywords);

    // Not a question and no keyword
    let decision = gate.evaluate_lexical("Расскажи про облака");
    assert_eq!(decision.reason, ReasonCode::NoKeywords);
}

#[tokio::test]
async fn test_semantic_request_without_matcher_checks_format_only() {
    let gate = RelevanceGate::new(&GateRules::default()).unwrap();
    let decision = gate
        .evaluate("Где находятся объекты?", true, 0.4)
        .await
        .unwrap();
    assert!(decision.accepted);
    assert_eq!(decision.reason, ReasonCode::ValidQuestionFormat);
    assert!(decision.score.is_none());
}

proptest! {
    #[test]
    fn prop_gate_is_deterministic(question in "\\PC{0,40}") {
        let gate = RelevanceGate::new(&GateRules::default()).unwrap();
        prop_assert_eq!(gate.evaluate_lexical(&question), gate.evaluate_lexical(&question));
    }

    #[test]
    fn prop_weather_keyword_is_blacklisted(prefix in "[a-h ]{0,20}", suffix in "[a-h ]{0,20}") {
        let gate = RelevanceGate::new(&GateRules::default()).unwrap();
        let question = format!("{} погода {}", prefix, suffix);
        let decision = gate.evaluate_lexical(&question);
        prop_assert!(!decision.accepted);
        prop_assert_eq!(decision.reason, ReasonCode::Blacklist("погода".to_string()));
        prop_assert_eq!(decision.severity, Severity::High);
    }
}
