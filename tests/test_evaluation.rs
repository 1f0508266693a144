//! Ranking metrics over logged runs and benchmark files

use proptest::prelude::*;
use ragrank::evaluation::{
    average_precision, load_benchmark, ndcg_at_k, reciprocal_rank, BenchmarkReport, RunLog,
};
use std::collections::BTreeSet;
use tempfile::TempDir;

fn ids(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_run_log_metrics() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("runs.json");
    std::fs::write(
        &path,
        r#"{
            "ground_truth": {"q1": ["d1", "d2"], "q2": ["d9"], "q3": ["d4"]},
            "runs": {"q1": ["d3", "d1", "d2"], "q2": ["d9", "d8"]}
        }"#,
    )
    .unwrap();

    let metrics = RunLog::load(&path).unwrap().evaluate(3);

    // q1: NDCG 0.6934, RR 1/2, AP (1/2 + 2/3) / 2; q2 perfect; q3 absent
    let expected_ndcg = (0.693_426_4 + 1.0) / 3.0;
    assert!((metrics.ndcg - expected_ndcg).abs() < 1e-4);
    assert!((metrics.mrr - 0.5).abs() < 1e-12);
    let expected_map = ((0.5 + 2.0 / 3.0) / 2.0 + 1.0) / 3.0;
    assert!((metrics.map - expected_map).abs() < 1e-12);
}

#[test]
fn test_run_log_rejects_malformed_json() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("runs.json");
    std::fs::write(&path, r#"{"ground_truth": ["q1"]}"#).unwrap();
    assert!(RunLog::load(&path).is_err());
}

#[test]
fn test_benchmark_formats() {
    let temp = TempDir::new().unwrap();

    let list = temp.path().join("list.json");
    std::fs::write(
        &list,
        r#"[{"question": "Какая выручка?"}, {"question_id": "gov", "question": "Кто директор?", "relevant_docs": ["governance"]}]"#,
    )
    .unwrap();
    let questions = load_benchmark(&list).unwrap();
    assert_eq!(questions[0].question_id.as_deref(), Some("q1"));
    assert_eq!(questions[1].question_id.as_deref(), Some("gov"));
    assert_eq!(questions[1].relevant_docs, vec!["governance"]);

    let wrapped = temp.path().join("wrapped.json");
    std::fs::write(&wrapped, r#"{"questions": [{"question": "Где объекты?"}]}"#).unwrap();
    assert_eq!(load_benchmark(&wrapped).unwrap().len(), 1);

    let unknown = temp.path().join("unknown.json");
    std::fs::write(&unknown, r#"{"items": []}"#).unwrap();
    assert!(load_benchmark(&unknown).is_err());
}

#[test]
fn test_empty_report_writes_json() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("report.json");

    let report = BenchmarkReport::from_questions(Vec::new(), &Default::default());
    report.write(&path).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["ndcg@5"], 0.0);
    assert_eq!(json["questions"], 0);
}

fn ranking() -> impl Strategy<Value = (BTreeSet<String>, Vec<String>)> {
    (
        proptest::collection::btree_set("d[0-9]", 0..6),
        proptest::collection::vec("d[0-9]", 0..12),
    )
}

proptest! {
    #[test]
    fn prop_metrics_are_bounded((relevant, retrieved) in ranking(), k in 1usize..15) {
        for value in [
            ndcg_at_k(&relevant, &retrieved, k),
            reciprocal_rank(&relevant, &retrieved, k),
            average_precision(&relevant, &retrieved, k),
        ] {
            prop_assert!((0.0..=1.0 + 1e-9).contains(&value));
        }
    }

    #[test]
    fn prop_relevant_first_is_perfect((relevant, retrieved) in ranking(), k in 1usize..15) {
        let mut ordered: Vec<String> = retrieved.iter().filter(|d| relevant.contains(*d)).cloned().collect();
        ordered.extend(retrieved.iter().filter(|d| !relevant.contains(*d)).cloned());

        let hit = ordered.iter().take(k).any(|d| relevant.contains(d));
        let expected = if hit { 1.0 } else { 0.0 };
        prop_assert!((ndcg_at_k(&relevant, &ordered, k) - expected).abs() < 1e-9);
        prop_assert_eq!(reciprocal_rank(&relevant, &ordered, k), expected);
    }
}

#[test]
fn test_ndcg_example() {
    let relevant: BTreeSet<String> = ids(&["d1", "d2"]).into_iter().collect();
    let score = ndcg_at_k(&relevant, &ids(&["d3", "d1", "d2"]), 3);
    assert!((score - 0.6934).abs() < 1e-4);
}
