//! Binary-relevance ranking metrics
//!
//! All metrics look at the top `k` retrieved ids only. Means are taken over
//! the query ids of the ground truth; a query missing from the run counts as
//! an empty retrieval, and an empty ground truth yields 0.

use crate::error::{RagrankError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

/// Query id to the ids of its relevant passages
pub type GroundTruthSet = BTreeMap<String, BTreeSet<String>>;

/// Query id to the retrieved ids in rank order
pub type RetrievalRun = BTreeMap<String, Vec<String>>;

/// Discounted cumulative gain of a relevance list
///
/// DCG@K = Σ rel_i / log2(i + 1) for ranks i in 1..=K
pub fn dcg_at_k(relevances: &[f64], k: usize) -> f64 {
    relevances
        .iter()
        .take(k)
        .enumerate()
        .map(|(i, rel)| rel / (i as f64 + 2.0).log2())
        .sum()
}

/// Normalized DCG of one query.
///
/// The ideal DCG comes from re-ordering the retrieved top-k, so relevant ids
/// that were never retrieved do not lower the score.
pub fn ndcg_at_k(relevant: &BTreeSet<String>, retrieved: &[String], k: usize) -> f64 {
    let relevances: Vec<f64> = retrieved
        .iter()
        .take(k)
        .map(|id| if relevant.contains(id) { 1.0 } else { 0.0 })
        .collect();

    let mut ideal = relevances.clone();
    ideal.sort_by(|a, b| b.total_cmp(a));

    let idcg = dcg_at_k(&ideal, k);
    if idcg > 0.0 {
        dcg_at_k(&relevances, k) / idcg
    } else {
        0.0
    }
}

/// 1 / rank of the first relevant id in the top `k`, 0 if none
pub fn reciprocal_rank(relevant: &BTreeSet<String>, retrieved: &[String], k: usize) -> f64 {
    retrieved
        .iter()
        .take(k)
        .position(|id| relevant.contains(id))
        .map(|i| 1.0 / (i as f64 + 1.0))
        .unwrap_or(0.0)
}

/// Average precision over the hits in the top `k`.
///
/// Divides by the number of hits rather than the number of relevant ids, so
/// a run with a single early hit scores 1 however many relevant ids exist.
pub fn average_precision(relevant: &BTreeSet<String>, retrieved: &[String], k: usize) -> f64 {
    let mut hits = 0.0;
    let mut precision_sum = 0.0;

    for (i, id) in retrieved.iter().take(k).enumerate() {
        if relevant.contains(id) {
            hits += 1.0;
            precision_sum += hits / (i as f64 + 1.0);
        }
    }

    if hits > 0.0 {
        precision_sum / hits
    } else {
        0.0
    }
}

fn mean_over_queries<F>(truth: &GroundTruthSet, runs: &RetrievalRun, metric: F) -> f64
where
    F: Fn(&BTreeSet<String>, &[String]) -> f64,
{
    if truth.is_empty() {
        return 0.0;
    }

    let total: f64 = truth
        .iter()
        .map(|(qid, relevant)| {
            let retrieved = runs.get(qid).map(Vec::as_slice).unwrap_or(&[]);
            metric(relevant, retrieved)
        })
        .sum();

    total / truth.len() as f64
}

pub fn mrr_at_k(truth: &GroundTruthSet, runs: &RetrievalRun, k: usize) -> f64 {
    mean_over_queries(truth, runs, |rel, ret| reciprocal_rank(rel, ret, k))
}

pub fn map_at_k(truth: &GroundTruthSet, runs: &RetrievalRun, k: usize) -> f64 {
    mean_over_queries(truth, runs, |rel, ret| average_precision(rel, ret, k))
}

pub fn ndcg_mean_at_k(truth: &GroundTruthSet, runs: &RetrievalRun, k: usize) -> f64 {
    mean_over_queries(truth, runs, |rel, ret| ndcg_at_k(rel, ret, k))
}

/// Aggregated ranking quality at one cut-off
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RankingMetrics {
    pub ndcg: f64,
    pub mrr: f64,
    pub map: f64,
}

impl fmt::Display for RankingMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  NDCG: {:.4}", self.ndcg)?;
        writeln!(f, "  MRR:  {:.4}", self.mrr)?;
        write!(f, "  MAP:  {:.4}", self.map)
    }
}

/// NDCG, MRR and MAP at the same cut-off
pub fn evaluate_ranking(truth: &GroundTruthSet, runs: &RetrievalRun, k: usize) -> RankingMetrics {
    RankingMetrics {
        ndcg: ndcg_mean_at_k(truth, runs, k),
        mrr: mrr_at_k(truth, runs, k),
        map: map_at_k(truth, runs, k),
    }
}

/// Logged retrieval runs with their ground truth, as read by
/// `ragrank evaluate`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunLog {
    pub ground_truth: GroundTruthSet,
    pub runs: RetrievalRun,
}

impl RunLog {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RagrankError::Io {
            source: e,
            context: format!("Failed to read run log: {:?}", path),
        })?;
        serde_json::from_str(&content).map_err(|e| RagrankError::Json {
            source: e,
            context: format!("Invalid run log: {:?}", path),
        })
    }

    pub fn evaluate(&self, k: usize) -> RankingMetrics {
        evaluate_ranking(&self.ground_truth, &self.runs, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_ndcg_partial_order() {
        let score = ndcg_at_k(&set(&["d1", "d2"]), &ids(&["d3", "d1", "d2"]), 3);
        let dcg = 1.0 / 3f64.log2() + 0.5;
        let idcg = 1.0 + 1.0 / 3f64.log2();
        assert!((score - dcg / idcg).abs() < 1e-9);
        assert!((score - 0.6934).abs() < 1e-4);
    }

    #[test]
    fn test_ndcg_ideal_and_empty() {
        assert_eq!(ndcg_at_k(&set(&["a"]), &ids(&["a", "b"]), 2), 1.0);
        assert_eq!(ndcg_at_k(&set(&["a"]), &ids(&["b", "c"]), 2), 0.0);
        assert_eq!(ndcg_at_k(&set(&["a"]), &[], 5), 0.0);
    }

    #[test]
    fn test_ndcg_ignores_unretrieved_relevant() {
        // IDCG is built from the retrieved list only
        assert_eq!(ndcg_at_k(&set(&["a", "z"]), &ids(&["a", "b"]), 2), 1.0);
    }

    #[test]
    fn test_reciprocal_rank_cutoff() {
        let relevant = set(&["c"]);
        let retrieved = ids(&["a", "b", "c"]);
        assert!((reciprocal_rank(&relevant, &retrieved, 3) - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(reciprocal_rank(&relevant, &retrieved, 2), 0.0);
    }

    #[test]
    fn test_average_precision_divides_by_hits() {
        // hits at ranks 1 and 3: (1/1 + 2/3) / 2
        let ap = average_precision(&set(&["a", "c", "x", "y"]), &ids(&["a", "b", "c"]), 10);
        assert!((ap - (1.0 + 2.0 / 3.0) / 2.0).abs() < 1e-12);
        assert_eq!(average_precision(&set(&["z"]), &ids(&["a"]), 10), 0.0);
    }

    #[test]
    fn test_missing_query_counts_as_empty() {
        let mut truth = GroundTruthSet::new();
        truth.insert("q1".to_string(), set(&["a"]));
        truth.insert("q2".to_string(), set(&["b"]));

        let mut runs = RetrievalRun::new();
        runs.insert("q1".to_string(), ids(&["a"]));

        let metrics = evaluate_ranking(&truth, &runs, 10);
        assert_eq!(metrics.mrr, 0.5);
        assert_eq!(metrics.map, 0.5);
        assert_eq!(metrics.ndcg, 0.5);
    }

    #[test]
    fn test_run_log_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("runs.json");
        std::fs::write(
            &path,
            r#"{"ground_truth": {"q1": ["d1", "d2"]}, "runs": {"q1": ["d3", "d1", "d2"]}}"#,
        )
        .unwrap();

        let log = RunLog::load(&path).unwrap();
        let metrics = log.evaluate(3);
        assert!((metrics.ndcg - 0.6934).abs() < 1e-4);
        assert_eq!(metrics.mrr, 0.5);
    }

    #[test]
    fn test_no_queries() {
        let metrics = evaluate_ranking(&GroundTruthSet::new(), &RetrievalRun::new(), 10);
        assert_eq!(metrics, RankingMetrics::default());
    }
}
