//! Benchmark runs of the online pipeline
//!
//! Benchmark file format: a JSON list, or an object with a `questions` list,
//! of `{ "question_id": "q1", "question": "...", "relevant_docs": ["..."] }`.
//! `question_id` and `relevant_docs` are optional.

use super::metrics::{map_at_k, mrr_at_k, ndcg_mean_at_k, GroundTruthSet, RetrievalRun};
use crate::error::{RagrankError, Result};
use crate::retrieval::{RetrievalConfig, RetrievalOutcome, RetrievalPipeline, ScoredPassage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Cut-offs reported by a benchmark run
pub const NDCG_CUTOFF: usize = 5;
pub const MRR_CUTOFF: usize = 10;
pub const MAP_CUTOFF: usize = 100;

/// Retrieved ids used as pseudo ground truth when a question has none
const PSEUDO_TRUTH_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkQuestion {
    #[serde(default)]
    pub question_id: Option<String>,
    pub question: String,
    #[serde(default)]
    pub relevant_docs: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BenchmarkFile {
    List(Vec<BenchmarkQuestion>),
    Wrapped { questions: Vec<BenchmarkQuestion> },
}

/// Load benchmark questions. Questions without an id get `q1`, `q2`, ...
/// by position.
pub fn load_benchmark(path: &Path) -> Result<Vec<BenchmarkQuestion>> {
    let content = std::fs::read_to_string(path).map_err(|e| RagrankError::Io {
        source: e,
        context: format!("Failed to read benchmark: {:?}", path),
    })?;

    let file: BenchmarkFile = serde_json::from_str(&content).map_err(|e| RagrankError::Json {
        source: e,
        context: format!("Unsupported benchmark format in {:?}", path),
    })?;

    let questions = match file {
        BenchmarkFile::List(questions) => questions,
        BenchmarkFile::Wrapped { questions } => questions,
    };

    Ok(questions
        .into_iter()
        .enumerate()
        .map(|(i, mut q)| {
            if q.question_id.is_none() {
                q.question_id = Some(format!("q{}", i + 1));
            }
            q
        })
        .collect())
}

/// Which passage attribute identifies a retrieved document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BenchmarkIdField {
    Passage,
    #[default]
    Document,
    Section,
}

impl BenchmarkIdField {
    fn id_of(&self, candidate: &ScoredPassage) -> String {
        match self {
            BenchmarkIdField::Passage => candidate.id().to_string(),
            BenchmarkIdField::Document => candidate.passage.source.document_id.clone(),
            BenchmarkIdField::Section => candidate.passage.source.section_title.clone(),
        }
    }
}

/// Outcome of one benchmark question
#[derive(Debug, Clone, Serialize)]
pub struct QuestionReport {
    pub question_id: String,
    pub question: String,
    pub retrieved: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refused: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Ground truth came from the top retrieved ids
    pub pseudo_ground_truth: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub generated_at: DateTime<Utc>,
    pub questions: usize,
    pub refused: usize,
    pub failed: usize,
    /// Questions scored against pseudo ground truth
    pub pseudo_ground_truth: usize,
    #[serde(rename = "ndcg@5")]
    pub ndcg_at_5: f64,
    #[serde(rename = "mrr@10")]
    pub mrr_at_10: f64,
    #[serde(rename = "map@100")]
    pub map_at_100: f64,
    pub per_question: Vec<QuestionReport>,
}

impl BenchmarkReport {
    /// Score per-question results
    pub fn from_questions(per_question: Vec<QuestionReport>, truth: &GroundTruthSet) -> Self {
        let runs: RetrievalRun = per_question
            .iter()
            .map(|q| (q.question_id.clone(), q.retrieved.clone()))
            .collect();

        Self {
            generated_at: Utc::now(),
            questions: per_question.len(),
            refused: per_question.iter().filter(|q| q.refused.is_some()).count(),
            failed: per_question.iter().filter(|q| q.error.is_some()).count(),
            pseudo_ground_truth: per_question.iter().filter(|q| q.pseudo_ground_truth).count(),
            ndcg_at_5: round4(ndcg_mean_at_k(truth, &runs, NDCG_CUTOFF)),
            mrr_at_10: round4(mrr_at_k(truth, &runs, MRR_CUTOFF)),
            map_at_100: round4(map_at_k(truth, &runs, MAP_CUTOFF)),
            per_question,
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| RagrankError::Json {
            source: e,
            context: "Failed to serialize benchmark report".to_string(),
        })?;
        std::fs::write(path, json).map_err(|e| RagrankError::Io {
            source: e,
            context: format!("Failed to write benchmark report: {:?}", path),
        })?;
        tracing::info!("Benchmark report written to {:?}", path);
        Ok(())
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Run every question through the pipeline and score the rankings.
///
/// Failed or refused questions count as empty retrievals.
pub async fn run_benchmark(
    pipeline: &RetrievalPipeline,
    config: &RetrievalConfig,
    questions: &[BenchmarkQuestion],
    id_field: BenchmarkIdField,
) -> BenchmarkReport {
    let mut truth = GroundTruthSet::new();
    let mut per_question = Vec::with_capacity(questions.len());

    for (i, item) in questions.iter().enumerate() {
        let question_id = item
            .question_id
            .clone()
            .unwrap_or_else(|| format!("q{}", i + 1));

        let (retrieved, refused, error) = match pipeline.retrieve(&item.question, config).await {
            Ok(RetrievalOutcome::Passages(result)) => (
                result.passages.iter().map(|p| id_field.id_of(p)).collect(),
                None,
                None,
            ),
            Ok(RetrievalOutcome::Refused(refusal)) => {
                (Vec::new(), Some(refusal.reason.code().to_string()), None)
            }
            Err(e) => {
                tracing::warn!("Benchmark question {} failed: {}", question_id, e);
                (Vec::new(), None, Some(e.to_string()))
            }
        };

        let pseudo_ground_truth = item.relevant_docs.is_empty();
        let relevant = if pseudo_ground_truth {
            retrieved.iter().take(PSEUDO_TRUTH_SIZE).cloned().collect()
        } else {
            item.relevant_docs.iter().cloned().collect()
        };
        truth.insert(question_id.clone(), relevant);

        tracing::debug!(
            "Benchmark {}/{}: {} retrieved",
            i + 1,
            questions.len(),
            retrieved.len()
        );

        per_question.push(QuestionReport {
            question_id,
            question: item.question.clone(),
            retrieved,
            refused,
            error,
            pseudo_ground_truth,
        });
    }

    let report = BenchmarkReport::from_questions(per_question, &truth);
    if report.pseudo_ground_truth > 0 {
        tracing::warn!(
            "{} questions had no relevant_docs; scored against the top {} retrieved",
            report.pseudo_ground_truth,
            PSEUDO_TRUTH_SIZE
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question_report(id: &str, retrieved: &[&str], pseudo: bool) -> QuestionReport {
        QuestionReport {
            question_id: id.to_string(),
            question: String::new(),
            retrieved: retrieved.iter().map(|s| s.to_string()).collect(),
            refused: None,
            error: None,
            pseudo_ground_truth: pseudo,
        }
    }

    #[test]
    fn test_load_list_and_wrapped() {
        let temp = tempfile::TempDir::new().unwrap();

        let list = temp.path().join("list.json");
        std::fs::write(
            &list,
            r#"[{"question": "Кто акционеры?", "relevant_docs": ["s1"]}, {"question_id": "x", "question": "Выручка"}]"#,
        )
        .unwrap();
        let questions = load_benchmark(&list).unwrap();
        assert_eq!(questions[0].question_id.as_deref(), Some("q1"));
        assert_eq!(questions[1].question_id.as_deref(), Some("x"));
        assert!(questions[1].relevant_docs.is_empty());

        let wrapped = temp.path().join("wrapped.json");
        std::fs::write(&wrapped, r#"{"questions": [{"question": "Выручка"}]}"#).unwrap();
        assert_eq!(load_benchmark(&wrapped).unwrap().len(), 1);
    }

    #[test]
    fn test_unsupported_format() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("bad.json");
        std::fs::write(&path, r#"{"items": []}"#).unwrap();
        assert!(matches!(load_benchmark(&path), Err(RagrankError::Json { .. })));
    }

    #[test]
    fn test_report_metrics_and_keys() {
        let mut truth = GroundTruthSet::new();
        truth.insert("q1".to_string(), ["s1".to_string()].into_iter().collect());
        truth.insert("q2".to_string(), ["s9".to_string()].into_iter().collect());

        let report = BenchmarkReport::from_questions(
            vec![
                question_report("q1", &["s1", "s2"], false),
                question_report("q2", &["s3"], false),
            ],
            &truth,
        );

        assert_eq!(report.questions, 2);
        assert_eq!(report.mrr_at_10, 0.5);
        assert_eq!(report.ndcg_at_5, 0.5);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["map@100"], 0.5);
        assert!(json.get("ndcg@5").is_some());
    }
}
