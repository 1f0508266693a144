//! Offline ranking-quality evaluation
//!
//! - [`metrics`]: NDCG, MRR and MAP over logged retrieval runs
//! - [`benchmark`]: runs the online pipeline over a question set and reports
//!   the same metrics

pub mod benchmark;
pub mod metrics;

pub use benchmark::{
    load_benchmark, run_benchmark, BenchmarkIdField, BenchmarkQuestion, BenchmarkReport,
};
pub use metrics::{
    average_precision, dcg_at_k, evaluate_ranking, map_at_k, mrr_at_k, ndcg_at_k,
    ndcg_mean_at_k, reciprocal_rank, GroundTruthSet, RankingMetrics, RetrievalRun, RunLog,
};
