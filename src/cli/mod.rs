//! CLI command definitions and parsing
use crate::evaluation::BenchmarkIdField;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ragrank",
    version,
    author = "neur0map",
    about = "Hybrid retrieval and ranking for document question answering",
    long_about = "ragrank classifies a question with a layered relevance gate, retrieves passages \
                  with concurrent dense and BM25 search, fuses and deduplicates the candidates and \
                  reranks them with a cross-encoder. It also measures ranking quality offline."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/ragrank/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Retrieve supporting passages for a question
    Ask {
        /// Question to ask
        question: String,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,

        /// Print only the sentences that share words with the question
        #[arg(long)]
        compress: bool,
    },

    /// Show how the relevance gate classifies a question
    Gate {
        /// Question to classify
        question: String,

        /// Skip the reference-question similarity check
        #[arg(long)]
        no_semantic: bool,
    },

    /// Compute NDCG, MRR and MAP from logged retrieval runs
    Evaluate {
        /// JSON file with `ground_truth` and `runs` maps
        #[arg(short, long)]
        runs: PathBuf,

        /// Rank cut-off
        #[arg(short, default_value = "10")]
        k: usize,
    },

    /// Run a benchmark question set through the pipeline
    Benchmark {
        /// Benchmark JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Where to write the JSON report
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Passage attribute compared against `relevant_docs`
        #[arg(long, value_enum, default_value = "document")]
        id_field: IdFieldArg,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum IdFieldArg {
    Passage,
    Document,
    Section,
}

impl From<IdFieldArg> for BenchmarkIdField {
    fn from(arg: IdFieldArg) -> Self {
        match arg {
            IdFieldArg::Passage => BenchmarkIdField::Passage,
            IdFieldArg::Document => BenchmarkIdField::Document,
            IdFieldArg::Section => BenchmarkIdField::Section,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration and gate rules
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
