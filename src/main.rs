use ragrank::app::{build_gate, Models, Services};
use ragrank::cli::{Cli, Commands, ConfigAction};
use ragrank::config::Config;
use ragrank::error::{RagrankError, Result};
use ragrank::evaluation::{load_benchmark, run_benchmark, BenchmarkIdField, RunLog};
use ragrank::retrieval::{compress_contexts, RetrievalOutcome};
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Ask {
            question,
            json,
            compress,
        } => {
            cmd_ask(cli.config, &question, json, compress).await?;
        }
        Commands::Gate {
            question,
            no_semantic,
        } => {
            cmd_gate(cli.config, &question, no_semantic).await?;
        }
        Commands::Evaluate { runs, k } => {
            cmd_evaluate(&runs, k)?;
        }
        Commands::Benchmark {
            file,
            output,
            id_field,
        } => {
            cmd_benchmark(cli.config, &file, output, id_field.into()).await?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "ragrank=debug" } else { "ragrank=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn cmd_ask(
    config_path: Option<PathBuf>,
    question: &str,
    json: bool,
    compress: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let retrieval = config.retrieval.clone();
    let models = Models::load(&config)?;
    let services = Services::build(config, models).await?;
    let (generation, passages) = services.current_index().await;
    tracing::debug!(generation, passages, "Index ready");

    let outcome = match services.pipeline.retrieve(question, &retrieval).await {
        Ok(outcome) => outcome,
        Err(e) => {
            // The detailed error goes to the log; the user sees the generic
            // text once and the process exits non-zero
            tracing::error!("Retrieval failed: {}", e);
            println!("{}", e.user_message());
            std::process::exit(1);
        }
    };

    if json {
        println!("{}", to_json(&outcome, "Failed to serialize outcome")?);
        return Ok(());
    }

    match &outcome {
        RetrievalOutcome::Refused(refusal) => {
            println!("{}", refusal.message);
            println!("  reason: {}", refusal.reason.code());
        }
        RetrievalOutcome::Passages(result) => {
            println!(
                "✓ {} passages (gate: {}, {} fused, {} after dedup)",
                result.passages.len(),
                result.decision.reason,
                result.counts.fused,
                result.counts.deduplicated
            );
            if let Some(side) = &result.counts.degraded {
                println!("  degraded: {}", side);
            }

            if compress {
                for (i, context) in compress_contexts(question, &result.passages).iter().enumerate() {
                    let marker = if context.compressed { " (compressed)" } else { "" };
                    println!("\n[{}] {}{}", i + 1, context.passage_id, marker);
                    println!("{}", context.text);
                }
            } else {
                for (i, passage) in result.passages.iter().enumerate() {
                    println!(
                        "\n[{}] {:.4} {:?} {} / {}",
                        i + 1,
                        passage.score,
                        passage.origin,
                        passage.passage.source.document_id,
                        passage.passage.source.section_title
                    );
                    println!("{}", passage.passage.preview(300));
                }
            }
        }
    }

    Ok(())
}

async fn cmd_gate(config_path: Option<PathBuf>, question: &str, no_semantic: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let use_semantic = config.retrieval.use_semantic_gate && !no_semantic;

    let embedder = if use_semantic {
        Some(Models::load(&config)?.embedder)
    } else {
        None
    };
    let gate = build_gate(&config, embedder).await?;

    let decision = gate
        .evaluate(question, use_semantic, config.retrieval.semantic_threshold)
        .await?;

    println!("{}", to_json(&decision, "Failed to serialize decision")?);
    Ok(())
}

fn cmd_evaluate(runs: &Path, k: usize) -> Result<()> {
    let log = RunLog::load(runs)?;
    let metrics = log.evaluate(k);

    println!("Ranking metrics @{} ({} queries):", k, log.ground_truth.len());
    println!("{}", metrics);
    Ok(())
}

async fn cmd_benchmark(
    config_path: Option<PathBuf>,
    file: &Path,
    output: Option<PathBuf>,
    id_field: BenchmarkIdField,
) -> Result<()> {
    let config = load_config(config_path)?;
    let retrieval = config.retrieval.clone();
    let questions = load_benchmark(file)?;
    println!("✓ Loaded {} benchmark questions", questions.len());

    let models = Models::load(&config)?;
    let services = Services::build(config, models).await?;

    let report = run_benchmark(&services.pipeline, &retrieval, &questions, id_field).await;

    println!("Ranking metrics:");
    println!("  NDCG@5:  {:.4}", report.ndcg_at_5);
    println!("  MRR@10:  {:.4}", report.mrr_at_10);
    println!("  MAP@100: {:.4}", report.map_at_100);
    if report.pseudo_ground_truth > 0 {
        println!(
            "  ({} questions scored against pseudo ground truth)",
            report.pseudo_ground_truth
        );
    }

    if let Some(path) = output {
        report.write(&path)?;
        println!("✓ Report written to {}", path.display());
    }
    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            println!("{}", to_json(&config, "Failed to serialize config")?);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            let config_dir = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            std::fs::create_dir_all(&config_dir).map_err(|e| RagrankError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", config_dir),
            })?;

            let rules_path = config_dir.join("gate_rules.toml");
            if force || !rules_path.exists() {
                std::fs::write(&rules_path, include_str!("../config-templates/gate_rules.toml"))
                    .map_err(|e| RagrankError::Io {
                        source: e,
                        context: format!("Failed to write gate_rules.toml: {:?}", rules_path),
                    })?;
            }

            let mut config = Config::default();
            config.gate.rules_file = Some(rules_path);
            config.save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
            println!("  - gate_rules.toml: relevance gate patterns and keywords");
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    Config::load_or_default(&path)
}

fn to_json<T: serde::Serialize>(value: &T, context: &str) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| RagrankError::Json {
        source: e,
        context: context.to_string(),
    })
}
