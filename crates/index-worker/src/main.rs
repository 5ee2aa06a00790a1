use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use core_types::{Severity, config::{IndexFormat, load_or_create_config}};
use index_worker::{CorpusOptions, log_summary, read_corpus_file, run_indexing};
use semantic_index::{VectorIndexStore, provider_from_config};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "logsight-indexer", version, about = "Build the semantic log index")]
struct Args {
    /// Corpus file: JSON Lines log events or plain text, one log per line.
    #[arg(long, short)]
    input: PathBuf,

    #[arg(long, env = "LOGSIGHT_CONFIG")]
    config: Option<PathBuf>,

    /// Skip structured events below this level (DEBUG, INFO, WARNING, ERROR, CRITICAL).
    #[arg(long)]
    min_level: Option<Severity>,

    #[arg(long)]
    batch_size: Option<usize>,

    /// On-disk format: binary or json.
    #[arg(long, value_parser = parse_format)]
    format: Option<IndexFormat>,

    /// Write the index here instead of the configured path.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn parse_format(raw: &str) -> Result<IndexFormat, String> {
    match raw.to_ascii_lowercase().as_str() {
        "binary" | "bin" => Ok(IndexFormat::Binary),
        "json" => Ok(IndexFormat::Json),
        other => Err(format!("unknown index format {other:?}")),
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cfg = load_or_create_config(args.config.as_deref())?;

    let opts = CorpusOptions {
        min_level: args.min_level,
    };
    let corpus = read_corpus_file(&args.input, &opts)?;
    log_summary(&corpus);

    let provider = provider_from_config(&cfg.embedding).context("build embedding provider")?;
    let path = args.output.unwrap_or_else(|| cfg.index_path());
    let store = VectorIndexStore::open_file(path)
        .with_format(args.format.unwrap_or(cfg.index.format));
    let batch_size = args.batch_size.unwrap_or(cfg.index.batch_size);

    let report = run_indexing(&corpus, &store, provider.as_ref(), batch_size)?;
    info!(
        entries = report.entries,
        location = %report.location,
        elapsed_ms = report.elapsed_ms as u64,
        "index written"
    );
    Ok(())
}
