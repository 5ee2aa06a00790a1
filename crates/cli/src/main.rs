use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cli::{describe_error, hits_from_results, render_hits};
use console::style;
use core_types::{EXAMPLE_QUERIES, config::load_or_create_config};
use indicatif::{ProgressBar, ProgressStyle};
use ipc::{DEFAULT_ADDR, SearchHit, client::TcpClient};
use semantic_index::{SemanticSearchEngine, VectorIndexStore, provider_from_config};

/// Debug / scripting CLI for logsight.
#[derive(Parser, Debug)]
#[command(name = "logsight", version, about = "Semantic log search client")]
struct Cli {
    #[arg(long, global = true, env = "LOGSIGHT_CONFIG")]
    config: Option<PathBuf>,

    /// Service address for remote commands.
    #[arg(long, global = true, env = "LOGSIGHT_ADDR", default_value = DEFAULT_ADDR)]
    addr: String,

    /// Print machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find the logs most similar in meaning to a query.
    Search {
        query: String,
        /// Number of results (defaults to `search.default_top_k`).
        #[arg(short = 'k', long)]
        top_k: Option<u32>,
        /// Ask the running service instead of loading the index here.
        #[arg(short, long)]
        remote: bool,
    },
    /// Show the service's index and metrics.
    Status,
    /// Tell the service to reload the index from disk.
    Reload,
    /// List sample queries.
    Examples,
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {}", style("error:").red().bold(), describe_error(&err));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Search {
            query,
            top_k,
            remote,
        } => {
            let cfg = load_or_create_config(cli.config.as_deref())?;
            let top_k = top_k
                .unwrap_or_else(|| u32::try_from(cfg.search.default_top_k).unwrap_or(u32::MAX));
            let hits = if remote {
                let timeout = Duration::from_millis(cfg.search.timeout_ms + cfg.embedding.timeout_ms);
                block_on(async {
                    let client = TcpClient::new(&cli.addr).with_request_timeout(timeout);
                    Ok(client.search(query.as_str(), top_k).await?.hits)
                })?
            } else {
                search_local(&cfg, &query, top_k as usize)?
            };
            print_hits(&query, &hits, cli.json)
        }
        Commands::Status => {
            let status = block_on(async { TcpClient::new(&cli.addr).status().await })?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
                return Ok(());
            }
            println!("{}", style("logsight service").cyan().bold());
            println!("  served by : {}", status.served_by.as_deref().unwrap_or("-"));
            println!("  index     : {}", status.index_location);
            println!("  entries   : {}", status.index_entries);
            match status.dimension {
                Some(d) => println!("  dimension : {d}"),
                None => println!("  dimension : -"),
            }
            println!("  provider  : {}", status.provider);
            match status.last_reload_ts {
                Some(ts) => println!("  reloaded  : {ts} (unix)"),
                None => println!("  reloaded  : never"),
            }
            if let Some(m) = status.metrics {
                println!(
                    "  searches  : {} ok, {} failed, avg {}",
                    m.searches_total,
                    m.search_errors_total,
                    m.search_latency_ms_avg
                        .map(|ms| format!("{ms:.2} ms"))
                        .unwrap_or_else(|| "-".into())
                );
                println!("  reloads   : {}", m.reloads_total);
            }
            Ok(())
        }
        Commands::Reload => {
            let resp = block_on(async { TcpClient::new(&cli.addr).reload().await })?;
            println!(
                "{} {} entries (dimension {})",
                style("reloaded").green(),
                resp.index_entries,
                resp.dimension
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".into())
            );
            Ok(())
        }
        Commands::Examples => {
            for q in EXAMPLE_QUERIES {
                println!("{} {q}", style("•").dim());
            }
            Ok(())
        }
    }
}

fn search_local(cfg: &core_types::config::AppConfig, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(80));

    spinner.set_message("loading index");
    let provider = provider_from_config(&cfg.embedding).context("build embedding provider")?;
    let store = VectorIndexStore::open_file(cfg.index_path()).with_format(cfg.index.format);
    let loaded = store.load();
    let index = match loaded {
        Ok(index) => index,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e).with_context(|| format!("load index from {}", store.location()));
        }
    };

    spinner.set_message(format!("searching {} entries", index.len()));
    let engine = SemanticSearchEngine::new(provider);
    let results = engine.search(query, top_k, &index);
    spinner.finish_and_clear();
    Ok(hits_from_results(results?))
}

fn print_hits(query: &str, hits: &[SearchHit], json: bool) -> Result<()> {
    if json {
        let body = serde_json::json!({
            "query": query,
            "results": hits
                .iter()
                .map(|h| serde_json::json!({"log": h.text, "score": h.score}))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }
    if hits.is_empty() {
        println!("{}", style("no matching logs").yellow());
        return Ok(());
    }
    print!("{}", render_hits(hits));
    Ok(())
}

fn block_on<T>(fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?
        .block_on(fut)
}
