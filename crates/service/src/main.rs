//! Entry point for the logsight search service.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use core_types::config::load_or_create_config;
use service::{bootstrap, init_tracing_with_config};

#[derive(Parser, Debug)]
#[command(name = "logsightd", version, about = "Semantic log search service")]
struct Args {
    /// Path to the TOML config (created with defaults if missing).
    #[arg(long, env = "LOGSIGHT_CONFIG")]
    config: Option<PathBuf>,

    /// Override `service.listen_addr`.
    #[arg(long)]
    listen: Option<String>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let mut cfg = load_or_create_config(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        cfg.service.listen_addr = listen;
    }
    let _guard = init_tracing_with_config(&cfg.logging)?;

    // built before the runtime: the http embedder wraps a blocking client
    let handler = bootstrap::build_handler(&cfg)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("logsightd")
        .build()
        .context("build tokio runtime")?;

    let served = runtime.block_on(bootstrap::run_app(&cfg, handler.clone(), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "ctrl-c handler failed");
        }
    }));
    // the last handler reference must drop outside the runtime
    drop(runtime);
    drop(handler);
    served?;

    tracing::info!("logsight service stopped");
    Ok(())
}
