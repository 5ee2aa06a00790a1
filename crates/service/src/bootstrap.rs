//! Wiring from configuration to a running server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use core_types::{ErrorKind, config::AppConfig};
use semantic_index::{
    SemanticError, SemanticSearchEngine, VectorIndexStore, provider_from_config,
};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::metrics::{ServiceMetrics, init_metrics_from_config, scrape_metrics};
use crate::search_handler::{SearchHandler, SemanticSearchHandler};
use crate::server::{ServerState, serve};
use crate::status_provider::BasicStatusProvider;

/// Build the handler and attempt the initial load.
///
/// Must run outside the async runtime: the HTTP embedder owns a blocking client.
pub fn build_handler(cfg: &AppConfig) -> Result<Arc<SemanticSearchHandler>> {
    let provider = provider_from_config(&cfg.embedding).context("build embedding provider")?;
    let store = VectorIndexStore::open_file(cfg.index_path()).with_format(cfg.index.format);
    info!(
        provider = provider.name(),
        dimension = provider.dimension(),
        index = %store.location(),
        "search handler configured"
    );
    let handler = Arc::new(SemanticSearchHandler::new(
        SemanticSearchEngine::new(provider),
        store,
        cfg.search.max_top_k,
    ));
    initial_load(handler.as_ref())?;
    Ok(handler)
}

/// A missing index is not fatal: the service starts empty and can be told
/// to reload once indexing has run. Anything else is.
pub fn initial_load(handler: &dyn SearchHandler) -> Result<()> {
    match handler.reload() {
        Ok(info) => {
            info!(entries = info.entries, dimension = ?info.dimension, "initial index loaded");
            Ok(())
        }
        Err(SemanticError::NotFound) => {
            warn!(
                hint = ErrorKind::NotFound.hint().unwrap_or_default(),
                "starting with an empty index"
            );
            Ok(())
        }
        Err(e) => Err(e).context("load initial index"),
    }
}

/// Bind the configured address and serve until `shutdown` resolves.
pub async fn run_app(
    cfg: &AppConfig,
    handler: Arc<SemanticSearchHandler>,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let metrics: Option<Arc<ServiceMetrics>> = init_metrics_from_config(&cfg.metrics)?;
    if let Some(m) = &metrics {
        m.set_index_entries(handler.info().entries);
    }

    let handler: Arc<dyn SearchHandler> = handler;
    let state = Arc::new(ServerState {
        status: Arc::new(BasicStatusProvider::new(handler.clone(), metrics.clone())),
        handler,
        metrics: metrics.clone(),
        default_timeout: Duration::from_millis(cfg.search.timeout_ms),
    });

    let listener = TcpListener::bind(&cfg.service.listen_addr)
        .await
        .with_context(|| format!("bind {}", cfg.service.listen_addr))?;
    serve(listener, state, shutdown).await?;

    if let Some(m) = &metrics {
        debug!(metrics = %scrape_metrics(m)?, "final metrics");
    }
    Ok(())
}
