//! Service support library: tracing bootstrap, metrics, search handling and the TCP server.

pub mod bootstrap;
mod logging;
pub mod metrics;
pub mod search_handler;
pub mod server;
pub mod status;
pub mod status_provider;

pub use logging::init_tracing_with_config;
pub use metrics::{ServiceMetrics, init_metrics_from_config, scrape_metrics};
pub use search_handler::{IndexInfo, SearchHandler, SemanticSearchHandler};
pub use status_provider::{BasicStatusProvider, StatusProvider, StatusSnapshot};
