use std::sync::Arc;

use ipc::MetricsSnapshot;

use crate::metrics::ServiceMetrics;
use crate::search_handler::{IndexInfo, SearchHandler};

/// Snapshot of service status used by IPC responses.
#[derive(Debug, Clone, Default)]
pub struct StatusSnapshot {
    pub index: IndexInfo,
    pub metrics: Option<MetricsSnapshot>,
}

pub trait StatusProvider: Send + Sync {
    fn snapshot(&self) -> StatusSnapshot;
}

/// Status read straight from the live handler and metrics registry.
pub struct BasicStatusProvider {
    handler: Arc<dyn SearchHandler>,
    metrics: Option<Arc<ServiceMetrics>>,
}

impl BasicStatusProvider {
    pub fn new(handler: Arc<dyn SearchHandler>, metrics: Option<Arc<ServiceMetrics>>) -> Self {
        Self { handler, metrics }
    }
}

impl StatusProvider for BasicStatusProvider {
    fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            index: self.handler.info(),
            metrics: self.metrics.as_ref().map(|m| m.snapshot()),
        }
    }
}
