//! Prometheus metrics for the search service.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use core_types::{ErrorKind, config::MetricsSection};
use ipc::MetricsSnapshot;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

#[derive(Clone)]
pub struct ServiceMetrics {
    registry: Registry,
    searches_total: IntCounter,
    search_errors_total: IntCounterVec,
    search_latency_seconds: Histogram,
    index_entries: IntGauge,
    index_reloads_total: IntCounter,
}

impl ServiceMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("logsight".into()), None)?;

        let searches_total = IntCounter::new("searches_total", "Completed search requests")?;
        let search_errors_total = IntCounterVec::new(
            Opts::new("search_errors_total", "Failed search requests by error kind"),
            &["kind"],
        )?;
        let search_latency_seconds = Histogram::with_opts(
            HistogramOpts::new("search_latency_seconds", "End-to-end search latency")
                .buckets(LATENCY_BUCKETS.to_vec()),
        )?;
        let index_entries = IntGauge::new("index_entries", "Entries in the served index snapshot")?;
        let index_reloads_total =
            IntCounter::new("index_reloads_total", "Successful index snapshot reloads")?;

        registry.register(Box::new(searches_total.clone()))?;
        registry.register(Box::new(search_errors_total.clone()))?;
        registry.register(Box::new(search_latency_seconds.clone()))?;
        registry.register(Box::new(index_entries.clone()))?;
        registry.register(Box::new(index_reloads_total.clone()))?;

        Ok(Self {
            registry,
            searches_total,
            search_errors_total,
            search_latency_seconds,
            index_entries,
            index_reloads_total,
        })
    }

    pub fn record_search(&self, elapsed: Duration) {
        self.searches_total.inc();
        self.search_latency_seconds.observe(elapsed.as_secs_f64());
    }

    pub fn record_search_error(&self, kind: ErrorKind) {
        self.search_errors_total
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    pub fn set_index_entries(&self, entries: usize) {
        self.index_entries.set(entries as i64);
    }

    pub fn record_reload(&self) {
        self.index_reloads_total.inc();
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let count = self.search_latency_seconds.get_sample_count();
        let avg_ms = (count > 0)
            .then(|| self.search_latency_seconds.get_sample_sum() / count as f64 * 1000.0);
        let errors = ErrorKind::ALL
            .iter()
            .map(|k| self.search_errors_total.with_label_values(&[k.as_str()]).get())
            .sum();

        MetricsSnapshot {
            searches_total: self.searches_total.get(),
            search_errors_total: errors,
            reloads_total: self.index_reloads_total.get(),
            search_latency_ms_avg: avg_ms,
        }
    }
}

impl std::fmt::Debug for ServiceMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceMetrics")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

/// `None` when metrics are disabled in config.
pub fn init_metrics_from_config(cfg: &MetricsSection) -> Result<Option<Arc<ServiceMetrics>>> {
    if !cfg.enabled {
        return Ok(None);
    }
    Ok(Some(Arc::new(ServiceMetrics::new()?)))
}

/// Prometheus text exposition of everything in the service registry.
pub fn scrape_metrics(metrics: &ServiceMetrics) -> Result<String> {
    let families = metrics.registry.gather();
    let mut buf = Vec::new();
    TextEncoder::new()
        .encode(&families, &mut buf)
        .context("encode metrics")?;
    String::from_utf8(buf).context("metrics are not utf-8")
}
