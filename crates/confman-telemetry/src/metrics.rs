//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Collector registration stays private; callers only see increment helpers.
//! - Counters follow the pipeline stages: dispatch, commit, list.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{TelemetryError, TelemetryResult};

/// Metrics registry shared between the dispatcher and committer.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    requests_total: IntCounterVec,
    batches_committed_total: IntCounter,
    batch_bytes_total: IntCounter,
    emit_failures_total: IntCounter,
    listed_files_total: IntCounter,
    inflight_batches: IntGauge,
}

/// Point-in-time view of the pipeline counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Batches handed to the sink successfully.
    pub batches_committed_total: u64,
    /// Payload bytes across committed batches.
    pub batch_bytes_total: u64,
    /// Sink inject failures.
    pub emit_failures_total: u64,
    /// Files reported by list requests.
    pub listed_files_total: u64,
    /// Batches currently between the sender and committer.
    pub inflight_batches: i64,
}

impl Metrics {
    /// Construct a registry with every collector registered.
    ///
    /// # Errors
    ///
    /// Returns an error if a collector cannot be built or registered.
    pub fn new() -> TelemetryResult<Self> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("cm_requests_total", "Processed requests by action and status"),
            &["action", "status"],
        )
        .map_err(|source| collector("cm_requests_total", source))?;
        let batches_committed_total = counter(
            "cm_batches_committed_total",
            "Batches delivered to the host sink",
        )?;
        let batch_bytes_total = counter(
            "cm_batch_bytes_total",
            "Payload bytes delivered to the host sink",
        )?;
        let emit_failures_total = counter(
            "cm_emit_failures_total",
            "Records the host sink refused",
        )?;
        let listed_files_total = counter(
            "cm_listed_files_total",
            "Config files reported by return requests",
        )?;
        let inflight_batches = IntGauge::with_opts(Opts::new(
            "cm_inflight_batches",
            "Batches awaiting the committer",
        ))
        .map_err(|source| collector("cm_inflight_batches", source))?;

        register(&registry, "cm_requests_total", requests_total.clone())?;
        register(
            &registry,
            "cm_batches_committed_total",
            batches_committed_total.clone(),
        )?;
        register(&registry, "cm_batch_bytes_total", batch_bytes_total.clone())?;
        register(
            &registry,
            "cm_emit_failures_total",
            emit_failures_total.clone(),
        )?;
        register(&registry, "cm_listed_files_total", listed_files_total.clone())?;
        register(&registry, "cm_inflight_batches", inflight_batches.clone())?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                requests_total,
                batches_committed_total,
                batch_bytes_total,
                emit_failures_total,
                listed_files_total,
                inflight_batches,
            }),
        })
    }

    /// Count one processed request.
    pub fn inc_request(&self, action: &str, status: &str) {
        self.inner
            .requests_total
            .with_label_values(&[action, status])
            .inc();
    }

    /// Requests seen for the given labels.
    #[must_use]
    pub fn requests(&self, action: &str, status: &str) -> u64 {
        self.inner
            .requests_total
            .with_label_values(&[action, status])
            .get()
    }

    /// Record a committed batch of `bytes` payload bytes.
    pub fn record_commit(&self, bytes: usize) {
        self.inner.batches_committed_total.inc();
        self.inner
            .batch_bytes_total
            .inc_by(u64::try_from(bytes).unwrap_or(u64::MAX));
    }

    /// Count a record the sink refused.
    pub fn inc_emit_failure(&self) {
        self.inner.emit_failures_total.inc();
    }

    /// Count a file reported by a list request.
    pub fn inc_listed_file(&self) {
        self.inner.listed_files_total.inc();
    }

    /// A batch left the sender.
    pub fn batch_sent(&self) {
        self.inner.inflight_batches.inc();
    }

    /// A sent batch was committed or abandoned.
    pub fn batch_settled(&self) {
        self.inner.inflight_batches.dec();
    }

    /// Render the registry in the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the output is not UTF-8.
    pub fn render(&self) -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Snapshot of the unlabelled counters and the in-flight gauge.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_committed_total: self.inner.batches_committed_total.get(),
            batch_bytes_total: self.inner.batch_bytes_total.get(),
            emit_failures_total: self.inner.emit_failures_total.get(),
            listed_files_total: self.inner.listed_files_total.get(),
            inflight_batches: self.inner.inflight_batches.get(),
        }
    }
}

fn counter(name: &'static str, help: &str) -> TelemetryResult<IntCounter> {
    IntCounter::with_opts(Opts::new(name, help)).map_err(|source| collector(name, source))
}

const fn collector(name: &'static str, source: prometheus::Error) -> TelemetryError {
    TelemetryError::MetricsCollector { name, source }
}

fn register<C>(registry: &Registry, name: &'static str, collector: C) -> TelemetryResult<()>
where
    C: prometheus::core::Collector + 'static,
{
    registry
        .register(Box::new(collector))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_updates() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_request("add", "OK");
        metrics.inc_request("add", "OK");
        metrics.inc_request("delete", "ERROR");
        metrics.record_commit(120);
        metrics.record_commit(30);
        metrics.inc_emit_failure();
        metrics.inc_listed_file();
        metrics.batch_sent();
        metrics.batch_sent();
        metrics.batch_settled();

        assert_eq!(metrics.requests("add", "OK"), 2);
        assert_eq!(metrics.requests("delete", "ERROR"), 1);
        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                batches_committed_total: 2,
                batch_bytes_total: 150,
                emit_failures_total: 1,
                listed_files_total: 1,
                inflight_batches: 1,
            }
        );
        Ok(())
    }

    #[test]
    fn render_exposes_every_family() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_request("return", "OK");
        let rendered = metrics.render()?;
        for family in [
            "cm_requests_total",
            "cm_batches_committed_total",
            "cm_batch_bytes_total",
            "cm_emit_failures_total",
            "cm_listed_files_total",
            "cm_inflight_batches",
        ] {
            assert!(rendered.contains(family), "missing {family}");
        }
        Ok(())
    }

    #[test]
    fn clones_share_the_registry() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        let clone = metrics.clone();
        clone.inc_listed_file();
        assert_eq!(metrics.snapshot().listed_files_total, 1);
        let json = serde_json::to_value(metrics.snapshot())?;
        assert_eq!(json["listed_files_total"], 1);
        Ok(())
    }
}
