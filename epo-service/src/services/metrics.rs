//! Metrics collection and Prometheus export.
//!
//! Initializes the metrics exporter and records search outcomes. Recording
//! before [`init_metrics`] is a no-op.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder.
///
/// Must be called at most once per process; a second call fails because the
/// global recorder is already set.
pub fn init_metrics() -> Result<(), BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = METRICS_HANDLE.set(handle);
    Ok(())
}

/// Get the current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Count a forwarded search by outcome (`success`, `invalid`, or an upstream error kind).
pub fn record_search(provider: &'static str, outcome: &'static str) {
    counter!(
        "epo_search_requests_total",
        "provider" => provider,
        "outcome" => outcome
    )
    .increment(1);
}

/// Time spent waiting on the upstream search.
pub fn record_upstream_latency(provider: &'static str, elapsed: Duration) {
    histogram!("epo_upstream_duration_seconds", "provider" => provider)
        .record(elapsed.as_secs_f64());
}
