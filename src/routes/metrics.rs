//! Prometheus metrics endpoint
//!
//! Exposes application metrics in Prometheus format for monitoring.

use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;

use crate::quota::models::Decision;

/// Global Prometheus handle for metrics export
static PROMETHEUS_HANDLE: Lazy<PrometheusHandle> = Lazy::new(|| {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
});

/// Initialize metrics (call once at startup)
pub fn init_metrics() {
    // Force initialization of the lazy static
    let _ = &*PROMETHEUS_HANDLE;

    register_metrics();
}

/// Register all custom metrics
fn register_metrics() {
    metrics::describe_counter!(
        "usage_gate_quota_decisions_total",
        "Quota decisions by feature and outcome"
    );
    metrics::describe_counter!(
        "usage_gate_usage_records_total",
        "Usage event writes by feature and result"
    );
    metrics::describe_counter!(
        "usage_gate_cache_operations_total",
        "Total cache operations"
    );
    metrics::describe_histogram!(
        "usage_gate_feature_duration_seconds",
        "Metered feature request duration in seconds"
    );
}

/// Prometheus metrics endpoint handler
pub async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE.render()
}

/// Outcome label for a decision
pub fn decision_outcome(decision: &Decision) -> &'static str {
    match (&decision.error, decision.allowed, decision.is_pro) {
        (Some(_), _, _) => "error",
        (None, true, true) => "unlimited",
        (None, true, false) => "allowed",
        (None, false, _) => "denied",
    }
}

/// Record a quota decision
pub fn record_decision(feature: &str, decision: &Decision) {
    metrics::counter!(
        "usage_gate_quota_decisions_total",
        "feature" => feature.to_string(),
        "outcome" => decision_outcome(decision)
    )
    .increment(1);
}

/// Record a usage write
pub fn record_usage_write(feature: &str, success: bool) {
    metrics::counter!(
        "usage_gate_usage_records_total",
        "feature" => feature.to_string(),
        "result" => if success { "success" } else { "failure" }
    )
    .increment(1);
}

/// Record cache operation
pub fn record_cache_operation(cache: &str, result: &str) {
    metrics::counter!(
        "usage_gate_cache_operations_total",
        "cache" => cache.to_string(),
        "result" => result.to_string()
    )
    .increment(1);
}

/// Record a metered feature request
pub fn record_feature_request(feature: &str, status: &str, duration_secs: f64) {
    metrics::histogram!(
        "usage_gate_feature_duration_seconds",
        "feature" => feature.to_string(),
        "status" => status.to_string()
    )
    .record(duration_secs);
}
