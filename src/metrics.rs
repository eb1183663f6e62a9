//! Prometheus metrics for query routing.
//!
//! This module provides metrics for:
//! - Inbound queries by method
//! - Resolution latency and failures
//! - Forward latency and failures by kind

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::debug;

// === Metric Name Constants ===

/// Inbound queries counter metric name.
pub const METRIC_QUERIES_RECEIVED: &str = "queries_received_total";
/// Queries relayed successfully counter metric name.
pub const METRIC_QUERIES_FORWARDED: &str = "queries_forwarded_total";
/// Rejected inbound payloads counter metric name.
pub const METRIC_MALFORMED_QUERIES: &str = "malformed_queries_total";
/// Resolution failures counter metric name.
pub const METRIC_RESOLUTION_FAILURES: &str = "resolution_failures_total";
/// Store errors counter metric name.
pub const METRIC_STORE_ERRORS: &str = "store_errors_total";
/// Forward failures counter metric name.
pub const METRIC_FORWARD_FAILURES: &str = "forward_failures_total";
/// Resolve latency metric name.
pub const METRIC_RESOLVE_LATENCY: &str = "resolve_latency_ms";
/// Forward latency metric name.
pub const METRIC_FORWARD_LATENCY: &str = "forward_latency_ms";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_RESOLVE_LATENCY,
        "Mapping Store resolution latency in milliseconds"
    );
    describe_histogram!(
        METRIC_FORWARD_LATENCY,
        "Downstream forward latency in milliseconds"
    );

    describe_counter!(METRIC_QUERIES_RECEIVED, "Total number of inbound queries");
    describe_counter!(
        METRIC_QUERIES_FORWARDED,
        "Total number of queries relayed from a downstream"
    );
    describe_counter!(
        METRIC_MALFORMED_QUERIES,
        "Total number of inbound queries rejected as malformed"
    );
    describe_counter!(
        METRIC_RESOLUTION_FAILURES,
        "Total number of targets that could not be resolved"
    );
    describe_counter!(METRIC_STORE_ERRORS, "Total number of Mapping Store errors");
    describe_counter!(
        METRIC_FORWARD_FAILURES,
        "Total number of failed downstream calls"
    );

    debug!("Metrics initialized");
}

/// Install the Prometheus recorder and return its render handle.
pub fn install_prometheus() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Increment inbound queries counter.
pub fn inc_queries_received(method: &'static str) {
    counter!(METRIC_QUERIES_RECEIVED, "method" => method).increment(1);
}

/// Increment relayed queries counter.
pub fn inc_queries_forwarded() {
    counter!(METRIC_QUERIES_FORWARDED).increment(1);
}

/// Increment malformed queries counter.
pub fn inc_malformed_queries() {
    counter!(METRIC_MALFORMED_QUERIES).increment(1);
}

/// Increment resolution failures counter.
pub fn inc_resolution_failures(reason: &'static str) {
    counter!(METRIC_RESOLUTION_FAILURES, "reason" => reason).increment(1);
}

/// Increment store errors counter.
pub fn inc_store_errors() {
    counter!(METRIC_STORE_ERRORS).increment(1);
}

/// Increment forward failures counter.
pub fn inc_forward_failures(kind: &'static str) {
    counter!(METRIC_FORWARD_FAILURES, "kind" => kind).increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        let latency_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        histogram!(self.metric_name).record(latency_ms);
    }
}

/// Create a latency timer for resolution.
pub fn timer_resolve() -> LatencyTimer {
    LatencyTimer::new(METRIC_RESOLVE_LATENCY)
}

/// Create a latency timer for forwarding.
pub fn timer_forward() -> LatencyTimer {
    LatencyTimer::new(METRIC_FORWARD_LATENCY)
}
