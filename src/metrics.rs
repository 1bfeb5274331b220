//! Prometheus metrics for the gateway.
//!
//! Metrics are exposed on a dedicated listener when `METRICS_PORT > 0`.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `gateway_auth_decisions_total` - Authorization decisions (label: outcome)
//! - `gateway_upstream_errors_total` - Failed forwards (label: kind)
//!
//! ## Histograms
//! - `gateway_auth_duration_seconds` - Auth service round trip, timeouts included
//!
//! Recording without an installed recorder is a no-op.

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const AUTH_DECISIONS_TOTAL: &str = "gateway_auth_decisions_total";
    pub const AUTH_DURATION_SECONDS: &str = "gateway_auth_duration_seconds";
    pub const UPSTREAM_ERRORS_TOTAL: &str = "gateway_upstream_errors_total";
}

/// Install the Prometheus exporter listening on `metrics_addr`.
///
/// # Errors
///
/// Returns a message if the exporter cannot be installed (e.g. the port is
/// taken or a recorder is already set).
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::AUTH_DECISIONS_TOTAL,
        "Authorization decisions by outcome"
    );
    describe_counter!(
        names::UPSTREAM_ERRORS_TOTAL,
        "Requests that could not be forwarded upstream"
    );
    describe_histogram!(
        names::AUTH_DURATION_SECONDS,
        "Auth service round trip duration in seconds"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

/// Record one authorization decision.
pub fn record_auth_decision(outcome: &'static str) {
    counter!(names::AUTH_DECISIONS_TOTAL, "outcome" => outcome).increment(1);
}

/// Record the duration of one auth service call.
pub fn record_auth_duration(duration_secs: f64) {
    histogram!(names::AUTH_DURATION_SECONDS).record(duration_secs);
}

/// Record a failed forward.
pub fn record_upstream_error(kind: &'static str) {
    counter!(names::UPSTREAM_ERRORS_TOTAL, "kind" => kind).increment(1);
}
