//! Metrics collection and exposition.
//!
//! # Metrics
//! - `pass_requests_total` (counter): forwarded requests by role, method, status
//! - `pass_request_duration_seconds` (histogram): latency distribution by role
//! - `pass_tokens_issued_total` (counter): tokens minted at the edge
//! - `pass_verifications_total` (counter): gate outcomes by reason
//! - `pass_nonce_store_degraded_total` (counter): store calls that failed open
//! - `pass_nonce_store_entries` (gauge): live nonce records

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed proxied request.
pub fn record_request(role: &'static str, method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "pass_requests_total",
        "role" => role,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("pass_request_duration_seconds", "role" => role)
        .record(start.elapsed().as_secs_f64());
}

/// Record a token minted at the edge.
pub fn record_token_issued() {
    metrics::counter!("pass_tokens_issued_total").increment(1);
}

/// Record a gate decision. `reason` is `allow` for allowed requests.
pub fn record_verification(reason: &'static str) {
    metrics::counter!("pass_verifications_total", "reason" => reason).increment(1);
}

/// Record a nonce store call that degraded to fail-open.
pub fn record_store_degraded(operation: &'static str) {
    metrics::counter!("pass_nonce_store_degraded_total", "operation" => operation).increment(1);
}

/// Record the current number of live nonce records.
pub fn record_nonce_store_size(len: usize) {
    metrics::gauge!("pass_nonce_store_entries").set(len as f64);
}
