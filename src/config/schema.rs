//! Configuration schema definitions.
//!
//! One schema serves both service roles; the `edge` role ignores the nonce
//! store knobs and the `origin` role never mints. All types derive Serde
//! traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for either service role.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address, connection cap).
    pub listener: ListenerConfig,

    /// Where verified/stamped requests are forwarded.
    pub upstream: UpstreamConfig,

    /// Pass-token protocol settings shared by both roles.
    pub pass: PassConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent in-flight requests (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Upstream the service forwards to: the origin gate when running as the
/// edge, the application server when running as the origin gate.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Pass-token protocol configuration.
///
/// `freshness_window_secs` and `nonce_ttl_secs` encode distinct trade-offs
/// (coarse clock-skew tolerance vs. tight replay suppression) and are never
/// collapsed into one value.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PassConfig {
    /// Apply the protocol to every request. When false the edge forwards
    /// unstamped and the origin gate passes everything through.
    pub enabled: bool,

    /// Shared secret, identical on both sides, provisioned out of band.
    pub secret: String,

    /// Maximum |now - issuance| accepted at verification, in seconds.
    pub freshness_window_secs: u64,

    /// How long an accepted nonce blocks replays, in seconds.
    pub nonce_ttl_secs: u64,

    /// Header carrying the edge-assigned request id.
    pub request_id_header: String,

    /// Upper bound on any single nonce store operation, in milliseconds.
    pub store_timeout_ms: u64,

    /// How often the in-memory store sweeps expired nonces, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            secret: String::new(),
            // 8-hour window, generous on purpose to absorb edge/origin clock drift.
            freshness_window_secs: 28_800,
            nonce_ttl_secs: 300,
            request_id_header: "x-request-id".to_string(),
            store_timeout_ms: 50,
            sweep_interval_secs: 60,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Idle upstream connection timeout in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            idle_secs: 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
