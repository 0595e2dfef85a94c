//! Semantic validation of loaded configuration.

use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;

use crate::config::schema::ServiceConfig;

/// A single semantic problem found in an otherwise well-formed config.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a valid socket address")]
    BadBindAddress(String),

    #[error("upstream.address '{0}' is not a valid socket address")]
    BadUpstreamAddress(String),

    #[error("pass.secret must not be empty while pass.enabled is true")]
    EmptySecret,

    #[error("pass.freshness_window_secs must be greater than zero")]
    ZeroFreshnessWindow,

    #[error("pass.nonce_ttl_secs must be greater than zero")]
    ZeroNonceTtl,

    #[error("pass.store_timeout_ms must be greater than zero")]
    ZeroStoreTimeout,

    #[error("pass.request_id_header '{0}' is not a valid header name")]
    BadRequestIdHeader(String),

    #[error("observability.metrics_address '{0}' is not a valid socket address")]
    BadMetricsAddress(String),
}

/// Collect every semantic problem rather than stopping at the first.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.upstream.address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadUpstreamAddress(
            config.upstream.address.clone(),
        ));
    }

    if config.pass.enabled && config.pass.secret.is_empty() {
        errors.push(ValidationError::EmptySecret);
    }

    if config.pass.freshness_window_secs == 0 {
        errors.push(ValidationError::ZeroFreshnessWindow);
    }

    if config.pass.nonce_ttl_secs == 0 {
        errors.push(ValidationError::ZeroNonceTtl);
    }

    if config.pass.store_timeout_ms == 0 {
        errors.push(ValidationError::ZeroStoreTimeout);
    }

    if HeaderName::from_bytes(config.pass.request_id_header.as_bytes()).is_err() {
        errors.push(ValidationError::BadRequestIdHeader(
            config.pass.request_id_header.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::BadMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
