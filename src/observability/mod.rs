//! Observability subsystem.
//!
//! # Responsibilities
//! - Expose Prometheus-compatible metrics for both service roles
//! - Keep metric updates cheap enough for the per-request hot path
//!
//! Structured logging lives with the code that emits it (`tracing` macros);
//! the subscriber is initialized in `main`.

pub mod metrics;
