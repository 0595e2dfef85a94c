//! Short-TTL nonce existence store.
//!
//! # Responsibilities
//! - Answer "has this nonce been accepted within its TTL window"
//! - Record accepted nonces with a bounded lifetime
//!
//! # Design Decisions
//! - The backend is behind a trait so deployments can swap the in-memory
//!   store for a shared one without touching the verifier
//! - Store failures are surfaced as errors, never panics; the verifier
//!   decides the degradation policy

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;

pub use memory::InMemoryNonceStore;

/// Error type for nonce store operations.
#[derive(Debug, Error)]
pub enum NonceStoreError {
    #[error("nonce store backend unavailable: {0}")]
    Unavailable(String),
}

/// An existence-checking key store with per-key TTL.
///
/// Implementations must be safe for concurrent check-then-store from many
/// simultaneous requests. A narrow race between two requests presenting the
/// same nonce is tolerated by the caller.
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Whether the nonce has been recorded and is still within its TTL.
    async fn contains(&self, nonce: &str) -> Result<bool, NonceStoreError>;

    /// Record the nonce for `ttl`, starting now.
    async fn put(&self, nonce: &str, ttl: Duration) -> Result<(), NonceStoreError>;
}
