//! Origin-side verification gate.
//!
//! # Responsibilities
//! - Run the linear gate: extract → freshness → replay → signature → commit
//! - Keep every denial indistinguishable on the wire (uniform 403 upstream)
//! - Degrade gracefully when the nonce store is unavailable
//!
//! # Design Decisions
//! - The replay stage fails open: replay defense is a second layer behind
//!   the signature, and a store outage must not become an origin outage
//! - The nonce is committed only on full ALLOW; a denied request never
//!   burns a nonce

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::PassConfig;
use crate::noncestore::NonceStore;
use crate::observability::metrics;
use crate::token::{signer, PassToken};

/// Outcome of running the gate against one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

/// Which stage denied the request.
///
/// Observable only in logs and metrics; callers emit the same 403 for every
/// reason so the response leaks nothing about which check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    MalformedToken,
    StaleToken,
    ReplayedNonce,
    SignatureMismatch,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::MalformedToken => "malformed_token",
            DenyReason::StaleToken => "stale_token",
            DenyReason::ReplayedNonce => "replayed_nonce",
            DenyReason::SignatureMismatch => "signature_mismatch",
        }
    }
}

/// Verifies pass tokens on requests reaching the origin.
pub struct Verifier {
    secret: Vec<u8>,
    freshness_window_secs: u64,
    nonce_ttl: Duration,
    store_timeout: Duration,
    store: Arc<dyn NonceStore>,
}

impl Verifier {
    pub fn new(config: &PassConfig, store: Arc<dyn NonceStore>) -> Self {
        Self {
            secret: config.secret.clone().into_bytes(),
            freshness_window_secs: config.freshness_window_secs,
            nonce_ttl: Duration::from_secs(config.nonce_ttl_secs),
            store_timeout: Duration::from_millis(config.store_timeout_ms),
            store,
        }
    }

    /// Run the gate against an inbound request's metadata.
    ///
    /// `header` is the raw `x-cf-pass` value if the request carried one;
    /// `user_agent` and `request_id` default to empty strings upstream.
    pub async fn decide(&self, header: Option<&str>, user_agent: &str, request_id: &str) -> Decision {
        self.decide_at(unix_now(), header, user_agent, request_id).await
    }

    async fn decide_at(
        &self,
        now: u64,
        header: Option<&str>,
        user_agent: &str,
        request_id: &str,
    ) -> Decision {
        // 1. Extract. Grammar rejection happens before any cryptographic work.
        let Some(raw) = header else {
            return Decision::Deny(DenyReason::MalformedToken);
        };
        let token = match PassToken::from_str(raw) {
            Ok(token) => token,
            Err(err) => {
                tracing::debug!(error = %err, "Pass header failed grammar check");
                return Decision::Deny(DenyReason::MalformedToken);
            }
        };

        // 2. Freshness, tolerating clock skew in both directions. The
        // boundary is inclusive: a skew of exactly the window passes.
        if now.abs_diff(token.timestamp) > self.freshness_window_secs {
            return Decision::Deny(DenyReason::StaleToken);
        }

        // 3. Replay. `None` means the store degraded and this stage is
        // skipped; the signature below remains the primary gate.
        if let Some(true) = self.nonce_seen(&token.nonce).await {
            return Decision::Deny(DenyReason::ReplayedNonce);
        }

        // 4. Signature, recomputed from the current request's metadata plus
        // the token's own timestamp and nonce.
        let input = signer::signing_input(user_agent, request_id, token.timestamp, &token.nonce);
        if !signer::verify(&self.secret, &input, &token.signature) {
            return Decision::Deny(DenyReason::SignatureMismatch);
        }

        // 5. Commit before allowing, so a fast replay inside the freshness
        // window already sees the nonce.
        self.record_nonce(&token.nonce).await;
        Decision::Allow
    }

    async fn nonce_seen(&self, nonce: &str) -> Option<bool> {
        match tokio::time::timeout(self.store_timeout, self.store.contains(nonce)).await {
            Ok(Ok(seen)) => Some(seen),
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "Nonce store lookup failed, skipping replay defense");
                metrics::record_store_degraded("contains");
                None
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.store_timeout.as_millis() as u64,
                    "Nonce store lookup timed out, skipping replay defense"
                );
                metrics::record_store_degraded("contains");
                None
            }
        }
    }

    async fn record_nonce(&self, nonce: &str) {
        match tokio::time::timeout(self.store_timeout, self.store.put(nonce, self.nonce_ttl)).await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "Nonce store write failed, replay defense degraded");
                metrics::record_store_degraded("put");
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.store_timeout.as_millis() as u64,
                    "Nonce store write timed out, replay defense degraded"
                );
                metrics::record_store_degraded("put");
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::issuer::Issuer;
    use crate::noncestore::{InMemoryNonceStore, NonceStoreError};

    const SECRET: &str = "shared-secret";

    fn pass_config() -> PassConfig {
        PassConfig {
            secret: SECRET.to_string(),
            ..PassConfig::default()
        }
    }

    fn verifier() -> Verifier {
        Verifier::new(&pass_config(), Arc::new(InMemoryNonceStore::new()))
    }

    /// Build a header value for an arbitrary issuance time.
    fn mint_at(timestamp: u64, user_agent: &str, request_id: &str, nonce: &str) -> String {
        let input = signer::signing_input(user_agent, request_id, timestamp, nonce);
        let signature = signer::sign(SECRET.as_bytes(), &input);
        format!("{signature}.{timestamp}.{nonce}")
    }

    #[tokio::test]
    async fn test_issued_token_allows() {
        let verifier = verifier();
        let token = Issuer::new(SECRET.as_bytes()).issue("curl/8.5.0", "edge-req-1");
        let header = token.to_string();

        let decision = verifier
            .decide(Some(header.as_str()), "curl/8.5.0", "edge-req-1")
            .await;
        assert_eq!(decision, Decision::Allow);
    }

    #[tokio::test]
    async fn test_empty_metadata_allows() {
        let verifier = verifier();
        let token = Issuer::new(SECRET.as_bytes()).issue("", "");
        let header = token.to_string();

        assert_eq!(
            verifier.decide(Some(header.as_str()), "", "").await,
            Decision::Allow
        );
    }

    #[tokio::test]
    async fn test_missing_header_denies() {
        let verifier = verifier();
        assert_eq!(
            verifier.decide(None, "ua", "rid").await,
            Decision::Deny(DenyReason::MalformedToken)
        );
    }

    #[tokio::test]
    async fn test_garbage_header_denies() {
        let verifier = verifier();
        for raw in ["", "garbage", "a.b.c", "sig.1700000000.A3F19C2B"] {
            assert_eq!(
                verifier.decide(Some(raw), "ua", "rid").await,
                Decision::Deny(DenyReason::MalformedToken),
                "header {raw:?} should fail the grammar"
            );
        }
    }

    #[tokio::test]
    async fn test_freshness_boundary() {
        let verifier = verifier();
        let issued = 1_700_000_000u64;
        let window = pass_config().freshness_window_secs;

        // Exactly at the window: allowed.
        let header = mint_at(issued, "ua", "rid", "a3f19c2b");
        assert_eq!(
            verifier
                .decide_at(issued + window, Some(header.as_str()), "ua", "rid")
                .await,
            Decision::Allow
        );

        // One second past: denied.
        let header = mint_at(issued, "ua", "rid", "b4f19c2b");
        assert_eq!(
            verifier
                .decide_at(issued + window + 1, Some(header.as_str()), "ua", "rid")
                .await,
            Decision::Deny(DenyReason::StaleToken)
        );
    }

    #[tokio::test]
    async fn test_future_timestamp_within_window_allows() {
        // Origin clock behind the edge clock; skew is tolerated both ways.
        let verifier = verifier();
        let now = 1_700_000_000u64;
        let header = mint_at(now + 3600, "ua", "rid", "a3f19c2b");
        assert_eq!(
            verifier.decide_at(now, Some(header.as_str()), "ua", "rid").await,
            Decision::Allow
        );
    }

    #[tokio::test]
    async fn test_replay_denied_second_time() {
        let verifier = verifier();
        let token = Issuer::new(SECRET.as_bytes()).issue("ua", "rid");
        let header = token.to_string();

        assert_eq!(
            verifier.decide(Some(header.as_str()), "ua", "rid").await,
            Decision::Allow
        );
        assert_eq!(
            verifier.decide(Some(header.as_str()), "ua", "rid").await,
            Decision::Deny(DenyReason::ReplayedNonce)
        );
    }

    #[tokio::test]
    async fn test_metadata_mismatch_denies() {
        let verifier = verifier();
        let token = Issuer::new(SECRET.as_bytes()).issue("ua", "rid");
        let header = token.to_string();

        assert_eq!(
            verifier.decide(Some(header.as_str()), "other-ua", "rid").await,
            Decision::Deny(DenyReason::SignatureMismatch)
        );
        assert_eq!(
            verifier.decide(Some(header.as_str()), "ua", "other-rid").await,
            Decision::Deny(DenyReason::SignatureMismatch)
        );
    }

    #[tokio::test]
    async fn test_denied_request_does_not_burn_nonce() {
        let store = Arc::new(InMemoryNonceStore::new());
        let verifier = Verifier::new(&pass_config(), store.clone());
        let token = Issuer::new(SECRET.as_bytes()).issue("ua", "rid");
        let header = token.to_string();

        // Signature mismatch (wrong UA) must not record the nonce...
        assert_eq!(
            verifier.decide(Some(header.as_str()), "other-ua", "rid").await,
            Decision::Deny(DenyReason::SignatureMismatch)
        );
        assert!(store.is_empty());

        // ...so the legitimate presentation still passes.
        assert_eq!(
            verifier.decide(Some(header.as_str()), "ua", "rid").await,
            Decision::Allow
        );
    }

    #[tokio::test]
    async fn test_wrong_secret_denies() {
        let verifier = verifier();
        let token = Issuer::new(b"some-other-secret".as_slice()).issue("ua", "rid");
        let header = token.to_string();

        assert_eq!(
            verifier.decide(Some(header.as_str()), "ua", "rid").await,
            Decision::Deny(DenyReason::SignatureMismatch)
        );
    }

    /// Store double that always errors, as a dead shared backend would.
    struct UnavailableStore;

    #[async_trait]
    impl NonceStore for UnavailableStore {
        async fn contains(&self, _nonce: &str) -> Result<bool, NonceStoreError> {
            Err(NonceStoreError::Unavailable("connection refused".into()))
        }

        async fn put(&self, _nonce: &str, _ttl: Duration) -> Result<(), NonceStoreError> {
            Err(NonceStoreError::Unavailable("connection refused".into()))
        }
    }

    /// Store double that hangs past any reasonable timeout.
    struct HangingStore;

    #[async_trait]
    impl NonceStore for HangingStore {
        async fn contains(&self, _nonce: &str) -> Result<bool, NonceStoreError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(false)
        }

        async fn put(&self, _nonce: &str, _ttl: Duration) -> Result<(), NonceStoreError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_store_failure_fails_open() {
        let verifier = Verifier::new(&pass_config(), Arc::new(UnavailableStore));
        let token = Issuer::new(SECRET.as_bytes()).issue("ua", "rid");
        let header = token.to_string();

        // Replay defense is gone but the signature gate still decides.
        assert_eq!(
            verifier.decide(Some(header.as_str()), "ua", "rid").await,
            Decision::Allow
        );
        assert_eq!(
            verifier.decide(Some(header.as_str()), "ua", "rid").await,
            Decision::Allow
        );
        assert_eq!(
            verifier.decide(Some(header.as_str()), "other-ua", "rid").await,
            Decision::Deny(DenyReason::SignatureMismatch)
        );
    }

    #[tokio::test]
    async fn test_store_timeout_fails_open() {
        let config = PassConfig {
            store_timeout_ms: 10,
            ..pass_config()
        };
        let verifier = Verifier::new(&config, Arc::new(HangingStore));
        let token = Issuer::new(SECRET.as_bytes()).issue("ua", "rid");
        let header = token.to_string();

        assert_eq!(
            verifier.decide(Some(header.as_str()), "ua", "rid").await,
            Decision::Allow
        );
    }
}
