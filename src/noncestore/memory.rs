//! In-memory nonce store backed by a concurrent map.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time;

use super::{NonceStore, NonceStoreError};
use crate::observability::metrics;

/// Nonce store keeping expiry instants in a `DashMap`.
///
/// Entries expire lazily on lookup; a periodic sweep task reclaims entries
/// that were never looked up again.
#[derive(Default)]
pub struct InMemoryNonceStore {
    entries: DashMap<String, Instant>,
}

impl InMemoryNonceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Remove expired entries. Returns how many were reclaimed.
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        let now = Instant::now();
        self.entries.retain(|_, expires_at| *expires_at > now);
        let len = self.entries.len();
        metrics::record_nonce_store_size(len);
        before.saturating_sub(len)
    }

    /// Number of live entries (including ones past expiry but not yet swept).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run the periodic sweep until the shutdown signal fires.
    pub async fn run_sweeper(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::info!(interval_secs = interval.as_secs(), "Nonce sweeper starting");

        let mut ticker = time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep();
                    if removed > 0 {
                        tracing::debug!(removed, remaining = self.len(), "Swept expired nonces");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Nonce sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl NonceStore for InMemoryNonceStore {
    async fn contains(&self, nonce: &str) -> Result<bool, NonceStoreError> {
        let expired = match self.entries.get(nonce) {
            None => return Ok(false),
            Some(entry) => *entry.value() <= Instant::now(),
        };

        if expired {
            // Guard against racing a fresh re-insert of the same nonce.
            self.entries.remove_if(nonce, |_, expires_at| *expires_at <= Instant::now());
            return Ok(false);
        }

        Ok(true)
    }

    async fn put(&self, nonce: &str, ttl: Duration) -> Result<(), NonceStoreError> {
        self.entries.insert(nonce.to_string(), Instant::now() + ttl);
        metrics::record_nonce_store_size(self.entries.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_contains() {
        let store = InMemoryNonceStore::new();
        assert!(!store.contains("a3f19c2b").await.unwrap());

        store.put("a3f19c2b", Duration::from_secs(300)).await.unwrap();
        assert!(store.contains("a3f19c2b").await.unwrap());
        assert!(!store.contains("deadbeef").await.unwrap());
    }

    #[tokio::test]
    async fn test_entry_expires() {
        let store = InMemoryNonceStore::new();
        store.put("a3f19c2b", Duration::from_millis(20)).await.unwrap();
        assert!(store.contains("a3f19c2b").await.unwrap());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!store.contains("a3f19c2b").await.unwrap());
        // The lazy-expiry path also removed the entry.
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_reclaims_expired() {
        let store = InMemoryNonceStore::new();
        store.put("11111111", Duration::from_millis(10)).await.unwrap();
        store.put("22222222", Duration::from_secs(300)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.sweep(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.contains("22222222").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_put_contains() {
        let store = Arc::new(InMemoryNonceStore::new());

        let mut handles = Vec::new();
        for i in 0..32u32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let nonce = format!("{i:08x}");
                store.put(&nonce, Duration::from_secs(300)).await.unwrap();
                assert!(store.contains(&nonce).await.unwrap());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len(), 32);
    }
}
