use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;

/// Abstract TTL-keyed byte store. The persistence backing (L2, "network
/// tier") is an external collaborator; this trait is the seam stage code and
/// the Provider Gateway's cache wrap depend on.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> anyhow::Result<()>;
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
}

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// In-memory reference implementation of the L2 tier. Stands in for a real
/// distributed store (Redis or similar) in this repo, since the spec treats
/// that backing as an abstract collaborator.
#[derive(Default)]
pub struct InMemoryKvStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            _ => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> anyhow::Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// L1 (in-process, sub-5ms) tier in front of an injectable L2. Reads check
/// L1 first; a miss falls through to L2 and repopulates L1. Writes go to
/// both. L1 entries carry a fixed default TTL independent of the caller's
/// requested TTL, since `moka` bounds its eviction by a single configured
/// policy rather than per-entry durations — L2 remains the source of truth
/// for TTL correctness.
pub struct TieredKvStore {
    l1: moka::future::Cache<String, Vec<u8>>,
    l2: Arc<dyn KvStore>,
}

impl TieredKvStore {
    pub fn new(l2: Arc<dyn KvStore>, l1_capacity: u64, l1_default_ttl: Duration) -> Self {
        let l1 = moka::future::Cache::builder()
            .max_capacity(l1_capacity)
            .time_to_live(l1_default_ttl)
            .build();
        Self { l1, l2 }
    }

    /// Bounds the L2 round trip so a slow cache layer cannot stall the
    /// pipeline indefinitely; on timeout, returns `Ok(None)` so callers fall
    /// back to a direct fetch.
    pub async fn get_with_timeout(
        &self,
        key: &str,
        timeout: Duration,
    ) -> anyhow::Result<Option<Vec<u8>>> {
        if let Some(hit) = self.l1.get(key).await {
            return Ok(Some(hit));
        }

        match tokio::time::timeout(timeout, self.l2.get(key)).await {
            Ok(Ok(Some(value))) => {
                self.l1.insert(key.to_string(), value.clone()).await;
                Ok(Some(value))
            }
            Ok(Ok(None)) => Ok(None),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::warn!(key, "cache wrap timed out, falling back to direct fetch");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl KvStore for TieredKvStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        if let Some(hit) = self.l1.get(key).await {
            return Ok(Some(hit));
        }
        let value = self.l2.get(key).await?;
        if let Some(ref v) = value {
            self.l1.insert(key.to_string(), v.clone()).await;
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> anyhow::Result<()> {
        self.l1.insert(key.to_string(), value.clone()).await;
        self.l2.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.l1.invalidate(key).await;
        self.l2.delete(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_round_trips() {
        let store = InMemoryKvStore::new();
        store.set("k", b"v".to_vec(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn in_memory_store_expires_entries() {
        let store = InMemoryKvStore::new();
        store.set("k", b"v".to_vec(), Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let store = InMemoryKvStore::new();
        store.set("k", b"v".to_vec(), Duration::from_secs(60)).await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn tiered_store_serves_from_l1_after_first_read() {
        let l2 = Arc::new(InMemoryKvStore::new());
        l2.set("k", b"v".to_vec(), Duration::from_secs(60)).await.unwrap();
        let tiered = TieredKvStore::new(l2.clone(), 100, Duration::from_secs(60));

        assert_eq!(tiered.get("k").await.unwrap(), Some(b"v".to_vec()));
        l2.delete("k").await.unwrap();
        // still served from L1 even though L2 no longer has it
        assert_eq!(tiered.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn get_with_timeout_falls_back_to_none_on_slow_l2() {
        struct SlowStore;
        #[async_trait]
        impl KvStore for SlowStore {
            async fn get(&self, _key: &str) -> anyhow::Result<Option<Vec<u8>>> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Some(b"late".to_vec()))
            }
            async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> anyhow::Result<()> {
                Ok(())
            }
            async fn delete(&self, _key: &str) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let tiered = TieredKvStore::new(Arc::new(SlowStore), 100, Duration::from_secs(60));
        let result = tiered
            .get_with_timeout("k", Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(result, None);
    }
}
