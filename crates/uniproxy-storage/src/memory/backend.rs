//! In-process edge tier using DashMap

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

use uniproxy_core::{CacheEntry, CacheError, TierBackend, TierStats};

/// Configuration for the edge tier
#[derive(Debug, Clone)]
pub struct MemoryTierConfig {
    /// Maximum number of entries (0 = unlimited)
    pub max_capacity: usize,
}

impl Default for MemoryTierConfig {
    fn default() -> Self {
        Self { max_capacity: 10_000 }
    }
}

impl MemoryTierConfig {
    /// Create config with a specific capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self { max_capacity: capacity }
    }

    /// Create config with unlimited capacity
    pub fn unlimited() -> Self {
        Self { max_capacity: 0 }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    stale_hits: u64,
    misses: u64,
    writes: u64,
    evictions: u64,
}

/// The fast, local, per-process cache tier.
///
/// Entries past their serveable window are removed when a lookup finds
/// them. Cloning creates a new handle to the SAME underlying store.
#[derive(Clone)]
pub struct MemoryTier {
    data: Arc<DashMap<String, CacheEntry<Vec<u8>>>>,
    counters: Arc<RwLock<Counters>>,
    config: MemoryTierConfig,
}

impl MemoryTier {
    /// Create a new edge tier
    pub fn new(config: MemoryTierConfig) -> Self {
        Self {
            data: Arc::new(DashMap::new()),
            counters: Arc::new(RwLock::new(Counters::default())),
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(MemoryTierConfig::default())
    }

    /// Evict entries if at capacity, preferring non-serveable ones
    fn maybe_evict(&self) {
        if self.config.max_capacity == 0 || self.data.len() < self.config.max_capacity {
            return;
        }

        let overflow = self.data.len() + 1 - self.config.max_capacity;

        let mut victims: Vec<String> = self
            .data
            .iter()
            .filter(|entry| !entry.value().is_serveable())
            .map(|entry| entry.key().clone())
            .take(overflow)
            .collect();

        if victims.len() < overflow {
            let more = overflow - victims.len();
            let additional: Vec<String> = self
                .data
                .iter()
                .filter(|entry| !victims.contains(entry.key()))
                .map(|entry| entry.key().clone())
                .take(more)
                .collect();
            victims.extend(additional);
        }

        let mut counters = self.counters.write();
        for key in victims {
            if self.data.remove(&key).is_some() {
                counters.evictions += 1;
            }
        }
    }
}

#[async_trait]
impl TierBackend for MemoryTier {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry<Vec<u8>>>, CacheError> {
        match self.data.get(key) {
            Some(entry) => {
                if !entry.is_serveable() {
                    drop(entry);
                    self.data.remove(key);
                    self.counters.write().misses += 1;
                    return Ok(None);
                }

                let mut counters = self.counters.write();
                if entry.is_stale() {
                    counters.stale_hits += 1;
                } else {
                    counters.hits += 1;
                }

                Ok(Some(entry.clone()))
            }
            None => {
                self.counters.write().misses += 1;
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, entry: CacheEntry<Vec<u8>>) -> Result<(), CacheError> {
        self.maybe_evict();
        self.data.insert(key.to_string(), entry);
        self.counters.write().writes += 1;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.data.remove(key).is_some())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.data.clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize, CacheError> {
        Ok(self.data.len())
    }

    async fn stats(&self) -> Result<TierStats, CacheError> {
        let counters = self.counters.read();
        Ok(TierStats {
            hits: counters.hits,
            stale_hits: counters.stale_hits,
            misses: counters.misses,
            writes: counters.writes,
            evictions: counters.evictions,
            size: self.data.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn entry(body: &[u8], ttl: Duration, swr: Duration) -> CacheEntry<Vec<u8>> {
        CacheEntry::new(body.to_vec(), ttl, swr)
    }

    #[tokio::test]
    async fn test_basic_get_set() {
        let tier = MemoryTier::with_defaults();

        tier.set("key1", entry(b"value1", Duration::from_secs(60), Duration::ZERO))
            .await
            .unwrap();

        let result = tier.get("key1").await.unwrap();
        assert_eq!(result.unwrap().value, b"value1".to_vec());
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let tier = MemoryTier::with_defaults();
        assert!(tier.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_entry_is_served() {
        let tier = MemoryTier::with_defaults();

        let mut stale = entry(b"old", Duration::from_secs(300), Duration::from_secs(600));
        stale.cached_at = SystemTime::now() - Duration::from_secs(400);
        tier.set("key", stale).await.unwrap();

        let got = tier.get("key").await.unwrap().unwrap();
        assert!(got.is_stale());
        assert_eq!(got.value, b"old".to_vec());
    }

    #[tokio::test]
    async fn test_expired_entry_removed_on_lookup() {
        let tier = MemoryTier::with_defaults();

        let mut expired = entry(b"dead", Duration::from_secs(300), Duration::from_secs(600));
        expired.cached_at = SystemTime::now() - Duration::from_secs(1000);
        tier.set("key", expired).await.unwrap();
        assert_eq!(tier.len().await.unwrap(), 1);

        assert!(tier.get("key").await.unwrap().is_none());
        assert_eq!(tier.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete() {
        let tier = MemoryTier::with_defaults();
        tier.set("key", entry(b"v", Duration::from_secs(60), Duration::ZERO))
            .await
            .unwrap();

        assert!(tier.delete("key").await.unwrap());
        assert!(!tier.delete("key").await.unwrap());
        assert!(tier.get("key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_capacity_eviction() {
        let tier = MemoryTier::new(MemoryTierConfig::with_capacity(2));

        for key in ["a", "b", "c"] {
            tier.set(key, entry(b"v", Duration::from_secs(60), Duration::ZERO))
                .await
                .unwrap();
        }

        assert!(tier.len().await.unwrap() <= 2);
        assert!(tier.stats().await.unwrap().evictions >= 1);
    }

    #[tokio::test]
    async fn test_stats_counters() {
        let tier = MemoryTier::with_defaults();
        tier.set("key", entry(b"v", Duration::from_secs(60), Duration::ZERO))
            .await
            .unwrap();

        tier.get("key").await.unwrap();
        tier.get("missing").await.unwrap();

        let stats = tier.stats().await.unwrap();
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let tier = MemoryTier::with_defaults();
        tier.set("a", entry(b"1", Duration::from_secs(60), Duration::ZERO))
            .await
            .unwrap();
        tier.set("b", entry(b"2", Duration::from_secs(60), Duration::ZERO))
            .await
            .unwrap();

        tier.clear().await.unwrap();
        assert_eq!(tier.len().await.unwrap(), 0);
    }
}
