//! Dual-tier stale-while-revalidate cache
//!
//! Lookup probes the edge tier, then the slow tier, then falls through to a
//! coalesced upstream fetch. Stale-but-serveable hits answer immediately and
//! refresh in the background; tier writes never block the response path.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use uniproxy_core::{
    CacheEntry, CacheSource, EndpointClass, Served, TierBackend, UpstreamError, keys,
};
use uniproxy_storage::MemoryTier;

use crate::coalescer::{Coalescer, CoalescerConfig};

/// Configuration for the SWR cache
#[derive(Debug, Clone)]
pub struct SwrCacheConfig {
    /// Origin used to synthesize URL-form edge keys
    pub edge_origin: String,
}

impl Default for SwrCacheConfig {
    fn default() -> Self {
        Self {
            edge_origin: "https://uniproxy.local".to_string(),
        }
    }
}

/// The layered cache: a fast per-process edge tier, an optional shared slow
/// tier, and single-flight upstream fetching for whatever misses both.
///
/// Cloning creates a new handle to the SAME tiers and in-flight tracking.
#[derive(Clone)]
pub struct SwrCache {
    edge: MemoryTier,
    slow: Option<Arc<dyn TierBackend>>,
    coalescer: Coalescer<Vec<u8>>,
    config: SwrCacheConfig,
}

impl SwrCache {
    /// Create a cache running on the edge tier alone
    pub fn new(edge: MemoryTier) -> Self {
        Self {
            edge,
            slow: None,
            coalescer: Coalescer::new(CoalescerConfig::default()),
            config: SwrCacheConfig::default(),
        }
    }

    /// Attach the shared slow tier
    pub fn with_slow_tier(mut self, slow: Arc<dyn TierBackend>) -> Self {
        self.slow = Some(slow);
        self
    }

    /// Override the cache configuration
    pub fn with_config(mut self, config: SwrCacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the coalescer tuning
    pub fn with_coalescer(mut self, config: CoalescerConfig) -> Self {
        self.coalescer = Coalescer::new(config);
        self
    }

    /// Look up `key`, falling back to a coalesced `producer` invocation on a
    /// miss. Returns the payload along with the tier that produced it and
    /// whether it was stale (in which case a background revalidation has
    /// been enqueued).
    pub async fn fetch<T, F, Fut>(
        &self,
        key: &str,
        class: EndpointClass,
        producer: F,
    ) -> Result<Served<T>, UpstreamError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, UpstreamError>> + Send + 'static,
    {
        let edge_key = keys::edge_url(&self.config.edge_origin, key);

        // 1. Edge tier. Probe failures and undecodable entries are misses.
        if let Some(entry) = self.probe_edge(&edge_key).await {
            match serde_json::from_slice::<T>(&entry.value) {
                Ok(value) => {
                    let stale = entry.is_stale();
                    if stale {
                        self.spawn_revalidation(key, class, producer);
                    }
                    return Ok(Served {
                        value,
                        source: CacheSource::Edge,
                        stale,
                    });
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "dropping undecodable edge entry");
                    let _ = self.edge.delete(&edge_key).await;
                }
            }
        }

        // 2. Slow tier. A hit is copied into the edge tier off the response
        // path so subsequent local requests skip this probe.
        if let Some(slow) = &self.slow {
            match slow.get(key).await {
                Ok(Some(entry)) => match serde_json::from_slice::<T>(&entry.value) {
                    Ok(value) => {
                        let stale = entry.is_stale();
                        self.spawn_edge_backfill(edge_key, entry, class);
                        if stale {
                            self.spawn_revalidation(key, class, producer);
                        }
                        return Ok(Served {
                            value,
                            source: CacheSource::Slow,
                            stale,
                        });
                    }
                    Err(e) => {
                        warn!(key = %key, error = %e, "dropping undecodable slow-tier entry");
                        let _ = slow.delete(key).await;
                    }
                },
                Ok(None) => {}
                Err(e) => debug!(key = %key, error = %e, "slow tier probe failed, treating as miss"),
            }
        }

        // 3. Miss: one coalesced upstream fetch; the leader stores both
        // tiers off the response path.
        let this = self.clone();
        let store_key = key.to_string();
        let bytes = self
            .coalescer
            .coalesce(key, move || {
                let fut = producer();
                async move {
                    let value = fut.await?;
                    let bytes = serde_json::to_vec(&value).map_err(|e| {
                        UpstreamError::Transport(format!("encode upstream payload: {e}"))
                    })?;
                    this.spawn_store(store_key, bytes.clone(), class);
                    Ok(bytes)
                }
            })
            .await?;

        let value = serde_json::from_slice(&bytes)
            .map_err(|e| UpstreamError::Transport(format!("decode upstream payload: {e}")))?;

        Ok(Served {
            value,
            source: CacheSource::Upstream,
            stale: false,
        })
    }

    /// Clear both tiers and all in-flight tracking
    pub async fn reset(&self) {
        let _ = self.edge.clear().await;
        if let Some(slow) = &self.slow {
            let _ = slow.clear().await;
        }
        self.coalescer.reset();
    }

    async fn probe_edge(&self, edge_key: &str) -> Option<CacheEntry<Vec<u8>>> {
        match self.edge.get(edge_key).await {
            Ok(found) => found,
            Err(e) => {
                debug!(error = %e, "edge tier probe failed, treating as miss");
                None
            }
        }
    }

    /// Copy a slow-tier hit into the edge tier, keeping its cached-at stamp
    /// so staleness carries over.
    fn spawn_edge_backfill(
        &self,
        edge_key: String,
        entry: CacheEntry<Vec<u8>>,
        class: EndpointClass,
    ) {
        let edge = self.edge.clone();
        let policy = class.policy();
        tokio::spawn(async move {
            let copy = CacheEntry {
                value: entry.value,
                cached_at: entry.cached_at,
                ttl: policy.edge_ttl,
                swr: policy.swr,
            };
            if let Err(e) = edge.set(&edge_key, copy).await {
                warn!(error = %e, "edge backfill failed");
            }
        });
    }

    /// Write a fetched payload through to both tiers, each with fresh
    /// metadata. Failures are logged and swallowed.
    fn spawn_store(&self, key: String, bytes: Vec<u8>, class: EndpointClass) {
        let edge = self.edge.clone();
        let slow = self.slow.clone();
        let edge_key = keys::edge_url(&self.config.edge_origin, &key);
        let policy = class.policy();
        tokio::spawn(async move {
            let edge_entry = CacheEntry::new(bytes.clone(), policy.edge_ttl, policy.swr);
            if let Err(e) = edge.set(&edge_key, edge_entry).await {
                warn!(key = %key, error = %e, "edge tier write failed");
            }

            if let Some(slow) = slow {
                let slow_entry = CacheEntry::new(bytes, policy.slow_ttl, policy.swr);
                if let Err(e) = slow.set(&key, slow_entry).await {
                    warn!(key = %key, error = %e, "slow tier write failed");
                }
            }
        });
    }

    /// Refresh a stale entry in the background. The fetch is coalesced
    /// under its own namespace so revalidations and in-band misses never
    /// starve each other; failures leave the stale data to age out.
    fn spawn_revalidation<T, F, Fut>(&self, key: &str, class: EndpointClass, producer: F)
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, UpstreamError>> + Send + 'static,
    {
        let this = self.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            let revalidation_key = keys::revalidation(&key);
            let store = this.clone();
            let store_key = key.clone();
            let result = this
                .coalescer
                .coalesce(&revalidation_key, move || {
                    let fut = producer();
                    async move {
                        let value = fut.await?;
                        let bytes = serde_json::to_vec(&value).map_err(|e| {
                            UpstreamError::Transport(format!("encode upstream payload: {e}"))
                        })?;
                        store.spawn_store(store_key, bytes.clone(), class);
                        Ok(bytes)
                    }
                })
                .await;

            if let Err(e) = result {
                debug!(key = %key, error = %e, "revalidation failed, stale entry ages out");
            }
        });
    }
}
