//! Cache tier trait

use crate::{CacheEntry, CacheError, TierStats};
use async_trait::async_trait;

/// A single cache tier holding opaque payload bytes plus freshness metadata.
///
/// Implementations include the in-process edge tier and the shared Redis
/// slow tier. A tier must never hand back an entry past its serveable
/// window; detecting one during `get` removes it and reports a miss.
#[async_trait]
pub trait TierBackend: Send + Sync + 'static {
    /// Get an entry, or `None` if absent or no longer serveable
    async fn get(&self, key: &str) -> Result<Option<CacheEntry<Vec<u8>>>, CacheError>;

    /// Store an entry, replacing any existing one under the key
    async fn set(&self, key: &str, entry: CacheEntry<Vec<u8>>) -> Result<(), CacheError>;

    /// Delete a key; returns `true` if it existed
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Drop every entry this tier holds
    async fn clear(&self) -> Result<(), CacheError>;

    /// Number of entries currently held
    async fn len(&self) -> Result<usize, CacheError>;

    /// Counters for diagnostics
    async fn stats(&self) -> Result<TierStats, CacheError> {
        Ok(TierStats::default())
    }
}
