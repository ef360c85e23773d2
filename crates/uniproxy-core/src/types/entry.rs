//! Cache entry type

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// A cached payload with its freshness metadata.
///
/// An entry moves through three states as it ages: fresh (`age <= ttl`),
/// stale-but-serveable (`ttl < age <= ttl + swr`), and expired
/// (`age > ttl + swr`). Expired entries must never be served; the tier that
/// produced one removes it on sight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// The cached value, immutable once stored
    pub value: T,
    /// When the entry was stored
    pub cached_at: SystemTime,
    /// Fresh window
    pub ttl: Duration,
    /// Additional stale-but-serveable window after the fresh window closes
    pub swr: Duration,
}

impl<T> CacheEntry<T> {
    /// Create an entry stamped with the current time
    pub fn new(value: T, ttl: Duration, swr: Duration) -> Self {
        Self {
            value,
            cached_at: SystemTime::now(),
            ttl,
            swr,
        }
    }

    /// Age of the entry; clock regression counts as zero
    pub fn age(&self) -> Duration {
        self.cached_at.elapsed().unwrap_or_default()
    }

    /// Within the fresh window
    pub fn is_fresh(&self) -> bool {
        self.age() <= self.ttl
    }

    /// Within the fresh or stale-while-revalidate window
    pub fn is_serveable(&self) -> bool {
        self.age() <= self.ttl + self.swr
    }

    /// Serveable but no longer fresh; serving it should trigger a
    /// background revalidation
    pub fn is_stale(&self) -> bool {
        self.is_serveable() && !self.is_fresh()
    }

    /// Replace the value, keeping the metadata
    pub fn map<U, F>(self, f: F) -> CacheEntry<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheEntry {
            value: f(self.value),
            cached_at: self.cached_at,
            ttl: self.ttl,
            swr: self.swr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backdated(age: Duration) -> CacheEntry<&'static str> {
        let mut entry = CacheEntry::new("payload", Duration::from_secs(300), Duration::from_secs(600));
        entry.cached_at = SystemTime::now() - age;
        entry
    }

    #[test]
    fn test_new_entry_is_fresh() {
        let entry = CacheEntry::new(42, Duration::from_secs(60), Duration::ZERO);
        assert!(entry.is_fresh());
        assert!(entry.is_serveable());
        assert!(!entry.is_stale());
    }

    #[test]
    fn test_stale_window() {
        let entry = backdated(Duration::from_secs(400));
        assert!(!entry.is_fresh());
        assert!(entry.is_serveable());
        assert!(entry.is_stale());
    }

    #[test]
    fn test_expired_entry() {
        let entry = backdated(Duration::from_secs(1000));
        assert!(!entry.is_fresh());
        assert!(!entry.is_serveable());
        assert!(!entry.is_stale());
    }

    #[test]
    fn test_clock_regression_counts_as_zero_age() {
        let mut entry = CacheEntry::new(1, Duration::from_secs(1), Duration::ZERO);
        entry.cached_at = SystemTime::now() + Duration::from_secs(3600);
        assert_eq!(entry.age(), Duration::ZERO);
        assert!(entry.is_fresh());
    }

    #[test]
    fn test_map_keeps_metadata() {
        let entry = backdated(Duration::from_secs(400));
        let cached_at = entry.cached_at;
        let mapped = entry.map(|v| v.len());
        assert_eq!(mapped.value, 7);
        assert_eq!(mapped.cached_at, cached_at);
        assert!(mapped.is_stale());
    }
}
