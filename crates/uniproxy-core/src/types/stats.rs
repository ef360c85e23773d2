//! Tier statistics

/// Counters reported by a cache tier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierStats {
    /// Fresh hits
    pub hits: u64,
    /// Stale-but-serveable hits
    pub stale_hits: u64,
    /// Misses, including expired entries discarded on lookup
    pub misses: u64,
    /// Stores
    pub writes: u64,
    /// Entries dropped to stay under capacity
    pub evictions: u64,
    /// Current entry count
    pub size: usize,
}
