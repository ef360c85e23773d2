//! uniproxy-storage: Cache tier backends for uniproxy

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "memory")]
pub use memory::{MemoryTier, MemoryTierConfig};

#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "redis")]
pub use redis::{RedisTier, RedisTierConfig};
