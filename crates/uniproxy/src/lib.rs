//! uniproxy: caching core for the Universalis market-price proxy
//!
//! Three subsystems compose the fast path from request to response:
//!
//! - **[`SwrCache`]**: a dual-tier stale-while-revalidate cache, a fast
//!   in-process edge tier backed by an optional shared slow tier, with
//!   background revalidation of stale hits and write-through on misses.
//! - **[`Coalescer`]**: single-flight tracking that collapses concurrent
//!   misses for one key into a single upstream fetch.
//! - **[`RateLimiter`]**: a per-identifier sliding-window request ledger.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use uniproxy::{EndpointClass, MemoryTier, SwrCache, UpstreamError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), UpstreamError> {
//!     let cache = SwrCache::new(MemoryTier::with_defaults());
//!
//!     let served = cache
//!         .fetch("aggregated:crystal:5808", EndpointClass::Aggregated, || async {
//!             Ok::<_, UpstreamError>(String::from("{\"items\":[]}"))
//!         })
//!         .await?;
//!
//!     println!("{} from {}", served.value, served.source.as_str());
//!     Ok(())
//! }
//! ```

mod coalescer;
mod limiter;
mod swr;


// Re-export core
pub use uniproxy_core::*;

// Re-export storage
#[cfg(feature = "memory")]
pub use uniproxy_storage::{MemoryTier, MemoryTierConfig};

#[cfg(feature = "redis")]
pub use uniproxy_storage::{RedisTier, RedisTierConfig};

pub use coalescer::{Coalescer, CoalescerConfig};
pub use limiter::{RateLimitDecision, RateLimitPolicy, RateLimiter};
pub use swr::{SwrCache, SwrCacheConfig};
