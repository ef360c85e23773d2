//! uniproxy-core: Core types and traits for the uniproxy market-price proxy
//!
//! This crate provides the foundational types shared by the storage tiers,
//! the SWR cache manager, and the HTTP surface.

mod error;
pub mod keys;
mod traits;
mod types;

pub use error::{CacheError, Result, UpstreamError};
pub use traits::*;
pub use types::*;
