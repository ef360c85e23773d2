//! Error types for cache tiers and the upstream client

use thiserror::Error;

/// Errors raised by cache tier operations.
///
/// Tier failures never reach a client: a probe that fails is treated as a
/// miss, and background writes log the error and drop it.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Backend connection failed
    #[error("connection error: {0}")]
    Connection(String),

    /// Backend operation failed
    #[error("backend error: {0}")]
    Backend(String),

    /// Serialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("deserialization error: {0}")]
    Deserialization(String),
}

/// Result type alias for cache tier operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors from the upstream market API.
///
/// `Clone` because one fetch result fans out to every coalesced waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// The upstream answered 429
    #[error("rate limited by upstream API")]
    RateLimited,

    /// The upstream answered a non-2xx status other than 429
    #[error("upstream returned {status} {reason}")]
    Status { status: u16, reason: String },

    /// Network failure or a body that did not decode as JSON
    #[error("failed to fetch from upstream API: {0}")]
    Transport(String),
}
