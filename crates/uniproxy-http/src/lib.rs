//! uniproxy-http: HTTP primitives for the uniproxy market-price proxy

mod cors;
mod headers;
mod payload;

pub use cors::CorsPolicy;
pub use headers::{apply_cache_headers, apply_rate_limit_headers};
pub use payload::CachedPayload;
