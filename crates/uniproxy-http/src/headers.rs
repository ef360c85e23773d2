//! Response header builders

use std::time::Duration;

use http::{HeaderMap, HeaderValue};

use uniproxy_core::CacheSource;

/// Stamp the cache-debug headers on a proxied response.
///
/// `X-Cache` reports HIT for anything served from a tier, MISS for an
/// upstream round trip; `Cache-Control` lets downstream caches hold the
/// body for the edge-tier fresh window.
pub fn apply_cache_headers(
    headers: &mut HeaderMap,
    source: CacheSource,
    stale: bool,
    edge_ttl: Duration,
) {
    let hit = !matches!(source, CacheSource::Upstream);
    headers.insert("x-cache", HeaderValue::from_static(if hit { "HIT" } else { "MISS" }));
    headers.insert("x-cache-source", HeaderValue::from_static(source.as_str()));
    headers.insert(
        "x-cache-stale",
        HeaderValue::from_static(if stale { "true" } else { "false" }),
    );
    if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={}", edge_ttl.as_secs())) {
        headers.insert(http::header::CACHE_CONTROL, value);
    }
}

/// Stamp the rate-limit headers. `reset_epoch` is absolute epoch seconds.
pub fn apply_rate_limit_headers(
    headers: &mut HeaderMap,
    limit: usize,
    remaining: usize,
    reset_epoch: u64,
) {
    let entries = [
        ("x-ratelimit-limit", limit.to_string()),
        ("x-ratelimit-remaining", remaining.to_string()),
        ("x-ratelimit-reset", reset_epoch.to_string()),
    ];
    for (name, value) in entries {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
}
