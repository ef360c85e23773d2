//! Shared application state

use std::sync::Arc;

use tracing::{info, warn};

use uniproxy::{
    MemoryTier, RateLimitPolicy, RateLimiter, RedisTier, RedisTierConfig, SwrCache, UpstreamError,
};
use uniproxy_http::CorsPolicy;

use crate::config::ServerConfig;
use crate::upstream::UniversalisClient;

/// Everything the handlers share. Cloning is cheap: the cache, limiter, and
/// client are all handles onto shared state.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub cors: CorsPolicy,
    pub cache: SwrCache,
    pub limiter: RateLimiter,
    pub upstream: UniversalisClient,
}

impl AppState {
    /// Build the state, attaching the slow tier when one is configured.
    /// A slow tier that fails to connect degrades to edge-only operation
    /// rather than refusing to start.
    pub async fn from_config(config: ServerConfig) -> Result<Self, UpstreamError> {
        let mut cache = SwrCache::new(MemoryTier::with_defaults());

        if let Some(url) = &config.redis_url {
            match RedisTier::new(RedisTierConfig::new(url)).await {
                Ok(tier) => {
                    info!("slow tier attached");
                    cache = cache.with_slow_tier(Arc::new(tier));
                }
                Err(e) => {
                    warn!(error = %e, "slow tier unavailable, running edge-only");
                }
            }
        }

        let limiter = RateLimiter::new(RateLimitPolicy {
            max_requests: config.rate_limit_requests,
            window: config.rate_limit_window,
        });

        let cors = CorsPolicy::new(
            config.allowed_origins.clone(),
            config.environment.is_development(),
        );

        let upstream = UniversalisClient::new(&config.upstream_base)?;

        Ok(Self {
            config,
            cors,
            cache,
            limiter,
            upstream,
        })
    }
}
