use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use bb8_redis::RedisConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

use uniproxy_core::{CacheEntry, CacheError, TierBackend};

use super::config::RedisTierConfig;

/// The shared slow tier.
///
/// Entries are stored JSON-encoded with a redis-side expiry of
/// `ttl + swr`, so redis itself reclaims anything past the serveable
/// window. The serveability check on read covers metadata drift between
/// writers with different clocks.
#[derive(Clone)]
pub struct RedisTier {
    pool: Pool<RedisConnectionManager>,
    config: RedisTierConfig,
}

impl RedisTier {
    /// Create a new slow tier, establishing the connection pool
    pub async fn new(config: RedisTierConfig) -> Result<Self, CacheError> {
        let manager = RedisConnectionManager::new(config.url.as_str())
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        Ok(Self { pool, config })
    }

    fn prefixed_key(&self, key: &str) -> String {
        match &self.config.key_prefix {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        }
    }

    async fn get_connection(&self) -> Result<PooledConnection<'_, RedisConnectionManager>, CacheError> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))
    }
}

#[async_trait]
impl TierBackend for RedisTier {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry<Vec<u8>>>, CacheError> {
        let mut conn = self.get_connection().await?;
        let prefixed = self.prefixed_key(key);

        let bytes: Option<Vec<u8>> = conn
            .get(&prefixed)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;

        let Some(data) = bytes else {
            return Ok(None);
        };

        let entry: CacheEntry<Vec<u8>> = serde_json::from_slice(&data)
            .map_err(|e| CacheError::Deserialization(e.to_string()))?;

        if !entry.is_serveable() {
            debug!(key = %key, "discarding expired slow-tier entry");
            let _: bool = conn
                .del(&prefixed)
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    async fn set(&self, key: &str, entry: CacheEntry<Vec<u8>>) -> Result<(), CacheError> {
        let serialized =
            serde_json::to_vec(&entry).map_err(|e| CacheError::Serialization(e.to_string()))?;

        let mut conn = self.get_connection().await?;
        let prefixed = self.prefixed_key(key);

        // Expiry covers the full serveable window, never less than a second
        let expiry = (entry.ttl + entry.swr).as_secs().max(1);
        let _: () = conn
            .set_ex(&prefixed, &serialized, expiry)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.get_connection().await?;
        let prefixed = self.prefixed_key(key);

        conn.del(&prefixed)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut conn = self.get_connection().await?;

        let match_pattern = match &self.config.key_prefix {
            Some(prefix) => format!("{}:*", prefix),
            None => "*".to_string(),
        };

        let mut cursor = 0u64;
        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .cursor_arg(cursor)
                .arg("MATCH")
                .arg(&match_pattern)
                .arg("COUNT")
                .arg(1000)
                .query_async(&mut *conn)
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))?;

            if !keys.is_empty() {
                let _: usize = conn
                    .unlink(&keys)
                    .await
                    .map_err(|e| CacheError::Backend(e.to_string()))?;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(())
    }

    async fn len(&self) -> Result<usize, CacheError> {
        let mut conn = self.get_connection().await?;

        let match_pattern = match &self.config.key_prefix {
            Some(prefix) => format!("{}:*", prefix),
            None => "*".to_string(),
        };

        let mut cursor = 0u64;
        let mut count = 0;
        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .cursor_arg(cursor)
                .arg("MATCH")
                .arg(&match_pattern)
                .arg("COUNT")
                .arg(1000)
                .query_async(&mut *conn)
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))?;

            count += keys.len();
            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(count)
    }
}
