//! Redis-backed cache implementation.

use super::service::{CacheError, CacheResult, CacheService};
use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Key namespace for cached short code mappings.
const KEY_PREFIX: &str = "short_code:";

/// Redis cache for fast short code lookups.
///
/// Uses a `ConnectionManager` for automatic reconnection; clones share one
/// multiplexed connection.
#[derive(Clone)]
pub struct RedisCache {
    client: ConnectionManager,
}

impl RedisCache {
    /// Wraps an already established connection manager.
    pub fn new(client: ConnectionManager) -> Self {
        Self { client }
    }

    /// Connects to Redis and validates the connection with a PING.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::ConnectionError`] if the URL is invalid, the connection
    /// cannot be established, or the PING fails.
    pub async fn connect(redis_url: &str) -> CacheResult<Self> {
        info!("Connecting to Redis cache");

        let client = redis::Client::open(redis_url).map_err(|e| {
            CacheError::ConnectionError(format!("Failed to create Redis client: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            CacheError::ConnectionError(format!("Failed to connect to Redis: {}", e))
        })?;

        let mut test_conn = manager.clone();
        test_conn
            .ping::<()>()
            .await
            .map_err(|e| CacheError::ConnectionError(format!("Redis PING failed: {}", e)))?;

        info!("✓ Connected to Redis cache");

        Ok(Self::new(manager))
    }

    /// Constructs the full Redis key with namespace prefix.
    fn build_key(short_code: &str) -> String {
        format!("{}{}", KEY_PREFIX, short_code)
    }
}

#[async_trait]
impl CacheService for RedisCache {
    async fn get_url(&self, short_code: &str) -> CacheResult<Option<String>> {
        let key = Self::build_key(short_code);
        let mut conn = self.client.clone();

        let url = conn.get::<_, Option<String>>(&key).await.map_err(|e| {
            warn!(short_code, error = %e, "Redis GET failed");
            CacheError::OperationError(e.to_string())
        })?;

        match &url {
            Some(_) => debug!(short_code, "Cache HIT"),
            None => debug!(short_code, "Cache MISS"),
        }

        Ok(url)
    }

    async fn set_url(&self, short_code: &str, full_url: &str, ttl: Duration) -> CacheResult<()> {
        let key = Self::build_key(short_code);
        let mut conn = self.client.clone();
        let ttl_seconds = ttl.as_secs().max(1);

        conn.set_ex::<_, _, ()>(&key, full_url, ttl_seconds)
            .await
            .map_err(|e| {
                warn!(short_code, error = %e, "Redis SET failed");
                CacheError::OperationError(e.to_string())
            })?;

        debug!(short_code, ttl_seconds, "Cache SET");
        Ok(())
    }

    async fn invalidate(&self, short_code: &str) -> CacheResult<()> {
        let key = Self::build_key(short_code);
        let mut conn = self.client.clone();

        let deleted = conn.del::<_, i32>(&key).await.map_err(|e| {
            warn!(short_code, error = %e, "Redis DEL failed");
            CacheError::OperationError(e.to_string())
        })?;

        if deleted > 0 {
            debug!(short_code, "Cache INVALIDATE");
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.client.clone();
        conn.ping::<()>().await.is_ok()
    }
}
