//! Cache service trait and error types.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache connection error: {0}")]
    ConnectionError(String),
    #[error("Cache operation error: {0}")]
    OperationError(String),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Resolution cache mapping short codes to destination URLs.
///
/// Entries are a projection of the link store and carry no authority of their own:
/// they may be absent, expired, or (if a mutation skipped invalidation) stale until
/// their TTL runs out.
///
/// # Implementations
///
/// - [`crate::infrastructure::cache::RedisCache`] - Redis-backed cache with TTL support
/// - [`crate::infrastructure::cache::NullCache`] - No-op implementation for disabled caching
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Looks up the destination URL for a short code.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(url))` on cache hit
    /// - `Ok(None)` on cache miss
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::OperationError`] if the backend cannot be queried.
    async fn get_url(&self, short_code: &str) -> CacheResult<Option<String>>;

    /// Stores a mapping that expires after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::OperationError`] if the write fails.
    async fn set_url(&self, short_code: &str, full_url: &str, ttl: Duration) -> CacheResult<()>;

    /// Removes a cached mapping. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::OperationError`] if the delete fails.
    async fn invalidate(&self, short_code: &str) -> CacheResult<()>;

    /// Checks if the cache backend is reachable.
    async fn health_check(&self) -> bool;
}
