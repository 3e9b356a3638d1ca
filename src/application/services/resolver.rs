//! Short code resolution on the redirect hot path.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde_json::json;
use tracing::{debug, warn};

use crate::domain::repositories::LinkRepository;
use crate::domain::visit_event::VisitEvent;
use crate::error::AppError;
use crate::infrastructure::cache::CacheService;
use crate::infrastructure::queue::VisitQueue;
use crate::utils::code_generator::validate_code;

/// Tuning knobs for [`ResolverService`].
#[derive(Debug, Clone, Copy)]
pub struct ResolverSettings {
    /// Lifetime of a cache entry populated after a store read.
    pub cache_ttl: Duration,
    /// Upper bound for each cache, store and queue call.
    pub io_timeout: Duration,
    /// When true, a failed visit publish fails the resolution.
    pub strict_publish: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(60 * 60),
            io_timeout: Duration::from_secs(2),
            strict_publish: false,
        }
    }
}

/// Resolves short codes to destination URLs and records the visit.
///
/// # Algorithm
///
/// 1. Reject malformed codes before any I/O
/// 2. Look the code up in the resolution cache
/// 3. On a miss, read the link store and populate the cache
/// 4. Publish one [`VisitEvent`] for the code
///
/// Cache population is best-effort. Visit publishing is fire-and-forget unless
/// [`ResolverSettings::strict_publish`] is set, so queue outages do not take
/// redirects down with them.
pub struct ResolverService {
    links: Arc<dyn LinkRepository>,
    cache: Arc<dyn CacheService>,
    queue: Arc<dyn VisitQueue>,
    settings: ResolverSettings,
}

impl ResolverService {
    /// Creates a new resolver.
    pub fn new(
        links: Arc<dyn LinkRepository>,
        cache: Arc<dyn CacheService>,
        queue: Arc<dyn VisitQueue>,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            links,
            cache,
            queue,
            settings,
        }
    }

    /// Returns the destination URL for `short_code`.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] if the code is empty, not 8 characters, or not alphanumeric
    /// - [`AppError::NotFound`] if neither cache nor store know the code
    /// - [`AppError::Internal`] on cache-read or store failures and timeouts, and on
    ///   publish failures in strict mode
    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, short_code: &str) -> Result<String, AppError> {
        validate_code(short_code)?;

        let cached = self
            .bounded("cache lookup", self.cache.get_url(short_code))
            .await??;

        let full_url = match cached {
            Some(url) => {
                counter!("cache_hits_total").increment(1);
                debug!("Resolved from cache");
                url
            }
            None => {
                counter!("cache_misses_total").increment(1);
                self.resolve_from_store(short_code).await?
            }
        };

        self.record_visit(short_code).await?;

        Ok(full_url)
    }

    async fn resolve_from_store(&self, short_code: &str) -> Result<String, AppError> {
        let link = self
            .bounded("store lookup", self.links.find_by_code(short_code))
            .await??
            .ok_or_else(|| {
                AppError::not_found(
                    "short code not found",
                    json!({ "short_code": short_code }),
                )
            })?;

        let populate = self.cache.set_url(short_code, &link.full_url, self.settings.cache_ttl);
        match self.bounded("cache populate", populate).await {
            Ok(Ok(())) => debug!("Resolved from store, cache populated"),
            Ok(Err(e)) => warn!(error = %e, "Failed to populate cache"),
            Err(e) => warn!(error = %e, "Cache populate timed out"),
        }

        Ok(link.full_url)
    }

    async fn record_visit(&self, short_code: &str) -> Result<(), AppError> {
        let payload = VisitEvent::new(short_code).encode();

        let error = match self.bounded("visit publish", self.queue.publish(&payload)).await {
            Ok(Ok(())) => {
                counter!("visit_events_published_total").increment(1);
                return Ok(());
            }
            Ok(Err(e)) => AppError::from(e),
            Err(e) => e,
        };

        counter!("visit_events_publish_failed_total").increment(1);

        if self.settings.strict_publish {
            return Err(error);
        }

        warn!(error = %error, "Visit event dropped");
        Ok(())
    }

    /// Runs `fut` under the configured I/O timeout.
    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = T>,
    ) -> Result<T, AppError> {
        tokio::time::timeout(self.settings.io_timeout, fut)
            .await
            .map_err(|_| {
                AppError::internal(
                    format!("{operation} timed out"),
                    json!({ "timeout_ms": self.settings.io_timeout.as_millis() as u64 }),
                )
            })
    }
}
