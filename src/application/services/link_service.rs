//! Link creation, lookup and mutation service.

use std::sync::Arc;

use crate::domain::entities::{NewShortLink, ShortLink};
use crate::domain::repositories::LinkRepository;
use crate::error::AppError;
use crate::infrastructure::cache::CacheService;
use crate::utils::code_generator::{SHORT_CODE_LENGTH, generate_code};
use serde_json::json;
use url::Url;

const MAX_CODE_ATTEMPTS: usize = 10;

/// Service for managing short links on behalf of their owners.
///
/// Mutations write the store first and invalidate the cached mapping last, so a
/// concurrent redirect can at worst repopulate the cache with the new value.
pub struct LinkService {
    links: Arc<dyn LinkRepository>,
    cache: Arc<dyn CacheService>,
    base_url: String,
}

impl LinkService {
    /// Creates a new link service.
    ///
    /// `base_url` is the public origin that short codes are appended to.
    pub fn new(
        links: Arc<dyn LinkRepository>,
        cache: Arc<dyn CacheService>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            links,
            cache,
            base_url: base_url.into(),
        }
    }

    /// Creates a short link with a freshly generated code.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if the owner is empty or the URL is not an
    /// absolute http(s) URL.
    /// Returns [`AppError::Internal`] if no free code was found in 10 attempts.
    pub async fn create(&self, owner_id: &str, full_url: &str) -> Result<ShortLink, AppError> {
        if owner_id.trim().is_empty() {
            return Err(AppError::bad_request("owner id cannot be empty", json!({})));
        }
        let full_url = normalize_destination(full_url)?;

        for _ in 0..MAX_CODE_ATTEMPTS {
            let short_code = generate_code(SHORT_CODE_LENGTH);

            if self.links.find_by_code(&short_code).await?.is_some() {
                continue;
            }

            let new_link = NewShortLink {
                owner_id: owner_id.to_string(),
                full_url: full_url.clone(),
                short_code,
            };

            match self.links.create(new_link).await {
                Ok(link) => {
                    tracing::info!(id = link.id, short_code = %link.short_code, "Short link created");
                    return Ok(link);
                }
                // Lost a race for the same code; draw again.
                Err(AppError::Conflict { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(AppError::internal(
            "Failed to generate unique code",
            json!({ "reason": "Too many collisions" }),
        ))
    }

    /// Retrieves a link by id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no link has this id.
    pub async fn get(&self, id: i64) -> Result<ShortLink, AppError> {
        self.links
            .find_by_id(id)
            .await?
            .ok_or_else(|| link_not_found(id))
    }

    /// Lists an owner's links, newest first.
    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ShortLink>, AppError> {
        self.links.list_by_owner(owner_id).await
    }

    /// Points an existing link at a new destination.
    ///
    /// The destination is stored in the same normalized form as on creation.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for a malformed URL and
    /// [`AppError::NotFound`] if no link has this id.
    pub async fn update_destination(&self, id: i64, full_url: &str) -> Result<ShortLink, AppError> {
        let full_url = normalize_destination(full_url)?;

        let link = self.get(id).await?;
        let updated = self.links.update_destination(link.id, &full_url).await?;

        self.invalidate(&updated.short_code, "update").await;

        Ok(updated)
    }

    /// Removes a link.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no link has this id.
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        let link = self.get(id).await?;

        if !self.links.delete(link.id).await? {
            return Err(link_not_found(id));
        }

        self.invalidate(&link.short_code, "delete").await;

        Ok(())
    }

    /// Builds the public short URL for a code.
    pub fn short_url(&self, short_code: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), short_code)
    }

    async fn invalidate(&self, short_code: &str, operation: &'static str) {
        if let Err(e) = self.cache.invalidate(short_code).await {
            tracing::warn!(error = ?e, short_code, operation, "Failed to invalidate cache");
        }
    }
}

fn link_not_found(id: i64) -> AppError {
    AppError::not_found("Short link not found", json!({ "id": id }))
}

/// Accepts absolute `http` and `https` URLs with a host and returns the
/// serialized form of the parsed URL.
///
/// The parser drops tabs and newlines and percent-encodes non-ASCII input, so the
/// returned string is always a valid `Location` header value.
fn normalize_destination(full_url: &str) -> Result<String, AppError> {
    let parsed = Url::parse(full_url).map_err(|e| {
        AppError::bad_request("Invalid URL format", json!({ "reason": e.to_string() }))
    })?;

    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(AppError::bad_request(
            "Invalid URL format",
            json!({ "reason": "only absolute http and https URLs are allowed" }),
        ));
    }

    Ok(parsed.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::MockLinkRepository;
    use crate::infrastructure::cache::{CacheError, MockCacheService};
    use chrono::Utc;

    fn create_test_link(id: i64, code: &str, url: &str) -> ShortLink {
        ShortLink::new(
            id,
            "user-1".to_string(),
            url.to_string(),
            code.to_string(),
            0,
            Utc::now(),
        )
    }

    fn service(links: MockLinkRepository, cache: MockCacheService) -> LinkService {
        LinkService::new(Arc::new(links), Arc::new(cache), "https://sho.rt/")
    }

    #[tokio::test]
    async fn test_create_success() {
        let mut links = MockLinkRepository::new();

        links
            .expect_find_by_code()
            .times(1)
            .returning(|_| Ok(None));
        links
            .expect_create()
            .withf(|new_link| {
                new_link.owner_id == "user-1"
                    && new_link.full_url == "https://example.com/page"
                    && new_link.short_code.len() == SHORT_CODE_LENGTH
            })
            .times(1)
            .returning(|new_link| Ok(create_test_link(10, &new_link.short_code, &new_link.full_url)));

        let service = service(links, MockCacheService::new());

        let link = service.create("user-1", "https://example.com/page").await.unwrap();
        assert_eq!(link.full_url, "https://example.com/page");
        assert_eq!(link.visited, 0);
    }

    #[tokio::test]
    async fn test_create_retries_on_collision() {
        let mut links = MockLinkRepository::new();
        let mut seq = mockall::Sequence::new();

        links
            .expect_find_by_code()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|code| Ok(Some(create_test_link(1, code, "https://taken.com"))));
        links
            .expect_find_by_code()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(None));
        links
            .expect_create()
            .times(1)
            .returning(|new_link| Ok(create_test_link(2, &new_link.short_code, &new_link.full_url)));

        let service = service(links, MockCacheService::new());

        assert!(service.create("user-1", "https://example.com").await.is_ok());
    }

    #[tokio::test]
    async fn test_create_gives_up_after_max_attempts() {
        let mut links = MockLinkRepository::new();

        links
            .expect_find_by_code()
            .times(MAX_CODE_ATTEMPTS)
            .returning(|code| Ok(Some(create_test_link(1, code, "https://taken.com"))));
        links.expect_create().times(0);

        let service = service(links, MockCacheService::new());

        let err = service.create("user-1", "https://example.com").await.unwrap_err();
        assert!(matches!(err, AppError::Internal { .. }));
    }

    #[tokio::test]
    async fn test_create_invalid_url() {
        for url in ["not-a-url", "", "ftp://example.com/file", "mailto:someone@example.com"] {
            let service = service(MockLinkRepository::new(), MockCacheService::new());

            let err = service.create("user-1", url).await.unwrap_err();
            assert!(matches!(err, AppError::Validation { .. }), "{url:?}");
        }
    }

    #[tokio::test]
    async fn test_create_stores_normalized_destination() {
        let mut links = MockLinkRepository::new();

        links.expect_find_by_code().returning(|_| Ok(None));
        links
            .expect_create()
            .withf(|new_link| new_link.full_url == "https://example.com/ab")
            .times(1)
            .returning(|new_link| Ok(create_test_link(3, &new_link.short_code, &new_link.full_url)));

        let service = service(links, MockCacheService::new());

        let link = service.create("user-1", "https://example.com/a\nb").await.unwrap();
        assert_eq!(link.full_url, "https://example.com/ab");
        assert!(axum::http::HeaderValue::from_str(&link.full_url).is_ok());
    }

    #[tokio::test]
    async fn test_update_destination_stores_normalized_destination() {
        let mut links = MockLinkRepository::new();
        let mut cache = MockCacheService::new();

        links
            .expect_find_by_id()
            .returning(|id| Ok(Some(create_test_link(id, "ab12CD34", "https://old.com"))));
        links
            .expect_update_destination()
            .withf(|_, url| url == "https://new.com/caf%C3%A9?q=1")
            .times(1)
            .returning(|id, url| Ok(create_test_link(id, "ab12CD34", url)));
        cache.expect_invalidate().returning(|_| Ok(()));

        let service = service(links, cache);

        let link = service
            .update_destination(7, "https://new.com/caf\u{e9}?q=\t1")
            .await
            .unwrap();
        assert_eq!(link.full_url, "https://new.com/caf%C3%A9?q=1");
    }

    #[tokio::test]
    async fn test_create_empty_owner() {
        let service = service(MockLinkRepository::new(), MockCacheService::new());

        let err = service.create("  ", "https://example.com").await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_update_destination_invalidates_cache_after_write() {
        let mut links = MockLinkRepository::new();
        let mut cache = MockCacheService::new();
        let mut seq = mockall::Sequence::new();

        links
            .expect_find_by_id()
            .withf(|id| *id == 7)
            .times(1)
            .returning(|id| Ok(Some(create_test_link(id, "ab12CD34", "https://old.com"))));
        links
            .expect_update_destination()
            .withf(|id, url| *id == 7 && url == "https://new.com/page")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|id, url| Ok(create_test_link(id, "ab12CD34", url)));
        cache
            .expect_invalidate()
            .withf(|code| code == "ab12CD34")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let service = service(links, cache);

        let link = service.update_destination(7, "https://new.com/page").await.unwrap();
        assert_eq!(link.full_url, "https://new.com/page");
    }

    #[tokio::test]
    async fn test_update_destination_not_found() {
        let mut links = MockLinkRepository::new();
        let mut cache = MockCacheService::new();

        links.expect_find_by_id().returning(|_| Ok(None));
        links.expect_update_destination().times(0);
        cache.expect_invalidate().times(0);

        let service = service(links, cache);

        let err = service.update_destination(99, "https://new.com").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_destination_rejects_invalid_url_before_lookup() {
        let mut links = MockLinkRepository::new();
        links.expect_find_by_id().times(0);

        let service = service(links, MockCacheService::new());

        let err = service.update_destination(7, "nope").await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_update_destination_survives_invalidation_failure() {
        let mut links = MockLinkRepository::new();
        let mut cache = MockCacheService::new();

        links
            .expect_find_by_id()
            .returning(|id| Ok(Some(create_test_link(id, "ab12CD34", "https://old.com"))));
        links
            .expect_update_destination()
            .returning(|id, url| Ok(create_test_link(id, "ab12CD34", url)));
        cache
            .expect_invalidate()
            .times(1)
            .returning(|_| Err(CacheError::OperationError("timeout".to_string())));

        let service = service(links, cache);

        assert!(service.update_destination(7, "https://new.com").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_removes_and_invalidates() {
        let mut links = MockLinkRepository::new();
        let mut cache = MockCacheService::new();
        let mut seq = mockall::Sequence::new();

        links
            .expect_find_by_id()
            .returning(|id| Ok(Some(create_test_link(id, "ab12CD34", "https://example.com"))));
        links
            .expect_delete()
            .withf(|id| *id == 7)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(true));
        cache
            .expect_invalidate()
            .withf(|code| code == "ab12CD34")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let service = service(links, cache);

        assert!(service.delete(7).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_not_found() {
        let mut links = MockLinkRepository::new();
        let mut cache = MockCacheService::new();

        links.expect_find_by_id().returning(|_| Ok(None));
        links.expect_delete().times(0);
        cache.expect_invalidate().times(0);

        let service = service(links, cache);

        let err = service.delete(7).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[test]
    fn test_short_url_trims_trailing_slash() {
        let service = service(MockLinkRepository::new(), MockCacheService::new());
        assert_eq!(service.short_url("ab12CD34"), "https://sho.rt/ab12CD34");
    }
}
