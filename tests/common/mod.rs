#![allow(dead_code)]

use async_trait::async_trait;
use axum::routing::get;
use axum::{Router, middleware};
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use link_shortener::api;
use link_shortener::api::handlers::{health_handler, redirect_handler};
use link_shortener::api::middleware::auth;
use link_shortener::application::services::ResolverSettings;
use link_shortener::domain::entities::{NewShortLink, ShortLink};
use link_shortener::domain::repositories::LinkRepository;
use link_shortener::error::AppError;
use link_shortener::infrastructure::cache::{CacheResult, CacheService};
use link_shortener::infrastructure::queue::MemoryQueue;
use link_shortener::state::AppState;

pub const TEST_TOKEN: &str = "test-internal-token";
pub const BASE_URL: &str = "http://sho.rt";

/// Link store kept in a vector, mirroring the Postgres semantics the services rely on.
#[derive(Default)]
pub struct InMemoryLinkRepository {
    links: Mutex<Vec<ShortLink>>,
    next_id: AtomicI64,
    unavailable: AtomicBool,
}

impl InMemoryLinkRepository {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            ..Default::default()
        }
    }

    /// Inserts a link directly, bypassing code generation.
    pub fn seed(&self, owner_id: &str, short_code: &str, full_url: &str, visited: i64) -> ShortLink {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let link = ShortLink::new(
            id,
            owner_id.to_string(),
            full_url.to_string(),
            short_code.to_string(),
            visited,
            Utc::now() + chrono::Duration::milliseconds(id),
        );
        self.links.lock().unwrap().push(link.clone());
        link
    }

    pub fn get(&self, short_code: &str) -> Option<ShortLink> {
        self.links
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.short_code == short_code)
            .cloned()
    }

    /// Makes every subsequent call fail like a lost database connection.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::internal("Database error", json!({})));
        }
        Ok(())
    }
}

#[async_trait]
impl LinkRepository for InMemoryLinkRepository {
    async fn create(&self, new_link: NewShortLink) -> Result<ShortLink, AppError> {
        self.check_available()?;
        if self.get(&new_link.short_code).is_some() {
            return Err(AppError::conflict("Unique constraint violation", json!({})));
        }
        Ok(self.seed(&new_link.owner_id, &new_link.short_code, &new_link.full_url, 0))
    }

    async fn find_by_code(&self, short_code: &str) -> Result<Option<ShortLink>, AppError> {
        self.check_available()?;
        Ok(self.get(short_code))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<ShortLink>, AppError> {
        self.check_available()?;
        Ok(self.links.lock().unwrap().iter().find(|l| l.id == id).cloned())
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ShortLink>, AppError> {
        self.check_available()?;
        let mut links: Vec<ShortLink> = self
            .links
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.owner_id == owner_id)
            .cloned()
            .collect();
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(links)
    }

    async fn update_destination(&self, id: i64, full_url: &str) -> Result<ShortLink, AppError> {
        self.check_available()?;
        let mut links = self.links.lock().unwrap();
        let link = links
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| AppError::not_found("Short link not found", json!({ "id": id })))?;
        link.full_url = full_url.to_string();
        link.updated_at = Some(Utc::now());
        Ok(link.clone())
    }

    async fn increment_visits(&self, short_code: &str, by: i64) -> Result<bool, AppError> {
        self.check_available()?;
        let mut links = self.links.lock().unwrap();
        match links.iter_mut().find(|l| l.short_code == short_code) {
            Some(link) => {
                link.visited += by;
                link.updated_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        self.check_available()?;
        let mut links = self.links.lock().unwrap();
        let before = links.len();
        links.retain(|l| l.id != id);
        Ok(links.len() != before)
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.check_available()
    }
}

/// Cache that ignores TTLs.
#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryCache {
    pub fn get(&self, short_code: &str) -> Option<String> {
        self.entries.lock().unwrap().get(short_code).cloned()
    }

    pub fn put(&self, short_code: &str, full_url: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(short_code.to_string(), full_url.to_string());
    }
}

#[async_trait]
impl CacheService for InMemoryCache {
    async fn get_url(&self, short_code: &str) -> CacheResult<Option<String>> {
        Ok(self.get(short_code))
    }

    async fn set_url(&self, short_code: &str, full_url: &str, _ttl: Duration) -> CacheResult<()> {
        self.put(short_code, full_url);
        Ok(())
    }

    async fn invalidate(&self, short_code: &str) -> CacheResult<()> {
        self.entries.lock().unwrap().remove(short_code);
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// Backends behind a test [`AppState`], kept for assertions.
pub struct TestBackends {
    pub links: Arc<InMemoryLinkRepository>,
    pub cache: Arc<InMemoryCache>,
    pub queue: MemoryQueue,
}

pub fn create_test_state() -> (AppState, TestBackends) {
    let backends = TestBackends {
        links: Arc::new(InMemoryLinkRepository::new()),
        cache: Arc::new(InMemoryCache::default()),
        queue: MemoryQueue::with_poll_interval(1_000, Duration::from_millis(10)),
    };

    let state = AppState::new(
        backends.links.clone(),
        backends.cache.clone(),
        Arc::new(backends.queue.clone()),
        ResolverSettings::default(),
        BASE_URL,
        TEST_TOKEN,
    );

    (state, backends)
}

/// Full route table without the per-IP rate limiter, which needs a real socket.
pub fn test_router(state: AppState) -> Router {
    let api_router = api::routes::protected_routes()
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::layer));

    Router::new()
        .route("/health", get(health_handler))
        .route("/{short_code}", get(redirect_handler))
        .nest("/api", api_router)
        .with_state(state)
}

pub fn bearer() -> String {
    format!("Bearer {TEST_TOKEN}")
}
