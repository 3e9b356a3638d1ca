//! Shared application state handed to every handler.

use std::sync::Arc;

use crate::application::services::{AuthService, LinkService, ResolverService, ResolverSettings};
use crate::domain::repositories::LinkRepository;
use crate::infrastructure::cache::CacheService;
use crate::infrastructure::queue::VisitQueue;

/// Services and backends shared across requests.
///
/// Cloning is cheap: every field is reference counted.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<ResolverService>,
    pub link_service: Arc<LinkService>,
    pub auth_service: Arc<AuthService>,
    pub links: Arc<dyn LinkRepository>,
    pub cache: Arc<dyn CacheService>,
    pub visit_queue: Arc<dyn VisitQueue>,
}

impl AppState {
    /// Wires the services on top of the given backends.
    pub fn new(
        links: Arc<dyn LinkRepository>,
        cache: Arc<dyn CacheService>,
        visit_queue: Arc<dyn VisitQueue>,
        resolver_settings: ResolverSettings,
        base_url: &str,
        api_token: &str,
    ) -> Self {
        let resolver = ResolverService::new(
            links.clone(),
            cache.clone(),
            visit_queue.clone(),
            resolver_settings,
        );
        let link_service = LinkService::new(links.clone(), cache.clone(), base_url);

        Self {
            resolver: Arc::new(resolver),
            link_service: Arc::new(link_service),
            auth_service: Arc::new(AuthService::new(api_token)),
            links,
            cache,
            visit_queue,
        }
    }
}
