//! API route configuration.
//!
//! All API endpoints require Bearer token authentication via
//! [`crate::api::middleware::auth`].

use crate::api::handlers::{
    create_link_handler, delete_link_handler, get_link_handler, owner_links_handler,
    update_link_handler,
};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

/// All API routes, protected by Bearer token authentication.
///
/// # Endpoints
///
/// - `POST   /links`                   - Create a short link
/// - `GET    /links/{id}`              - Fetch a link
/// - `PATCH  /links/{id}`              - Change a link's destination
/// - `DELETE /links/{id}`              - Delete a link
/// - `GET    /owners/{owner_id}/links` - List an owner's links, newest first
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/links", post(create_link_handler))
        .route(
            "/links/{id}",
            get(get_link_handler)
                .patch(update_link_handler)
                .delete(delete_link_handler),
        )
        .route("/owners/{owner_id}/links", get(owner_links_handler))
}
