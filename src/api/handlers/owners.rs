//! Handler for listing an owner's links.

use axum::{
    Json,
    extract::{Path, State},
};
use serde_json::json;

use crate::api::dto::envelope::{Envelope, Meta};
use crate::api::dto::links::{OWNER_ID_REGEX, OwnerLinkItem};
use crate::error::AppError;
use crate::state::AppState;

/// Lists all links of an owner, newest first.
///
/// # Endpoint
///
/// `GET /api/owners/{owner_id}/links`
///
/// # Response
///
/// ```json
/// {
///   "messages": "short links found",
///   "data": [
///     { "id": 3, "full_url": "https://example.com", "short_url": "http://localhost:3000/ab12CD34", "visited": 6 }
///   ],
///   "error": null,
///   "meta": { "total_data": 1 }
/// }
/// ```
///
/// An owner without links gets an empty list, not 404.
pub async fn owner_links_handler(
    Path(owner_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<OwnerLinkItem>>>, AppError> {
    if owner_id.len() > 128 || !OWNER_ID_REGEX.is_match(&owner_id) {
        return Err(AppError::bad_request(
            "Invalid owner id",
            json!({ "owner_id": owner_id }),
        ));
    }

    let links = state.link_service.list_by_owner(&owner_id).await?;

    let items: Vec<OwnerLinkItem> = links
        .into_iter()
        .map(|link| OwnerLinkItem {
            short_url: state.link_service.short_url(&link.short_code),
            id: link.id,
            full_url: link.full_url,
            visited: link.visited,
        })
        .collect();

    let total_data = items.len();

    Ok(Json(
        Envelope::success("short links found", items).with_meta(Meta { total_data }),
    ))
}
