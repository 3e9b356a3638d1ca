//! Handlers for link management endpoints (create, get, update, delete).

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use validator::Validate;

use crate::api::dto::envelope::Envelope;
use crate::api::dto::links::{CreateLinkRequest, LinkResponse, UpdateLinkRequest};
use crate::error::AppError;
use crate::state::AppState;

/// Creates a short link for an owner.
///
/// # Endpoint
///
/// `POST /api/links`
///
/// # Request Body
///
/// ```json
/// { "owner_id": "64b7f0c2e1a4", "full_url": "https://example.com/page" }
/// ```
///
/// # Errors
///
/// Returns 400 Bad Request if validation fails.
pub async fn create_link_handler(
    State(state): State<AppState>,
    Json(payload): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<Envelope<LinkResponse>>), AppError> {
    payload.validate()?;

    let link = state
        .link_service
        .create(&payload.owner_id, &payload.full_url)
        .await?;
    let short_url = state.link_service.short_url(&link.short_code);

    Ok((
        StatusCode::CREATED,
        Json(Envelope::success(
            "short link created",
            LinkResponse::new(link, short_url),
        )),
    ))
}

/// Returns a single link.
///
/// # Endpoint
///
/// `GET /api/links/{id}`
///
/// # Errors
///
/// Returns 404 Not Found if the link doesn't exist.
pub async fn get_link_handler(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Envelope<LinkResponse>>, AppError> {
    let link = state.link_service.get(id).await?;
    let short_url = state.link_service.short_url(&link.short_code);

    Ok(Json(Envelope::success(
        "short link found",
        LinkResponse::new(link, short_url),
    )))
}

/// Points a link at a new destination.
///
/// # Endpoint
///
/// `PATCH /api/links/{id}`
///
/// # Request Body
///
/// ```json
/// { "full_url": "https://new-destination.com" }
/// ```
///
/// # Cache
///
/// The cached mapping is invalidated after the write, so the next redirect
/// uses the new destination.
///
/// # Errors
///
/// Returns 404 Not Found if the link doesn't exist.
/// Returns 400 Bad Request if validation fails.
pub async fn update_link_handler(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateLinkRequest>,
) -> Result<Json<Envelope<LinkResponse>>, AppError> {
    payload.validate()?;

    let link = state
        .link_service
        .update_destination(id, &payload.full_url)
        .await?;
    let short_url = state.link_service.short_url(&link.short_code);

    Ok(Json(Envelope::success(
        "short link updated",
        LinkResponse::new(link, short_url),
    )))
}

/// Deletes a link and its cached mapping.
///
/// # Endpoint
///
/// `DELETE /api/links/{id}`
///
/// # Errors
///
/// Returns 404 Not Found if the link doesn't exist.
pub async fn delete_link_handler(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state.link_service.delete(id).await?;

    Ok(StatusCode::NO_CONTENT)
}
