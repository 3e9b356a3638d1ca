//! Handler for short URL redirect.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect},
};

use crate::error::AppError;
use crate::state::AppState;

/// Redirects a short code to its destination URL.
///
/// # Endpoint
///
/// `GET /{short_code}`
///
/// Resolution goes through [`crate::application::services::ResolverService`]:
/// cache first, link store on a miss, then one visit event per successful
/// resolution.
///
/// # Errors
///
/// Returns 400 Bad Request for a malformed code, 404 Not Found for an unknown one
/// and 500 Internal Server Error when a backend fails or times out.
pub async fn redirect_handler(
    Path(short_code): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let full_url = state.resolver.resolve(&short_code).await?;

    Ok(Redirect::temporary(&full_url))
}
