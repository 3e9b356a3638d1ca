//! Service token guard for the internal `/api` routes.
//!
//! The link API is called by sibling services, not by end users. They all present
//! the same shared secret (`INTERNAL_API_TOKEN`); there are no per-client tokens.

use axum::{
    extract::{FromRequestParts, Request, State},
    middleware::Next,
    response::Response,
};
use axum_auth::AuthBearer;
use serde_json::json;

use crate::{error::AppError, state::AppState};

/// Rejects `/api` requests that do not carry the shared service token.
///
/// Expects `Authorization: Bearer <INTERNAL_API_TOKEN>`. The check itself lives in
/// [`crate::application::services::AuthService`].
///
/// A missing or malformed header and a wrong token both end in a 401 envelope with
/// `WWW-Authenticate: Bearer`; only `data.reason` tells them apart.
///
/// Mounted with `route_layer`, so unknown `/api` paths still answer 404:
///
/// ```rust,ignore
/// let api = api::routes::protected_routes()
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth::layer));
/// ```
pub async fn layer(
    State(st): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();

    let AuthBearer(token) = AuthBearer::from_request_parts(&mut parts, &())
        .await
        .map_err(|_| {
            AppError::unauthorized(
                "Unauthorized",
                json!({ "reason": "Authorization header is missing or invalid" }),
            )
        })?;

    st.auth_service.authenticate(&token)?;

    Ok(next.run(Request::from_parts(parts, body)).await)
}
