//! DTOs for link management endpoints.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use validator::Validate;

use crate::domain::entities::ShortLink;

/// Owner ids are opaque, but restricted to a URL-safe alphabet.
pub static OWNER_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.:@-]+$").unwrap());

/// Request body for `POST /api/links`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLinkRequest {
    #[validate(length(min = 1, max = 128))]
    #[validate(regex(path = "*OWNER_ID_REGEX", message = "Invalid owner id"))]
    pub owner_id: String,

    #[validate(url(message = "Invalid URL format"))]
    pub full_url: String,
}

/// Request body for `PATCH /api/links/{id}`.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLinkRequest {
    /// New destination URL for this link.
    #[validate(url(message = "Invalid URL format"))]
    pub full_url: String,
}

/// Full JSON representation of a link.
#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub id: i64,
    pub owner_id: String,
    pub full_url: String,
    pub short_code: String,
    pub short_url: String,
    pub visited: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl LinkResponse {
    pub fn new(link: ShortLink, short_url: String) -> Self {
        Self {
            id: link.id,
            owner_id: link.owner_id,
            full_url: link.full_url,
            short_code: link.short_code,
            short_url,
            visited: link.visited,
            created_at: link.created_at,
            updated_at: link.updated_at,
        }
    }
}

/// Item of the owner listing: `{id, full_url, short_url, visited}`.
#[derive(Debug, Serialize)]
pub struct OwnerLinkItem {
    pub id: i64,
    pub full_url: String,
    pub short_url: String,
    pub visited: i64,
}
