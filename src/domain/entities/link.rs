//! Short link entity representing a code-to-destination mapping.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A stored short link with its visit counter.
///
/// `visited` only ever moves forward and is written exclusively by the visit
/// consumer; everything else about the link belongs to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ShortLink {
    pub id: i64,
    pub owner_id: String,
    pub full_url: String,
    pub short_code: String,
    pub visited: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ShortLink {
    /// Creates a new ShortLink instance.
    pub fn new(
        id: i64,
        owner_id: String,
        full_url: String,
        short_code: String,
        visited: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_id,
            full_url,
            short_code,
            visited,
            created_at,
            updated_at: None,
        }
    }
}

/// Input data for creating a new short link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShortLink {
    pub owner_id: String,
    pub full_url: String,
    pub short_code: String,
}
