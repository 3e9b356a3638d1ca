//! Standard JSON response envelope shared by every endpoint.

use serde::Serialize;
use serde_json::Value;

/// Response body wrapper: `{ messages, data, error, meta }`.
///
/// Successful responses carry `error: null`; failures carry the machine-readable
/// error code from [`crate::error::AppError::code`] and never include `meta`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub messages: String,
    pub data: T,
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// Collection metadata attached to list responses.
#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub total_data: usize,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(messages: impl Into<String>, data: T) -> Self {
        Self {
            messages: messages.into(),
            data,
            error: None,
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }
}

impl Envelope<Value> {
    pub fn failure(messages: impl Into<String>, data: Value, code: &'static str) -> Self {
        Self {
            messages: messages.into(),
            data,
            error: Some(code),
            meta: None,
        }
    }
}
