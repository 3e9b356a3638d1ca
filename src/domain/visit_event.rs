//! Visit event carried on the visit accounting queue.

use serde::{Deserialize, Serialize};

/// Signals that a short code was resolved once.
///
/// The increment is implicit: every event counts as exactly one visit. Events are
/// created by the resolver on every successful resolution, cache hit or miss, and
/// consumed by [`crate::domain::visit_consumer::VisitConsumer`].
///
/// Wire format is JSON: `{"short_code":"ab12CD34"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitEvent {
    pub short_code: String,
}

impl VisitEvent {
    pub fn new(short_code: impl Into<String>) -> Self {
        Self {
            short_code: short_code.into(),
        }
    }

    /// Encodes the event as a queue payload.
    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("VisitEvent serialization is infallible")
    }

    /// Decodes a queue payload.
    ///
    /// # Errors
    ///
    /// Returns the JSON error for malformed payloads or an empty `short_code`.
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        let event: Self = serde_json::from_slice(payload)?;
        if event.short_code.is_empty() {
            return Err(serde::de::Error::custom("short_code must not be empty"));
        }
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_produces_expected_json() {
        let payload = VisitEvent::new("ab12CD34").encode();
        assert_eq!(payload, br#"{"short_code":"ab12CD34"}"#);
    }

    #[test]
    fn test_decode_valid_payload() {
        let event = VisitEvent::decode(br#"{"short_code":"ab12CD34"}"#).unwrap();
        assert_eq!(event.short_code, "ab12CD34");
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let event = VisitEvent::decode(br#"{"short_code":"ab12CD34","source":"web"}"#).unwrap();
        assert_eq!(event.short_code, "ab12CD34");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(VisitEvent::decode(b"not json").is_err());
        assert!(VisitEvent::decode(br#"{"code":"ab12CD34"}"#).is_err());
    }

    #[test]
    fn test_decode_rejects_empty_code() {
        assert!(VisitEvent::decode(br#"{"short_code":""}"#).is_err());
    }
}
