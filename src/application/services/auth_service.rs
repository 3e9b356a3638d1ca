//! Authentication service for the internal service token.

use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

use crate::error::AppError;
use serde_json::json;

type HmacSha256 = Hmac<Sha256>;

/// Authenticates calls from sibling services via a shared Bearer token.
///
/// The configured token is never compared directly. Both sides are MAC'd with a
/// per-process random key and checked with [`Mac::verify_slice`], which runs in
/// constant time.
pub struct AuthService {
    signing_key: [u8; 32],
    expected_tag: Vec<u8>,
}

impl AuthService {
    /// Creates a service accepting exactly `api_token`.
    pub fn new(api_token: &str) -> Self {
        let mut signing_key = [0u8; 32];
        rand::rng().fill(&mut signing_key);

        let expected_tag = Self::mac(&signing_key, api_token).finalize().into_bytes().to_vec();

        Self {
            signing_key,
            expected_tag,
        }
    }

    fn mac(key: &[u8], token: &str) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
        mac.update(token.as_bytes());
        mac
    }

    /// Checks a presented Bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthorized`] if the token does not match.
    pub fn authenticate(&self, token: &str) -> Result<(), AppError> {
        Self::mac(&self.signing_key, token)
            .verify_slice(&self.expected_tag)
            .map_err(|_| {
                AppError::unauthorized("Unauthorized", json!({"reason": "Invalid service token"}))
            })
    }
}
