//! Short code generation and validation utilities.
//!
//! Codes are fixed-length strings over `[A-Za-z0-9]`. The generator does not
//! guarantee uniqueness; the link store's unique constraint does.

use crate::error::AppError;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde_json::json;

/// Length of every short code handed out and accepted on redirect.
pub const SHORT_CODE_LENGTH: usize = 8;

/// Generates a random alphanumeric code of `length` characters.
///
/// # Panics
///
/// Panics if the operating system random number generator is unavailable.
///
/// # Examples
///
/// ```ignore
/// let code = generate_code(SHORT_CODE_LENGTH);
/// assert_eq!(code.len(), 8);
/// assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
/// ```
pub fn generate_code(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Returns true if `code` has the short code length and alphabet.
pub fn is_valid_code(code: &str) -> bool {
    code.len() == SHORT_CODE_LENGTH && code.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Validates a short code received from a client before any I/O.
///
/// # Errors
///
/// Returns [`AppError::Validation`] if the code is empty, has the wrong length,
/// or contains characters outside `[A-Za-z0-9]`.
pub fn validate_code(code: &str) -> Result<(), AppError> {
    if code.is_empty() {
        return Err(AppError::bad_request(
            "short code cannot be empty",
            json!({ "short_code": code }),
        ));
    }

    if code.len() != SHORT_CODE_LENGTH {
        return Err(AppError::bad_request(
            format!("short code length must be {SHORT_CODE_LENGTH}"),
            json!({ "short_code": code, "provided_length": code.len() }),
        ));
    }

    if !is_valid_code(code) {
        return Err(AppError::bad_request(
            "short code can only contain letters and digits",
            json!({ "short_code": code }),
        ));
    }

    Ok(())
}
