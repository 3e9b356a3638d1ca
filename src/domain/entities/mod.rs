//! Core domain entities.
//!
//! - [`ShortLink`] - a stored code-to-destination mapping with its visit counter
//! - [`NewShortLink`] - insert payload for a link whose code is already chosen

pub mod link;

pub use link::{NewShortLink, ShortLink};
