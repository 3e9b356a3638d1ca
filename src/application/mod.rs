//! Application layer services implementing business logic.
//!
//! Services orchestrate the link store, the resolution cache and the visit queue
//! behind trait objects and give HTTP handlers a narrow API.
//!
//! # Available Services
//!
//! - [`services::resolver::ResolverService`] - Redirect resolution and visit publishing
//! - [`services::link_service::LinkService`] - Link creation, listing, update and delete
//! - [`services::auth_service::AuthService`] - Internal service token authentication

pub mod services;
