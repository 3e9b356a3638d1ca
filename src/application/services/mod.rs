//! Business logic services for the application layer.

pub mod auth_service;
pub mod link_service;
pub mod resolver;

pub use auth_service::AuthService;
pub use link_service::LinkService;
pub use resolver::{ResolverService, ResolverSettings};
