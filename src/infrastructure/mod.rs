//! Infrastructure layer for external integrations.
//!
//! This layer implements interfaces defined by the domain layer.
//!
//! # Modules
//!
//! - [`cache`] - Resolution cache (Redis and no-op implementations)
//! - [`persistence`] - PostgreSQL link store
//! - [`queue`] - Visit accounting queue (Redis Streams and in-process implementations)

pub mod cache;
pub mod persistence;
pub mod queue;
