//! Domain layer containing business entities and logic.
//!
//! It defines entities, repository interfaces, and the visit pipeline pieces that are
//! independent of the concrete store, cache and queue backends.
//!
//! # Architecture
//!
//! - [`entities`] - Core business data structures
//! - [`repositories`] - Data access trait definitions
//! - [`visit_event`] - Visit accounting message model
//! - [`visit_consumer`] - Background consumer applying visit counts
//!
//! # Visit Processing Flow
//!
//! 1. [`crate::application::services::ResolverService`] resolves a short code
//! 2. A [`visit_event::VisitEvent`] is published to the visit queue
//! 3. [`visit_consumer::VisitConsumer`] applies the increment with retry logic
//! 4. The counter is persisted via [`repositories::LinkRepository::increment_visits`]

pub mod entities;
pub mod repositories;
pub mod visit_consumer;
pub mod visit_event;
