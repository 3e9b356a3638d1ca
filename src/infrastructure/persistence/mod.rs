//! PostgreSQL repository implementations.
//!
//! - [`PgLinkRepository`] - Short link storage, lookup and visit counting

pub mod pg_link_repository;

pub use pg_link_repository::PgLinkRepository;
