//! Visit queue traits and error types.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while talking to the queue backend.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue connection error: {0}")]
    ConnectionError(String),
    #[error("Queue operation error: {0}")]
    OperationError(String),
    #[error("Queue is full")]
    Full,
    #[error("Queue is closed")]
    Closed,
}

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// A message pulled from the queue, pending acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Backend-assigned message id (a stream entry id for Redis).
    pub id: String,
    pub payload: Vec<u8>,
}

/// Message channel carrying visit events from the resolver to the visit consumer.
///
/// A queue instance is bound to one topic at construction. Publishing never waits
/// for a consumer; consumers pull through a [`Subscription`].
///
/// # Implementations
///
/// - [`crate::infrastructure::queue::RedisStreamQueue`] - durable, at-least-once
/// - [`crate::infrastructure::queue::MemoryQueue`] - in-process bounded channel
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VisitQueue: Send + Sync {
    /// Appends a payload to the topic.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Full`] if a bounded backend has no room, or
    /// [`QueueError::OperationError`] if the backend rejects the write.
    async fn publish(&self, payload: &[u8]) -> QueueResult<()>;

    /// Opens a pull subscription for the named consumer.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ConnectionError`] if the subscription cannot be set up.
    async fn subscribe(&self, consumer: &str) -> QueueResult<Box<dyn Subscription>>;

    /// Checks if the queue backend is reachable.
    async fn health_check(&self) -> bool;
}

/// Lazy sequence of deliveries for one consumer.
///
/// A delivery stays pending until it is acknowledged or dead-lettered. Pending
/// deliveries of a durable backend are handed out again after a restart.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Subscription: Send {
    /// Waits a bounded time for the next delivery.
    ///
    /// Returns `Ok(None)` when nothing arrived within the poll window.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] once the queue can never yield again, or
    /// [`QueueError::OperationError`] on backend failures.
    async fn next(&mut self) -> QueueResult<Option<Delivery>>;

    /// Marks a delivery as processed.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::OperationError`] on backend failures.
    async fn ack(&mut self, delivery: &Delivery) -> QueueResult<()>;

    /// Moves a delivery that cannot be processed to the dead-letter topic and
    /// acknowledges it.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::OperationError`] on backend failures.
    async fn dead_letter(&mut self, delivery: &Delivery, reason: &str) -> QueueResult<()>;
}
