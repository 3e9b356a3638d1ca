//! Visit accounting queue.
//!
//! Provides the [`VisitQueue`] and [`Subscription`] traits with two implementations:
//! - [`RedisStreamQueue`] - Redis Streams consumer group, durable and at-least-once
//! - [`MemoryQueue`] - bounded in-process channel, used when Redis is not configured

mod memory;
mod redis_stream;
mod service;

pub use memory::MemoryQueue;
pub use redis_stream::{RedisStreamQueue, StreamStats, StreamTopology};
pub use service::{Delivery, QueueError, QueueResult, Subscription, VisitQueue};

#[cfg(test)]
pub use service::{MockSubscription, MockVisitQueue};
