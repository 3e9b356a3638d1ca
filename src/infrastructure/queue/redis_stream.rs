//! Durable visit queue on Redis Streams.
//!
//! Events are appended with `XADD` and consumed through a consumer group with
//! `XREADGROUP`. A delivery stays in the group's pending list until the consumer
//! calls `XACK`, which it does only after the store write succeeded. Acknowledged
//! entries are removed with `XDEL`, so the stream only holds the backlog. Entries
//! that cannot be processed are copied to a dead-letter stream and then acknowledged.
//!
//! Entries left pending by a consumer name that never comes back (fewer loops after
//! a restart, a renamed consumer) are taken over with `XAUTOCLAIM` once they have
//! been idle for the claim window.

use super::service::{Delivery, QueueError, QueueResult, Subscription, VisitQueue};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use redis::streams::{
    StreamAutoClaimOptions, StreamAutoClaimReply, StreamId, StreamPendingReply,
    StreamRangeReply, StreamReadOptions, StreamReadReply,
};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Stream entry field holding the encoded event.
const PAYLOAD_FIELD: &str = "payload";

/// Cursor value that starts, and ends, an `XAUTOCLAIM` scan.
const CLAIM_CURSOR_START: &str = "0-0";

/// Idle time after which another consumer's pending entry may be claimed.
const DEFAULT_CLAIM_MIN_IDLE: Duration = Duration::from_secs(60);

/// Stream names and consumer group of one visit topic.
#[derive(Debug, Clone)]
pub struct StreamTopology {
    pub stream: String,
    pub dead_letter_stream: String,
    pub group: String,
}

/// Depth of the visit topic, as reported by `admin queue info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamStats {
    /// Entries not yet acknowledged: undelivered plus pending.
    pub length: usize,
    pub pending: usize,
    pub dead_letters: usize,
}

/// Redis Streams implementation of [`VisitQueue`].
#[derive(Clone)]
pub struct RedisStreamQueue {
    client: ConnectionManager,
    topology: StreamTopology,
    poll_interval: Duration,
    claim_min_idle: Duration,
}

impl RedisStreamQueue {
    /// Connects to Redis and makes sure the consumer group exists.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ConnectionError`] if Redis is unreachable or the group
    /// cannot be created.
    pub async fn connect(redis_url: &str, topology: StreamTopology) -> QueueResult<Self> {
        info!(stream = %topology.stream, group = %topology.group, "Connecting to Redis visit stream");

        let client = redis::Client::open(redis_url).map_err(|e| {
            QueueError::ConnectionError(format!("Failed to create Redis client: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            QueueError::ConnectionError(format!("Failed to connect to Redis: {}", e))
        })?;

        let queue = Self::new(manager, topology);
        queue.ensure_group().await?;

        info!("✓ Visit stream ready");
        Ok(queue)
    }

    /// Wraps an established connection without touching Redis.
    pub fn new(client: ConnectionManager, topology: StreamTopology) -> Self {
        Self {
            client,
            topology,
            poll_interval: Duration::from_millis(250),
            claim_min_idle: DEFAULT_CLAIM_MIN_IDLE,
        }
    }

    /// Sets how long an entry must sit unacknowledged under another consumer before
    /// subscriptions of this queue take it over. Defaults to 60s.
    pub fn with_claim_min_idle(mut self, claim_min_idle: Duration) -> Self {
        self.claim_min_idle = claim_min_idle;
        self
    }

    pub fn topology(&self) -> &StreamTopology {
        &self.topology
    }

    /// Creates the consumer group (and the stream) if missing.
    ///
    /// The group starts at id `0` so that events published before the first
    /// consumer came up are still counted.
    async fn ensure_group(&self) -> QueueResult<()> {
        let mut conn = self.client.clone();
        let result: redis::RedisResult<()> = conn
            .xgroup_create_mkstream(&self.topology.stream, &self.topology.group, "0")
            .await;

        match result {
            Ok(()) => {
                info!(group = %self.topology.group, "Created visit consumer group");
                Ok(())
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(QueueError::ConnectionError(format!(
                "Failed to create consumer group: {}",
                e
            ))),
        }
    }

    /// Reports stream length, unacknowledged deliveries and dead letters.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::OperationError`] on Redis failures.
    pub async fn stats(&self) -> QueueResult<StreamStats> {
        let mut conn = self.client.clone();

        let length: usize = conn.xlen(&self.topology.stream).await.map_err(op_error)?;
        let dead_letters: usize = conn
            .xlen(&self.topology.dead_letter_stream)
            .await
            .map_err(op_error)?;
        let pending: StreamPendingReply = conn
            .xpending(&self.topology.stream, &self.topology.group)
            .await
            .map_err(op_error)?;

        Ok(StreamStats {
            length,
            pending: pending.count(),
            dead_letters,
        })
    }

    /// Moves every dead-lettered event back onto the visit stream.
    ///
    /// Returns the number of events requeued.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::OperationError`] on Redis failures. Events requeued
    /// before the failure stay requeued.
    pub async fn requeue_dead_letters(&self) -> QueueResult<usize> {
        let mut conn = self.client.clone();
        let reply: StreamRangeReply = conn
            .xrange_all(&self.topology.dead_letter_stream)
            .await
            .map_err(op_error)?;

        let mut moved = 0;
        for entry in reply.ids {
            let payload = entry.get::<Vec<u8>>(PAYLOAD_FIELD).unwrap_or_default();
            let _: String = conn
                .xadd(&self.topology.stream, "*", &[(PAYLOAD_FIELD, payload)])
                .await
                .map_err(op_error)?;
            let _: i64 = conn
                .xdel(&self.topology.dead_letter_stream, &[&entry.id])
                .await
                .map_err(op_error)?;
            moved += 1;
        }

        Ok(moved)
    }
}

fn op_error(e: redis::RedisError) -> QueueError {
    QueueError::OperationError(e.to_string())
}

#[async_trait]
impl VisitQueue for RedisStreamQueue {
    async fn publish(&self, payload: &[u8]) -> QueueResult<()> {
        let mut conn = self.client.clone();
        let id: String = conn
            .xadd(&self.topology.stream, "*", &[(PAYLOAD_FIELD, payload)])
            .await
            .map_err(|e| {
                warn!(stream = %self.topology.stream, error = %e, "XADD failed");
                op_error(e)
            })?;

        debug!(stream = %self.topology.stream, id, "Published visit event");
        Ok(())
    }

    async fn subscribe(&self, consumer: &str) -> QueueResult<Box<dyn Subscription>> {
        self.ensure_group().await?;

        Ok(Box::new(RedisStreamSubscription {
            client: self.client.clone(),
            topology: self.topology.clone(),
            consumer: consumer.to_string(),
            poll_interval: self.poll_interval,
            claim_min_idle: self.claim_min_idle,
            phase: ReadPhase::OwnPending,
            last_claim_scan: Instant::now(),
        }))
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.client.clone();
        conn.ping::<()>().await.is_ok()
    }
}

/// Where a subscription currently reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReadPhase {
    /// Own pending entries, left over from before a crash.
    OwnPending,
    /// Idle pending entries of other consumers, scanned from `cursor`.
    Claiming { cursor: String },
    /// Entries never delivered to any consumer.
    New,
}

/// One named consumer inside the visit consumer group.
///
/// Starts by replaying its own pending entries, then claims entries other consumers
/// left idle for longer than the claim window, then switches to new entries. The
/// claim scan is repeated once per claim window while the subscription is idle.
struct RedisStreamSubscription {
    client: ConnectionManager,
    topology: StreamTopology,
    consumer: String,
    poll_interval: Duration,
    claim_min_idle: Duration,
    phase: ReadPhase,
    last_claim_scan: Instant,
}

impl RedisStreamSubscription {
    async fn read_one(&mut self, start_id: &str) -> QueueResult<Option<StreamId>> {
        let options = StreamReadOptions::default()
            .group(&self.topology.group, &self.consumer)
            .count(1);

        let mut conn = self.client.clone();
        let reply: Option<StreamReadReply> = conn
            .xread_options(&[&self.topology.stream], &[start_id], &options)
            .await
            .map_err(op_error)?;

        Ok(reply
            .and_then(|r| r.keys.into_iter().next())
            .and_then(|key| key.ids.into_iter().next()))
    }

    /// Claims the next idle entry at or after `cursor`.
    ///
    /// Returns the claimed entry, if any, and the cursor to continue from.
    async fn claim_one(&mut self, cursor: &str) -> QueueResult<(Option<StreamId>, String)> {
        let mut conn = self.client.clone();
        let reply: StreamAutoClaimReply = conn
            .xautoclaim_options(
                &self.topology.stream,
                &self.topology.group,
                &self.consumer,
                self.claim_min_idle.as_millis() as u64,
                cursor,
                StreamAutoClaimOptions::default().count(1),
            )
            .await
            .map_err(op_error)?;

        Ok((reply.claimed.into_iter().next(), reply.next_stream_id))
    }
}

#[async_trait]
impl Subscription for RedisStreamSubscription {
    async fn next(&mut self) -> QueueResult<Option<Delivery>> {
        if self.phase == ReadPhase::OwnPending {
            match self.read_one("0").await? {
                Some(entry) => return Ok(Some(into_delivery(entry))),
                None => {
                    debug!(consumer = %self.consumer, "Pending backlog drained");
                    self.phase = ReadPhase::Claiming {
                        cursor: CLAIM_CURSOR_START.to_string(),
                    };
                }
            }
        }

        while let ReadPhase::Claiming { cursor } = &self.phase {
            let cursor = cursor.clone();
            let (claimed, next_cursor) = self.claim_one(&cursor).await?;

            if next_cursor == CLAIM_CURSOR_START {
                self.phase = ReadPhase::New;
                self.last_claim_scan = Instant::now();
            } else {
                self.phase = ReadPhase::Claiming { cursor: next_cursor };
            }

            if let Some(entry) = claimed {
                info!(consumer = %self.consumer, id = %entry.id, "Claimed idle visit event");
                return Ok(Some(into_delivery(entry)));
            }
        }

        match self.read_one(">").await? {
            Some(entry) => Ok(Some(into_delivery(entry))),
            None => {
                if self.last_claim_scan.elapsed() >= self.claim_min_idle {
                    self.phase = ReadPhase::Claiming {
                        cursor: CLAIM_CURSOR_START.to_string(),
                    };
                }
                tokio::time::sleep(self.poll_interval).await;
                Ok(None)
            }
        }
    }

    async fn ack(&mut self, delivery: &Delivery) -> QueueResult<()> {
        let mut conn = self.client.clone();
        let _: i64 = conn
            .xack(&self.topology.stream, &self.topology.group, &[&delivery.id])
            .await
            .map_err(op_error)?;

        // One group reads this stream, so an acked entry is never read again.
        let deleted: redis::RedisResult<i64> =
            conn.xdel(&self.topology.stream, &[&delivery.id]).await;
        if let Err(e) = deleted {
            warn!(id = %delivery.id, error = %e, "Failed to delete acknowledged entry");
        }

        Ok(())
    }

    async fn dead_letter(&mut self, delivery: &Delivery, reason: &str) -> QueueResult<()> {
        let mut conn = self.client.clone();
        let _: String = conn
            .xadd(
                &self.topology.dead_letter_stream,
                "*",
                &[
                    (PAYLOAD_FIELD, delivery.payload.as_slice()),
                    ("reason", reason.as_bytes()),
                    ("source_id", delivery.id.as_bytes()),
                ],
            )
            .await
            .map_err(op_error)?;

        self.ack(delivery).await
    }
}

/// A pending entry whose body was already acked or trimmed comes back without
/// fields; it surfaces as an empty payload and is dead-lettered by the consumer.
fn into_delivery(entry: StreamId) -> Delivery {
    let payload = entry.get::<Vec<u8>>(PAYLOAD_FIELD).unwrap_or_default();
    Delivery {
        id: entry.id,
        payload,
    }
}
