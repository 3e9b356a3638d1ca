//! In-process visit queue backed by a bounded Tokio channel.

use super::service::{Delivery, QueueError, QueueResult, Subscription, VisitQueue};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

/// Bounded in-process queue.
///
/// Used when Redis is not configured, and by tests. Publishing never blocks: a full
/// channel rejects the event with [`QueueError::Full`]. Nothing survives a restart,
/// so delivery is at-most-once.
///
/// All subscriptions share one receiver; each message goes to exactly one of them.
#[derive(Clone)]
pub struct MemoryQueue {
    sender: mpsc::Sender<Delivery>,
    receiver: Arc<Mutex<mpsc::Receiver<Delivery>>>,
    dead_letters: Arc<StdMutex<Vec<(Delivery, String)>>>,
    next_id: Arc<AtomicU64>,
    poll_interval: Duration,
}

impl MemoryQueue {
    /// Creates a queue holding at most `capacity` undelivered events.
    pub fn new(capacity: usize) -> Self {
        Self::with_poll_interval(capacity, Duration::from_millis(500))
    }

    /// Creates a queue whose subscriptions give up waiting after `poll_interval`.
    pub fn with_poll_interval(capacity: usize, poll_interval: Duration) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            dead_letters: Arc::new(StdMutex::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            poll_interval,
        }
    }

    /// Number of events waiting to be consumed.
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of dead-lettered deliveries with their reasons.
    pub fn dead_letters(&self) -> Vec<(Delivery, String)> {
        self.dead_letters
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl VisitQueue for MemoryQueue {
    async fn publish(&self, payload: &[u8]) -> QueueResult<()> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let delivery = Delivery {
            id,
            payload: payload.to_vec(),
        };

        self.sender.try_send(delivery).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    async fn subscribe(&self, consumer: &str) -> QueueResult<Box<dyn Subscription>> {
        debug!(consumer, "Subscribed to in-process visit queue");
        Ok(Box::new(MemorySubscription {
            receiver: self.receiver.clone(),
            dead_letters: self.dead_letters.clone(),
            poll_interval: self.poll_interval,
        }))
    }

    async fn health_check(&self) -> bool {
        !self.sender.is_closed()
    }
}

struct MemorySubscription {
    receiver: Arc<Mutex<mpsc::Receiver<Delivery>>>,
    dead_letters: Arc<StdMutex<Vec<(Delivery, String)>>>,
    poll_interval: Duration,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn next(&mut self) -> QueueResult<Option<Delivery>> {
        let mut receiver = self.receiver.lock().await;

        match tokio::time::timeout(self.poll_interval, receiver.recv()).await {
            Ok(Some(delivery)) => Ok(Some(delivery)),
            Ok(None) => Err(QueueError::Closed),
            Err(_) => Ok(None),
        }
    }

    async fn ack(&mut self, _delivery: &Delivery) -> QueueResult<()> {
        Ok(())
    }

    async fn dead_letter(&mut self, delivery: &Delivery, reason: &str) -> QueueResult<()> {
        self.dead_letters
            .lock()
            .map_err(|_| QueueError::OperationError("dead letter store poisoned".to_string()))?
            .push((delivery.clone(), reason.to_string()));
        Ok(())
    }
}
