//! Background consumer that applies queued visit events to the link store.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::watch;
use tokio_retry::Retry;
use tokio_retry::strategy::ExponentialBackoff;

use crate::domain::repositories::LinkRepository;
use crate::domain::visit_event::VisitEvent;
use crate::infrastructure::queue::{Delivery, QueueError, Subscription, VisitQueue};

const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Drains the visit queue and increments `visited` for each event.
///
/// Every delivery ends in exactly one of:
/// - applied and acknowledged
/// - acknowledged without effect when the link no longer exists
/// - dead-lettered when the payload is malformed or the store keeps failing
///
/// Acknowledgement happens only after the store write, so a crash in between
/// redelivers the event (at-least-once).
pub struct VisitConsumer {
    links: Arc<dyn LinkRepository>,
    queue: Arc<dyn VisitQueue>,
    max_attempts: usize,
    retry_base: Duration,
}

impl VisitConsumer {
    pub fn new(
        links: Arc<dyn LinkRepository>,
        queue: Arc<dyn VisitQueue>,
        max_attempts: usize,
    ) -> Self {
        Self {
            links,
            queue,
            max_attempts: max_attempts.max(1),
            retry_base: Duration::from_millis(50),
        }
    }

    /// Overrides the first retry delay (default 50ms). Later delays double up to 5s.
    pub fn with_retry_base(mut self, retry_base: Duration) -> Self {
        self.retry_base = retry_base;
        self
    }

    /// Runs the consume loop until `shutdown` flips to `true` or the queue closes.
    ///
    /// A delivery that is already being processed when shutdown is signalled is
    /// finished before the loop exits.
    pub async fn run(&self, consumer_name: &str, mut shutdown: watch::Receiver<bool>) {
        let Some(mut subscription) = self.subscribe(consumer_name, &mut shutdown).await else {
            return;
        };

        tracing::info!(consumer = consumer_name, "Visit consumer started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let next = tokio::select! {
                _ = shutdown.changed() => break,
                next = subscription.next() => next,
            };

            match next {
                Ok(Some(delivery)) => self.handle_delivery(subscription.as_mut(), &delivery).await,
                Ok(None) => {}
                Err(QueueError::Closed) => {
                    tracing::warn!(consumer = consumer_name, "Visit queue closed");
                    break;
                }
                Err(e) => {
                    tracing::error!(consumer = consumer_name, error = %e, "Failed to receive visit event");
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(MAX_RETRY_DELAY) => {}
                    }
                }
            }
        }

        tracing::info!(consumer = consumer_name, "Visit consumer stopped");
    }

    async fn subscribe(
        &self,
        consumer_name: &str,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<Box<dyn Subscription>> {
        loop {
            match self.queue.subscribe(consumer_name).await {
                Ok(subscription) => return Some(subscription),
                Err(e) => {
                    tracing::error!(consumer = consumer_name, error = %e, "Failed to subscribe to visit queue");
                }
            }

            tokio::select! {
                _ = shutdown.changed() => return None,
                _ = tokio::time::sleep(MAX_RETRY_DELAY) => {}
            }
        }
    }

    /// Processes one delivery to completion.
    pub async fn handle_delivery(&self, subscription: &mut dyn Subscription, delivery: &Delivery) {
        let event = match VisitEvent::decode(&delivery.payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(delivery_id = %delivery.id, error = %e, "Malformed visit event");
                self.dead_letter(subscription, delivery, &format!("decode failed: {e}"))
                    .await;
                return;
            }
        };

        let strategy = self.retry_delays();

        let links = &self.links;
        let short_code = event.short_code.as_str();

        match Retry::start(strategy, move || links.increment_visits(short_code, 1)).await {
            Ok(true) => {
                counter!("visit_events_applied_total").increment(1);
                tracing::debug!(short_code, "Visit applied");
            }
            Ok(false) => {
                tracing::warn!(short_code, "Visit for unknown short code discarded");
            }
            Err(e) => {
                tracing::error!(
                    short_code,
                    attempts = self.max_attempts,
                    error = %e,
                    "Failed to apply visit"
                );
                self.dead_letter(subscription, delivery, &format!("increment failed: {e}"))
                    .await;
                return;
            }
        }

        if let Err(e) = subscription.ack(delivery).await {
            tracing::warn!(delivery_id = %delivery.id, error = %e, "Failed to acknowledge visit event");
        }
    }

    /// Delays between store attempts: `retry_base`, then doubling, capped at 5s.
    fn retry_delays(&self) -> std::iter::Take<ExponentialBackoff> {
        // Delay n is 2^n * factor ms, so half the base makes the first one the base.
        let half_base_ms = (self.retry_base.as_millis() as u64 / 2).max(1);

        ExponentialBackoff::from_millis(2)
            .factor(half_base_ms)
            .max_delay(MAX_RETRY_DELAY)
            .take(self.max_attempts - 1)
    }

    async fn dead_letter(&self, subscription: &mut dyn Subscription, delivery: &Delivery, reason: &str) {
        match subscription.dead_letter(delivery, reason).await {
            Ok(()) => {
                counter!("visit_events_dead_lettered_total").increment(1);
            }
            Err(e) => {
                tracing::error!(delivery_id = %delivery.id, error = %e, "Failed to dead-letter visit event");
            }
        }
    }
}
