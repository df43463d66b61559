//! The ingestion worker: drives one notification at a time from delivery to
//! a terminal outcome.
//!
//! Per delivery the worker fetches the message body, extracts transaction
//! fields, raises a threshold alert best-effort, persists the normalized
//! record, and then tells the queue how the delivery ended: acknowledged,
//! failed for redelivery, or dead-lettered. All state lives in the delivery
//! itself and the immutable configuration, so any number of workers can run
//! the loop concurrently without coordination.

use std::{sync::Arc, time::Duration};

use crate::{
    Error,
    alert::evaluate,
    channels::AlertChannel,
    config::AppConfig,
    extract::extract,
    models::RawNotification,
    queue::{NotificationQueue, QueueDelivery},
    record::normalize,
    stores::{ObjectStore, write_record},
};

/// Why a delivery was acknowledged and removed from the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckReason {
    /// The body did not match the extraction pattern: not a transaction
    /// notification. Nothing was written and no alert was raised.
    NoMatch,
    /// The body matched but its content can never be processed (malformed
    /// amount, empty merchant). Acknowledged so it does not occupy retry
    /// budget.
    Unprocessable,
    /// The record was persisted.
    Persisted,
}

/// The terminal outcome of handling one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The delivery was acknowledged and will not be redelivered.
    Acknowledged(AckReason),
    /// A transient failure occurred with retry budget remaining; the queue
    /// will redeliver after its backoff window.
    Retried,
    /// A transient failure occurred on the final permitted attempt; the
    /// delivery was moved to the dead-letter destination.
    DeadLettered,
}

/// Processes notifications against a store and an alert channel.
///
/// Stateless apart from the immutable configuration: clones of one worker,
/// or many workers over the same collaborators, behave identically.
#[derive(Debug, Clone)]
pub struct IngestionWorker<S, A> {
    config: AppConfig,
    store: S,
    alerts: A,
}

impl<S, A> IngestionWorker<S, A>
where
    S: ObjectStore,
    A: AlertChannel,
{
    /// Create a worker over `store` and `alerts` with the process
    /// configuration.
    pub fn new(config: AppConfig, store: S, alerts: A) -> Self {
        Self {
            config,
            store,
            alerts,
        }
    }

    /// Drive `delivery` to a terminal outcome, informing `queue` of the
    /// result.
    ///
    /// Never returns an error: every failure mode maps to an outcome, so one
    /// bad notification cannot take down the worker loop.
    pub fn handle_delivery(
        &self,
        queue: &impl NotificationQueue,
        delivery: QueueDelivery,
    ) -> Outcome {
        match self.try_process(&delivery) {
            Ok(reason) => {
                if let Err(error) = queue.acknowledge(&delivery) {
                    // The queue will redeliver; idempotent record identity
                    // makes the repeat processing harmless.
                    tracing::warn!(
                        source_key = %delivery.source_key,
                        "could not acknowledge delivery: {error}"
                    );
                }

                Outcome::Acknowledged(reason)
            }
            Err(error) if error.is_retryable() => {
                if delivery.delivery_attempt >= self.config.max_delivery_attempts {
                    tracing::error!(
                        source_key = %delivery.source_key,
                        attempts = delivery.delivery_attempt,
                        "dead-lettering notification after exhausting retries: {error}"
                    );

                    if let Err(queue_error) = queue.dead_letter(delivery) {
                        tracing::error!("could not dead-letter delivery: {queue_error}");
                    }

                    Outcome::DeadLettered
                } else {
                    tracing::warn!(
                        source_key = %delivery.source_key,
                        attempt = delivery.delivery_attempt,
                        "transient failure, leaving for redelivery: {error}"
                    );

                    if let Err(queue_error) = queue.retry(delivery) {
                        tracing::error!("could not return delivery to the queue: {queue_error}");
                    }

                    Outcome::Retried
                }
            }
            Err(error) => {
                tracing::warn!(
                    source_key = %delivery.source_key,
                    "acknowledging permanently unprocessable notification: {error}"
                );

                if let Err(queue_error) = queue.acknowledge(&delivery) {
                    tracing::warn!("could not acknowledge delivery: {queue_error}");
                }

                Outcome::Acknowledged(AckReason::Unprocessable)
            }
        }
    }

    /// Run the extraction, alerting, and persistence stages for one
    /// delivery.
    ///
    /// # Errors
    /// Retryable errors ([Error::TransientStorage]) bubble up for the
    /// redelivery path; unprocessable-content errors bubble up for the
    /// acknowledge-and-drop path.
    fn try_process(&self, delivery: &QueueDelivery) -> Result<AckReason, Error> {
        let body = self.store.get(&delivery.source_key)?;

        let notification = RawNotification {
            source_key: delivery.source_key.clone(),
            body,
            received_at: delivery.received_at,
            delivery_attempt: delivery.delivery_attempt,
        };

        let Some(extracted) = extract(&notification.body, &self.config.pattern)? else {
            tracing::debug!(
                source_key = %notification.source_key,
                "body does not match the extraction pattern"
            );

            return Ok(AckReason::NoMatch);
        };

        let record = normalize(&notification, extracted);

        // Alerting is best-effort: a failed publish must not fail the
        // notification, and a redelivery may publish a duplicate alert.
        if let Some(alert) = evaluate(&record, self.config.threshold_amount) {
            match self.alerts.publish(&alert) {
                Ok(()) => tracing::info!(
                    source_key = %record.source_key,
                    amount = record.amount,
                    "published high value transaction alert"
                ),
                Err(error) => tracing::warn!(
                    source_key = %record.source_key,
                    "could not publish alert: {error}"
                ),
            }
        }

        write_record(&self.store, &record)?;

        tracing::info!(
            source_key = %record.source_key,
            record_id = %record.id,
            amount = record.amount,
            merchant = %record.merchant,
            "persisted transaction record"
        );

        Ok(AckReason::Persisted)
    }
}

/// Consume deliveries from `queue` until the task is cancelled, sleeping for
/// `poll_interval` whenever the queue is empty.
///
/// Intended to be spawned once per worker in the pool; each iteration is one
/// independent notification state machine.
pub async fn run_worker<Q, S, A>(
    worker_id: usize,
    queue: Q,
    worker: Arc<IngestionWorker<S, A>>,
    poll_interval: Duration,
) where
    Q: NotificationQueue,
    S: ObjectStore,
    A: AlertChannel,
{
    loop {
        match queue.receive() {
            Ok(Some(delivery)) => {
                let outcome = worker.handle_delivery(&queue, delivery);
                tracing::debug!(worker_id, ?outcome, "finished delivery");
            }
            Ok(None) => tokio::time::sleep(poll_interval).await,
            Err(error) => {
                tracing::warn!(worker_id, "could not receive from queue: {error}");
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}
