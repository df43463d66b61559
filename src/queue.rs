//! Defines the buffered notification queue trait and an in-memory
//! implementation of its redelivery mechanics.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use time::OffsetDateTime;

use crate::Error;

/// One delivery of an object-creation notification.
///
/// The queue owns the delivery-attempt counter; the core reads it but never
/// keeps a counter of its own, so the two cannot diverge.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueDelivery {
    /// The storage key of the newly created message object.
    pub source_key: String,
    /// When the notification was first received, in UTC.
    pub received_at: OffsetDateTime,
    /// Which delivery this is, starting at 1.
    pub delivery_attempt: u32,
}

/// The buffered queue the ingestion workers consume from.
///
/// Delivery is at-least-once: a delivery that is neither acknowledged nor
/// dead-lettered becomes visible again and is redelivered with an
/// incremented attempt counter. Implementations route dead-lettered
/// deliveries to a separate holding destination that is observable from
/// outside the pipeline.
pub trait NotificationQueue {
    /// Take the next visible delivery, if any.
    ///
    /// # Errors
    /// Returns [Error::QueueError] if the queue cannot be polled.
    fn receive(&self) -> Result<Option<QueueDelivery>, Error>;

    /// Terminally remove `delivery` from the queue.
    ///
    /// # Errors
    /// Returns [Error::QueueError] if the acknowledgement fails.
    fn acknowledge(&self, delivery: &QueueDelivery) -> Result<(), Error>;

    /// Fail `delivery` without acknowledging so it is redelivered with an
    /// incremented attempt counter after the backoff window.
    ///
    /// # Errors
    /// Returns [Error::QueueError] if the delivery cannot be returned.
    fn retry(&self, delivery: QueueDelivery) -> Result<(), Error>;

    /// Move `delivery` to the dead-letter destination; it will not be
    /// redelivered.
    ///
    /// # Errors
    /// Returns [Error::QueueError] if the delivery cannot be moved.
    fn dead_letter(&self, delivery: QueueDelivery) -> Result<(), Error>;
}

/// An in-memory queue modelling at-least-once delivery and a dead-letter
/// destination, for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryQueue {
    ready: Arc<Mutex<VecDeque<QueueDelivery>>>,
    dead: Arc<Mutex<Vec<QueueDelivery>>>,
}

impl MemoryQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a first delivery for the object at `source_key`.
    pub fn enqueue(&self, source_key: &str, received_at: OffsetDateTime) {
        self.ready.lock().unwrap().push_back(QueueDelivery {
            source_key: source_key.to_owned(),
            received_at,
            delivery_attempt: 1,
        });
    }

    /// The deliveries that have been dead-lettered, in order.
    pub fn dead_letters(&self) -> Vec<QueueDelivery> {
        self.dead.lock().unwrap().clone()
    }

    /// Whether there are no deliveries waiting to be received.
    pub fn is_drained(&self) -> bool {
        self.ready.lock().unwrap().is_empty()
    }
}

impl NotificationQueue for MemoryQueue {
    fn receive(&self) -> Result<Option<QueueDelivery>, Error> {
        Ok(self.ready.lock().unwrap().pop_front())
    }

    fn acknowledge(&self, _delivery: &QueueDelivery) -> Result<(), Error> {
        // Receiving removed the delivery from the ready list, so there is
        // nothing left to clean up for the in-memory model.
        Ok(())
    }

    fn retry(&self, mut delivery: QueueDelivery) -> Result<(), Error> {
        delivery.delivery_attempt += 1;
        self.ready.lock().unwrap().push_back(delivery);

        Ok(())
    }

    fn dead_letter(&self, delivery: QueueDelivery) -> Result<(), Error> {
        self.dead.lock().unwrap().push(delivery);

        Ok(())
    }
}
