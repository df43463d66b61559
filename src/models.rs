//! Defines the core data models that flow through the ingestion pipeline.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

/// A raw transaction-notification message as delivered by the queue.
///
/// Created by the queue collaborator on delivery and read-only to the core.
/// The notification is removed from the queue once it reaches a terminal
/// outcome (acknowledged or dead-lettered).
#[derive(Debug, Clone, PartialEq)]
pub struct RawNotification {
    /// The object-storage key the message body was fetched from.
    ///
    /// This is the identity of the notification: the persisted record id is
    /// derived from it so redeliveries converge on the same record.
    pub source_key: String,
    /// The plain-text message body.
    pub body: String,
    /// When the notification was received, in UTC.
    pub received_at: OffsetDateTime,
    /// How many times the queue has delivered this notification, starting
    /// at 1 for the first delivery.
    ///
    /// Tracked by the queue, not the core, so the two can never disagree
    /// about how much retry budget is left.
    pub delivery_attempt: u32,
}

/// The amount and merchant captured from a notification body.
///
/// Transient output of [extract](crate::extract::extract); never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    /// The charged amount in the account currency.
    pub amount: f64,
    /// The merchant name, trimmed of surrounding whitespace.
    pub merchant: String,
}

/// A normalized transaction, persisted once per unique source key.
///
/// `id` is a pure function of `source_key`, so reprocessing the same
/// notification (queue redelivery or manual replay) always produces the same
/// identity and overwrites identical content rather than appending a
/// duplicate row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Stable identity derived from `source_key`.
    pub id: String,
    /// The amount of money spent in this transaction.
    pub amount: f64,
    /// The merchant the card was charged at.
    pub merchant: String,
    /// The date partition the record belongs to, derived from the
    /// notification's received time truncated to a UTC date.
    pub date: Date,
    /// The object-storage key of the source message.
    pub source_key: String,
}

/// An alert raised for a transaction whose amount exceeds the configured
/// threshold.
///
/// Published at-least-once: a redelivered notification that alerts will
/// alert again, and subscribers must tolerate duplicates for the same
/// `source_key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    /// The transaction amount that tripped the alert.
    pub amount: f64,
    /// The merchant the card was charged at.
    pub merchant: String,
    /// The source key of the notification, for correlating duplicates.
    pub source_key: String,
    /// The threshold that was exceeded.
    pub threshold: f64,
    /// A human-readable one-line summary for plain-text subscribers.
    pub message: String,
}

/// A merchant and its summed spending for a report period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantTotal {
    /// The merchant name.
    pub merchant: String,
    /// Total amount spent at this merchant over the period.
    pub amount: f64,
}

/// The daily spending report computed by the aggregation job.
///
/// Recomputed from persisted records on every run. Re-running the job for
/// the same date with unchanged records produces an identical report, so a
/// replay after a failed run or a late-arriving partition converges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    /// The date the report covers.
    pub date: Date,
    /// Sum of all transaction amounts on `date`.
    pub total_amount: f64,
    /// Number of transactions on `date`.
    pub transaction_count: usize,
    /// Merchants ordered by summed amount, largest first, ties broken
    /// alphabetically by merchant name.
    pub top_merchants: Vec<MerchantTotal>,
    /// Sum of all transaction amounts from the first of the month through
    /// `date`, recomputed fresh rather than accumulated.
    pub month_to_date: f64,
    /// The rendered plain-text report body.
    pub body: String,
}
