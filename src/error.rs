//! Defines the app level error type and the retry classification used by the
//! ingestion worker.
use crate::extract::CAPTURE_GROUP_COUNT;

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The configured extraction pattern could not be compiled.
    ///
    /// This is raised at configuration load, so a bad pattern stops the
    /// process at startup instead of silently failing on every message.
    #[error("could not compile extraction pattern \"{0}\": {1}")]
    InvalidPattern(String, String),

    /// The extraction pattern compiled but does not have exactly two capture
    /// groups (amount, merchant).
    #[error(
        "extraction pattern \"{0}\" must have exactly {CAPTURE_GROUP_COUNT} capture groups, found {1}"
    )]
    PatternArity(String, usize),

    /// A configuration value could not be parsed from the environment.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The amount capture matched the pattern but is not a valid non-negative
    /// decimal with at most two fractional digits.
    ///
    /// A notification with a malformed amount will never parse on a retry, so
    /// the worker acknowledges it instead of spending retry budget on it.
    #[error("matched amount \"{0}\" is not a valid decimal amount")]
    UnparseableAmount(String),

    /// The amount capture parsed but is zero or negative.
    ///
    /// The notification format only describes charges, so a non-positive
    /// amount means the message is malformed rather than a refund.
    #[error("matched amount {0} must be greater than zero")]
    NonPositiveAmount(f64),

    /// The merchant capture is empty after trimming surrounding whitespace.
    #[error("matched merchant is empty")]
    EmptyMerchant,

    /// The object store could not complete a read or write.
    ///
    /// Storage outages are expected to be temporary, so the worker fails the
    /// delivery without acknowledging and lets the queue redeliver.
    #[error("storage operation failed: {0}")]
    TransientStorage(String),

    /// The queue collaborator failed to receive, acknowledge, or redeliver.
    #[error("queue operation failed: {0}")]
    QueueError(String),

    /// The query engine or partition catalog could not serve a query.
    ///
    /// This includes catalog staleness for a partition that has been written
    /// but not yet discovered. The scheduled report run retries; other days'
    /// data is unaffected.
    #[error("record query failed: {0}")]
    Query(String),

    /// An alert or report channel rejected a publish.
    #[error("channel publish failed: {0}")]
    ChannelClosed(String),

    /// A record could not be serialized for persistence.
    #[error("could not serialize as JSON: {0}")]
    JsonSerializationError(String),

    /// A persisted record could not be parsed back out of storage.
    #[error("could not deserialize stored record: {0}")]
    JsonDeserializationError(String),

    /// An unhandled/unexpected SQL error in the local record index.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl Error {
    /// Whether the ingestion worker should fail the delivery without
    /// acknowledging so the queue redelivers it.
    ///
    /// Permanently unprocessable content (malformed amount, empty merchant)
    /// is not retryable: a message that will never parse must not occupy
    /// retry budget.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::TransientStorage(_) | Error::QueueError(_) | Error::Query(_)
        )
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => {
                Error::Query("query returned no rows".to_owned())
            }
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::JsonSerializationError(value.to_string())
    }
}
