//! Defines the object store trait and the date-partitioned record layout.

use crate::{Error, models::TransactionRecord};

/// Durable object storage, the source of raw message bodies and the sink for
/// normalized records.
///
/// Implementations should treat `put` with an existing key as a replace, not
/// an append: record keys are derived from the notification source key, so a
/// redelivered notification overwrites identical content.
///
/// Implementations over remote storage must bound how long an operation can
/// block and report a timeout as [Error::TransientStorage], the same as any
/// other storage failure.
pub trait ObjectStore {
    /// Fetch the object at `key` as UTF-8 text.
    ///
    /// # Errors
    /// Returns [Error::TransientStorage] if the object cannot be read.
    fn get(&self, key: &str) -> Result<String, Error>;

    /// Write `contents` to `key`, replacing any existing object.
    ///
    /// # Errors
    /// Returns [Error::TransientStorage] if the object cannot be written.
    fn put(&self, key: &str, contents: &str) -> Result<(), Error>;

    /// List the keys under `prefix`, in no particular order.
    ///
    /// Used by the partition catalog to discover newly written records; the
    /// ingestion path never lists.
    ///
    /// # Errors
    /// Returns [Error::TransientStorage] if the listing cannot be produced.
    fn list(&self, prefix: &str) -> Result<Vec<String>, Error>;
}

/// The prefix all transaction records are written under.
pub(crate) const RECORD_PREFIX: &str = "data";

/// The storage key for `record`, encoding the date partition and record id.
///
/// Layout is `data/year=YYYY/month=MM/day=DD/<id>.json` so that a partition
/// catalog can discover one day at a time and the aggregation query for a
/// date only ever touches one partition.
pub fn partition_key(record: &TransactionRecord) -> String {
    format!(
        "{RECORD_PREFIX}/year={:04}/month={:02}/day={:02}/{}.json",
        record.date.year(),
        u8::from(record.date.month()),
        record.date.day(),
        record.id
    )
}

/// Serialize `record` and write it to its partition key in `store`.
///
/// Keyed by the record id, so retrying the write for a redelivered
/// notification replaces identical content instead of creating a duplicate.
///
/// # Errors
/// This function will return a:
/// - [Error::JsonSerializationError] if the record cannot be serialized,
/// - or [Error::TransientStorage] if the store rejects the write, which the
///   worker treats as retryable.
pub fn write_record(store: &impl ObjectStore, record: &TransactionRecord) -> Result<(), Error> {
    let contents = serde_json::to_string(record)?;

    store.put(&partition_key(record), &contents)
}

/// Read the record stored at `key` back out of `store`.
///
/// # Errors
/// This function will return a:
/// - [Error::TransientStorage] if the object cannot be read,
/// - or [Error::JsonDeserializationError] if the contents are not a valid
///   record.
pub fn read_record(store: &impl ObjectStore, key: &str) -> Result<TransactionRecord, Error> {
    let contents = store.get(key)?;

    serde_json::from_str(&contents)
        .map_err(|error| Error::JsonDeserializationError(error.to_string()))
}
