//! Defines the record query trait used by the aggregation job.

use time::Date;

use crate::{Error, models::TransactionRecord};

/// Read-side access to persisted transaction records, as exposed by the
/// partition catalog and query engine.
///
/// The catalog discovers partitions on its own schedule, so a record that
/// has been written but not yet discovered is simply absent from results
/// until the next crawl. Implementations report engine or catalog
/// unavailability as [Error::Query], which the aggregation scheduler treats
/// as retryable.
pub trait RecordQuery {
    /// All records in the partition for `date`.
    fn records_for(&self, date: Date) -> Result<Vec<TransactionRecord>, Error>;

    /// All records with dates in `start..=end`.
    fn records_between(&self, start: Date, end: Date) -> Result<Vec<TransactionRecord>, Error>;
}
