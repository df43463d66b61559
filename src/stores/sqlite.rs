//! Implements a SQLite backed partition catalog and record query engine.
//!
//! Stands in for the external catalog/query collaborator when running
//! locally: a crawl pass discovers record objects under the storage prefix
//! and indexes them, and the aggregation job queries the index by date.

use std::sync::{Arc, Mutex};

use rusqlite::{Connection, Row, params};
use time::Date;

use crate::{
    Error,
    models::TransactionRecord,
    stores::{ObjectStore, RecordQuery, object::RECORD_PREFIX, read_record},
};

/// Indexes persisted transaction records in a SQLite database and serves
/// date-ranged queries over them.
#[derive(Debug, Clone)]
pub struct SqliteRecordIndex {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteRecordIndex {
    /// Create an index for the SQLite `connection`, creating the record
    /// table if it does not exist.
    ///
    /// # Errors
    /// Returns [Error::SqlError] if the table cannot be created.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Result<Self, Error> {
        connection.lock().unwrap().execute(
            "CREATE TABLE IF NOT EXISTS transaction_record (
                id TEXT PRIMARY KEY,
                amount REAL NOT NULL,
                merchant TEXT NOT NULL,
                date TEXT NOT NULL,
                source_key TEXT NOT NULL
            )",
            (),
        )?;

        Ok(Self { connection })
    }

    /// Discover record objects under the storage prefix and index any that
    /// are new or changed.
    ///
    /// Indexing is keyed by record id, so crawling the same partition twice
    /// replaces identical rows rather than duplicating them. An object that
    /// cannot be read or parsed as a record is logged and skipped: one bad
    /// object must not keep the rest of the partition out of the index.
    /// Returns the number of keys examined.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::TransientStorage] if the store cannot be listed,
    /// - or [Error::SqlError] if the index cannot be updated.
    pub fn crawl(&self, store: &impl ObjectStore) -> Result<usize, Error> {
        let keys = store.list(&format!("{RECORD_PREFIX}/"))?;

        for key in &keys {
            if !key.ends_with(".json") {
                continue;
            }

            let record = match read_record(store, key) {
                Ok(record) => record,
                Err(error) => {
                    tracing::warn!(key = %key, "skipping unreadable record object: {error}");
                    continue;
                }
            };

            self.upsert(&record)?;
        }

        Ok(keys.len())
    }

    /// Insert `record` into the index, replacing any existing row with the
    /// same id.
    pub fn upsert(&self, record: &TransactionRecord) -> Result<(), Error> {
        self.connection.lock().unwrap().execute(
            "INSERT OR REPLACE INTO transaction_record (id, amount, merchant, date, source_key)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id,
                record.amount,
                record.merchant,
                record.date,
                record.source_key
            ],
        )?;

        Ok(())
    }
}

fn map_record_row(row: &Row) -> Result<TransactionRecord, rusqlite::Error> {
    Ok(TransactionRecord {
        id: row.get(0)?,
        amount: row.get(1)?,
        merchant: row.get(2)?,
        date: row.get(3)?,
        source_key: row.get(4)?,
    })
}

impl RecordQuery for SqliteRecordIndex {
    fn records_for(&self, date: Date) -> Result<Vec<TransactionRecord>, Error> {
        self.records_between(date, date)
    }

    fn records_between(&self, start: Date, end: Date) -> Result<Vec<TransactionRecord>, Error> {
        let connection = self.connection.lock().unwrap();

        let records = connection
            .prepare(
                "SELECT id, amount, merchant, date, source_key
                 FROM transaction_record
                 WHERE date BETWEEN ?1 AND ?2
                 ORDER BY date, id",
            )?
            .query_map(params![start, end], map_record_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }
}

#[cfg(test)]
mod sqlite_record_index_tests {
    use std::sync::{Arc, Mutex};

    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        models::TransactionRecord,
        stores::{
            MemoryObjectStore, ObjectStore, RecordQuery, sqlite::SqliteRecordIndex, write_record,
        },
    };

    fn index() -> SqliteRecordIndex {
        let connection = Connection::open_in_memory().unwrap();
        SqliteRecordIndex::new(Arc::new(Mutex::new(connection))).unwrap()
    }

    fn record(id: &str, amount: f64, date: time::Date) -> TransactionRecord {
        TransactionRecord {
            id: id.to_owned(),
            amount,
            merchant: "Acme Store".to_owned(),
            date,
            source_key: format!("inbound/{id}"),
        }
    }

    #[test]
    fn crawl_indexes_written_records() {
        let store = MemoryObjectStore::new();
        let index = index();
        write_record(&store, &record("aaa", 10.0, date!(2025 - 06 - 05))).unwrap();
        write_record(&store, &record("bbb", 20.0, date!(2025 - 06 - 06))).unwrap();

        index.crawl(&store).unwrap();

        let records = index.records_for(date!(2025 - 06 - 05)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "aaa");
    }

    #[test]
    fn crawl_skips_bad_objects_and_indexes_the_rest() {
        let store = MemoryObjectStore::new();
        let index = index();
        // Sorts before the valid record's key, so the crawl sees it first.
        store
            .put("data/year=2025/month=06/day=12/0000-corrupt.json", "not json")
            .unwrap();
        write_record(&store, &record("aaa", 10.0, date!(2025 - 06 - 12))).unwrap();

        let examined = index.crawl(&store).unwrap();

        assert_eq!(examined, 2);
        let records = index.records_for(date!(2025 - 06 - 12)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "aaa");
    }

    #[test]
    fn crawling_twice_does_not_duplicate() {
        let store = MemoryObjectStore::new();
        let index = index();
        write_record(&store, &record("aaa", 10.0, date!(2025 - 06 - 05))).unwrap();

        index.crawl(&store).unwrap();
        index.crawl(&store).unwrap();

        assert_eq!(index.records_for(date!(2025 - 06 - 05)).unwrap().len(), 1);
    }

    #[test]
    fn records_between_is_inclusive_of_both_ends() {
        let index = index();
        index.upsert(&record("aaa", 10.0, date!(2025 - 06 - 01))).unwrap();
        index.upsert(&record("bbb", 20.0, date!(2025 - 06 - 15))).unwrap();
        index.upsert(&record("ccc", 30.0, date!(2025 - 07 - 01))).unwrap();

        let records = index
            .records_between(date!(2025 - 06 - 01), date!(2025 - 06 - 15))
            .unwrap();

        assert_eq!(records.len(), 2);
    }

    #[test]
    fn upsert_with_same_id_replaces() {
        let index = index();
        index.upsert(&record("aaa", 10.0, date!(2025 - 06 - 05))).unwrap();
        index.upsert(&record("aaa", 10.0, date!(2025 - 06 - 05))).unwrap();

        assert_eq!(index.records_for(date!(2025 - 06 - 05)).unwrap().len(), 1);
    }
}
