//! Contains traits and implementations for the external collaborators that
//! hold durable state: the object store the records are written to and the
//! catalog/query engine the aggregation job reads from.

mod fs;
mod memory;
mod object;
mod query;

pub mod sqlite;

pub use fs::FsObjectStore;
pub use memory::MemoryObjectStore;
pub use object::{ObjectStore, partition_key, read_record, write_record};
pub use query::RecordQuery;
