//! Implements an in-memory object store used in tests and local runs.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use crate::{Error, stores::ObjectStore};

/// Stores objects in a shared in-memory map.
///
/// Writes can be made to fail for a number of calls to simulate a storage
/// outage and exercise the worker's retry and dead-letter handling.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<Mutex<BTreeMap<String, String>>>,
    failing_puts: Arc<Mutex<u32>>,
}

impl MemoryObjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls to `put` fail with a transient storage
    /// error.
    pub fn fail_next_puts(&self, count: u32) {
        *self.failing_puts.lock().unwrap() = count;
    }

    /// The number of objects currently stored.
    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn get(&self, key: &str) -> Result<String, Error> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::TransientStorage(format!("no such object: {key}")))
    }

    fn put(&self, key: &str, contents: &str) -> Result<(), Error> {
        let mut failing_puts = self.failing_puts.lock().unwrap();

        if *failing_puts > 0 {
            *failing_puts -= 1;
            return Err(Error::TransientStorage("storage unavailable".to_owned()));
        }

        self.objects
            .lock()
            .unwrap()
            .insert(key.to_owned(), contents.to_owned());

        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, Error> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}
