//! Implements an object store backed by a local directory.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::{Error, stores::ObjectStore};

/// Stores objects as files under a root directory, one file per key.
///
/// Slashes in keys map to subdirectories, so the date-partitioned record
/// layout comes out as a browsable `data/year=.../month=.../day=...` tree on
/// disk, the same shape a bucket listing would show.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    /// Returns [Error::TransientStorage] if the root directory cannot be
    /// created.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, Error> {
        let root = root.into();

        fs::create_dir_all(&root)
            .map_err(|error| Error::TransientStorage(format!("could not create {root:?}: {error}")))?;

        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn collect_keys(&self, directory: &Path, keys: &mut Vec<String>) -> std::io::Result<()> {
        for entry in fs::read_dir(directory)? {
            let path = entry?.path();

            if path.is_dir() {
                self.collect_keys(&path, keys)?;
            } else if let Ok(relative) = path.strip_prefix(&self.root) {
                keys.push(relative.to_string_lossy().replace('\\', "/"));
            }
        }

        Ok(())
    }
}

impl ObjectStore for FsObjectStore {
    fn get(&self, key: &str) -> Result<String, Error> {
        fs::read_to_string(self.path_for(key))
            .map_err(|error| Error::TransientStorage(format!("could not read {key}: {error}")))
    }

    fn put(&self, key: &str, contents: &str) -> Result<(), Error> {
        let path = self.path_for(key);
        let error = |error| Error::TransientStorage(format!("could not write {key}: {error}"));

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(error)?;
        }

        // Write to a sibling temp file first so a crashed write never leaves
        // a half-written record in a partition the catalog may be crawling.
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).map_err(error)?;
        file.write_all(contents.as_bytes()).map_err(error)?;
        fs::rename(&temp_path, &path).map_err(error)?;

        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, Error> {
        let mut keys = Vec::new();

        if self.root.exists() {
            self.collect_keys(&self.root, &mut keys)
                .map_err(|error| {
                    Error::TransientStorage(format!("could not list {prefix}: {error}"))
                })?;
        }

        keys.retain(|key| key.starts_with(prefix));
        keys.sort();

        Ok(keys)
    }
}
