//! JSON-backed record of labeled content hashes.
//!
//! The record file is a pretty-printed JSON array of hash strings. It is read
//! once, on first access, and rewritten wholesale by [`RecordStore::persist`].
//!
//! # Concurrency
//!
//! The in-memory set sits behind an `RwLock`, so `add` and `contains` calls
//! from concurrently processed items never observe a half-updated set.
//! Persists take a separate write lock for the whole snapshot-and-write, so
//! two overlapping persists never interleave their bytes and each one writes
//! the set as it stands when its turn comes. Labels added while a persist is
//! waiting are picked up by that persist or a later one.

use crate::{Error, Result};
use indexmap::IndexSet;
use once_cell::sync::OnceCell;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tracing::instrument;

/// Default record file name.
pub const DEFAULT_RECORD_FILE: &str = "labeled.json";

/// Set of labeled content hashes backed by a JSON file.
///
/// # Example
///
/// ```rust,no_run
/// use labelgate::storage::RecordStore;
///
/// let store = RecordStore::new("labeled.json");
/// if !store.contains("2cf24dba")? {
///     store.add("2cf24dba")?;
///     store.persist()?;
/// }
/// # Ok::<(), labelgate::Error>(())
/// ```
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    hashes: OnceCell<RwLock<IndexSet<String>>>,
    persist_lock: Mutex<()>,
}

impl RecordStore {
    /// Creates a store for the record file at `path`.
    ///
    /// Nothing is read until the first operation.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            hashes: OnceCell::new(),
            persist_lock: Mutex::new(()),
        }
    }

    /// Returns the record file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true once the record file has been read.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.hashes.get().is_some()
    }

    /// Loads the record file if it has not been loaded yet.
    ///
    /// A missing file yields an empty set. Later calls never touch the disk.
    /// Returns the number of hashes held.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordParse`] if the file is not a JSON array of
    /// strings, or [`Error::OperationFailed`] if it cannot be read.
    pub fn load(&self) -> Result<usize> {
        self.len()
    }

    /// Returns whether `hash` has been labeled.
    pub fn contains(&self, hash: &str) -> Result<bool> {
        Ok(self.read()?.contains(hash))
    }

    /// Records `hash` as labeled.
    ///
    /// Returns `true` if the hash was not present before.
    #[instrument(skip(self, hash), fields(operation = "record_add"))]
    pub fn add(&self, hash: impl Into<String>) -> Result<bool> {
        let mut hashes = self.write()?;
        let inserted = hashes.insert(hash.into());

        metrics::gauge!("labelgate_record_size").set(hashes.len() as f64);
        tracing::trace!(inserted, size = hashes.len(), "Recorded label");

        Ok(inserted)
    }

    /// Returns the number of labeled hashes.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    /// Returns true if nothing has been labeled.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns the hashes in insertion order.
    pub fn snapshot(&self) -> Result<Vec<String>> {
        Ok(self.read()?.iter().cloned().collect())
    }

    /// Overwrites the record file with the current set.
    ///
    /// The file is a JSON array indented with two spaces. Missing parent
    /// directories are created.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileWrite`] if the file cannot be written.
    #[instrument(skip(self), fields(operation = "record_persist", path = %self.path.display()))]
    pub fn persist(&self) -> Result<()> {
        let start = Instant::now();
        let _guard = self
            .persist_lock
            .lock()
            .map_err(|e| lock_error(&e.to_string()))?;

        let (json, count) = {
            let hashes = self.read()?;
            let json = serde_json::to_string_pretty(&*hashes).map_err(|e| {
                Error::OperationFailed {
                    operation: "serialize_record".to_string(),
                    cause: e.to_string(),
                }
            })?;
            (json, hashes.len())
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.write_error(&e))?;
        }
        fs::write(&self.path, json).map_err(|e| self.write_error(&e))?;

        let duration_ms = start.elapsed().as_millis();
        metrics::counter!("labelgate_record_persists_total").increment(1);
        metrics::histogram!("labelgate_record_persist_duration_ms").record(duration_ms as f64);
        tracing::debug!(count, duration_ms = %duration_ms, "Persisted label record");

        Ok(())
    }

    fn write_error(&self, e: &std::io::Error) -> Error {
        Error::FileWrite {
            path: self.path.display().to_string(),
            cause: e.to_string(),
        }
    }

    fn hashes(&self) -> Result<&RwLock<IndexSet<String>>> {
        self.hashes
            .get_or_try_init(|| read_record(&self.path).map(RwLock::new))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, IndexSet<String>>> {
        self.hashes()?.read().map_err(|e| lock_error(&e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, IndexSet<String>>> {
        self.hashes()?.write().map_err(|e| lock_error(&e.to_string()))
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new(DEFAULT_RECORD_FILE)
    }
}

/// Reads the record file, treating a missing file as an empty record.
#[instrument(skip(path), fields(operation = "record_load", path = %path.display()))]
fn read_record(path: &Path) -> Result<IndexSet<String>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("No label record found, starting empty");
            return Ok(IndexSet::new());
        },
        Err(e) => {
            return Err(Error::OperationFailed {
                operation: "read_record".to_string(),
                cause: format!("{}: {e}", path.display()),
            });
        },
    };

    let hashes: IndexSet<String> =
        serde_json::from_str(&contents).map_err(|e| Error::RecordParse {
            path: path.display().to_string(),
            cause: e.to_string(),
        })?;

    tracing::debug!(count = hashes.len(), "Loaded label record");
    metrics::gauge!("labelgate_record_size").set(hashes.len() as f64);

    Ok(hashes)
}

fn lock_error(cause: &str) -> Error {
    Error::OperationFailed {
        operation: "record_lock".to_string(),
        cause: cause.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> RecordStore {
        RecordStore::new(dir.path().join(DEFAULT_RECORD_FILE))
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(!store.is_loaded());
        assert_eq!(store.load().unwrap(), 0);
        assert!(store.is_loaded());
        assert!(store.is_empty().unwrap());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_add_then_contains() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(!store.contains("abc").unwrap());
        assert!(store.add("abc").unwrap());
        assert!(store.contains("abc").unwrap());
    }

    #[test]
    fn test_add_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(store.add("abc").unwrap());
        assert!(!store.add("abc").unwrap());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_persist_writes_pretty_json_array() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.add("bbb").unwrap();
        store.add("aaa").unwrap();
        store.persist().unwrap();

        let written = fs::read_to_string(store.path()).unwrap();
        assert_eq!(written, "[\n  \"bbb\",\n  \"aaa\"\n]");
    }

    #[test]
    fn test_persist_empty_set() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.persist().unwrap();
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "[]");
    }

    #[test]
    fn test_round_trip_preserves_order() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        for hash in ["c", "a", "b"] {
            store.add(hash).unwrap();
        }
        store.persist().unwrap();

        let reloaded = store_in(&dir);
        assert_eq!(reloaded.snapshot().unwrap(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_load_happens_once() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.load().unwrap(), 0);

        fs::write(store.path(), r#"["late"]"#).unwrap();
        assert!(!store.contains("late").unwrap());
    }

    #[test]
    fn test_duplicate_entries_on_disk_collapse() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), r#"["x", "y", "x"]"#).unwrap();

        assert_eq!(store.snapshot().unwrap(), vec!["x", "y"]);
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "not json").unwrap();

        let err = store.contains("abc").unwrap_err();
        assert!(matches!(err, Error::RecordParse { .. }));
        assert!(!store.is_loaded());
    }

    #[test]
    fn test_non_array_json_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), r#"{"hash": true}"#).unwrap();

        assert!(matches!(store.load(), Err(Error::RecordParse { .. })));
    }

    #[test]
    fn test_persist_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path().join("nested/deeper/labeled.json"));
        store.add("abc").unwrap();
        store.persist().unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_persist_over_directory_is_write_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.add("abc").unwrap();
        fs::create_dir(store.path()).unwrap();

        let err = store.persist().unwrap_err();
        assert!(matches!(err, Error::FileWrite { .. }));
    }

    #[test]
    fn test_unreadable_record_is_operation_failed() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path());

        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::OperationFailed { ref operation, .. } if operation == "read_record"));
    }

    #[test]
    fn test_concurrent_adds_are_all_recorded() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(store_in(&dir));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..50 {
                        store.add(format!("hash-{t}-{i}")).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len().unwrap(), 200);
    }
}
