//! Persistent storage for labeled content hashes.

mod record;

pub use record::{DEFAULT_RECORD_FILE, RecordStore};
