//! # Labelgate
//!
//! Skips files whose contents were already labeled in a previous pipeline run.
//!
//! Labelgate keeps the SHA256 hashes of processed file contents in a small
//! JSON record and exposes three bounded-concurrency pipeline stages over it:
//!
//! - `not_labeled`: drops items whose content hash is already recorded
//! - `label`: records the content hash of every item it sees
//! - `dump`: writes the record back to disk
//!
//! ## Example
//!
//! ```rust,no_run
//! use labelgate::{LabelStages, LabelgateConfig, Pipeline};
//! use labelgate::pipeline::collect_items;
//! use std::path::Path;
//!
//! # #[tokio::main]
//! # async fn main() -> labelgate::Result<()> {
//! let config = LabelgateConfig::from_env();
//! labelgate::observability::init_logging(&config.logging)?;
//!
//! let stages = LabelStages::from_config(&config);
//! let output = Pipeline::new()
//!     .stage(stages.not_labeled())
//!     .stage(stages.label())
//!     .stage(stages.dump())
//!     .run(collect_items(Path::new("assets"))?)
//!     .await?;
//!
//! tracing::info!(new_items = output.items.len(), "Labeled new files");
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]
// Metrics values are recorded as f64 from counts and durations.
#![allow(clippy::cast_precision_loss)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::{DumpPolicy, LabelgateConfig};
pub use models::{ContentHash, Contents, FileItem, PipelineItem};
pub use pipeline::{ConcurrentTransform, Pipeline, PipelineOutput, StageStats, Transform};
pub use services::{ContentHasher, LabelStages};
pub use storage::RecordStore;

/// Error type for labelgate operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `RecordParse` | The record file exists but is not a JSON array of strings |
/// | `HashCompute` | An item has content that is not a readable buffer |
/// | `FileWrite` | Writing the record file fails |
/// | `InvalidInput` | Configuration values are invalid |
/// | `OperationFailed` | Other I/O, task join or logging setup failures |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The record file could not be parsed.
    ///
    /// Fatal: surfaced by the first stage that touches the record.
    #[error("record file '{path}' is invalid: {cause}")]
    RecordParse {
        /// Path of the record file.
        path: String,
        /// Parser message.
        cause: String,
    },

    /// An item's content could not be hashed.
    #[error("cannot hash content: {0}")]
    HashCompute(String),

    /// The record file could not be written.
    #[error("failed to write record file '{path}': {cause}")]
    FileWrite {
        /// Path of the record file.
        path: String,
        /// The underlying cause.
        cause: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for labelgate operations.
pub type Result<T> = std::result::Result<T, Error>;
