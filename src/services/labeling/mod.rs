//! Label tracking for file pipelines.
//!
//! Remembers which file contents have already been processed, across runs,
//! by keeping their SHA256 hashes in a JSON record file.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │ not_labeled  │──► │  (external   │──► │    label     │──► │     dump     │
//! │ drop known   │    │  processing) │    │ add hashes   │    │ write record │
//! └──────┬───────┘    └──────────────┘    └──────┬───────┘    └──────┬───────┘
//!        │                                       │                   │
//!        └───────────────────────┬───────────────┴───────────────────┘
//!                                ▼
//!                      Arc<RecordStore> (labeled.json)
//! ```
//!
//! Items without content (directories) pass through every stage untouched.

mod hasher;
mod stages;

pub use hasher::ContentHasher;
pub use stages::{DUMP_STAGE, LABEL_STAGE, LabelStages, NOT_LABELED_STAGE};
