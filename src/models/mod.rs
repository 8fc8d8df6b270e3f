//! Data models for labelgate.
//!
//! Items flowing through the pipeline and the hashes recorded for them.

mod hash;
mod item;

pub use hash::ContentHash;
pub use item::{Contents, FileItem, PipelineItem};
