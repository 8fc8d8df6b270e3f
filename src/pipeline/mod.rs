//! Stream stages with bounded concurrency.
//!
//! ```text
//! items ──► [stage 1] ──► [stage 2] ──► ... ──► survivors
//!            ≤ N in flight  ≤ N in flight
//! ```
//!
//! Each stage is a [`ConcurrentTransform`] running in its own task. Stages
//! talk over bounded tokio channels and can be chained with [`Pipeline`] or
//! wired by hand through [`ConcurrentTransform::spawn`].

mod runner;
mod source;
mod transform;

pub use runner::{Pipeline, PipelineOutput};
pub use source::collect_items;
pub use transform::{
    ConcurrentTransform, DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_CONCURRENT, FnTransform,
    StageHandle, StageStats, Transform, TransformConfig,
};
