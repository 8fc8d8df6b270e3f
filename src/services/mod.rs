//! Business logic.

pub mod labeling;

pub use labeling::{ContentHasher, LabelStages};
