//! Content hashing for label tracking.
//!
//! Raw content bytes are hashed with SHA256. Unlike text deduplication there is
//! no normalization step: two files are the same only if their bytes are.

use crate::models::{ContentHash, PipelineItem};
use crate::{Error, Result};
use sha2::{Digest, Sha256};

/// Content hasher for label tracking.
///
/// # Example
///
/// ```rust
/// use labelgate::services::labeling::ContentHasher;
///
/// let hash = ContentHasher::hash(b"hello");
/// assert_eq!(hash.as_str().len(), 64);
/// assert_eq!(
///     hash.as_str(),
///     "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
/// );
/// ```
pub struct ContentHasher;

impl ContentHasher {
    /// Computes the lowercase hex SHA256 digest of `content`.
    #[must_use]
    pub fn hash(content: &[u8]) -> ContentHash {
        let mut hasher = Sha256::new();
        hasher.update(content);
        ContentHash::new(hex::encode(hasher.finalize()))
    }

    /// Hashes an item's contents.
    ///
    /// Returns `Ok(None)` for null items, which the stages pass through
    /// without consulting the record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HashCompute`] when the item has content that is not a
    /// readable buffer.
    pub fn hash_item<I: PipelineItem + ?Sized>(item: &I) -> Result<Option<ContentHash>> {
        if item.is_null() {
            return Ok(None);
        }

        item.contents().map(|bytes| Some(Self::hash(bytes))).ok_or_else(|| {
            Error::HashCompute(format!(
                "{}: contents are not a readable buffer",
                item.path().display()
            ))
        })
    }
}
