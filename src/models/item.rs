//! Pipeline items and their contents.

use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Contract an item must satisfy to flow through the labeling stages.
///
/// Items are owned by the surrounding pipeline; the stages only look at
/// their contents and hand them back unchanged.
pub trait PipelineItem: Send + 'static {
    /// Returns true when the item carries no content (directories, placeholders).
    fn is_null(&self) -> bool;

    /// Returns the content buffer, or `None` when the content is not a
    /// materialised buffer.
    fn contents(&self) -> Option<&[u8]>;

    /// Path used to identify the item in logs and errors.
    fn path(&self) -> &Path;
}

/// Content carried by a [`FileItem`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Contents {
    /// No content: a directory or placeholder entry.
    #[default]
    Null,
    /// File content read fully into memory.
    Buffer(Vec<u8>),
    /// Content that is only available as a stream and cannot be hashed.
    Stream,
}

impl Contents {
    /// Returns the variant name used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Buffer(_) => "buffer",
            Self::Stream => "stream",
        }
    }
}

/// A file moving through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileItem {
    path: PathBuf,
    contents: Contents,
}

impl FileItem {
    /// Creates an item from a path and its contents.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, contents: Contents) -> Self {
        Self {
            path: path.into(),
            contents,
        }
    }

    /// Creates an item whose contents are an in-memory buffer.
    #[must_use]
    pub fn buffer(path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(path, Contents::Buffer(bytes.into()))
    }

    /// Creates a content-less directory entry.
    #[must_use]
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self::new(path, Contents::Null)
    }

    /// Creates an item whose contents are only available as a stream.
    #[must_use]
    pub fn stream(path: impl Into<PathBuf>) -> Self {
        Self::new(path, Contents::Stream)
    }

    /// Reads an item from disk.
    ///
    /// Directories become null items; regular files are read into a buffer.
    pub fn read(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let metadata = fs::metadata(&path).map_err(|e| Error::OperationFailed {
            operation: "stat_item".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        if metadata.is_dir() {
            return Ok(Self::directory(path));
        }

        let bytes = fs::read(&path).map_err(|e| Error::OperationFailed {
            operation: "read_item".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Ok(Self::buffer(path, bytes))
    }

    /// Returns the item's contents.
    #[must_use]
    pub const fn file_contents(&self) -> &Contents {
        &self.contents
    }
}

impl PipelineItem for FileItem {
    fn is_null(&self) -> bool {
        matches!(self.contents, Contents::Null)
    }

    fn contents(&self) -> Option<&[u8]> {
        match &self.contents {
            Contents::Buffer(bytes) => Some(bytes),
            Contents::Null | Contents::Stream => None,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
