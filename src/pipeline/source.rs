//! Producing pipeline items from a directory tree.

use crate::models::FileItem;
use crate::{Error, Result};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Walks `root` and reads every entry below it into a [`FileItem`].
///
/// Directories become null items and files are read into buffers. Entries are
/// returned in file-name order so runs over the same tree are reproducible.
/// Symlinked directories are not descended into and `root` itself is not
/// included. Symlinks whose target does not exist are skipped.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the walk or a file read fails.
pub fn collect_items(root: &Path) -> Result<Vec<FileItem>> {
    let mut items = Vec::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| Error::OperationFailed {
            operation: "walk_items".to_string(),
            cause: e.to_string(),
        })?;

        let file_type = entry.file_type();
        let item = if file_type.is_dir() {
            FileItem::directory(entry.path())
        } else if file_type.is_symlink() && fs::metadata(entry.path()).is_err() {
            tracing::debug!(path = %entry.path().display(), "Skipping dangling symlink");
            continue;
        } else {
            FileItem::read(entry.path())?
        };
        items.push(item);
    }

    tracing::debug!(root = %root.display(), count = items.len(), "Collected items");
    Ok(items)
}
