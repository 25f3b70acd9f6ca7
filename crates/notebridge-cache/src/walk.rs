//! Recursive, cycle-safe enumeration of markdown files at the source.

use std::collections::{BTreeSet, HashSet};

use tracing::debug;

use notebridge_core::path::{is_markdown, join_path, normalize_path};
use notebridge_core::{NoteSource, SourceError};

use crate::retry::RetryPolicy;

/// List every markdown file under `root`.
///
/// Directories already in `visited` are skipped, which guards against
/// symlink loops and listings that repeat a parent. Callers pass a fresh
/// set per walk. A directory that reports [`SourceError::NotFound`] is
/// skipped; any other failure aborts the walk, so a partially listed vault
/// never causes good entries to be tombstoned.
///
/// # Errors
///
/// Returns the first non-`NotFound` error from listing a directory.
pub async fn list_markdown_files(
    source: &dyn NoteSource,
    root: &str,
    visited: &mut HashSet<String>,
    retry: &RetryPolicy,
) -> Result<Vec<String>, SourceError> {
    let mut files = BTreeSet::new();
    let mut pending = vec![normalize_path(root)];

    while let Some(dir) = pending.pop() {
        if !visited.insert(dir.clone()) {
            debug!(dir = %dir, "directory already visited, skipping");
            continue;
        }

        let entries = match retry.run(|| source.list_directory(&dir)).await {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => {
                debug!(dir = %dir, "directory not found, skipping");
                continue;
            }
            Err(e) => return Err(e),
        };

        for entry in entries {
            if entry.ends_with('/') {
                let child = join_path(&dir, &entry);
                if !child.is_empty() && child != dir {
                    pending.push(child);
                }
            } else if is_markdown(&entry) {
                files.insert(join_path(&dir, &entry));
            }
        }
    }

    Ok(files.into_iter().collect())
}
