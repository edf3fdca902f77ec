//! Cleanup stage: remove empty directories under the output root
//!
//! Folders emptied by `skipped_no_media` deletions or by manual
//! intervention are swept at the end of a run. Children are removed before
//! their parents so a group directory emptied by the sweep is itself
//! removed; the output root is never touched.

use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Remove every empty directory below `root` (never `root` itself)
///
/// Returns the number of directories removed. Directories that cannot be
/// read or removed are logged and skipped.
pub(crate) async fn remove_empty_dirs(root: &Path) -> Result<usize> {
    if tokio::fs::metadata(root).await.is_err() {
        return Ok(0);
    }

    // Collect the subtree, then sweep deepest-first so nested empty
    // directories unblock their parents
    let mut dirs: Vec<PathBuf> = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
            continue;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };
            if file_type.is_dir() {
                let path = entry.path();
                dirs.push(path.clone());
                stack.push(path);
            }
        }
    }
    dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));

    let mut removed = 0usize;
    for dir in dirs {
        if !is_empty_dir(&dir).await {
            continue;
        }
        match tokio::fs::remove_dir(&dir).await {
            Ok(()) => {
                debug!(dir = %dir.display(), "removed empty directory");
                removed += 1;
            }
            Err(e) => debug!(dir = %dir.display(), error = %e, "could not remove directory"),
        }
    }

    if removed > 0 {
        info!(removed, "cleaned up empty directories");
    }
    Ok(removed)
}

async fn is_empty_dir(dir: &Path) -> bool {
    match tokio::fs::read_dir(dir).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(None)),
        Err(_) => false,
    }
}
