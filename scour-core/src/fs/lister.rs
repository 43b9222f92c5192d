//! `src/fs/lister.rs`
//! ============================================================
//! # Directory Lister: Single-Level Asynchronous Listing
//!
//! Lists the immediate children of one directory and returns them sorted.
//! Never descends into subdirectories, which bounds the worst-case latency
//! of an "open folder" action regardless of subtree size. Children are
//! stat'ed with bounded fan-out and collected into a single vector before
//! sorting; FetchDir has no streamed partial results.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::{StreamExt, stream};
use tokio::fs::{self, ReadDir};
use tracing::debug;

use crate::error::AppError;
use crate::fs::entry::Entry;

/// Bounded fan-out for per-child stat calls.
const STAT_CONCURRENCY: usize = 32;

/// Scans the given directory and returns a sorted list of its immediate
/// children.
///
/// - The root is canonicalized first; failure to resolve is a terminal
///   error with no entries.
/// - The root's own entry never appears in the result.
/// - Dotfiles are included; hiding them is a presentation concern.
/// - Children whose metadata cannot be read are included degraded (zero
///   size, epoch mtime) rather than dropped.
pub async fn list_directory(path: &Path) -> Result<Vec<Entry>, AppError> {
    let start_time: Instant = Instant::now();

    let abs: PathBuf = fs::canonicalize(path)
        .await
        .map_err(|_| AppError::NotFound(path.to_path_buf()))?;

    let mut read_dir: ReadDir = fs::read_dir(&abs).await?;

    let mut children: Vec<PathBuf> = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        children.push(entry.path());
    }

    let mut entries: Vec<Entry> = stream::iter(children)
        .map(|child: PathBuf| async move { Entry::from_path_async(&child).await })
        .buffer_unordered(STAT_CONCURRENCY)
        .collect()
        .await;

    sort_entries(&mut entries);

    debug!(
        "Listed {} entries under {} in {:?}",
        entries.len(),
        abs.display(),
        start_time.elapsed()
    );

    Ok(entries)
}

/// Sort entries: directories first, then case-sensitive ascending name
/// within each group. The UI depends on this ordering being deterministic
/// for a fixed directory snapshot.
pub fn sort_entries(entries: &mut [Entry]) {
    entries.sort_by(|a: &Entry, b: &Entry| -> Ordering {
        if a.is_dir && !b.is_dir {
            Ordering::Less
        } else if !a.is_dir && b.is_dir {
            Ordering::Greater
        } else {
            a.name.cmp(&b.name)
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("dir1")).unwrap();
        std::fs::write(tmp.path().join("dir1/nested.txt"), b"nested").unwrap();
        std::fs::write(tmp.path().join("file1.txt"), b"one").unwrap();
        std::fs::write(tmp.path().join(".hidden"), b"dot").unwrap();
        tmp
    }

    #[tokio::test]
    async fn test_immediate_children_only() {
        let tmp = fixture();

        let entries = list_directory(tmp.path()).await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();

        assert_eq!(names, vec!["dir1", ".hidden", "file1.txt"]);
        assert!(entries[0].is_dir);
        assert!(!names.contains(&"nested.txt"));
    }

    #[tokio::test]
    async fn test_idempotent_for_unchanged_directory() {
        let tmp = fixture();

        let first = list_directory(tmp.path()).await.unwrap();
        let second = list_directory(tmp.path()).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_sort_is_dirs_first_then_case_sensitive_name() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.txt"), b"").unwrap();
        std::fs::write(tmp.path().join("B.txt"), b"").unwrap();
        std::fs::create_dir(tmp.path().join("zeta")).unwrap();
        std::fs::create_dir(tmp.path().join("Alpha")).unwrap();

        let entries = list_directory(tmp.path()).await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();

        // Uppercase sorts before lowercase in byte order.
        assert_eq!(names, vec!["Alpha", "zeta", "B.txt", "a.txt"]);
    }

    #[tokio::test]
    async fn test_unresolvable_root_is_terminal_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("does-not-exist");

        let err = list_directory(&missing).await.unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks_resolve_to_target_type() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("real_dir")).unwrap();
        std::fs::write(tmp.path().join("real_file"), b"x").unwrap();
        std::os::unix::fs::symlink(tmp.path().join("real_dir"), tmp.path().join("to_dir"))
            .unwrap();
        std::os::unix::fs::symlink(tmp.path().join("real_file"), tmp.path().join("to_file"))
            .unwrap();
        std::os::unix::fs::symlink(tmp.path().join("gone"), tmp.path().join("broken")).unwrap();

        let entries = list_directory(tmp.path()).await.unwrap();

        let by_name = |n: &str| entries.iter().find(|e| e.name == n).unwrap();

        assert!(by_name("to_dir").is_dir);
        assert!(!by_name("to_file").is_dir);

        let broken = by_name("broken");
        assert!(!broken.is_dir);
        assert!(broken.is_symlink);
        assert_eq!(broken.size, 0);
    }
}
