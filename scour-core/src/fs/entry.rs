//! `src/fs/entry.rs`
//! ============================================================
//! Filesystem entry model for the scan/search worker.
//!
//! Goals
//! -----
//! • Type (`is_dir`) reflects the symlink *target*, so a link to a
//!   directory browses like a directory.
//! • Stat failures degrade the entry (zero size, epoch mtime) instead of
//!   dropping it, so the UI can still render the name.
//! • Zero-clone sharing of paths via Arc.
//! • Sync and async constructors share one builder.

// ------------------------------------------------------------
// Standard-library imports
// ------------------------------------------------------------

use std::ffi::OsStr;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// ------------------------------------------------------------
// Third-party crate imports
// ------------------------------------------------------------

use bytesize::ByteSize;
use chrono::{DateTime, Local, TimeZone};
use compact_str::CompactString;
use tokio::fs as tokio_fs;
use tracing::debug;

// ------------------------------------------------------------
// ObjectType: file, directory, or symlink.
// ------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Dir,
    File,
    Symlink,
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dir => write!(f, "Dir"),
            Self::File => write!(f, "File"),
            Self::Symlink => write!(f, "Symlink"),
        }
    }
}

// ------------------------------------------------------------
// Entry: one filesystem child on a Response.
// ------------------------------------------------------------

/// One filesystem child. Created fresh per scan, never mutated after being
/// placed on a `Response`; ownership transfers to the caller with the
/// channel read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Shared absolute path.
    pub path: Arc<PathBuf>,

    /// Byte length; 0 for directories and degraded entries.
    pub size: u64,

    /// Last-modification timestamp; `UNIX_EPOCH` when stat failed.
    pub modified: SystemTime,

    /// File or directory name.
    pub name: CompactString,

    /// Directory after following symlinks: a symlink to a directory is a
    /// directory here, a broken symlink is a file.
    pub is_dir: bool,

    /// The entry itself is a symlink (pre-resolution).
    pub is_symlink: bool,
}

impl Entry {
    /// Constant-time type check.
    #[inline]
    #[must_use]
    pub const fn object_type(&self) -> ObjectType {
        if self.is_dir {
            ObjectType::Dir
        } else if self.is_symlink {
            ObjectType::Symlink
        } else {
            ObjectType::File
        }
    }

    /// Human-readable size string.
    #[inline]
    #[must_use]
    pub fn size_human(&self) -> String {
        ByteSize::b(self.size).to_string()
    }

    /// Format the modification date.
    #[expect(clippy::cast_possible_wrap, reason = "Expected")]
    #[must_use]
    pub fn format_date(&self, fmt: &str) -> String {
        let dur: Duration = self
            .modified
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| -> Duration { Duration::from_secs(0) });

        let dt: DateTime<Local> = Local
            .timestamp_opt(dur.as_secs() as i64, dur.subsec_nanos())
            .single()
            .unwrap_or_else(Local::now);

        dt.format(fmt).to_string()
    }

    /// Synchronous constructor. Infallible: a stat failure produces a
    /// degraded entry rather than an error.
    #[must_use]
    pub fn from_path_sync(path: &Path) -> Self {
        let is_symlink: bool = fs::symlink_metadata(path)
            .map(|m: Metadata| m.file_type().is_symlink())
            .unwrap_or(false);

        // fs::metadata follows symlinks; a broken link or permission error
        // lands in the degraded branch.
        match fs::metadata(path) {
            Ok(meta) => Self::from_meta(path, &meta, is_symlink),
            Err(e) => {
                debug!("Stat failed for {:?}: {}", path, e);
                Self::degraded(path, is_symlink)
            }
        }
    }

    /// Async constructor for worker tasks.
    pub async fn from_path_async(path: &Path) -> Self {
        let is_symlink: bool = tokio_fs::symlink_metadata(path)
            .await
            .map(|m: Metadata| m.file_type().is_symlink())
            .unwrap_or(false);

        match tokio_fs::metadata(path).await {
            Ok(meta) => Self::from_meta(path, &meta, is_symlink),
            Err(e) => {
                debug!("Stat failed for {:?}: {}", path, e);
                Self::degraded(path, is_symlink)
            }
        }
    }

    // Internal builder shared by both entry points.
    fn from_meta(path: &Path, meta: &Metadata, is_symlink: bool) -> Self {
        let is_dir: bool = meta.file_type().is_dir();

        let size: u64 = if is_dir { 0 } else { meta.len() };
        let mod_time: SystemTime = meta.modified().unwrap_or(UNIX_EPOCH);

        Self {
            path: Arc::new(path.to_path_buf()),
            size,
            modified: mod_time,
            name: Self::name_of(path),
            is_dir,
            is_symlink,
        }
    }

    // Placeholder for entries whose metadata could not be read.
    fn degraded(path: &Path, is_symlink: bool) -> Self {
        Self {
            path: Arc::new(path.to_path_buf()),
            size: 0,
            modified: UNIX_EPOCH,
            name: Self::name_of(path),
            is_dir: false,
            is_symlink,
        }
    }

    fn name_of(path: &Path) -> CompactString {
        CompactString::new(path.file_name().and_then(OsStr::to_str).unwrap_or(""))
    }
}

impl Default for Entry {
    fn default() -> Self {
        Self {
            path: Arc::new(PathBuf::new()),
            size: 0,
            modified: UNIX_EPOCH,
            name: CompactString::new(""),
            is_dir: false,
            is_symlink: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_entry_from_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("data.bin");
        std::fs::write(&file, b"12345").unwrap();

        let entry = Entry::from_path_sync(&file);

        assert_eq!(entry.name, "data.bin");
        assert_eq!(entry.size, 5);
        assert!(!entry.is_dir);
        assert!(!entry.is_symlink);
        assert_eq!(entry.object_type(), ObjectType::File);
        assert_ne!(entry.modified, UNIX_EPOCH);
    }

    #[test]
    fn test_entry_from_dir_has_zero_size() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("sub");
        std::fs::create_dir(&dir).unwrap();

        let entry = Entry::from_path_sync(&dir);

        assert!(entry.is_dir);
        assert_eq!(entry.size, 0);
        assert_eq!(entry.object_type(), ObjectType::Dir);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_to_dir_reports_dir() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("target");
        std::fs::create_dir(&dir).unwrap();
        let link = tmp.path().join("link");
        std::os::unix::fs::symlink(&dir, &link).unwrap();

        let entry = Entry::from_path_sync(&link);

        assert!(entry.is_dir);
        assert!(entry.is_symlink);
    }

    #[cfg(unix)]
    #[test]
    fn test_broken_symlink_degrades_to_file() {
        let tmp = TempDir::new().unwrap();
        let link = tmp.path().join("dangling");
        std::os::unix::fs::symlink(tmp.path().join("missing"), &link).unwrap();

        let entry = Entry::from_path_sync(&link);

        assert!(!entry.is_dir);
        assert!(entry.is_symlink);
        assert_eq!(entry.size, 0);
        assert_eq!(entry.modified, UNIX_EPOCH);
    }
}
