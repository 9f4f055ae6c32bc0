//! Data model for the file index
//!
//! - [`FileRecord`]: one persisted row per filesystem path
//! - [`ChangeEvent`]: a transient unit of work travelling from a change
//!   listener to the notification writer

use std::fs::Metadata;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};

// ============================================================================
// File Records
// ============================================================================

/// One indexed file or folder. `path` is the unique key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Base name of the entry
    pub name: String,
    /// Whether the entry is a directory
    pub is_dir: bool,
    /// Absolute path
    pub path: String,
    /// Extension without the leading dot; empty for directories
    pub extension: String,
    /// Volume the path belongs to
    pub volume: String,
    /// Last modification time
    pub modified_at: DateTime<Utc>,
    /// Size in bytes; 0 for directories
    pub size: u64,
}

impl FileRecord {
    /// Build a record from already-fetched metadata.
    pub fn from_metadata(path: &Path, volume: &str, metadata: &Metadata) -> Self {
        let is_dir = metadata.is_dir();
        let modified_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| DateTime::<Utc>::from(SystemTime::UNIX_EPOCH));

        Self {
            name: entry_name(path),
            is_dir,
            path: path.to_string_lossy().into_owned(),
            extension: if is_dir {
                String::new()
            } else {
                entry_extension(path)
            },
            volume: volume.to_string(),
            modified_at,
            size: if is_dir { 0 } else { metadata.len() },
        }
    }

    /// Stat `path` and build a record from its current metadata.
    ///
    /// Fails if the path no longer exists, which callers treat as
    /// "drop the event".
    pub fn stat(path: &Path, volume: &str) -> io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        Ok(Self::from_metadata(path, volume, &metadata))
    }
}

/// Base name of a path. Volume roots have no final component, so the
/// whole path is used instead.
pub fn entry_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn entry_extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ============================================================================
// Change Events
// ============================================================================

/// Kind of a filesystem change, as reported by the OS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
    RenameFrom,
    RenameTo,
}

impl ChangeKind {
    /// Whether applying this kind writes a record (as opposed to deleting one)
    pub fn is_upsert(self) -> bool {
        matches!(self, Self::Added | Self::Modified | Self::RenameTo)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
            Self::RenameFrom => "rename_from",
            Self::RenameTo => "rename_to",
        }
    }
}

/// A single change travelling from a listener to the notification writer.
///
/// Upsert kinds always carry a `record`; `Removed` and `RenameFrom` carry only
/// the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: String,
    pub record: Option<FileRecord>,
}

impl ChangeEvent {
    /// `Added`, `Modified` or `RenameTo` with fresh metadata.
    ///
    /// # Panics
    ///
    /// Debug builds assert that `kind` is an upsert kind.
    pub fn upsert(kind: ChangeKind, record: FileRecord) -> Self {
        debug_assert!(kind.is_upsert());
        Self {
            kind,
            path: record.path.clone(),
            record: Some(record),
        }
    }

    /// `Removed` or `RenameFrom` for a path that no longer exists.
    pub fn removal(kind: ChangeKind, path: impl Into<String>) -> Self {
        debug_assert!(!kind.is_upsert());
        Self {
            kind,
            path: path.into(),
            record: None,
        }
    }
}
