//! Change listeners
//!
//! One listener thread per enabled volume. Each listener blocks on a
//! [`ChangeSource`], turns raw notifications into [`ChangeEvent`]s and pushes
//! them onto the record store's bounded queue.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────┐     ┌────────────┐
//! │ ChangeSource │────>│   classify   │────>│ stat +   │────>│ EventSender│
//! │ (per volume) │     │ action code  │     │ filter   │     │ (bounded)  │
//! └──────────────┘     └──────────────┘     └──────────┘     └────────────┘
//! ```
//!
//! On Windows the source reads `ReadDirectoryChangesW` buffers and decodes
//! them with [`decode`]. Elsewhere it wraps a `notify` watcher and maps its
//! events onto the same action codes.

pub mod decode;

#[cfg(not(windows))]
mod portable;
#[cfg(windows)]
mod windows;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::{IndexError, Result};
use crate::filter::FolderFilter;
use crate::schema::{ChangeEvent, ChangeKind, FileRecord};
use crate::store::EventSender;

use decode::{
    FILE_ACTION_ADDED, FILE_ACTION_MODIFIED, FILE_ACTION_REMOVED, FILE_ACTION_RENAMED_NEW_NAME,
    FILE_ACTION_RENAMED_OLD_NAME,
};

/// A raw notification: OS action code plus absolute path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNotification {
    pub action: u32,
    pub path: PathBuf,
}

impl RawNotification {
    pub fn new(action: u32, path: impl Into<PathBuf>) -> Self {
        Self {
            action,
            path: path.into(),
        }
    }
}

/// Blocking producer of raw notification batches for one volume
pub trait ChangeSource: Send {
    /// Block until the next batch is available.
    ///
    /// Returns `Ok(None)` once the source has been closed.
    fn next_batch(&mut self) -> Result<Option<Vec<RawNotification>>>;

    /// Handle that unblocks [`ChangeSource::next_batch`] from another thread
    fn closer(&self) -> Arc<dyn SourceCloser>;
}

/// Closes a change source from outside its listener thread. Idempotent.
pub trait SourceCloser: Send + Sync {
    fn close(&self);
}

/// Map an OS action code to a change kind. Unknown codes are dropped.
pub fn classify(action: u32) -> Option<ChangeKind> {
    match action {
        FILE_ACTION_ADDED => Some(ChangeKind::Added),
        FILE_ACTION_REMOVED => Some(ChangeKind::Removed),
        FILE_ACTION_MODIFIED => Some(ChangeKind::Modified),
        FILE_ACTION_RENAMED_OLD_NAME => Some(ChangeKind::RenameFrom),
        FILE_ACTION_RENAMED_NEW_NAME => Some(ChangeKind::RenameTo),
        _ => None,
    }
}

/// Open the platform change source for a volume root.
pub fn open_source(root: &Path, buffer_size: usize) -> Result<Box<dyn ChangeSource>> {
    #[cfg(windows)]
    {
        Ok(Box::new(windows::DirectoryChanges::open(root, buffer_size)?))
    }
    #[cfg(not(windows))]
    {
        let _ = buffer_size;
        Ok(Box::new(portable::NotifySource::open(root)?))
    }
}

// ============================================================================
// Listener
// ============================================================================

/// Turns raw notifications for one volume into store events
pub struct ChangeListener {
    volume: String,
    filter: Arc<dyn FolderFilter>,
    sender: EventSender,
}

impl ChangeListener {
    pub fn new(volume: impl Into<String>, filter: Arc<dyn FolderFilter>, sender: EventSender) -> Self {
        Self {
            volume: volume.into(),
            filter,
            sender,
        }
    }

    /// Build the event for one notification, or `None` if it should be dropped.
    pub fn to_event(&self, raw: &RawNotification) -> Option<ChangeEvent> {
        let kind = classify(raw.action)?;

        if !kind.is_upsert() {
            return Some(ChangeEvent::removal(kind, raw.path.to_string_lossy()));
        }

        let record = match FileRecord::stat(&raw.path, &self.volume) {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!("stat {} failed, {}", raw.path.display(), e);
                return None;
            }
        };

        let checked = if record.is_dir {
            raw.path.as_path()
        } else {
            raw.path.parent().unwrap_or(raw.path.as_path())
        };
        if self.filter.is_excluded_below(checked, Path::new(&self.volume)) {
            tracing::trace!("filtered {}", raw.path.display());
            return None;
        }

        Some(ChangeEvent::upsert(kind, record))
    }

    /// Drain `source` until it is closed or the store stops accepting events.
    pub fn run(self, mut source: Box<dyn ChangeSource>) {
        tracing::info!("change listener for {} started", self.volume);

        loop {
            let batch = match source.next_batch() {
                Ok(Some(batch)) => batch,
                Ok(None) => break,
                Err(IndexError::Decode(e)) => {
                    tracing::warn!("change listener for {}: {}", self.volume, e);
                    continue;
                }
                Err(e) => {
                    tracing::error!("change listener for {} failed: {}", self.volume, e);
                    break;
                }
            };

            for raw in &batch {
                let Some(event) = self.to_event(raw) else {
                    continue;
                };
                if self.sender.send(event).is_err() {
                    tracing::info!("record store closed, stopping listener for {}", self.volume);
                    return;
                }
            }
        }

        tracing::info!("change listener for {} stopped", self.volume);
    }

    /// Run on a dedicated thread.
    pub fn spawn(self, source: Box<dyn ChangeSource>) -> Result<ListenerHandle> {
        let volume = self.volume.clone();
        let closer = source.closer();
        let thread = thread::Builder::new()
            .name(format!("fsindex-listen-{}", volume))
            .spawn(move || self.run(source))
            .map_err(|e| IndexError::ListenerStart {
                volume: volume.clone(),
                message: e.to_string(),
            })?;

        Ok(ListenerHandle {
            volume,
            closer,
            thread: Some(thread),
        })
    }
}

/// Handle to a running listener thread
pub struct ListenerHandle {
    volume: String,
    closer: Arc<dyn SourceCloser>,
    thread: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    pub fn volume(&self) -> &str {
        &self.volume
    }

    /// Close the source, unblocking the listener thread.
    pub fn close(&self) {
        self.closer.close();
    }

    /// Wait for the listener thread to exit.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("change listener for {} panicked", self.volume);
            }
        }
    }
}

/// Open a source for `root` and start a listener for it.
pub fn start_listener(
    volume: &str,
    root: &Path,
    buffer_size: usize,
    filter: Arc<dyn FolderFilter>,
    sender: EventSender,
) -> Result<ListenerHandle> {
    let source = open_source(root, buffer_size).map_err(|e| IndexError::ListenerStart {
        volume: volume.to_string(),
        message: e.to_string(),
    })?;
    ChangeListener::new(volume, filter, sender).spawn(source)
}
