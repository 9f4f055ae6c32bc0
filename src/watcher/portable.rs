//! `notify`-backed change source for non-Windows hosts

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;

use super::decode::{
    FILE_ACTION_ADDED, FILE_ACTION_MODIFIED, FILE_ACTION_REMOVED, FILE_ACTION_RENAMED_NEW_NAME,
    FILE_ACTION_RENAMED_OLD_NAME,
};
use super::{ChangeSource, RawNotification, SourceCloser};
use crate::error::{IndexError, Result};

/// How often a blocked read re-checks the closed flag
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub(super) struct NotifySource {
    rx: Receiver<notify::Result<Event>>,
    guard: Arc<WatcherGuard>,
}

struct WatcherGuard {
    watcher: Mutex<Option<RecommendedWatcher>>,
    closed: AtomicBool,
}

impl SourceCloser for WatcherGuard {
    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            // Dropping the watcher stops its event thread and disconnects the channel
            self.watcher.lock().take();
        }
    }
}

impl NotifySource {
    pub(super) fn open(root: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::channel();

        let mut watcher = notify::recommended_watcher(tx).map_err(|e| {
            IndexError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        })?;
        watcher.watch(root, RecursiveMode::Recursive).map_err(|e| {
            IndexError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("watch {}: {}", root.display(), e),
            ))
        })?;

        Ok(Self {
            rx,
            guard: Arc::new(WatcherGuard {
                watcher: Mutex::new(Some(watcher)),
                closed: AtomicBool::new(false),
            }),
        })
    }
}

impl ChangeSource for NotifySource {
    fn next_batch(&mut self) -> Result<Option<Vec<RawNotification>>> {
        loop {
            if self.guard.closed.load(Ordering::SeqCst) {
                return Ok(None);
            }
            match self.rx.recv_timeout(POLL_INTERVAL) {
                Ok(Ok(event)) => {
                    let mut batch = map_event(&event);
                    // Drain whatever else is already queued
                    while let Ok(next) = self.rx.try_recv() {
                        match next {
                            Ok(event) => batch.extend(map_event(&event)),
                            Err(e) => tracing::warn!("watch error: {}", e),
                        }
                    }
                    if !batch.is_empty() {
                        return Ok(Some(batch));
                    }
                }
                Ok(Err(e)) => tracing::warn!("watch error: {}", e),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Ok(None),
            }
        }
    }

    fn closer(&self) -> Arc<dyn SourceCloser> {
        self.guard.clone()
    }
}

/// Map a `notify` event onto the `FILE_ACTION_*` codes used by the listener.
pub(super) fn map_event(event: &Event) -> Vec<RawNotification> {
    let all = |action: u32| -> Vec<RawNotification> {
        event
            .paths
            .iter()
            .map(|p| RawNotification::new(action, p.clone()))
            .collect()
    };

    match &event.kind {
        EventKind::Create(_) => all(FILE_ACTION_ADDED),
        EventKind::Remove(_) => all(FILE_ACTION_REMOVED),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => all(FILE_ACTION_RENAMED_OLD_NAME),
            RenameMode::To => all(FILE_ACTION_RENAMED_NEW_NAME),
            RenameMode::Both => rename_pair(&event.paths),
            _ => event
                .paths
                .iter()
                .map(|p| {
                    let action = if p.exists() {
                        FILE_ACTION_RENAMED_NEW_NAME
                    } else {
                        FILE_ACTION_RENAMED_OLD_NAME
                    };
                    RawNotification::new(action, p.clone())
                })
                .collect(),
        },
        EventKind::Modify(_) => all(FILE_ACTION_MODIFIED),
        _ => Vec::new(),
    }
}

fn rename_pair(paths: &[PathBuf]) -> Vec<RawNotification> {
    match paths {
        [from, to, ..] => vec![
            RawNotification::new(FILE_ACTION_RENAMED_OLD_NAME, from.clone()),
            RawNotification::new(FILE_ACTION_RENAMED_NEW_NAME, to.clone()),
        ],
        _ => Vec::new(),
    }
}
