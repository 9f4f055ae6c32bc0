//! Common test utilities and fixtures for fsindex integration tests
//!
//! This module provides:
//! - `TestTree` builder for on-disk directory fixtures
//! - `TestStore` wrapper opening a record store in its own temp directory
//! - `record` for building records that need no file on disk
//! - `Replay` change source for driving a listener without OS notifications

#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use fsindex::watcher::{ChangeListener, ChangeSource, RawNotification, SourceCloser};
use fsindex::{FileRecord, FolderFilter, RecordStore, StoreOptions, VolumeConfig};

/// Builder for directory trees used as scan and listener volumes
pub struct TestTree {
    dir: TempDir,
}

impl TestTree {
    /// Create an empty tree. The prefix keeps the root name free of a
    /// leading dot, which the hidden-name check would otherwise see.
    pub fn new() -> Self {
        Self {
            dir: tempfile::Builder::new()
                .prefix("fsindex-tree")
                .tempdir()
                .expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Add a file of `size` bytes, creating parents as needed
    pub fn add_file(&self, relative: &str, size: usize) -> &Self {
        let full = self.join(relative);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&full, vec![b'x'; size]).expect("Failed to write file");
        self
    }

    pub fn add_dir(&self, relative: &str) -> &Self {
        fs::create_dir_all(self.join(relative)).expect("Failed to create dir");
        self
    }

    /// This tree as an enabled volume
    pub fn volume(&self) -> VolumeConfig {
        VolumeConfig::new(self.path().to_string_lossy())
    }
}

/// Record store living in its own temp directory
pub struct TestStore {
    pub dir: TempDir,
    pub store: Arc<RecordStore>,
}

impl TestStore {
    pub fn new() -> Self {
        let dir = tempfile::Builder::new()
            .prefix("fsindex-db")
            .tempdir()
            .expect("Failed to create temp dir");
        let store = RecordStore::open(&dir.path().join("index.db"), StoreOptions::default())
            .expect("Failed to open store");
        Self {
            dir,
            store: Arc::new(store),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("index.db")
    }

    /// Sorted paths currently in the store
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .store
            .query("", usize::MAX)
            .expect("query failed")
            .into_iter()
            .map(|r| r.path)
            .collect();
        paths.sort();
        paths
    }
}

/// A file record for `path` that does not need to exist on disk
pub fn record(path: &str, size: u64) -> FileRecord {
    let name = path.rsplit(['\\', '/']).next().unwrap_or(path).to_string();
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_string())
        .unwrap_or_default();
    let volume = if path.starts_with("C:") { "C:\\" } else { "/" };
    FileRecord {
        name,
        is_dir: false,
        path: path.to_string(),
        extension,
        volume: volume.to_string(),
        modified_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        size,
    }
}

struct NoopCloser;

impl SourceCloser for NoopCloser {
    fn close(&self) {}
}

/// Source that hands out prepared batches, then reports closed
pub struct Replay(VecDeque<Vec<RawNotification>>);

impl Replay {
    pub fn batch(batch: Vec<RawNotification>) -> Self {
        Self(VecDeque::from([batch]))
    }
}

impl ChangeSource for Replay {
    fn next_batch(&mut self) -> fsindex::Result<Option<Vec<RawNotification>>> {
        Ok(self.0.pop_front())
    }

    fn closer(&self) -> Arc<dyn SourceCloser> {
        Arc::new(NoopCloser)
    }
}

/// Run a listener for `tree` over one batch on this thread, then flush.
pub fn replay(
    fixture: &TestStore,
    tree: &TestTree,
    filter: Arc<dyn FolderFilter>,
    batch: Vec<RawNotification>,
) {
    let volume = tree.path().to_string_lossy().into_owned();
    ChangeListener::new(volume, filter, fixture.store.notifier()).run(Box::new(Replay::batch(batch)));
    fixture.store.flush().expect("flush failed");
}
