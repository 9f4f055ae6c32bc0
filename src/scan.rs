//! Full-scan reconciler
//!
//! Walks each enabled volume depth-first and writes a record for every
//! non-excluded entry. Excluded directories are neither recorded nor
//! descended into.
//!
//! # Example
//!
//! ```ignore
//! use fsindex::scan::Reconciler;
//!
//! let stats = Reconciler::new(store, filter, cancel)
//!     .with_progress(Box::new(|p| eprintln!("{}", p.path.display())))
//!     .rebuild(&config.effective_volumes())?;
//! println!("{} records", stats.recorded);
//! ```

use std::ops::AddAssign;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ignore::WalkBuilder;
use tokio_util::sync::CancellationToken;

use crate::config::VolumeConfig;
use crate::error::Result;
use crate::filter::FolderFilter;
use crate::schema::FileRecord;
use crate::store::RecordStore;

/// Minimum time between two progress reports
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

/// Default number of records per write transaction
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Coarse progress snapshot
#[derive(Debug, Clone)]
pub struct ScanProgress {
    pub volume: String,
    pub path: PathBuf,
    pub visited: usize,
}

pub type ProgressCallback = Box<dyn Fn(ScanProgress) + Send + Sync>;

/// Outcome of a scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Entries yielded by the walk
    pub visited: usize,
    /// Records handed to the store
    pub recorded: usize,
    /// Directories pruned by the folder filter
    pub skipped_dirs: usize,
    /// Walk, metadata and write failures
    pub errors: usize,
    pub cancelled: bool,
    pub duration: Duration,
}

impl AddAssign for ScanStats {
    fn add_assign(&mut self, other: Self) {
        self.visited += other.visited;
        self.recorded += other.recorded;
        self.skipped_dirs += other.skipped_dirs;
        self.errors += other.errors;
        self.cancelled |= other.cancelled;
        self.duration += other.duration;
    }
}

pub struct Reconciler {
    store: Arc<RecordStore>,
    filter: Arc<dyn FolderFilter>,
    cancel: CancellationToken,
    batch_size: usize,
    progress: Option<ProgressCallback>,
}

impl Reconciler {
    pub fn new(
        store: Arc<RecordStore>,
        filter: Arc<dyn FolderFilter>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            filter,
            cancel,
            batch_size: DEFAULT_BATCH_SIZE,
            progress: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Reset the store, then scan every enabled volume in order.
    pub fn rebuild(&self, volumes: &[VolumeConfig]) -> Result<ScanStats> {
        self.store.reset()?;

        let mut total = ScanStats::default();
        for volume in volumes {
            if self.cancel.is_cancelled() {
                total.cancelled = true;
                break;
            }
            if !volume.enabled {
                tracing::debug!("skipping disabled volume {}", volume.name);
                continue;
            }
            total += self.scan_volume(volume);
        }
        Ok(total)
    }

    /// Walk one volume and write its records. Failures are counted, not returned.
    pub fn scan_volume(&self, volume: &VolumeConfig) -> ScanStats {
        let started = Instant::now();
        tracing::info!("full scan of {} started", volume.name);

        let skipped = Arc::new(AtomicUsize::new(0));
        let walker = {
            let filter = Arc::clone(&self.filter);
            let skipped = Arc::clone(&skipped);
            WalkBuilder::new(volume.root())
                .standard_filters(false)
                .follow_links(false)
                .filter_entry(move |entry| {
                    let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                    if entry.depth() == 0 || !is_dir {
                        return true;
                    }
                    if filter.is_excluded(entry.path()) {
                        tracing::debug!("skip folder {}", entry.path().display());
                        skipped.fetch_add(1, Ordering::Relaxed);
                        return false;
                    }
                    true
                })
                .build()
        };

        let mut stats = ScanStats::default();
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut last_report = started;

        for result in walker {
            if self.cancel.is_cancelled() {
                tracing::info!("full scan of {} cancelled", volume.name);
                stats.cancelled = true;
                break;
            }

            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!("walk error: {}", e);
                    stats.errors += 1;
                    continue;
                }
            };
            stats.visited += 1;

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::debug!("metadata {} failed, {}", entry.path().display(), e);
                    stats.errors += 1;
                    continue;
                }
            };
            batch.push(FileRecord::from_metadata(entry.path(), &volume.name, &metadata));

            if batch.len() >= self.batch_size {
                self.flush(&mut batch, &mut stats);
            }

            if let Some(progress) = &self.progress {
                let now = Instant::now();
                if now.duration_since(last_report) >= PROGRESS_INTERVAL {
                    last_report = now;
                    progress(ScanProgress {
                        volume: volume.name.clone(),
                        path: entry.path().to_path_buf(),
                        visited: stats.visited,
                    });
                }
            }
        }

        self.flush(&mut batch, &mut stats);
        stats.skipped_dirs = skipped.load(Ordering::Relaxed);
        stats.duration = started.elapsed();

        tracing::info!(
            "full scan of {} ended: {} visited, {} recorded, {} folders skipped, {} errors in {:.1}s",
            volume.name,
            stats.visited,
            stats.recorded,
            stats.skipped_dirs,
            stats.errors,
            stats.duration.as_secs_f64()
        );
        stats
    }

    fn flush(&self, batch: &mut Vec<FileRecord>, stats: &mut ScanStats) {
        if batch.is_empty() {
            return;
        }
        match self.store.upsert_batch(batch) {
            Ok(written) => stats.recorded += written,
            Err(e) => {
                tracing::warn!("dropping batch of {} records, {}", batch.len(), e);
                stats.errors += batch.len();
            }
        }
        batch.clear();
    }
}
