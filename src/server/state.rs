//! Observable server status
//!
//! Plain data behind a `parking_lot::Mutex`; readers get a cloned snapshot,
//! so no lock is held while a caller renders it.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::scan::ScanStats;

/// Coarse lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerPhase {
    Starting,
    Running,
    Rebuilding,
    Stopping,
    Stopped,
}

impl ServerPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Rebuilding => "rebuilding",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

/// Snapshot of what the server is doing
#[derive(Debug, Clone)]
pub struct ServerStatus {
    pub phase: ServerPhase,
    /// Last path reported by a running scan
    pub last_scanned: Option<PathBuf>,
    /// Entries visited so far by a running scan
    pub visited: usize,
    /// Outcome of the most recent finished rebuild
    pub last_rebuild: Option<ScanStats>,
    pub uptime: Duration,
    start_time: Instant,
}

impl ServerStatus {
    fn new() -> Self {
        Self {
            phase: ServerPhase::Starting,
            last_scanned: None,
            visited: 0,
            last_rebuild: None,
            uptime: Duration::ZERO,
            start_time: Instant::now(),
        }
    }
}

/// Thread-safe holder for [`ServerStatus`]
pub struct ServerState {
    status: Mutex<ServerStatus>,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            status: Mutex::new(ServerStatus::new()),
        }
    }

    /// Cloned snapshot with uptime filled in
    pub fn status(&self) -> ServerStatus {
        let mut status = self.status.lock().clone();
        status.uptime = status.start_time.elapsed();
        status
    }

    pub fn phase(&self) -> ServerPhase {
        self.status.lock().phase
    }

    pub fn set_phase(&self, phase: ServerPhase) {
        let mut status = self.status.lock();
        if phase == ServerPhase::Running && status.phase == ServerPhase::Starting {
            status.start_time = Instant::now();
        }
        status.phase = phase;
    }

    /// Record scan progress
    pub fn scanned(&self, path: PathBuf, visited: usize) {
        let mut status = self.status.lock();
        status.last_scanned = Some(path);
        status.visited = visited;
    }

    /// Record a finished rebuild and return to `Running` unless shutting down
    pub fn rebuild_finished(&self, stats: Option<ScanStats>) {
        let mut status = self.status.lock();
        if stats.is_some() {
            status.last_rebuild = stats;
        }
        status.last_scanned = None;
        status.visited = 0;
        if status.phase == ServerPhase::Rebuilding {
            status.phase = ServerPhase::Running;
        }
    }
}
