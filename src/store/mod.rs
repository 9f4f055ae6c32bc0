//! Persistent record store
//!
//! The only component that touches persistent storage. Records live in a
//! single SQLite table keyed by path; every write is an upsert or a delete on
//! that key.
//!
//! # Locking
//!
//! - Mutations (`upsert`, `upsert_batch`, `delete`, `reset`) take the gate
//!   exclusively and run on the single writer connection.
//! - Queries (`query`, `count`) take the gate shared and run on a pooled
//!   read-only connection, so they never block each other.
//!
//! # Notification writer
//!
//! Opening a store also starts its [`writer`] thread, which drains the bounded
//! event queue returned by [`RecordStore::notifier`]. [`RecordStore::close`]
//! stops the writer with a sentinel, waits for it to exit and only then
//! releases the connections.

pub(crate) mod sql;
pub mod writer;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Sender;
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection};

use crate::error::{IndexError, Result};
use crate::schema::{ChangeEvent, FileRecord};

pub use writer::WriterMessage;

/// Idle read connections kept for reuse
const MAX_IDLE_READERS: usize = 4;

/// Default bounded queue length between listeners and the writer
pub const DEFAULT_QUEUE_CAPACITY: usize = 100_000;

/// Default cap on live events buffered while the writer is held
pub const DEFAULT_HOLD_LIMIT: usize = 1_000_000;

// ============================================================================
// Query Dispatch
// ============================================================================

/// Which matching rule a query pattern selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Case-insensitive substring containment over `name`.
    ///
    /// Runs on SQLite `LIKE`, which folds ASCII letters only: `"report"`
    /// matches `"REPORT.txt"`, but `"été"` does not match `"ÉTÉ.txt"`.
    Substring,
    /// Case-sensitive SQLite `GLOB` over `name`
    Glob,
}

impl QueryMode {
    /// Glob iff the pattern contains one of `* ? [ ]`.
    pub fn for_pattern(pattern: &str) -> Self {
        if pattern.contains(['*', '?', '[', ']']) {
            Self::Glob
        } else {
            Self::Substring
        }
    }
}

// ============================================================================
// Store
// ============================================================================

/// Options for [`RecordStore::open`]
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Capacity of the bounded event queue
    pub queue_capacity: usize,
    /// Maximum number of live events buffered while the writer is held
    pub hold_limit: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            hold_limit: DEFAULT_HOLD_LIMIT,
        }
    }
}

/// Connections and locks shared between the store handle and its writer thread
pub(crate) struct StoreInner {
    path: PathBuf,
    gate: RwLock<()>,
    writer: Mutex<Option<Connection>>,
    readers: Mutex<Vec<Connection>>,
    closed: AtomicBool,
}

impl StoreInner {
    pub(crate) fn upsert(&self, record: &FileRecord) -> Result<()> {
        let _gate = self.gate.write();
        let guard = self.writer.lock();
        let conn = guard.as_ref().ok_or(IndexError::StoreClosed)?;
        conn.prepare_cached(sql::UPSERT)?.execute(params![
            record.name,
            record.is_dir,
            record.path,
            record.extension,
            record.volume,
            sql::format_timestamp(&record.modified_at),
            sql::size_to_sql(record.size),
        ])?;
        Ok(())
    }

    fn upsert_batch(&self, records: &[FileRecord]) -> Result<usize> {
        let _gate = self.gate.write();
        let mut guard = self.writer.lock();
        let conn = guard.as_mut().ok_or(IndexError::StoreClosed)?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(sql::UPSERT)?;
            for record in records {
                stmt.execute(params![
                    record.name,
                    record.is_dir,
                    record.path,
                    record.extension,
                    record.volume,
                    sql::format_timestamp(&record.modified_at),
                    sql::size_to_sql(record.size),
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    pub(crate) fn delete(&self, path: &str) -> Result<()> {
        let _gate = self.gate.write();
        let guard = self.writer.lock();
        let conn = guard.as_ref().ok_or(IndexError::StoreClosed)?;
        conn.prepare_cached(sql::DELETE)?.execute(params![path])?;
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        let _gate = self.gate.write();
        let mut guard = self.writer.lock();
        let conn = guard.as_mut().ok_or(IndexError::StoreClosed)?;
        let tx = conn.transaction()?;
        tx.execute_batch(sql::DROP_SCHEMA)?;
        tx.execute_batch(sql::CREATE_SCHEMA)?;
        tx.commit()?;
        tracing::info!("record store reset");
        Ok(())
    }

    fn query(&self, pattern: &str, limit: usize) -> Result<Vec<FileRecord>> {
        let mode = QueryMode::for_pattern(pattern);
        let _gate = self.gate.read();
        let conn = self.checkout()?;
        let result = run_query(&conn, mode, pattern, limit);
        self.checkin(conn);
        result
    }

    fn count(&self) -> Result<u64> {
        let _gate = self.gate.read();
        let conn = self.checkout()?;
        let result = conn
            .query_row(sql::COUNT, [], |row| row.get::<_, i64>(0))
            .map(|n| u64::try_from(n).unwrap_or(0))
            .map_err(IndexError::from);
        self.checkin(conn);
        result
    }

    fn checkout(&self) -> Result<Connection> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(IndexError::StoreClosed);
        }
        if let Some(conn) = self.readers.lock().pop() {
            return Ok(conn);
        }
        open_reader(&self.path)
    }

    fn checkin(&self, conn: Connection) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let mut readers = self.readers.lock();
        if readers.len() < MAX_IDLE_READERS {
            readers.push(conn);
        }
    }

    fn release(&self) {
        let _gate = self.gate.write();
        self.closed.store(true, Ordering::SeqCst);
        self.readers.lock().clear();
        if let Some(conn) = self.writer.lock().take() {
            if let Err((_, e)) = conn.close() {
                tracing::warn!("sql close failed, {}", e);
            }
        }
    }
}

fn run_query(
    conn: &Connection,
    mode: QueryMode,
    pattern: &str,
    limit: usize,
) -> Result<Vec<FileRecord>> {
    let (statement, argument) = match mode {
        QueryMode::Glob => (sql::QUERY_GLOB, pattern.to_string()),
        QueryMode::Substring => (sql::QUERY_LIKE, format!("%{}%", sql::escape_like(pattern))),
    };
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let mut stmt = conn.prepare_cached(statement)?;
    let rows = stmt.query_map(params![argument, limit], sql::record_from_row)?;

    let mut output = Vec::new();
    for row in rows {
        match row {
            Ok(record) => output.push(record),
            Err(e) => tracing::warn!("skipping unreadable row: {}", e),
        }
    }
    Ok(output)
}

fn open_reader(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.pragma_update(None, "query_only", true)?;
    Ok(conn)
}

fn open_writer(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path).map_err(|e| IndexError::Database {
        message: format!("Failed to open {}: {}", path.display(), e),
    })?;
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.execute_batch(sql::CREATE_SCHEMA)
        .map_err(|e| IndexError::Database {
            message: format!("Failed to create schema: {}", e),
        })?;
    Ok(conn)
}

/// Handle for pushing change events onto a store's writer queue.
///
/// Cloneable; `send` blocks while the queue is full.
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<WriterMessage>,
}

impl EventSender {
    /// Enqueue a change event for the notification writer.
    pub fn send(&self, event: ChangeEvent) -> Result<()> {
        self.tx
            .send(WriterMessage::Event(event))
            .map_err(|_| IndexError::StoreClosed)
    }

    fn control(&self, message: WriterMessage) -> Result<()> {
        self.tx.send(message).map_err(|_| IndexError::StoreClosed)
    }
}

/// Durable keyed table of file records plus its notification writer
pub struct RecordStore {
    inner: Arc<StoreInner>,
    sender: EventSender,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl RecordStore {
    /// Open (or create) the store at `path` and start its notification writer.
    pub fn open(path: &Path, options: StoreOptions) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = open_writer(path)?;
        let inner = Arc::new(StoreInner {
            path: path.to_path_buf(),
            gate: RwLock::new(()),
            writer: Mutex::new(Some(conn)),
            readers: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });

        let (tx, rx) = crossbeam_channel::bounded(options.queue_capacity.max(1));
        let handle = writer::spawn(Arc::clone(&inner), rx, options.hold_limit)?;

        tracing::info!("record store opened at {}", path.display());

        Ok(Self {
            inner,
            sender: EventSender { tx },
            writer: Mutex::new(Some(handle)),
        })
    }

    /// Path of the backing database file
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Insert or replace the record for `record.path`.
    pub fn upsert(&self, record: &FileRecord) -> Result<()> {
        self.inner.upsert(record)
    }

    /// Upsert a batch of records in one transaction. Returns the number written.
    pub fn upsert_batch(&self, records: &[FileRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        self.inner.upsert_batch(records)
    }

    /// Remove the record for `path`, if any.
    pub fn delete(&self, path: &str) -> Result<()> {
        self.inner.delete(path)
    }

    /// Match `pattern` against record names, returning at most `limit` rows.
    ///
    /// See [`QueryMode::for_pattern`] for how the matching rule is chosen.
    pub fn query(&self, pattern: &str, limit: usize) -> Result<Vec<FileRecord>> {
        self.inner.query(pattern, limit)
    }

    /// Number of records in the table
    pub fn count(&self) -> Result<u64> {
        self.inner.count()
    }

    /// Atomically drop and recreate the table. Used before a rebuild.
    pub fn reset(&self) -> Result<()> {
        self.inner.reset()
    }

    /// Sender for the notification writer's queue
    pub fn notifier(&self) -> EventSender {
        self.sender.clone()
    }

    /// Buffer live events at the writer until [`RecordStore::release_live_events`].
    pub fn hold_live_events(&self) -> Result<()> {
        self.sender.control(WriterMessage::Hold)
    }

    /// Replay buffered live events in arrival order and resume direct application.
    pub fn release_live_events(&self) -> Result<()> {
        self.sender.control(WriterMessage::Release)
    }

    /// Block until every message enqueued before this call has been handled by
    /// the writer. Held events stay held.
    pub fn flush(&self) -> Result<()> {
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        self.sender.control(WriterMessage::Barrier(ack_tx))?;
        ack_rx.recv().map_err(|_| IndexError::StoreClosed)
    }

    /// Stop the writer, wait for it to exit, then release the storage handles.
    ///
    /// Idempotent; later operations return [`IndexError::StoreClosed`].
    pub fn close(&self) {
        let Some(handle) = self.writer.lock().take() else {
            return;
        };

        if self.sender.control(WriterMessage::Shutdown).is_err() {
            tracing::warn!("notification writer already gone");
        }
        if handle.join().is_err() {
            tracing::error!("notification writer panicked");
        }

        self.inner.release();
        tracing::info!("record store closed");
    }
}

impl Drop for RecordStore {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Tests
// ============================================================================
