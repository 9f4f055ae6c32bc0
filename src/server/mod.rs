//! Index server lifecycle
//!
//! [`IndexServer`] owns every long-running component and is the only handle
//! callers (the CLI, or a desktop shell) need.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           IndexServer                               │
//! │                                                                     │
//! │  ┌──────────────┐    bounded     ┌──────────────┐                   │
//! │  │ Listener (C:)│───┐  queue     │ Notification │                   │
//! │  ├──────────────┤   ├───────────>│    Writer    │──┐                │
//! │  │ Listener (D:)│───┘            └──────────────┘  │ upsert/delete  │
//! │  └──────────────┘                                  v                │
//! │  ┌──────────────┐   upsert_batch          ┌──────────────┐          │
//! │  │  Reconciler  │────────────────────────>│ RecordStore  │          │
//! │  └──────────────┘                         └──────────────┘          │
//! │  ┌──────────────┐          query                 ^                  │
//! │  │  ToolServer  │────────────────────────────────┘                  │
//! │  └──────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Startup and shutdown order
//!
//! Startup: store, listeners, tool server. A failing step tears down what
//! already started and returns the error.
//!
//! Shutdown: tool server, listeners, rebuild thread, store. The store close
//! waits for the writer to drain the queue.
//!
//! # Rebuilds
//!
//! Listeners keep running during a rebuild. Live events are held at the
//! writer while the store is reset and rescanned, then replayed in order, so
//! changes seen during the scan win over the scan's snapshot.

pub mod state;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::{IndexConfig, VolumeConfig};
use crate::error::{IndexError, Result};
use crate::filter::{FolderFilter, FolderFilterPolicy};
use crate::mcp_server::{FileIndexServer, ToolServer, ToolServerState};
use crate::scan::{Reconciler, ScanStats};
use crate::schema::{ChangeEvent, FileRecord};
use crate::store::{EventSender, RecordStore, StoreOptions};
use crate::watcher::{self, ListenerHandle};

pub use state::{ServerPhase, ServerState, ServerStatus};

/// Everything a rebuild needs, cloneable into its thread
#[derive(Clone)]
struct RebuildContext {
    store: Arc<RecordStore>,
    filter: Arc<dyn FolderFilter>,
    volumes: Vec<VolumeConfig>,
    batch_size: usize,
    cancel: CancellationToken,
    state: Arc<ServerState>,
    running: Arc<AtomicBool>,
}

impl RebuildContext {
    fn run(&self) -> Result<ScanStats> {
        self.state.set_phase(ServerPhase::Rebuilding);
        self.store.hold_live_events()?;

        let state = Arc::clone(&self.state);
        let result = Reconciler::new(
            Arc::clone(&self.store),
            Arc::clone(&self.filter),
            self.cancel.clone(),
        )
        .with_batch_size(self.batch_size)
        .with_progress(Box::new(move |progress| {
            state.scanned(progress.path, progress.visited);
        }))
        .rebuild(&self.volumes);

        if let Err(e) = self.store.release_live_events() {
            tracing::warn!("releasing held events failed, {}", e);
        }
        self.state.rebuild_finished(result.as_ref().ok().cloned());
        result
    }
}

/// Clears the rebuild flag when the rebuild ends, however it ends
struct RebuildGuard(Arc<AtomicBool>);

impl Drop for RebuildGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Running index: store, listeners and tool server
pub struct IndexServer {
    config: IndexConfig,
    store: Arc<RecordStore>,
    rebuild: RebuildContext,
    listeners: Mutex<Vec<ListenerHandle>>,
    tool_server: Mutex<Option<ToolServer>>,
    tool_addr: Option<SocketAddr>,
    rebuild_thread: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl IndexServer {
    /// Start the store, one listener per enabled volume, then the tool server.
    pub async fn start(config: IndexConfig) -> Result<Self> {
        let state = Arc::new(ServerState::new());
        let volumes = config.effective_volumes();

        let store = Arc::new(RecordStore::open(
            &config.database_path(),
            StoreOptions {
                queue_capacity: config.index.queue_capacity,
                ..StoreOptions::default()
            },
        )?);

        let roots: Vec<_> = volumes.iter().map(|v| v.root().to_path_buf()).collect();
        let filter: Arc<dyn FolderFilter> = match FolderFilterPolicy::from_config(
            &config.filter,
            &config.data_dir(),
            &roots,
        ) {
            Ok(policy) => Arc::new(policy),
            Err(e) => {
                store.close();
                return Err(e);
            }
        };

        let mut listeners = Vec::new();
        if config.index.notify {
            for volume in volumes.iter().filter(|v| v.enabled) {
                match watcher::start_listener(
                    &volume.name,
                    volume.root(),
                    config.index.buffer_size,
                    Arc::clone(&filter),
                    store.notifier(),
                ) {
                    Ok(handle) => listeners.push(handle),
                    Err(e) => {
                        tracing::error!("{}", e);
                        stop_listeners(listeners);
                        store.close();
                        return Err(e);
                    }
                }
            }
        }

        let mut tool_server = None;
        if config.mcp.enabled {
            let handler = FileIndexServer::new(Arc::clone(&store));
            match ToolServer::start(&config.mcp.listen, config.mcp.port, handler).await {
                Ok(server) => tool_server = Some(server),
                Err(e) => {
                    tracing::error!("{}", e);
                    stop_listeners(listeners);
                    store.close();
                    return Err(e);
                }
            }
        }
        let tool_addr = tool_server.as_ref().map(ToolServer::local_addr);

        state.set_phase(ServerPhase::Running);
        tracing::info!(
            "index server started: {} volume(s), {} listener(s), mcp {}",
            volumes.len(),
            listeners.len(),
            tool_addr
                .map(|a| a.to_string())
                .unwrap_or_else(|| "disabled".to_string())
        );

        Ok(Self {
            rebuild: RebuildContext {
                store: Arc::clone(&store),
                filter,
                volumes,
                batch_size: config.index.batch_size,
                cancel: CancellationToken::new(),
                state,
                running: Arc::new(AtomicBool::new(false)),
            },
            config,
            store,
            listeners: Mutex::new(listeners),
            tool_server: Mutex::new(tool_server),
            tool_addr,
            rebuild_thread: Mutex::new(None),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<RecordStore> {
        Arc::clone(&self.store)
    }

    /// A fresh tool handler over this server's store (for stdio serving)
    pub fn tool_handler(&self) -> FileIndexServer {
        FileIndexServer::new(Arc::clone(&self.store))
    }

    /// Address the HTTP tool server is bound to, if enabled
    pub fn tool_address(&self) -> Option<SocketAddr> {
        self.tool_addr
    }

    /// Tool server liveness, if enabled
    pub fn tool_state(&self) -> Option<ToolServerState> {
        self.tool_server.lock().as_ref().map(ToolServer::state)
    }

    pub fn status(&self) -> ServerStatus {
        self.rebuild.state.status()
    }

    /// Match `pattern` against indexed names
    pub fn query(&self, pattern: &str, limit: usize) -> Result<Vec<FileRecord>> {
        self.store.query(pattern, limit)
    }

    pub fn count(&self) -> Result<u64> {
        self.store.count()
    }

    /// Queue a change for the notification writer.
    pub fn write(&self, event: ChangeEvent) -> Result<()> {
        self.store.notifier().send(event)
    }

    pub fn notifier(&self) -> EventSender {
        self.store.notifier()
    }

    pub fn is_rebuilding(&self) -> bool {
        self.rebuild.running.load(Ordering::SeqCst)
    }

    fn claim_rebuild(&self) -> Result<RebuildGuard> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(IndexError::StoreClosed);
        }
        if self.rebuild.running.swap(true, Ordering::SeqCst) {
            return Err(IndexError::RebuildInProgress);
        }
        Ok(RebuildGuard(Arc::clone(&self.rebuild.running)))
    }

    /// Reset the store and rescan every enabled volume on the calling thread.
    pub fn rebuild_index(&self) -> Result<ScanStats> {
        let _guard = self.claim_rebuild()?;
        self.rebuild.run()
    }

    /// Start a rebuild on a background thread.
    ///
    /// Fails with [`IndexError::RebuildInProgress`] while one is running.
    pub fn spawn_rebuild(&self) -> Result<()> {
        let guard = self.claim_rebuild()?;

        let mut slot = self.rebuild_thread.lock();
        if let Some(previous) = slot.take() {
            if previous.join().is_err() {
                tracing::error!("previous rebuild thread panicked");
            }
        }

        let context = self.rebuild.clone();
        let handle = thread::Builder::new()
            .name("fsindex-rebuild".to_string())
            .spawn(move || {
                let _guard = guard;
                if let Err(e) = context.run() {
                    tracing::error!("index rebuild failed, {}", e);
                }
            })?;
        *slot = Some(handle);
        Ok(())
    }

    /// Stop everything in reverse startup order. Idempotent.
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.rebuild.state.set_phase(ServerPhase::Stopping);
        tracing::info!("index server shutting down");

        let tool_server = self.tool_server.lock().take();
        if let Some(mut server) = tool_server {
            server.shutdown().await;
        }

        self.rebuild.cancel.cancel();

        // Joining threads and draining the writer block, so keep them off
        // the async workers.
        let listeners = std::mem::take(&mut *self.listeners.lock());
        let rebuild = self.rebuild_thread.lock().take();
        let store = Arc::clone(&self.store);
        let teardown = tokio::task::spawn_blocking(move || {
            stop_listeners(listeners);
            if let Some(handle) = rebuild {
                if handle.join().is_err() {
                    tracing::error!("rebuild thread panicked");
                }
            }
            store.close();
        });
        if let Err(e) = teardown.await {
            tracing::error!("shutdown teardown failed, {}", e);
            self.store.close();
        }

        self.rebuild.state.set_phase(ServerPhase::Stopped);
        tracing::info!("index server stopped");
    }
}

fn stop_listeners(listeners: Vec<ListenerHandle>) {
    for listener in &listeners {
        listener.close();
    }
    for listener in listeners {
        tracing::debug!("joining listener for {}", listener.volume());
        listener.join();
    }
}
