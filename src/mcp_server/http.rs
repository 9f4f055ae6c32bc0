//! Streamable HTTP transport for the MCP tools
//!
//! Binds eagerly so a busy port fails [`ToolServer::start`] instead of a
//! background task. Each MCP session gets its own [`FileIndexServer`] clone.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::FileIndexServer;
use crate::error::{IndexError, Result};

/// Route the MCP endpoint is mounted at
pub const MCP_PATH: &str = "/mcp";

/// How long shutdown waits for open connections before aborting them
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Liveness published by a [`ToolServer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolServerState {
    Running,
    Stopped,
}

/// `host:port`, with IPv6 literals bracketed
pub fn format_address(listen: &str, port: u16) -> String {
    if listen.contains(':') && !listen.starts_with('[') {
        format!("[{}]:{}", listen, port)
    } else {
        format!("{}:{}", listen, port)
    }
}

pub struct ToolServer {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    state: Arc<watch::Sender<ToolServerState>>,
}

impl ToolServer {
    /// Bind `listen:port` and start serving `handler` at [`MCP_PATH`].
    pub async fn start(listen: &str, port: u16, handler: FileIndexServer) -> Result<Self> {
        let address = format_address(listen, port);
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| IndexError::BindFailed {
                address: address.clone(),
                message: e.to_string(),
            })?;
        let local_addr = listener.local_addr()?;

        let service = StreamableHttpService::new(
            move || Ok(handler.clone()),
            LocalSessionManager::default().into(),
            StreamableHttpServerConfig::default(),
        );
        let app = Router::new().nest_service(MCP_PATH, service);

        let cancel = CancellationToken::new();
        let (state_tx, _) = watch::channel(ToolServerState::Running);
        let state = Arc::new(state_tx);

        let task = {
            let cancel = cancel.clone();
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                let result = axum::serve(listener, app)
                    .with_graceful_shutdown(async move { cancel.cancelled().await })
                    .await;
                if let Err(e) = result {
                    tracing::warn!("mcp http server failed, {}", e);
                }
                state.send_replace(ToolServerState::Stopped);
            })
        };

        tracing::info!("mcp server listening on http://{}{}", local_addr, MCP_PATH);

        Ok(Self {
            local_addr,
            cancel,
            task: Some(task),
            state,
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> ToolServerState {
        *self.state.borrow()
    }

    /// Watch liveness changes
    pub fn subscribe(&self) -> watch::Receiver<ToolServerState> {
        self.state.subscribe()
    }

    /// Stop accepting, wait up to [`SHUTDOWN_TIMEOUT`], then abort what is left.
    /// Idempotent.
    pub async fn shutdown(&mut self) {
        let Some(mut task) = self.task.take() else {
            return;
        };

        tracing::info!("mcp server ready to shutdown");
        self.cancel.cancel();

        if tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut task).await.is_err() {
            tracing::warn!(
                "mcp server did not stop within {}s, aborting connections",
                SHUTDOWN_TIMEOUT.as_secs()
            );
            task.abort();
            let _ = task.await;
        }

        self.state.send_replace(ToolServerState::Stopped);
        tracing::info!("mcp server stopped");
    }
}

impl Drop for ToolServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
