//! Index server command handler
//!
//! Starts the store, change listeners and the HTTP tool server, then runs
//! until Ctrl-C. With `--stdio` the MCP tools are also served over stdio and
//! the server stops when the client closes the stream.

use rmcp::transport::stdio;
use rmcp::ServiceExt;

use super::CommandContext;
use crate::cli::ServeArgs;
use crate::error::{IndexError, Result};
use crate::server::IndexServer;

/// Run the index server
///
/// This creates a tokio runtime and blocks until shutdown completes.
pub fn run_serve(ctx: &CommandContext, args: &ServeArgs) -> Result<String> {
    let config = ctx.load_config()?;
    ctx.init_tracing(&config);

    let runtime = super::runtime()?;
    runtime.block_on(run_serve_async(config, args))?;

    // Server exits cleanly - no output needed
    Ok(String::new())
}

async fn run_serve_async(config: crate::config::IndexConfig, args: &ServeArgs) -> Result<()> {
    tracing::info!("Starting fsindex v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Database: {}", config.database_path().display());

    let server = IndexServer::start(config).await?;

    let empty = matches!(server.count(), Ok(0));
    if args.rebuild || empty {
        if empty {
            tracing::info!("index is empty, starting full scan");
        }
        if let Err(e) = server.spawn_rebuild() {
            tracing::warn!("could not start rebuild, {}", e);
        }
    }

    let result = if args.stdio {
        serve_stdio(&server).await
    } else {
        tracing::info!("Press Ctrl-C to stop");
        tokio::signal::ctrl_c().await.map_err(IndexError::from)
    };

    server.shutdown().await;
    result
}

async fn serve_stdio(server: &IndexServer) -> Result<()> {
    let service = server
        .tool_handler()
        .serve(stdio())
        .await
        .map_err(|e| IndexError::ServerError {
            message: format!("Failed to start MCP server: {}", e),
        })?;

    tracing::info!("MCP server initialized on stdio, waiting for requests...");

    tokio::select! {
        waited = service.waiting() => {
            waited.map_err(|e| IndexError::ServerError {
                message: format!("MCP server error: {}", e),
            })?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
        }
    }
    Ok(())
}
