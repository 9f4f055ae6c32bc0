//! MCP Server for fsindex
//!
//! Exposes the file index as two tools that can be called by AI assistants:
//!
//! - `search`: match file names by keyword or glob, returned as CSV
//! - `open`: open a path with the platform default handler
//!
//! The same handler is served over streamable HTTP by [`http::ToolServer`]
//! and over stdio by `fsindex serve --stdio`.

pub mod formatting;
pub mod http;
pub mod types;

use std::io;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler,
};

use crate::store::RecordStore;

pub use formatting::{human_size, records_to_csv};
pub use http::{ToolServer, ToolServerState};
pub use types::{OpenRequest, SearchRequest, DEFAULT_LIMIT};

// ============================================================================
// File Opener
// ============================================================================

/// Opens a path with whatever the desktop associates with it
pub trait FileOpener: Send + Sync {
    fn open(&self, path: &Path) -> io::Result<()>;
}

/// `cmd /C start` on Windows, `open` on macOS, `xdg-open` elsewhere
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl FileOpener for SystemOpener {
    fn open(&self, path: &Path) -> io::Result<()> {
        let mut command = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.args(["/C", "start", ""]).arg(path);
            c
        } else if cfg!(target_os = "macos") {
            let mut c = Command::new("open");
            c.arg(path);
            c
        } else {
            let mut c = Command::new("xdg-open");
            c.arg(path);
            c
        };

        let status = command.status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::Other,
                format!("opener exited with {}", status),
            ))
        }
    }
}

// ============================================================================
// MCP Server Implementation
// ============================================================================

/// MCP Server answering file-name searches from the record store
#[derive(Clone)]
pub struct FileIndexServer {
    store: Arc<RecordStore>,
    opener: Arc<dyn FileOpener>,
    /// Tool router for MCP
    tool_router: ToolRouter<FileIndexServer>,
}

#[tool_router]
impl FileIndexServer {
    /// Create a server over `store` using the system opener
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self::with_opener(store, Arc::new(SystemOpener))
    }

    /// Create a server with a custom opener
    pub fn with_opener(store: Arc<RecordStore>, opener: Arc<dyn FileOpener>) -> Self {
        Self {
            store,
            opener,
            tool_router: Self::tool_router(),
        }
    }

    /// Search file and folder names
    #[tool(
        description = "Search indexed files and folders by name. Provide a keyword (case-insensitive substring) or a glob pattern using * ? [...] (case-sensitive). Returns CSV with columns name,isDirectory,path,extension,volume,modifiedTime,size."
    )]
    pub async fn search(
        &self,
        Parameters(request): Parameters<SearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        if request.filename.is_empty() {
            return Ok(CallToolResult::error(vec![Content::text(
                "filename is empty",
            )]));
        }

        let limit = request.effective_limit();
        tracing::info!("search filename: {}, limit: {}", request.filename, limit);

        let store = Arc::clone(&self.store);
        let pattern = request.filename.clone();
        let result = tokio::task::spawn_blocking(move || store.query(&pattern, limit)).await;

        let records = match result {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                tracing::error!("search query failed, {}", e);
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "query failed: {}",
                    e
                ))]));
            }
            Err(e) => {
                return Err(McpError::internal_error(
                    format!("query task failed: {}", e),
                    None,
                ))
            }
        };

        if records.is_empty() {
            return Ok(CallToolResult::error(vec![Content::text("no files found")]));
        }

        tracing::info!("search filename: {}, rows: {}", request.filename, records.len());
        Ok(CallToolResult::success(vec![Content::text(records_to_csv(
            &records,
        ))]))
    }

    /// Open a path with the default handler
    #[tool(
        description = "Open a file or folder with the platform default application. Pass a full path returned by search."
    )]
    pub async fn open(
        &self,
        Parameters(request): Parameters<OpenRequest>,
    ) -> Result<CallToolResult, McpError> {
        if request.filename.is_empty() {
            return Ok(CallToolResult::error(vec![Content::text(
                "filename is empty",
            )]));
        }

        let opener = Arc::clone(&self.opener);
        let target = request.filename.clone();
        let result = tokio::task::spawn_blocking(move || opener.open(Path::new(&target))).await;

        match result {
            Ok(Ok(())) => Ok(CallToolResult::success(vec![Content::text("ok")])),
            Ok(Err(e)) => {
                tracing::warn!("open {} failed, {}", request.filename, e);
                Ok(CallToolResult::error(vec![Content::text(format!(
                    "open {} failed: {}",
                    request.filename, e
                ))]))
            }
            Err(e) => Err(McpError::internal_error(
                format!("open task failed: {}", e),
                None,
            )),
        }
    }
}

#[tool_handler]
impl ServerHandler for FileIndexServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "fsindex".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("Local File Index".to_string()),
                website_url: None,
                icons: None,
            },
            instructions: Some(MCP_INSTRUCTIONS.to_string()),
        }
    }
}

/// Instructions for AI agents using the fsindex tools
const MCP_INSTRUCTIONS: &str = r#"fsindex - Live index of local files and folders

## Tools
- search: find files and folders by name
  - "report" matches any name containing "report", ignoring case
  - "*.png", "IMG_20??.jpg", "[ab]*.txt" are globs, matched case-sensitively
  - limit caps the number of rows (default 100)
- open: open a path from a search result with the default application

## Output
CSV with header name,isDirectory,path,extension,volume,modifiedTime,size.
Sizes are human-scaled (B, KB, MB, GB, TB); times are local YYYY-MM-DD HH:MM:SS.
A search with no matches returns the error "no files found"."#;
