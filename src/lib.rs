//! fsindex: live index of local files and folders
//!
//! Keeps one SQLite table of file records current through a full directory
//! walk plus continuous OS change notifications, and answers name searches
//! over MCP.
//!
//! # Components
//!
//! - [`store`]: the record table and its notification writer
//! - [`watcher`]: per-volume change listeners
//! - [`scan`]: full-scan reconciler
//! - [`filter`]: folder exclusion policy
//! - [`mcp_server`]: `search` and `open` tools, served over streamable HTTP
//! - [`server`]: lifecycle of all of the above
//!
//! # Example
//!
//! ```ignore
//! use fsindex::{IndexConfig, IndexServer};
//!
//! let server = IndexServer::start(IndexConfig::load()?).await?;
//! server.spawn_rebuild()?;
//! for record in server.query("report", 10)? {
//!     println!("{}", record.path);
//! }
//! server.shutdown().await;
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod filter;
pub mod fs_utils;
pub mod mcp_server;
pub mod scan;
pub mod schema;
pub mod server;
pub mod store;
pub mod watcher;

// Re-export commonly used types
pub use config::{FilterConfig, IndexConfig, VolumeConfig};
pub use error::{IndexError, Result};
pub use filter::{FolderFilter, FolderFilterPolicy};
pub use mcp_server::FileIndexServer;
pub use scan::{Reconciler, ScanStats};
pub use schema::{ChangeEvent, ChangeKind, FileRecord};
pub use server::IndexServer;
pub use store::{QueryMode, RecordStore, StoreOptions};
