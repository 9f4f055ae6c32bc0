//! Command modules for the fsindex CLI
//!
//! Each command module implements a single top-level command:
//! - `serve` - Run the index server (store, listeners, MCP tools)
//! - `search` - Query the index directly
//! - `rebuild` - Reset and rescan with a progress spinner
//! - `status` - Record count and configuration summary
//! - `config` - Inspect or create the configuration file
//!
//! All command handlers take their respective `Args` struct from `cli.rs`
//! and a shared `CommandContext`, and return the text to print on stdout.

pub mod config;
pub mod rebuild;
pub mod search;
pub mod serve;
pub mod status;

pub use config::run_config;
pub use rebuild::run_rebuild;
pub use search::run_search;
pub use serve::run_serve;
pub use status::run_status;

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::fs_utils;

/// Shared context passed to all command handlers
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Configuration file in effect
    pub config_path: PathBuf,
    /// Show verbose output
    pub verbose: bool,
}

impl CommandContext {
    /// Create a new CommandContext from CLI args
    pub fn from_cli(config: Option<PathBuf>, verbose: bool) -> Self {
        Self {
            config_path: config.unwrap_or_else(fs_utils::config_file),
            verbose,
        }
    }

    pub fn load_config(&self) -> Result<IndexConfig> {
        IndexConfig::load_from(&self.config_path)
    }

    /// Install the stderr tracing subscriber.
    ///
    /// `RUST_LOG` wins over the configured level; `--verbose` raises the
    /// default to `debug`. Safe to call more than once.
    pub fn init_tracing(&self, config: &IndexConfig) {
        let level = if self.verbose {
            "debug"
        } else {
            config.logging.level.as_str()
        };
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(format!("fsindex={},rmcp=info", level)))
            .unwrap_or_else(|_| EnvFilter::new("fsindex=info"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

/// Multi-threaded tokio runtime for the async commands
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| IndexError::ServerError {
            message: format!("Failed to create tokio runtime: {}", e),
        })
}
