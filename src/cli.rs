//! CLI argument definitions using clap with subcommand architecture

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::mcp_server::DEFAULT_LIMIT;

/// Live file and folder index for local volumes
#[derive(Parser, Debug)]
#[command(name = "fsindex")]
#[command(about = "Keeps a live index of local files and folders and serves name search over MCP")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, value_name = "PATH", global = true, env = "FSINDEX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available subcommands for fsindex
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the index server until interrupted
    Serve(ServeArgs),

    /// Search the index by file name
    #[command(visible_alias = "s")]
    Search(SearchArgs),

    /// Reset the index and rescan every enabled volume
    Rebuild,

    /// Show record count and configuration summary
    Status,

    /// Inspect or create the configuration file
    Config(ConfigArgs),
}

// ============================================
// Serve Subcommand
// ============================================

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Rebuild the index in the background after startup
    #[arg(long)]
    pub rebuild: bool,

    /// Serve MCP tools over stdio instead of waiting for Ctrl-C
    #[arg(long)]
    pub stdio: bool,
}

// ============================================
// Search Subcommand
// ============================================

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Keyword, or glob pattern when it contains * ? [ ]
    #[arg(value_name = "PATTERN")]
    pub pattern: String,

    /// Maximum number of results
    #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
    pub limit: usize,
}

// ============================================
// Config Subcommand
// ============================================

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the configuration file path
    Path,

    /// Print the effective configuration as TOML
    Show,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
