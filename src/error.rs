//! Error types and exit codes for fsindex

use std::process::ExitCode;
use thiserror::Error;

use crate::watcher::decode::DecodeError;

/// Main error type for fsindex operations
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Record store is closed")]
    StoreClosed,

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Failed to start change listener for {volume}: {message}")]
    ListenerStart { volume: String, message: String },

    #[error("Failed to bind {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("An index rebuild is already running")]
    RebuildInProgress,

    #[error("Malformed change notification buffer: {0}")]
    Decode(#[from] DecodeError),

    #[error("Server error: {message}")]
    ServerError { message: String },
}

impl From<rusqlite::Error> for IndexError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database {
            message: e.to_string(),
        }
    }
}

impl IndexError {
    /// Convert error to the process exit code used by the CLI:
    /// - 1: IO error
    /// - 2: Configuration error
    /// - 3: Database / store error
    /// - 4: Listener or server startup error
    /// - 5: Rebuild already running
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Io(_) => ExitCode::from(1),
            Self::ConfigError { .. } => ExitCode::from(2),
            Self::Database { .. } | Self::StoreClosed => ExitCode::from(3),
            Self::ListenerStart { .. } | Self::BindFailed { .. } => ExitCode::from(4),
            Self::Decode(_) | Self::ServerError { .. } => ExitCode::from(4),
            Self::RebuildInProgress => ExitCode::from(5),
        }
    }
}

/// Result type alias for fsindex operations
pub type Result<T> = std::result::Result<T, IndexError>;
