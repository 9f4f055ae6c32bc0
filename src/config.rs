//! fsindex configuration management.
//!
//! Handles the configuration file at:
//! - Linux: ~/.config/fsindex/config.toml
//! - macOS: ~/Library/Application Support/fsindex/config.toml
//! - Windows: %APPDATA%\fsindex\config.toml
//!
//! A missing file yields [`IndexConfig::default`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::fs_utils;
use crate::store::DEFAULT_QUEUE_CAPACITY;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IndexConfig {
    /// MCP tool server settings
    #[serde(default)]
    pub mcp: McpConfig,

    /// Indexing settings
    #[serde(default)]
    pub index: IndexSettings,

    /// Folder exclusion settings
    #[serde(default)]
    pub filter: FilterConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Volumes to index. Empty means the platform defaults.
    #[serde(default)]
    pub volumes: Vec<VolumeConfig>,
}

/// MCP tool server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// Whether to serve tools over HTTP
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8888
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: default_listen(),
            port: default_port(),
        }
    }
}

/// Indexing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Start change listeners
    #[serde(default = "default_true")]
    pub notify: bool,
    /// Change-read buffer hint in bytes
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Bounded event queue length
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Records per reconciler write batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Database file; defaults to the platform data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
}

fn default_buffer_size() -> usize {
    1024 * 1024
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_batch_size() -> usize {
    1000
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            notify: true,
            buffer_size: default_buffer_size(),
            queue_capacity: default_queue_capacity(),
            batch_size: default_batch_size(),
            database: None,
        }
    }
}

/// Folder exclusion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Skip hidden entries
    #[serde(default = "default_true")]
    pub hidden: bool,
    /// Skip entries with the system attribute
    #[serde(default = "default_true")]
    pub system: bool,
    /// Folder prefixes never indexed
    #[serde(default = "default_folders")]
    pub folders: Vec<String>,
    /// Regexes matched against the final path component
    #[serde(default)]
    pub name_patterns: Vec<String>,
}

fn default_folders() -> Vec<String> {
    if cfg!(windows) {
        vec![
            "C:\\Windows".to_string(),
            "C:\\Program Files".to_string(),
            "C:\\Program Files (x86)".to_string(),
            "C:\\ProgramData".to_string(),
        ]
    } else {
        ["/proc", "/sys", "/dev", "/run"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            hidden: true,
            system: true,
            folders: default_folders(),
            name_patterns: Vec::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing directive (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// One indexed volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeConfig {
    /// Volume root, e.g. `C:\` or `/`
    pub name: String,
    /// Whether to listen for changes and scan it
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl VolumeConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
        }
    }

    pub fn root(&self) -> &Path {
        Path::new(&self.name)
    }
}

impl IndexConfig {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(&fs_utils::config_file())
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| IndexError::ConfigError {
            message: format!("Failed to parse config: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = self.to_toml()?;

        // Atomic write
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs_utils::atomic_rename(&temp_path, path)?;
        Ok(())
    }

    /// Pretty TOML rendering with the effective volume list filled in
    pub fn to_toml(&self) -> Result<String> {
        let mut effective = self.clone();
        effective.volumes = self.effective_volumes();
        toml::to_string_pretty(&effective).map_err(|e| IndexError::ConfigError {
            message: format!("Failed to serialize config: {}", e),
        })
    }

    fn validate(&self) -> Result<()> {
        if self.index.batch_size == 0 {
            return Err(IndexError::ConfigError {
                message: "index.batch_size must be at least 1".to_string(),
            });
        }
        if self.index.queue_capacity == 0 {
            return Err(IndexError::ConfigError {
                message: "index.queue_capacity must be at least 1".to_string(),
            });
        }
        if self.volumes.iter().any(|v| v.name.trim().is_empty()) {
            return Err(IndexError::ConfigError {
                message: "volume names must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Configured volumes, or the platform defaults when none are listed
    pub fn effective_volumes(&self) -> Vec<VolumeConfig> {
        if self.volumes.is_empty() {
            fs_utils::default_volumes()
                .into_iter()
                .map(VolumeConfig::new)
                .collect()
        } else {
            self.volumes.clone()
        }
    }

    /// Database file to open
    pub fn database_path(&self) -> PathBuf {
        self.index
            .database
            .clone()
            .unwrap_or_else(fs_utils::default_database_path)
    }

    /// Directory excluded from indexing because it holds the app's own state
    pub fn data_dir(&self) -> PathBuf {
        self.database_path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(fs_utils::data_dir)
    }
}
