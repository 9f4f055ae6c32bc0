//! Cross-platform filesystem utilities
//!
//! This module provides helpers that work correctly on both Unix and Windows:
//! - `normalize_path`: Verbatim-prefix stripping for filter comparisons
//! - `atomic_rename`: Handles atomic file replacement (Windows requires explicit delete)
//! - `data_dir` / `config_file`: Platform-appropriate locations for the index and config
//! - `is_hidden` / `is_system`: Attribute checks used by the folder filter
//! - `default_volumes`: Volume roots indexed when none are configured

use std::io;
use std::path::{Path, PathBuf};

/// Application directory name under the platform data/config roots
pub const APP_DIR: &str = "fsindex";

/// Drop the Windows verbatim prefix (`\\?\`, `\\?\UNC\`) so configured
/// folders and volume roots compare equal to the plain paths the walker and
/// change sources report. Unchanged elsewhere.
pub fn normalize_path(path: &Path) -> PathBuf {
    #[cfg(windows)]
    {
        let text = path.to_string_lossy();
        if let Some(share) = text.strip_prefix(r"\\?\UNC\") {
            return PathBuf::from(format!(r"\\{}", share));
        }
        if let Some(local) = text.strip_prefix(r"\\?\") {
            return PathBuf::from(local);
        }
    }
    path.to_path_buf()
}

/// Cross-platform atomic rename that handles Windows file replacement.
///
/// On Unix, `fs::rename` atomically replaces the target if it exists.
/// On Windows, `fs::rename` fails if the target exists, so the target is
/// deleted first.
pub fn atomic_rename(src: &Path, dst: &Path) -> io::Result<()> {
    #[cfg(windows)]
    {
        if dst.exists() {
            std::fs::remove_file(dst)?;
        }
    }
    std::fs::rename(src, dst)
}

/// Directory holding the index database.
///
/// - **Windows**: `%LOCALAPPDATA%\fsindex`
/// - **Unix**: `$XDG_DATA_HOME/fsindex` or `~/.local/share/fsindex`
/// - **Fallback**: System temp directory + `fsindex`
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| std::env::temp_dir().join(APP_DIR))
}

/// Default database file inside [`data_dir`]
pub fn default_database_path() -> PathBuf {
    data_dir().join("index.db")
}

/// Default configuration file.
///
/// - **Windows**: `%APPDATA%\fsindex\config.toml`
/// - **Unix**: `$XDG_CONFIG_HOME/fsindex/config.toml` or `~/.config/fsindex/config.toml`
pub fn config_file() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(data_dir)
        .join("config.toml")
}

// ============================================================================
// Attributes
// ============================================================================

#[cfg(windows)]
const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
#[cfg(windows)]
const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;

#[cfg(windows)]
fn has_attribute(path: &Path, flag: u32) -> bool {
    use std::os::windows::fs::MetadataExt;
    std::fs::symlink_metadata(path)
        .map(|m| m.file_attributes() & flag != 0)
        .unwrap_or(false)
}

/// Whether the entry carries the hidden attribute (Windows) or its final
/// component starts with a dot.
pub fn is_hidden(path: &Path) -> bool {
    let dotted = path
        .file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false);
    #[cfg(windows)]
    {
        dotted || has_attribute(path, FILE_ATTRIBUTE_HIDDEN)
    }
    #[cfg(not(windows))]
    {
        dotted
    }
}

/// Whether the entry carries the system attribute. Always false off Windows.
pub fn is_system(path: &Path) -> bool {
    #[cfg(windows)]
    {
        has_attribute(path, FILE_ATTRIBUTE_SYSTEM)
    }
    #[cfg(not(windows))]
    {
        let _ = path;
        false
    }
}

/// Volume roots to index when the configuration names none.
///
/// Every existing drive root `A:\`..`Z:\` on Windows, `/` elsewhere.
pub fn default_volumes() -> Vec<String> {
    #[cfg(windows)]
    {
        (b'A'..=b'Z')
            .map(|letter| format!("{}:\\", letter as char))
            .filter(|root| Path::new(root).exists())
            .collect()
    }
    #[cfg(not(windows))]
    {
        vec!["/".to_string()]
    }
}
