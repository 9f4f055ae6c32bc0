//! Folder exclusion predicate shared by change listeners and the reconciler

use std::path::{Component, Path, PathBuf};

use regex::RegexSet;

use crate::config::FilterConfig;
use crate::error::{IndexError, Result};
use crate::fs_utils;

const RECYCLE_BIN: &str = "$Recycle.Bin";

/// Predicate deciding whether a path must stay out of the index
pub trait FolderFilter: Send + Sync {
    fn is_excluded(&self, path: &Path) -> bool;

    /// Whether `path` or any directory between it and `root` is excluded.
    ///
    /// Matches what a walk from `root` prunes: an entry inside an excluded
    /// folder is excluded even when its own name passes. `root` itself is not
    /// checked. Paths outside `root` are checked on their own.
    fn is_excluded_below(&self, path: &Path, root: &Path) -> bool {
        if !path.starts_with(root) {
            return self.is_excluded(path);
        }
        path.ancestors()
            .take_while(|ancestor| *ancestor != root)
            .any(|ancestor| self.is_excluded(ancestor))
    }
}

/// Exclusion policy built from [`FilterConfig`]
#[derive(Debug)]
pub struct FolderFilterPolicy {
    hidden: bool,
    system: bool,
    folders: Vec<PathBuf>,
    names: RegexSet,
    data_dir: PathBuf,
    roots: Vec<PathBuf>,
}

impl FolderFilterPolicy {
    /// Build the policy.
    ///
    /// `data_dir` is the application's own state directory. `roots` are the
    /// indexed volume roots: they are never excluded, and hidden-name checks
    /// only look at components below them.
    pub fn from_config(config: &FilterConfig, data_dir: &Path, roots: &[PathBuf]) -> Result<Self> {
        let names = RegexSet::new(&config.name_patterns).map_err(|e| IndexError::ConfigError {
            message: format!("Invalid filter.name_patterns: {}", e),
        })?;

        Ok(Self {
            hidden: config.hidden,
            system: config.system,
            folders: config.folders.iter().map(|f| comparable(Path::new(f))).collect(),
            names,
            data_dir: comparable(data_dir),
            roots: roots.iter().map(|r| comparable(r)).collect(),
        })
    }

    fn below_root<'a>(&self, path: &'a Path) -> &'a Path {
        let folded = fold_case(path);
        self.roots
            .iter()
            .filter(|root| folded.starts_with(root))
            .map(|root| root.components().count())
            .max()
            .map(|skip| {
                let mut components = path.components();
                for _ in 0..skip {
                    components.next();
                }
                components.as_path()
            })
            .unwrap_or(path)
    }
}

impl FolderFilter for FolderFilterPolicy {
    fn is_excluded(&self, path: &Path) -> bool {
        if path.parent().is_none() {
            return false;
        }
        let folded = fold_case(path);
        if self.roots.iter().any(|root| *root == folded) {
            return false;
        }

        if path
            .components()
            .any(|c| c.as_os_str().to_string_lossy().eq_ignore_ascii_case(RECYCLE_BIN))
        {
            return true;
        }

        if folded.starts_with(&self.data_dir) {
            return true;
        }

        if self.folders.iter().any(|folder| folded.starts_with(folder)) {
            return true;
        }

        if let Some(name) = path.file_name() {
            if self.names.is_match(&name.to_string_lossy()) {
                return true;
            }
        }

        if self.hidden {
            let dotted = self.below_root(path).components().any(|c| {
                matches!(c, Component::Normal(name) if name.to_string_lossy().starts_with('.'))
            });
            if dotted || fs_utils::is_hidden(path) {
                return true;
            }
        }

        self.system && fs_utils::is_system(path)
    }
}

/// Configured paths may come from `canonicalize`, so drop the verbatim prefix
/// before folding case.
fn comparable(path: &Path) -> PathBuf {
    fold_case(&fs_utils::normalize_path(path))
}

/// Windows paths compare case-insensitively
fn fold_case(path: &Path) -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(path.to_string_lossy().to_lowercase())
    } else {
        path.to_path_buf()
    }
}
