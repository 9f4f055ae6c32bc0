//! Request types for the MCP tools

use rmcp::schemars;
use serde::Deserialize;

/// Default and fallback row limit for `search`
pub const DEFAULT_LIMIT: usize = 100;

/// Request to search the index by file name
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchRequest {
    /// Keyword or glob pattern matched against file names
    #[schemars(
        description = "File name keyword. Plain text matches any name containing it (case-insensitive); a pattern with * ? or [...] is matched as a case-sensitive glob."
    )]
    pub filename: String,

    /// Maximum number of rows to return
    #[schemars(description = "Maximum number of results to return (default: 100)")]
    pub limit: Option<i64>,
}

impl SearchRequest {
    /// Requested limit, with non-positive or missing values meaning the default
    pub fn effective_limit(&self) -> usize {
        self.limit
            .filter(|l| *l > 0)
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(DEFAULT_LIMIT)
    }
}

/// Request to open a path with the platform default handler
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct OpenRequest {
    /// Absolute path of the file or folder to open
    #[schemars(description = "Absolute path of the file or folder to open, as returned by search")]
    pub filename: String,
}
