//! SQL text and row mapping for the `file_info` table

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;

use crate::schema::FileRecord;

pub(crate) const CREATE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS file_info (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    is_dir INTEGER NOT NULL,
    path TEXT NOT NULL UNIQUE,
    ext TEXT NOT NULL,
    volume TEXT NOT NULL,
    mod_time TEXT NOT NULL,
    size INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_file_info_name ON file_info (name, ext);
"#;

pub(crate) const DROP_SCHEMA: &str = r#"
DROP INDEX IF EXISTS idx_file_info_name;
DROP TABLE IF EXISTS file_info;
"#;

pub(crate) const UPSERT: &str = r#"
INSERT INTO file_info (name, is_dir, path, ext, volume, mod_time, size)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
ON CONFLICT(path) DO UPDATE SET
    name = excluded.name,
    is_dir = excluded.is_dir,
    ext = excluded.ext,
    volume = excluded.volume,
    mod_time = excluded.mod_time,
    size = excluded.size
"#;

pub(crate) const DELETE: &str = "DELETE FROM file_info WHERE path = ?1";

pub(crate) const COUNT: &str = "SELECT COUNT(*) FROM file_info";

pub(crate) const QUERY_LIKE: &str = r#"
SELECT name, is_dir, path, ext, volume, mod_time, size FROM file_info
WHERE name LIKE ?1 ESCAPE '\'
LIMIT ?2
"#;

pub(crate) const QUERY_GLOB: &str = r#"
SELECT name, is_dir, path, ext, volume, mod_time, size FROM file_info
WHERE name GLOB ?1
LIMIT ?2
"#;

/// Escape `LIKE` metacharacters so the keyword matches literally.
pub(crate) fn escape_like(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len() + 2);
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub(crate) fn parse_timestamp(text: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(text) {
        Ok(ts) => ts.with_timezone(&Utc),
        Err(e) => {
            tracing::warn!("parse mod time {} failed, {}", text, e);
            DateTime::<Utc>::UNIX_EPOCH
        }
    }
}

pub(crate) fn size_to_sql(size: u64) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}

/// Map a `SELECT name, is_dir, path, ext, volume, mod_time, size` row.
pub(crate) fn record_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    let mod_time: String = row.get(5)?;
    let size: i64 = row.get(6)?;
    Ok(FileRecord {
        name: row.get(0)?,
        is_dir: row.get(1)?,
        path: row.get(2)?,
        extension: row.get(3)?,
        volume: row.get(4)?,
        modified_at: parse_timestamp(&mod_time),
        size: u64::try_from(size).unwrap_or(0),
    })
}
