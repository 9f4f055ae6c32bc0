//! Formatting helpers for MCP tool output
//!
//! Search results are returned as CSV: a header row followed by one row per
//! record, fields quoted only when they contain a delimiter, a quote or a
//! line break.

use chrono::{DateTime, Local, Utc};

use crate::schema::FileRecord;

pub const CSV_HEADER: [&str; 7] = [
    "name",
    "isDirectory",
    "path",
    "extension",
    "volume",
    "modifiedTime",
    "size",
];

// ============================================================================
// Field Formatting
// ============================================================================

/// Human-scaled size: bytes below 1 KiB, otherwise one decimal place.
pub fn human_size(size: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if size < 1024 {
        return format!("{}B", size);
    }
    let mut value = size as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1}{}", value, UNITS[unit])
}

/// `YYYY-MM-DD HH:MM:SS` in local time
pub fn display_time(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

fn record_fields(record: &FileRecord) -> [String; 7] {
    [
        record.name.clone(),
        record.is_dir.to_string(),
        record.path.clone(),
        record.extension.clone(),
        record.volume.clone(),
        display_time(&record.modified_at),
        human_size(record.size),
    ]
}

// ============================================================================
// CSV
// ============================================================================

fn needs_quotes(field: &str) -> bool {
    field.starts_with(' ') || field.contains([',', '"', '\r', '\n'])
}

fn push_field(out: &mut String, field: &str) {
    if needs_quotes(field) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

fn push_row<S: AsRef<str>>(out: &mut String, fields: &[S]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_field(out, field.as_ref());
    }
    out.push('\n');
}

/// Render records as CSV with the search header.
pub fn records_to_csv(records: &[FileRecord]) -> String {
    let mut out = String::new();
    push_row(&mut out, &CSV_HEADER);
    for record in records {
        push_row(&mut out, &record_fields(record));
    }
    out
}
