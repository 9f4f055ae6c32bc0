//! Status command handler

use std::fmt::Write;

use super::CommandContext;
use crate::error::Result;
use crate::mcp_server::http::format_address;
use crate::store::{RecordStore, StoreOptions};

pub fn run_status(ctx: &CommandContext) -> Result<String> {
    let config = ctx.load_config()?;
    ctx.init_tracing(&config);

    let database = config.database_path();
    let records = if database.exists() {
        let store = RecordStore::open(&database, StoreOptions::default())?;
        let count = store.count()?;
        store.close();
        Some(count)
    } else {
        None
    };

    let mut out = String::new();
    let _ = writeln!(out, "config:   {}", ctx.config_path.display());
    let _ = writeln!(out, "database: {}", database.display());
    match records {
        Some(n) => {
            let _ = writeln!(out, "records:  {}", n);
        }
        None => {
            let _ = writeln!(out, "records:  (no index yet, run `fsindex rebuild`)");
        }
    }
    let _ = writeln!(
        out,
        "mcp:      {}",
        if config.mcp.enabled {
            format!("http://{}/mcp", format_address(&config.mcp.listen, config.mcp.port))
        } else {
            "disabled".to_string()
        }
    );
    let _ = writeln!(
        out,
        "notify:   {}",
        if config.index.notify { "on" } else { "off" }
    );
    let _ = writeln!(out, "volumes:");
    for volume in config.effective_volumes() {
        let _ = writeln!(
            out,
            "  {} ({})",
            volume.name,
            if volume.enabled { "enabled" } else { "disabled" }
        );
    }
    Ok(out)
}
