//! Search command handler

use super::CommandContext;
use crate::cli::SearchArgs;
use crate::error::Result;
use crate::mcp_server::records_to_csv;
use crate::store::{QueryMode, RecordStore, StoreOptions};

/// Query the index file directly and render CSV
pub fn run_search(ctx: &CommandContext, args: &SearchArgs) -> Result<String> {
    let config = ctx.load_config()?;
    ctx.init_tracing(&config);

    let store = RecordStore::open(&config.database_path(), StoreOptions::default())?;
    if ctx.verbose {
        eprintln!(
            "{:?} query for {:?} in {}",
            QueryMode::for_pattern(&args.pattern),
            args.pattern,
            store.path().display()
        );
    }

    let records = store.query(&args.pattern, args.limit.max(1))?;
    store.close();

    if records.is_empty() {
        eprintln!("no files found");
        return Ok(String::new());
    }
    Ok(records_to_csv(&records))
}
