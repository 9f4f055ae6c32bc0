//! Rebuild command handler

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use super::CommandContext;
use crate::error::Result;
use crate::filter::FolderFilterPolicy;
use crate::scan::Reconciler;
use crate::store::{RecordStore, StoreOptions};

/// Reset the index and rescan every enabled volume with a spinner
pub fn run_rebuild(ctx: &CommandContext) -> Result<String> {
    let config = ctx.load_config()?;
    ctx.init_tracing(&config);

    let volumes = config.effective_volumes();
    let roots: Vec<_> = volumes.iter().map(|v| v.root().to_path_buf()).collect();
    let filter = FolderFilterPolicy::from_config(&config.filter, &config.data_dir(), &roots)?;
    let store = Arc::new(RecordStore::open(
        &config.database_path(),
        StoreOptions::default(),
    )?);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("resetting index");

    let progress = spinner.clone();
    let stats = Reconciler::new(Arc::clone(&store), Arc::new(filter), CancellationToken::new())
        .with_batch_size(config.index.batch_size)
        .with_progress(Box::new(move |p| {
            progress.set_message(format!("{} entries, {}", p.visited, p.path.display()));
        }))
        .rebuild(&volumes);

    spinner.finish_and_clear();
    let stats = stats?;
    let total = store.count()?;
    store.close();

    let mut output = format!(
        "indexed {} records from {} entries in {:.1}s\n",
        total,
        stats.visited,
        stats.duration.as_secs_f64()
    );
    if stats.skipped_dirs > 0 || stats.errors > 0 {
        output.push_str(&format!(
            "skipped {} excluded folders, {} errors\n",
            stats.skipped_dirs, stats.errors
        ));
    }
    Ok(output)
}
