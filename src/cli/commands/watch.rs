//! Watch command implementation
//!
//! Implements `onsave watch`: rebuilds affected units whenever files in the
//! workspace are saved, until interrupted.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use super::build::command_output;
use super::open_workspace;
use crate::cli::output::{status, ConsoleListener, OutputConfig};
use crate::core::driver::Driver;
use crate::infra::executor::CommandExecutor;
use crate::infra::watcher::{self, WatchOptions};

/// Execute the watch command
pub async fn execute(manifest: &Path, output: OutputConfig) -> Result<()> {
    let workspace = open_workspace(manifest)?;
    let settings = workspace.load()?.scheduler;
    let root = workspace.root().to_path_buf();

    let executor = Arc::new(CommandExecutor::new(command_output(output)));
    let listener = Arc::new(ConsoleListener::new(output));
    let driver = Driver::new(Box::new(workspace), executor, listener);
    let handle = driver.handle();

    let options = WatchOptions {
        settle: Duration::from_millis(settings.settle_ms),
        ignore: settings.ignore,
    };
    let events = handle.clone();
    let _watcher = watcher::watch(&root, options, move |saved| events.paths_changed(saved))?;

    if output.human() {
        println!(
            "{} Watching {} (Ctrl-C to stop)",
            status::INFO,
            root.display()
        );
    }

    let worker = tokio::task::spawn_blocking(move || driver.run());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("interrupted, waiting for the running build");

    handle.shutdown();
    worker.await.context("Driver failed")?;
    Ok(())
}
