//! Build command implementation
//!
//! Implements `onsave build` to run one build cycle for a set of changed
//! units and report its outcome.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use super::{open_workspace, unit_keys};
use crate::cli::output::{ConsoleListener, OutputConfig};
use crate::core::driver::Driver;
use crate::core::graph::UnitKey;
use crate::core::status::{BuildReport, BuildStatus};
use crate::infra::executor::{CommandExecutor, CommandOutput};

/// Execute the build command
pub async fn execute(
    manifest: &Path,
    changed: &[String],
    startup: Option<String>,
    output: OutputConfig,
) -> Result<()> {
    let workspace = open_workspace(manifest)?;
    let changed = unit_keys(changed);
    tracing::info!("Building from workspace: {}", workspace.root().display());

    let executor = Arc::new(CommandExecutor::new(command_output(output)));
    let listener = Arc::new(ConsoleListener::new(output));
    let mut driver = Driver::new(Box::new(workspace), executor, listener);

    let report = tokio::task::spawn_blocking(move || -> Option<BuildReport> {
        match startup {
            Some(key) => driver.begin_cycle(changed, Some(UnitKey::from(key))),
            None => driver.notify_changed(changed),
        }
        driver.run_until_idle().cloned()
    })
    .await
    .context("Build worker failed")?;

    match report.map(|report| report.status) {
        Some(BuildStatus::Ok) => Ok(()),
        Some(BuildStatus::Failed) => bail!("Build failed"),
        Some(BuildStatus::Indeterminate) | None => bail!("Build did not complete"),
    }
}

/// Build output would corrupt machine-readable or quiet output
pub(crate) fn command_output(output: OutputConfig) -> CommandOutput {
    if output.human() {
        CommandOutput::Inherit
    } else {
        CommandOutput::Capture
    }
}
