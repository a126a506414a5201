//! Plan command implementation
//!
//! Implements `onsave plan` to show the build request a change produces.

use std::path::Path;

use anyhow::Result;

use super::{open_workspace, unit_keys};
use crate::cli::output::{status, OutputConfig};
use crate::core::graph::{ProjectGraph, UnitKey};
use crate::core::request::{self, BuildRequest};
use crate::core::workspace::Workspace;

/// Execute the plan command
pub async fn execute(
    manifest: &Path,
    changed: &[String],
    startup: Option<String>,
    output: OutputConfig,
) -> Result<()> {
    let workspace = open_workspace(manifest)?;
    let snapshot = workspace.snapshot()?;
    let graph = ProjectGraph::build(snapshot.units)?;
    let changed = unit_keys(changed);

    for key in changed.iter().filter(|key| !graph.contains(key)) {
        tracing::warn!("'{key}' is not a unit of this workspace");
    }

    let startup = match startup {
        Some(key) => Some(UnitKey::from(key)),
        None => snapshot.startup,
    };
    let request = request::plan(&graph, &changed, &snapshot.selection, startup.as_ref())?;

    if output.json {
        println!("{}", serde_json::to_string_pretty(&request)?);
    } else if !output.quiet {
        print_request(request.as_ref());
    }

    Ok(())
}

fn print_request(request: Option<&BuildRequest>) {
    let Some(request) = request else {
        println!("{} Nothing to build", status::INFO);
        return;
    };

    println!("Build order:");
    for key in request.ordered_keys() {
        if request.must_be_skipped(key) {
            println!("  • {key} (skipped)");
        } else {
            println!("  • {key}");
        }
    }
}
