//! Check command implementation
//!
//! Implements `onsave check` to validate the workspace without building.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use super::open_workspace;
use crate::cli::output::{status, OutputConfig};
use crate::core::graph::{ProjectGraph, UnitKey};
use crate::core::order;
use crate::core::workspace::Workspace;

/// Result of checking a workspace
#[derive(Debug, Serialize)]
struct CheckResult {
    /// Every unit, dependencies first
    order: Vec<UnitKey>,
    /// Units the current configuration builds
    selected: BTreeSet<UnitKey>,
    startup: Option<UnitKey>,
    /// References to keys that are not part of the workspace
    warnings: Vec<String>,
}

/// Execute the check command
pub async fn execute(manifest: &Path, output: OutputConfig) -> Result<()> {
    let workspace = open_workspace(manifest)?;
    tracing::info!("Checking workspace: {}", workspace.root().display());

    let snapshot = workspace.snapshot()?;
    let graph = ProjectGraph::build(snapshot.units).context("Invalid workspace")?;
    let all: BTreeSet<UnitKey> = graph.keys().cloned().collect();
    let order = order::order(&graph, &all).context("Invalid workspace")?;

    let startup = snapshot.startup;
    if let Some(key) = &startup {
        anyhow::ensure!(
            graph.contains(key),
            "Startup unit '{key}' is not part of the workspace"
        );
    }

    let result = CheckResult {
        order,
        selected: snapshot.selection,
        startup,
        warnings: dangling_references(&graph),
    };

    if output.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if !output.quiet {
        print_result(&result);
    }

    Ok(())
}

fn dangling_references(graph: &ProjectGraph) -> Vec<String> {
    graph
        .units()
        .flat_map(|unit| {
            unit.depends_on
                .iter()
                .filter(move |dep| !graph.contains(dep))
                .map(move |dep| format!("'{}' references unknown unit '{dep}'", unit.key))
        })
        .collect()
}

fn print_result(result: &CheckResult) {
    println!("{} Workspace is valid", status::SUCCESS);
    println!("{} No dependency cycles", status::SUCCESS);

    for warning in &result.warnings {
        println!("{} {warning}", status::WARNING);
    }

    if let Some(startup) = &result.startup {
        println!("{} Startup unit: {startup}", status::INFO);
    }

    println!("\nBuild order:");
    if result.order.is_empty() {
        println!("  (none)");
    }
    for key in &result.order {
        if result.selected.contains(key) {
            println!("  • {key}");
        } else {
            println!("  • {key} (disabled)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::tests::unit;

    #[test]
    fn test_dangling_references() {
        let graph = ProjectGraph::build(vec![unit("a", &["ghost"]), unit("b", &["a"])]).unwrap();
        assert_eq!(
            dangling_references(&graph),
            vec!["'a' references unknown unit 'ghost'"]
        );
    }
}
