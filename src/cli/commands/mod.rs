//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod build;
pub mod check;
pub mod plan;
pub mod watch;

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;

use super::output::OutputConfig;
use crate::core::graph::UnitKey;
use crate::infra::workspace::ManifestWorkspace;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the manifest: unit identities, references and cycles
    Check,

    /// Show what a change would rebuild, without building
    Plan {
        /// Keys of the changed units
        #[arg(required = true)]
        changed: Vec<String>,

        /// Only consider this unit and its dependencies
        #[arg(long)]
        startup: Option<String>,
    },

    /// Rebuild the units affected by a change, once
    Build {
        /// Keys of the changed units
        #[arg(required = true)]
        changed: Vec<String>,

        /// Only consider this unit and its dependencies
        #[arg(long)]
        startup: Option<String>,
    },

    /// Rebuild affected units whenever files are saved
    Watch,
}

impl Commands {
    /// Execute the command
    pub async fn run(self, manifest: &Path, output: OutputConfig) -> Result<()> {
        match self {
            Self::Check => check::execute(manifest, output).await,
            Self::Plan { changed, startup } => {
                plan::execute(manifest, &changed, startup, output).await
            }
            Self::Build { changed, startup } => {
                build::execute(manifest, &changed, startup, output).await
            }
            Self::Watch => watch::execute(manifest, output).await,
        }
    }
}

/// Open the workspace, with a hint when the manifest is missing
pub(crate) fn open_workspace(manifest: &Path) -> Result<ManifestWorkspace> {
    ManifestWorkspace::open(manifest).with_context(|| {
        format!(
            "No workspace at '{}'. Create an onsave.toml or pass --manifest.",
            manifest.display()
        )
    })
}

pub(crate) fn unit_keys(keys: &[String]) -> BTreeSet<UnitKey> {
    keys.iter().map(|key| UnitKey::from(key.as_str())).collect()
}
