//! Command-line interface module
//!
//! This module handles argument parsing and output formatting.
//! It contains no scheduling logic - that belongs in the [`crate::core`] module.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::config::defaults;
use commands::Commands;
use output::OutputConfig;

/// onsave - incremental build-on-save scheduler
///
/// Rebuilds exactly the units affected by a change, dependencies first.
#[derive(Parser, Debug)]
#[command(name = "onsave")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Workspace manifest
    #[arg(
        short,
        long,
        global = true,
        env = "ONSAVE_MANIFEST",
        default_value = defaults::MANIFEST_FILE
    )]
    pub manifest: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Output settings derived from the global flags
    pub fn output(&self) -> OutputConfig {
        OutputConfig::new(self.quiet, self.json, self.verbose)
    }

    /// Execute the CLI command
    pub async fn run(self) -> Result<()> {
        let output = self.output();
        if let Some(cmd) = self.command {
            cmd.run(&self.manifest, output).await
        } else {
            // No subcommand provided, show help
            use clap::CommandFactory;
            let mut cmd = Self::command();
            cmd.print_help()?;
            Ok(())
        }
    }
}
