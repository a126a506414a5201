//! Shell command executor
//!
//! Builds a unit by running each of its targets as a shell command in the
//! unit's directory. The first target exiting non-zero fails the unit.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use anyhow::Context;

use crate::core::coordinator::Executor;
use crate::core::graph::Unit;
use crate::core::status::UnitOutcome;

/// Where command output goes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommandOutput {
    /// Stream to the terminal
    #[default]
    Inherit,
    /// Capture; replay to stderr only when a target fails
    Capture,
}

/// Runs unit targets through the platform shell
#[derive(Debug, Clone, Default)]
pub struct CommandExecutor {
    output: CommandOutput,
}

impl CommandExecutor {
    pub fn new(output: CommandOutput) -> Self {
        Self { output }
    }

    fn run_target(&self, target: &str, dir: &Path) -> anyhow::Result<bool> {
        let mut command = shell(target);
        command.current_dir(dir).stdin(Stdio::null());

        match self.output {
            CommandOutput::Inherit => {
                let status = command
                    .status()
                    .with_context(|| format!("Failed to run '{target}'"))?;
                Ok(status.success())
            }
            CommandOutput::Capture => {
                let output = command
                    .output()
                    .with_context(|| format!("Failed to run '{target}'"))?;
                if !output.status.success() {
                    replay(&output);
                }
                Ok(output.status.success())
            }
        }
    }
}

impl Executor for CommandExecutor {
    fn execute(&self, unit: &Unit) -> anyhow::Result<UnitOutcome> {
        if unit.targets.is_empty() {
            tracing::debug!("unit '{}' has no targets", unit.key);
            return Ok(UnitOutcome::Succeeded);
        }

        for target in &unit.targets {
            tracing::info!("[{}] {target}", unit.key);
            if !self.run_target(target, &unit.location)? {
                tracing::warn!("[{}] '{target}' failed", unit.key);
                return Ok(UnitOutcome::Failed);
            }
        }

        Ok(UnitOutcome::Succeeded)
    }
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

fn replay(output: &Output) {
    let mut stderr = std::io::stderr().lock();
    // Best effort; the failure itself is reported through the outcome
    let _ = stderr.write_all(&output.stdout);
    let _ = stderr.write_all(&output.stderr);
}
