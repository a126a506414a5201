//! Output formatting and progress indicators
//!
//! Terminal rendering of build cycles: the intro listing, per-unit status
//! lines, a progress bar while units build, and the final summary.

use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};

use crate::core::graph::{Unit, UnitKey};
use crate::core::listener::BuildListener;
use crate::core::request::BuildRequest;
use crate::core::status::{BuildReport, BuildStatus, UnitOutcome};

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";

    /// Info prefix (blue circle)
    pub const INFO: &str = "ℹ";
}

/// How the CLI presents its results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputConfig {
    pub quiet: bool,
    pub json: bool,
    pub verbose: u8,
}

impl OutputConfig {
    pub fn new(quiet: bool, json: bool, verbose: u8) -> Self {
        Self {
            quiet,
            json,
            verbose,
        }
    }

    /// Log level implied by the flags
    pub fn log_level(&self) -> tracing::Level {
        match (self.quiet, self.verbose) {
            (true, _) => tracing::Level::ERROR,
            (false, 0) => tracing::Level::WARN,
            (false, 1) => tracing::Level::INFO,
            (false, _) => tracing::Level::DEBUG,
        }
    }

    /// Whether human-readable progress is printed
    pub fn human(&self) -> bool {
        !self.quiet && !self.json
    }
}

/// Print an error and its causes to stderr
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} Error: {error}", status::ERROR);
    for cause in error.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
}

/// Create a progress bar for build steps
pub fn create_build_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} units ({msg})")
    {
        pb.set_style(style.progress_chars("█▓▒░"));
    }
    pb
}

/// Line printed before a cycle builds anything
pub fn intro_line(request: &BuildRequest) -> String {
    let primary: Vec<&str> = request
        .ordered
        .iter()
        .filter(|unit| !request.must_be_skipped(&unit.key))
        .map(|unit| unit.key.as_str())
        .collect();
    let noun = if primary.len() == 1 { "unit" } else { "units" };
    format!(
        "{} Building {} {noun}: {}",
        status::INFO,
        primary.len(),
        primary.join(", ")
    )
}

/// Line printed once a cycle is reported
pub fn summary_line(report: &BuildReport) -> String {
    let prefix = match report.status {
        BuildStatus::Ok => status::SUCCESS,
        BuildStatus::Failed => status::ERROR,
        BuildStatus::Indeterminate => status::WARNING,
    };
    format!(
        "{prefix} Build {}: {} ({:.2?})",
        report.status, report.summary, report.duration
    )
}

/// Line printed for a unit left out by the selection
pub fn skipped_line(key: &UnitKey) -> String {
    format!(
        "{} {key} not built because of the current configuration",
        status::WARNING
    )
}

/// Listener that renders cycles to the terminal
///
/// In JSON mode only final reports are printed, one object per line.
#[derive(Debug, Default)]
pub struct ConsoleListener {
    config: OutputConfig,
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleListener {
    pub fn new(config: OutputConfig) -> Self {
        Self {
            config,
            bar: Mutex::new(None),
        }
    }

    /// Print above the progress bar, if one is showing
    fn print(&self, line: &str) {
        self.emit(|| println!("{line}"));
    }

    fn print_error(&self, line: &str) {
        self.emit(|| eprintln!("{line}"));
    }

    fn emit(&self, write: impl FnOnce()) {
        match self.bar.lock() {
            Ok(bar) => match bar.as_ref() {
                Some(bar) => bar.suspend(write),
                None => write(),
            },
            Err(_) => write(),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(bar) = self.bar.lock() {
            if let Some(bar) = bar.as_ref() {
                f(bar);
            }
        }
    }

    fn clear_bar(&self) {
        if let Ok(mut bar) = self.bar.lock() {
            if let Some(bar) = bar.take() {
                bar.finish_and_clear();
            }
        }
    }
}

impl BuildListener for ConsoleListener {
    fn cycle_started(&self, request: &BuildRequest) {
        if !self.config.human() {
            return;
        }
        self.print(&intro_line(request));
        if let Ok(mut bar) = self.bar.lock() {
            *bar = Some(create_build_bar(request.ordered.len() as u64));
        }
    }

    fn unit_started(&self, unit: &Unit) {
        self.with_bar(|bar| bar.set_message(unit.key.to_string()));
    }

    fn unit_skipped(&self, key: &UnitKey) {
        if self.config.human() {
            self.print(&skipped_line(key));
        }
        self.with_bar(|bar| bar.inc(1));
    }

    fn unit_finished(&self, key: &UnitKey, outcome: UnitOutcome) {
        if self.config.human() {
            match outcome {
                UnitOutcome::Succeeded => self.print(&format!("{} {key}", status::SUCCESS)),
                UnitOutcome::Failed => self.print(&format!("{} {key} failed", status::ERROR)),
            }
        }
        self.with_bar(|bar| bar.inc(1));
    }

    fn cycle_error(&self, error: &str) {
        if !self.config.json {
            self.print_error(&format!("{} {error}", status::ERROR));
        }
    }

    fn cycle_finished(&self, report: &BuildReport) {
        self.clear_bar();

        if self.config.json {
            match serde_json::to_string(report) {
                Ok(json) => println!("{json}"),
                Err(e) => tracing::error!("failed to serialize report: {e}"),
            }
        } else if !self.config.quiet {
            println!("{}", summary_line(report));
        }
    }
}
