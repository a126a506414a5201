//! Build status and cycle reports

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Outcome of a whole build cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    /// Cancelled, or not conclusively known
    #[default]
    Indeterminate,
    /// Every executed unit succeeded
    Ok,
    /// A unit failed, or the cycle could not be planned
    Failed,
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Indeterminate => "indeterminate",
            Self::Ok => "ok",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Outcome of building a single unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitOutcome {
    Succeeded,
    Failed,
}

/// Per-cycle counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BuildSummary {
    /// Count one unit outcome
    pub fn record(&mut self, outcome: UnitOutcome) {
        match outcome {
            UnitOutcome::Succeeded => self.succeeded += 1,
            UnitOutcome::Failed => self.failed += 1,
        }
    }
}

impl fmt::Display for BuildSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed, {} skipped",
            self.succeeded, self.failed, self.skipped
        )
    }
}

/// Final report of one build cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub status: BuildStatus,
    pub summary: BuildSummary,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
    /// Why the cycle could not be planned, or the unexpected error that
    /// ended it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BuildReport {
    /// Report for a cycle that ended without building anything
    pub fn with_status(status: BuildStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Report for a cycle aborted before any unit was built
    pub fn aborted(error: impl fmt::Display) -> Self {
        Self {
            status: BuildStatus::Failed,
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_millis<S: serde::Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}
