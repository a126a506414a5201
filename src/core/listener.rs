//! Build progress and status notifications
//!
//! Unit-level callbacks are invoked on the build worker thread; cycle-level
//! callbacks on the driver thread.

use super::graph::{Unit, UnitKey};
use super::request::BuildRequest;
use super::status::{BuildReport, UnitOutcome};

/// Receives progress and the final status of build cycles
pub trait BuildListener: Send + Sync {
    /// A cycle is about to execute `request`
    fn cycle_started(&self, _request: &BuildRequest) {}

    /// The executor is about to build `unit`
    fn unit_started(&self, _unit: &Unit) {}

    /// `key` is not built because of the current configuration
    fn unit_skipped(&self, _key: &UnitKey) {}

    /// `key` finished building
    fn unit_finished(&self, _key: &UnitKey, _outcome: UnitOutcome) {}

    /// A cycle could not be planned or executed
    fn cycle_error(&self, _error: &str) {}

    /// Final status of a cycle; superseded cycles are not reported
    fn cycle_finished(&self, _report: &BuildReport) {}
}

/// Listener that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullListener;

impl BuildListener for NullListener {}
