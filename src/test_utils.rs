//! Test utilities
//!
//! Proptest generators for project graphs and in-process fakes for the
//! scheduler's collaborators.

#[cfg(test)]
pub mod generators {
    use std::path::PathBuf;

    use proptest::prelude::*;

    use crate::core::graph::{ProjectGraph, UnitDescriptor, UnitKey};

    /// Generate a valid unit key (lowercase alphanumeric with hyphens)
    pub fn unit_key() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,12}"
    }

    fn descriptor(index: usize, deps: impl IntoIterator<Item = usize>) -> UnitDescriptor {
        let key = format!("u{index:02}");
        UnitDescriptor {
            key: Some(UnitKey::new(key.clone())),
            location: PathBuf::from("/ws").join(&key),
            depends_on: deps
                .into_iter()
                .map(|d| UnitKey::new(format!("u{d:02}")))
                .collect(),
            targets: vec![format!("build {key}")],
            outputs: Vec::new(),
        }
    }

    /// Raw adjacency: for unit `i`, a list of candidate dependency indices
    fn adjacency(max_units: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
        (1..=max_units).prop_flat_map(|n| {
            proptest::collection::vec(proptest::collection::vec(0..n, 0..4), n)
        })
    }

    /// Generate an acyclic graph: unit `i` only depends on units `< i`
    pub fn acyclic_graph(max_units: usize) -> impl Strategy<Value = ProjectGraph> {
        adjacency(max_units).prop_map(|adjacency| {
            let descriptors = adjacency.into_iter().enumerate().map(|(i, deps)| {
                let deps: Vec<usize> = deps.into_iter().filter(|d| *d < i).collect();
                descriptor(i, deps)
            });
            ProjectGraph::build(descriptors).unwrap_or_default()
        })
    }

    /// Generate a graph with at least one cycle: the last unit depends on
    /// the first one, which (transitively) depends on the last one
    pub fn cyclic_graph(max_units: usize) -> impl Strategy<Value = ProjectGraph> {
        adjacency(max_units).prop_map(|adjacency| {
            let n = adjacency.len();
            let descriptors = adjacency.into_iter().enumerate().map(|(i, mut deps)| {
                if i + 1 < n {
                    deps.push(i + 1);
                } else {
                    deps.push(0);
                }
                descriptor(i, deps)
            });
            ProjectGraph::build(descriptors).unwrap_or_default()
        })
    }
}

/// In-process fakes for the scheduler's collaborators
#[cfg(test)]
pub mod fakes {
    use std::collections::BTreeSet;
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::core::coordinator::Executor;
    use crate::core::graph::{Unit, UnitDescriptor, UnitKey};
    use crate::core::listener::BuildListener;
    use crate::core::request::BuildRequest;
    use crate::core::status::{BuildReport, UnitOutcome};
    use crate::core::workspace::Workspace;
    use crate::error::WorkspaceError;

    /// In-memory workspace; clones share state so a test can edit it
    /// while a driver owns another clone
    #[derive(Clone, Default)]
    pub struct StaticWorkspace {
        state: Arc<Mutex<WorkspaceState>>,
    }

    #[derive(Default)]
    struct WorkspaceState {
        units: Vec<UnitDescriptor>,
        /// `None` selects every unit
        selection: Option<BTreeSet<UnitKey>>,
        startup: Option<UnitKey>,
    }

    impl StaticWorkspace {
        pub fn new(units: Vec<UnitDescriptor>) -> Self {
            let workspace = Self::default();
            workspace.set_units(units);
            workspace
        }

        pub fn with_selection(self, selection: BTreeSet<UnitKey>) -> Self {
            self.state.lock().unwrap().selection = Some(selection);
            self
        }

        pub fn with_startup(self, startup: Option<UnitKey>) -> Self {
            self.state.lock().unwrap().startup = startup;
            self
        }

        pub fn set_units(&self, units: Vec<UnitDescriptor>) {
            self.state.lock().unwrap().units = units;
        }
    }

    impl Workspace for StaticWorkspace {
        fn units(&self) -> Result<Vec<UnitDescriptor>, WorkspaceError> {
            Ok(self.state.lock().unwrap().units.clone())
        }

        fn selection(&self) -> Result<BTreeSet<UnitKey>, WorkspaceError> {
            let state = self.state.lock().unwrap();
            Ok(match &state.selection {
                Some(selection) => selection.clone(),
                None => state.units.iter().filter_map(UnitDescriptor::identity).collect(),
            })
        }

        fn startup_unit(&self) -> Result<Option<UnitKey>, WorkspaceError> {
            Ok(self.state.lock().unwrap().startup.clone())
        }
    }

    /// Executor whose behaviour per unit is scripted by the test
    ///
    /// A gated executor blocks every unit until the test calls `release`.
    #[derive(Default)]
    pub struct ScriptedExecutor {
        calls: Mutex<Vec<String>>,
        failing: BTreeSet<UnitKey>,
        erroring: BTreeSet<UnitKey>,
        panicking: BTreeSet<UnitKey>,
        gate: Option<Gate>,
    }

    struct Gate {
        started_tx: Mutex<Sender<UnitKey>>,
        started_rx: Mutex<Receiver<UnitKey>>,
        release_tx: Mutex<Sender<()>>,
        release_rx: Mutex<Receiver<()>>,
    }

    impl ScriptedExecutor {
        pub fn gated() -> Self {
            let (started_tx, started_rx) = mpsc::channel();
            let (release_tx, release_rx) = mpsc::channel();
            Self {
                gate: Some(Gate {
                    started_tx: Mutex::new(started_tx),
                    started_rx: Mutex::new(started_rx),
                    release_tx: Mutex::new(release_tx),
                    release_rx: Mutex::new(release_rx),
                }),
                ..Self::default()
            }
        }

        pub fn failing(mut self, key: &str) -> Self {
            self.failing.insert(key.into());
            self
        }

        pub fn erroring(mut self, key: &str) -> Self {
            self.erroring.insert(key.into());
            self
        }

        pub fn panicking(mut self, key: &str) -> Self {
            self.panicking.insert(key.into());
            self
        }

        /// Keys handed to the executor, in call order
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        /// Block until a gated unit has started, returning its key
        pub fn wait_started(&self, timeout: Duration) -> UnitKey {
            let gate = self.gate.as_ref().expect("executor is not gated");
            gate.started_rx
                .lock()
                .unwrap()
                .recv_timeout(timeout)
                .expect("no unit started")
        }

        /// Let one gated unit finish
        pub fn release(&self) {
            let gate = self.gate.as_ref().expect("executor is not gated");
            gate.release_tx.lock().unwrap().send(()).unwrap();
        }
    }

    impl Executor for ScriptedExecutor {
        fn execute(&self, unit: &Unit) -> anyhow::Result<UnitOutcome> {
            self.calls.lock().unwrap().push(unit.key.to_string());

            if let Some(gate) = &self.gate {
                gate.started_tx.lock().unwrap().send(unit.key.clone())?;
                gate.release_rx.lock().unwrap().recv()?;
            }

            if self.panicking.contains(&unit.key) {
                panic!("scripted panic in '{}'", unit.key);
            }
            if self.erroring.contains(&unit.key) {
                anyhow::bail!("scripted error in '{}'", unit.key);
            }
            if self.failing.contains(&unit.key) {
                return Ok(UnitOutcome::Failed);
            }
            Ok(UnitOutcome::Succeeded)
        }
    }

    /// Listener that records everything it is told
    #[derive(Default)]
    pub struct RecordingListener {
        cycles: Mutex<Vec<BuildRequest>>,
        skipped: Mutex<Vec<UnitKey>>,
        errors: Mutex<Vec<String>>,
        reports: Mutex<Vec<BuildReport>>,
    }

    impl RecordingListener {
        pub fn cycles(&self) -> Vec<BuildRequest> {
            self.cycles.lock().unwrap().clone()
        }

        pub fn skipped(&self) -> Vec<UnitKey> {
            self.skipped.lock().unwrap().clone()
        }

        pub fn errors(&self) -> Vec<String> {
            self.errors.lock().unwrap().clone()
        }

        pub fn reports(&self) -> Vec<BuildReport> {
            self.reports.lock().unwrap().clone()
        }
    }

    impl BuildListener for RecordingListener {
        fn cycle_started(&self, request: &BuildRequest) {
            self.cycles.lock().unwrap().push(request.clone());
        }

        fn unit_skipped(&self, key: &UnitKey) {
            self.skipped.lock().unwrap().push(key.clone());
        }

        fn cycle_error(&self, error: &str) {
            self.errors.lock().unwrap().push(error.to_string());
        }

        fn cycle_finished(&self, report: &BuildReport) {
            self.reports.lock().unwrap().push(report.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(crate::config::defaults::MIN_PROPTEST_ITERATIONS))]

        #[test]
        fn test_unit_key_generator(key in unit_key()) {
            prop_assert!(!key.is_empty());
            prop_assert!(key.chars().next().unwrap().is_ascii_lowercase());
        }

        #[test]
        fn test_acyclic_graph_generator(graph in acyclic_graph(8)) {
            prop_assert!(!graph.is_empty());
            for key in graph.keys() {
                for dep in graph.direct_dependencies(key) {
                    prop_assert!(dep < key);
                }
            }
        }

        #[test]
        fn test_cyclic_graph_generator(graph in cyclic_graph(8)) {
            let first = graph.keys().next().cloned().unwrap();
            prop_assert!(graph.direct_dependents(&first).count() >= 1);
        }
    }
}
