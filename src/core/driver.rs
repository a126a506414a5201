//! Build driver
//!
//! Owns the trigger side of the scheduler. Changes, completions and external
//! build notifications arrive as [`DriverEvent`]s on one queue and are
//! handled one at a time on the driver thread. Triggers that arrive while a
//! build is in flight are coalesced into exactly one follow-up cycle, which
//! plans from scratch against the workspace as it is then.
//!
//! Only the final cycle of a coalesced chain is reported to the listener;
//! the status of a superseded cycle is dropped.
//!
//! Saved paths are queued as they arrive and resolved to units when the
//! next cycle is planned, against the same snapshot that cycle builds from.
//! Saves a unit's own build produced are dropped on arrival.

use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::coordinator::{BuildCoordinator, Executor};
use super::graph::{ProjectGraph, UnitKey};
use super::listener::BuildListener;
use super::request::{self, BuildRequest};
use super::status::{BuildReport, BuildStatus};
use super::workspace::Workspace;
use crate::config::defaults;
use crate::error::{CoordinatorError, PlanError};

/// A saved file and when the save was first observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPath {
    pub path: PathBuf,
    pub observed: Instant,
}

impl SavedPath {
    /// A save observed now
    pub fn now(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            observed: Instant::now(),
        }
    }
}

/// Everything the driver reacts to
#[derive(Debug)]
pub enum DriverEvent {
    /// Units reported as changed
    Changed(BTreeSet<UnitKey>),
    /// Saved files, resolved to their owning units by the next cycle
    PathsChanged(Vec<SavedPath>),
    /// The background build finished
    BuildCompleted(BuildReport),
    /// A build outside the scheduler is starting
    ExternalBuildStarted,
    /// The build outside the scheduler is done
    ExternalBuildFinished,
    /// Stop the driver, cancelling any running build
    Shutdown,
}

/// Sends events to a [`Driver`] from any thread
#[derive(Debug, Clone)]
pub struct DriverHandle {
    tx: Sender<DriverEvent>,
}

impl DriverHandle {
    /// Post an event; returns `false` when the driver is gone
    pub fn send(&self, event: DriverEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn changed(&self, keys: BTreeSet<UnitKey>) -> bool {
        self.send(DriverEvent::Changed(keys))
    }

    pub fn paths_changed(&self, saved: Vec<SavedPath>) -> bool {
        self.send(DriverEvent::PathsChanged(saved))
    }

    pub fn external_build_started(&self) -> bool {
        self.send(DriverEvent::ExternalBuildStarted)
    }

    pub fn external_build_finished(&self) -> bool {
        self.send(DriverEvent::ExternalBuildFinished)
    }

    pub fn shutdown(&self) -> bool {
        self.send(DriverEvent::Shutdown)
    }
}

/// Where the startup unit of a cycle comes from
#[derive(Debug, Clone, Default)]
enum StartupSource {
    /// Ask the workspace every cycle
    #[default]
    Workspace,
    /// Fixed by the last explicit `begin_cycle`
    Explicit(Option<UnitKey>),
}

/// Coalescing trigger loop around a [`BuildCoordinator`]
pub struct Driver {
    workspace: Box<dyn Workspace>,
    coordinator: BuildCoordinator,
    listener: Arc<dyn BuildListener>,
    events: Receiver<DriverEvent>,
    handle: DriverHandle,
    /// Changes accumulated since the last cycle started
    changed: BTreeSet<UnitKey>,
    /// Saved paths not yet resolved to units
    pending_paths: Vec<PathBuf>,
    /// How long after a unit's build its own writes are still expected
    echo_grace: Duration,
    startup: StartupSource,
    /// A build was started and its completion is not yet handled
    in_flight: bool,
    external_build: bool,
    last_report: Option<BuildReport>,
}

impl Driver {
    /// Create an idle driver
    pub fn new(
        workspace: Box<dyn Workspace>,
        executor: Arc<dyn Executor>,
        listener: Arc<dyn BuildListener>,
    ) -> Self {
        let (tx, events) = mpsc::channel();
        Self {
            workspace,
            coordinator: BuildCoordinator::new(executor, Arc::clone(&listener)),
            listener,
            events,
            handle: DriverHandle { tx },
            changed: BTreeSet::new(),
            pending_paths: Vec::new(),
            echo_grace: Duration::from_millis(defaults::BUILD_ECHO_GRACE_MS),
            startup: StartupSource::default(),
            in_flight: false,
            external_build: false,
            last_report: None,
        }
    }

    /// A handle for posting events from other threads
    pub fn handle(&self) -> DriverHandle {
        self.handle.clone()
    }

    /// The coordinator running this driver's builds
    pub fn coordinator(&self) -> &BuildCoordinator {
        &self.coordinator
    }

    /// Whether a build is running or its completion is still queued
    pub fn is_running(&self) -> bool {
        self.in_flight || self.coordinator.is_running()
    }

    /// Changes waiting for the next cycle
    pub fn pending_changes(&self) -> &BTreeSet<UnitKey> {
        &self.changed
    }

    /// Saved paths waiting to be resolved by the next cycle
    pub fn pending_paths(&self) -> &[PathBuf] {
        &self.pending_paths
    }

    /// Final report of the most recent cycle
    pub fn last_report(&self) -> Option<&BuildReport> {
        self.last_report.as_ref()
    }

    /// Trigger a cycle for `changed`
    ///
    /// With a `startup` unit, impact is computed only within its dependency
    /// closure; without one, over the whole graph. The choice sticks for
    /// coalesced follow-up cycles and later changes.
    pub fn begin_cycle(&mut self, changed: BTreeSet<UnitKey>, startup: Option<UnitKey>) {
        self.startup = StartupSource::Explicit(startup);
        self.notify_changed(changed);
    }

    /// Record changed units and trigger
    pub fn notify_changed(&mut self, changed: BTreeSet<UnitKey>) {
        if changed.is_empty() {
            return;
        }
        tracing::debug!("changed: {}", join(&changed));
        self.changed.extend(changed);
        self.trigger();
    }

    /// Queue saved files for the next cycle, then trigger
    ///
    /// Saves observed inside a unit while that unit was building, or within
    /// the echo grace period after, are the build's own output and dropped.
    pub fn notify_paths(&mut self, saved: Vec<SavedPath>) {
        let paths: Vec<PathBuf> = saved
            .into_iter()
            .filter(|save| {
                let echo = self
                    .coordinator
                    .wrote_during_build(&save.path, save.observed, self.echo_grace);
                if echo {
                    tracing::debug!("ignoring build output {}", save.path.display());
                }
                !echo
            })
            .map(|save| save.path)
            .collect();

        if paths.is_empty() {
            return;
        }
        self.pending_paths.extend(paths);
        self.trigger();
    }

    /// Cancel the running build, wait for it and forget any pending retry
    pub fn cancel_and_wait(&self) {
        self.coordinator.clear_pending_retry();
        self.coordinator.cancel_and_wait();
    }

    /// A build outside the scheduler is starting
    ///
    /// The running build is cancelled and waited for, and a pending retry is
    /// dropped so no stale cycle races the external build.
    pub fn external_build_started(&mut self) {
        self.dump_state("external build started");
        self.external_build = true;
        self.cancel_and_wait();
        if !self.in_flight {
            self.report(BuildReport::with_status(BuildStatus::Indeterminate));
        }
    }

    /// The build outside the scheduler finished; its outcome is unknown
    pub fn external_build_finished(&mut self) {
        self.dump_state("external build finished");
        if !self.external_build {
            return;
        }
        self.external_build = false;
        self.complete(BuildReport::with_status(BuildStatus::Indeterminate));
    }

    /// Handle one event
    pub fn handle_event(&mut self, event: DriverEvent) -> ControlFlow<()> {
        match event {
            DriverEvent::Changed(keys) => self.notify_changed(keys),
            DriverEvent::PathsChanged(saved) => self.notify_paths(saved),
            DriverEvent::BuildCompleted(report) => self.build_completed(report),
            DriverEvent::ExternalBuildStarted => self.external_build_started(),
            DriverEvent::ExternalBuildFinished => self.external_build_finished(),
            DriverEvent::Shutdown => {
                tracing::info!("driver shutting down");
                self.cancel_and_wait();
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Handle events until shutdown
    pub fn run(mut self) {
        while let Ok(event) = self.events.recv() {
            if self.handle_event(event).is_break() {
                break;
            }
        }
    }

    /// Handle events until no build is in flight
    ///
    /// Returns the report of the last finished cycle. Returns early when a
    /// shutdown event arrives.
    pub fn run_until_idle(&mut self) -> Option<&BuildReport> {
        while self.in_flight {
            let Ok(event) = self.events.recv() else {
                break;
            };
            if self.handle_event(event).is_break() {
                break;
            }
        }
        self.last_report.as_ref()
    }

    fn has_pending(&self) -> bool {
        !self.changed.is_empty() || !self.pending_paths.is_empty()
    }

    /// Start a cycle for the accumulated changes, or defer it
    ///
    /// Returns `false` when there turned out to be nothing to do, so no
    /// cycle was started, deferred or reported.
    fn trigger(&mut self) -> bool {
        self.dump_state("trigger");

        if self.in_flight || self.external_build || self.coordinator.is_running() {
            tracing::debug!("build in progress, deferring");
            self.coordinator.defer_retry();
            return true;
        }

        if !self.has_pending() {
            tracing::debug!("nothing changed since the last cycle");
            return false;
        }

        let paths = std::mem::take(&mut self.pending_paths);
        let mut changed = std::mem::take(&mut self.changed);
        let request = match self.plan(&paths, &mut changed) {
            Ok(Some(request)) => request,
            Ok(None) if changed.is_empty() => {
                tracing::debug!("{} saved files belong to no unit", paths.len());
                return false;
            }
            Ok(None) => {
                tracing::info!("no unit selected for building is affected");
                self.report(BuildReport::with_status(BuildStatus::Indeterminate));
                return true;
            }
            Err(e) => {
                self.abort_cycle(&e);
                return true;
            }
        };

        self.listener.cycle_started(&request);

        let handle = self.handle.clone();
        let started = self.coordinator.begin_build(request, move |report| {
            if !handle.send(DriverEvent::BuildCompleted(report)) {
                tracing::debug!("driver gone, dropping build report");
            }
        });

        match started {
            Ok(()) => self.in_flight = true,
            Err(CoordinatorError::AlreadyRunning) => {
                self.changed.extend(changed);
                self.coordinator.defer_retry();
            }
            Err(e) => {
                tracing::error!("failed to begin build: {e}");
                self.listener.cycle_error(&e.to_string());
                self.report(BuildReport::aborted(e));
            }
        }
        true
    }

    fn build_completed(&mut self, report: BuildReport) {
        self.in_flight = false;
        if let Some(error) = &report.error {
            self.listener.cycle_error(error);
        }
        self.complete(report);
    }

    fn complete(&mut self, report: BuildReport) {
        self.dump_state("completed");

        let retry = self.coordinator.take_pending_retry();
        if retry && self.external_build {
            // Keep it for when the external build is done
            self.coordinator.defer_retry();
        } else if retry && self.has_pending() {
            let status = report.status;
            tracing::info!("changes arrived during the build ({status}), building again");
            if self.trigger() {
                return;
            }
        }

        self.report(report);
    }

    fn report(&mut self, report: BuildReport) {
        self.listener.cycle_finished(&report);
        self.last_report = Some(report);
    }

    fn abort_cycle(&mut self, error: &PlanError) {
        tracing::error!("build cycle aborted: {error}");
        self.listener.cycle_error(&error.to_string());
        self.report(BuildReport::aborted(error));
    }

    /// Plan against one workspace snapshot, adding the owners of `paths`
    /// to `changed`
    fn plan(
        &self,
        paths: &[PathBuf],
        changed: &mut BTreeSet<UnitKey>,
    ) -> Result<Option<BuildRequest>, PlanError> {
        let snapshot = self.workspace.snapshot()?;
        let graph = ProjectGraph::build(snapshot.units)?;
        changed.extend(graph.owners_of(paths.iter().map(PathBuf::as_path)));
        if changed.is_empty() {
            return Ok(None);
        }

        let startup = match &self.startup {
            StartupSource::Workspace => snapshot.startup,
            StartupSource::Explicit(startup) => startup.clone(),
        };
        request::plan(&graph, changed, &snapshot.selection, startup.as_ref())
    }

    fn dump_state(&self, context: &str) {
        tracing::debug!(
            in_flight = self.in_flight,
            running = self.coordinator.is_running(),
            again = self.coordinator.has_pending_retry(),
            external = self.external_build,
            changed = self.changed.len(),
            paths = self.pending_paths.len(),
            "{context}"
        );
    }
}

fn join(keys: &BTreeSet<UnitKey>) -> String {
    keys.iter()
        .map(UnitKey::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
