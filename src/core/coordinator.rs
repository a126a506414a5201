//! Build coordinator
//!
//! Runs at most one build at a time on a background worker thread, supports
//! cooperative cancellation with a synchronous wait and owns the
//! pending-retry flag used by the driver to coalesce triggers.
//!
//! All mutable state lives in one [`Mutex`] paired with a [`Condvar`], so
//! cancellation requests, retry flags and state transitions are observed
//! consistently and `cancel_and_wait` never misses the transition to idle.
//!
//! The coordinator also remembers when each unit was being built, so saves
//! a unit's own targets produce can be told apart from edits.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use super::graph::Unit;
use super::listener::BuildListener;
use super::request::BuildRequest;
use super::status::{BuildReport, BuildStatus, UnitOutcome};
use crate::config::defaults;
use crate::error::CoordinatorError;

/// Builds a single unit
///
/// `Ok(UnitOutcome::Failed)` is an ordinary build failure. `Err` is an
/// unexpected error; the coordinator treats the unit as failed and carries
/// the error in the cycle's [`BuildReport`].
pub trait Executor: Send + Sync {
    fn execute(&self, unit: &Unit) -> anyhow::Result<UnitOutcome>;
}

/// Coordinator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Running,
}

/// When the executor was working inside `location`
#[derive(Debug, Clone)]
struct BuildWindow {
    location: PathBuf,
    started: Instant,
    finished: Option<Instant>,
}

impl BuildWindow {
    fn covers(&self, path: &Path, observed: Instant, grace: Duration) -> bool {
        path.starts_with(&self.location)
            && observed >= self.started
            && self.finished.map_or(true, |finished| observed <= finished + grace)
    }
}

#[derive(Debug)]
struct Shared {
    state: CoordinatorState,
    cancel_requested: bool,
    pending_retry: bool,
    windows: Vec<BuildWindow>,
}

struct Inner {
    shared: Mutex<Shared>,
    idle: Condvar,
    executor: Arc<dyn Executor>,
    listener: Arc<dyn BuildListener>,
}

/// Single-flight build runner
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct BuildCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for BuildCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildCoordinator")
            .field("shared", &*self.inner.lock())
            .finish_non_exhaustive()
    }
}

impl BuildCoordinator {
    /// Create an idle coordinator
    pub fn new(executor: Arc<dyn Executor>, listener: Arc<dyn BuildListener>) -> Self {
        Self {
            inner: Arc::new(Inner {
                shared: Mutex::new(Shared {
                    state: CoordinatorState::Idle,
                    cancel_requested: false,
                    pending_retry: false,
                    windows: Vec::new(),
                }),
                idle: Condvar::new(),
                executor,
                listener,
            }),
        }
    }

    /// Start building `request` in the background
    ///
    /// Returns immediately. `on_completed` runs on the worker thread after
    /// the coordinator is idle again, exactly once per started build.
    /// Returns [`CoordinatorError::AlreadyRunning`] without side effects
    /// when a build is in progress.
    pub fn begin_build<F>(&self, request: BuildRequest, on_completed: F) -> Result<(), CoordinatorError>
    where
        F: FnOnce(BuildReport) + Send + 'static,
    {
        {
            let mut shared = self.inner.lock();
            if shared.state == CoordinatorState::Running {
                return Err(CoordinatorError::AlreadyRunning);
            }
            shared.state = CoordinatorState::Running;
            shared.cancel_requested = false;
        }

        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name("onsave-build".to_string())
            .spawn(move || {
                let report = inner.run(&request);
                on_completed(report);
            });

        if let Err(e) = spawned {
            tracing::error!("failed to spawn build worker: {e}");
            self.inner.set_idle();
            return Err(CoordinatorError::WorkerSpawn {
                error: e.to_string(),
            });
        }

        Ok(())
    }

    /// Request cancellation and block until the coordinator is idle
    ///
    /// Must not be called from the worker thread (listener callbacks).
    pub fn cancel_and_wait(&self) {
        let mut shared = self.inner.lock();
        shared.cancel_requested = true;
        if shared.state == CoordinatorState::Running {
            tracing::info!("cancelling background build");
        }
        while shared.state == CoordinatorState::Running {
            shared = self
                .inner
                .idle
                .wait(shared)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> CoordinatorState {
        self.inner.lock().state
    }

    /// Whether a build is in progress
    pub fn is_running(&self) -> bool {
        self.state() == CoordinatorState::Running
    }

    /// Remember that another cycle is wanted once the current one ends
    pub fn defer_retry(&self) {
        self.inner.lock().pending_retry = true;
    }

    /// Read and clear the pending-retry flag
    pub fn take_pending_retry(&self) -> bool {
        std::mem::take(&mut self.inner.lock().pending_retry)
    }

    /// Drop any pending retry
    pub fn clear_pending_retry(&self) {
        self.inner.lock().pending_retry = false;
    }

    /// Whether a retry is pending
    pub fn has_pending_retry(&self) -> bool {
        self.inner.lock().pending_retry
    }

    /// Whether `path`, seen changing at `observed`, was written by a build
    ///
    /// True when the change was observed while a unit whose location
    /// contains `path` was being built, or within `grace` after it finished.
    pub fn wrote_during_build(&self, path: &Path, observed: Instant, grace: Duration) -> bool {
        self.inner
            .lock()
            .windows
            .iter()
            .any(|window| window.covers(path, observed, grace))
    }
}

/// Restores `Idle` when the worker leaves `run`, however it leaves
struct IdleGuard<'a>(&'a Inner);

impl Drop for IdleGuard<'_> {
    fn drop(&mut self) {
        self.0.set_idle();
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_idle(&self) {
        self.lock().state = CoordinatorState::Idle;
        self.idle.notify_all();
    }

    fn is_cancelled(&self) -> bool {
        self.lock().cancel_requested
    }

    fn open_window(&self, unit: &Unit) {
        let now = Instant::now();
        let retention = Duration::from_millis(defaults::BUILD_WINDOW_RETENTION_MS);
        let mut shared = self.lock();
        shared.windows.retain(|window| {
            window
                .finished
                .map_or(true, |finished| now.duration_since(finished) < retention)
        });
        shared.windows.push(BuildWindow {
            location: unit.location.clone(),
            started: now,
            finished: None,
        });
    }

    fn close_window(&self, unit: &Unit) {
        let now = Instant::now();
        if let Some(window) = self
            .lock()
            .windows
            .iter_mut()
            .rev()
            .find(|window| window.finished.is_none() && window.location == unit.location)
        {
            window.finished = Some(now);
        }
    }

    fn run(&self, request: &BuildRequest) -> BuildReport {
        let _idle = IdleGuard(self);
        let started = Instant::now();
        let mut report = BuildReport::default();

        // A cancel issued right after begin_build must prevent any work
        report.status = if self.is_cancelled() {
            tracing::debug!("build cancelled before it started");
            BuildStatus::Indeterminate
        } else {
            panic::catch_unwind(AssertUnwindSafe(|| self.build_units(request, &mut report)))
                .unwrap_or_else(|payload| {
                    let message = format!("build crashed: {}", panic_message(&*payload));
                    tracing::error!("{message}");
                    report.error = Some(message);
                    BuildStatus::Failed
                })
        };

        report.duration = started.elapsed();
        tracing::info!(
            "build finished: {} ({}) in {:?}",
            report.status,
            report.summary,
            report.duration
        );
        report
    }

    fn build_units(&self, request: &BuildRequest, report: &mut BuildReport) -> BuildStatus {
        for unit in &request.ordered {
            if self.is_cancelled() {
                tracing::info!("build cancelled before '{}'", unit.key);
                return BuildStatus::Indeterminate;
            }

            if request.must_be_skipped(&unit.key) {
                tracing::debug!("skipping '{}'", unit.key);
                report.summary.skipped += 1;
                self.listener.unit_skipped(&unit.key);
                continue;
            }

            self.listener.unit_started(unit);
            self.open_window(unit);
            let result = self.execute(unit);
            self.close_window(unit);

            let outcome = result.unwrap_or_else(|error| {
                tracing::error!("{error}");
                report.error = Some(error);
                UnitOutcome::Failed
            });
            report.summary.record(outcome);
            self.listener.unit_finished(&unit.key, outcome);

            if outcome == UnitOutcome::Failed {
                return BuildStatus::Failed;
            }
        }

        BuildStatus::Ok
    }

    /// Run the executor; `Err` carries the message of an unexpected failure
    fn execute(&self, unit: &Unit) -> Result<UnitOutcome, String> {
        tracing::debug!("building '{}'", unit.key);
        match panic::catch_unwind(AssertUnwindSafe(|| self.executor.execute(unit))) {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => Err(format!("building '{}' failed unexpectedly: {e:#}", unit.key)),
            Err(payload) => Err(format!(
                "executor crashed while building '{}': {}",
                unit.key,
                panic_message(&*payload)
            )),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
