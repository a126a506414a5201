//! Error types for onsave
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::graph::UnitKey;

/// Project graph construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Two units share the same key
    #[error("Duplicate unit key '{key}'")]
    DuplicateKey { key: UnitKey },

    /// A unit has neither a key nor a location that could name it
    #[error("Unit at '{}' has no identity", location.display())]
    MissingIdentity { location: PathBuf },
}

/// Build ordering errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// Circular dependency detected
    #[error("Circular dependency detected: {}", format_path(path))]
    CycleDetected { path: Vec<UnitKey> },
}

fn format_path(path: &[UnitKey]) -> String {
    path.iter()
        .map(UnitKey::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Build coordinator errors
#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// A build is already running
    #[error("A build is already running")]
    AlreadyRunning,

    /// The background worker could not be started
    #[error("Failed to start build worker: {error}")]
    WorkerSpawn { error: String },
}

/// Workspace manifest errors
#[derive(Error, Debug)]
pub enum WorkspaceError {
    /// Manifest not found
    #[error("Manifest not found at '{}'", path.display())]
    NotFound { path: PathBuf },

    /// Failed to read the manifest
    #[error("Failed to read manifest '{}': {error}", path.display())]
    Read { path: PathBuf, error: String },

    /// Failed to parse the manifest
    #[error("Failed to parse manifest '{}': {error}", path.display())]
    Parse { path: PathBuf, error: String },

    /// Startup scope configured without a startup unit
    #[error("Scope is 'startup' but no startup unit is configured")]
    MissingStartup,
}

/// Errors that abort a build cycle before any unit is built
#[derive(Error, Debug)]
pub enum PlanError {
    /// Workspace could not be loaded
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// Graph could not be built
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Units could not be ordered
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Startup unit is not part of the workspace
    #[error("Startup unit '{key}' is not part of the workspace")]
    UnknownStartup { key: UnitKey },
}

/// File watcher errors
#[derive(Error, Debug)]
pub enum WatchError {
    /// The watcher could not be started on a directory
    #[error("Failed to watch '{}': {error}", path.display())]
    Start { path: PathBuf, error: String },

    /// The batching thread could not be started
    #[error("Failed to start watcher thread: {error}")]
    Thread { error: String },
}
