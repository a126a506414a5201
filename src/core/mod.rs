//! Core scheduling logic
//!
//! Graph analysis and build coordination. Reading manifests from disk,
//! running commands and watching files belong in [`crate::infra`].
//!
//! # Submodules
//!
//! - [`graph`] - Immutable project graph snapshot
//! - [`impact`] - Impact and dependency closures
//! - [`order`] - Dependency-first ordering with cycle detection
//! - [`request`] - Build request planning
//! - [`status`] - Build status and cycle reports
//! - [`listener`] - Progress notifications
//! - [`coordinator`] - Background build worker
//! - [`workspace`] - Workspace manifest and snapshot provider
//! - [`driver`] - Trigger coalescing loop

pub mod coordinator;
pub mod driver;
pub mod graph;
pub mod impact;
pub mod listener;
pub mod order;
pub mod request;
pub mod status;
pub mod workspace;
