//! onsave - incremental build-on-save scheduler
//!
//! When a unit of a multi-unit workspace changes, onsave rebuilds exactly
//! the units affected by it, dependencies first, on a background worker.
//! Changes arriving while a build runs are coalesced into one follow-up
//! cycle.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Scheduling logic (no I/O operations)
//! - [`infra`] - Infrastructure layer (manifest, processes, file watching)
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
