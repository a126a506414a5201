//! Infrastructure layer
//!
//! Handles all I/O: reading the manifest, running build commands and
//! watching the filesystem. This module is the only place where side
//! effects occur.

pub mod executor;
pub mod watcher;
pub mod workspace;
