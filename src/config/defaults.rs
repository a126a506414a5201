//! Default configuration values

/// Workspace manifest file name
pub const MANIFEST_FILE: &str = "onsave.toml";

/// How long the watcher waits after the last save before triggering (ms)
pub const SETTLE_MS: u64 = 200;

/// Directory names the watcher never reports changes from
pub const IGNORED_DIRS: &[&str] = &["target", ".git", "node_modules", "bin", "obj"];

/// How long after a unit finished building a save under it still counts
/// as the build's own output (ms)
pub const BUILD_ECHO_GRACE_MS: u64 = 500;

/// How long finished build windows are remembered (ms)
pub const BUILD_WINDOW_RETENTION_MS: u64 = 60_000;

/// Minimum proptest iterations
pub const MIN_PROPTEST_ITERATIONS: u32 = 100;
