//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Test workspace context
///
/// Creates a temporary directory holding a manifest and unit directories.
pub struct TestProject {
    /// Temporary directory for the test workspace
    pub dir: TempDir,
}

impl TestProject {
    /// Create an empty workspace in a temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Create a workspace from `manifest`, with a directory for every unit
    pub fn with_manifest(manifest: &str, units: &[&str]) -> Self {
        let project = Self::new();
        project.write_manifest(manifest);
        for unit in units {
            project.create_dir(unit);
        }
        project
    }

    /// Get the path to the workspace directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Path of the workspace manifest
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.path().join("onsave.toml")
    }

    /// Replace the workspace manifest
    pub fn write_manifest(&self, content: &str) {
        self.create_file("onsave.toml", content);
    }

    /// Create a file in the workspace
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Create a directory in the workspace
    pub fn create_dir(&self, name: &str) {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(path).expect("Failed to create directory");
    }

    /// Check if a file exists in the workspace
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// Read a file from the workspace, empty when it does not exist
    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).unwrap_or_default()
    }

    /// Units built so far, in build order
    pub fn build_log(&self) -> Vec<String> {
        self.read_file("build.log")
            .lines()
            .map(ToString::to_string)
            .collect()
    }

    /// Run the onsave binary inside the workspace
    pub fn onsave(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_onsave"))
            .current_dir(self.path())
            .args(args)
            .output()
            .expect("Failed to execute onsave")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Stdout of a finished command
pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Stderr of a finished command
pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// Unit directories of [`SAMPLE_MANIFEST`]
pub const SAMPLE_UNITS: &[&str] = &["core", "net", "app", "tools", "docs"];

/// Sample workspace: app -> net -> core, docs -> core (disabled), tools
///
/// Every target appends the unit's key to `build.log` in the workspace root.
pub const SAMPLE_MANIFEST: &str = r#"
[[unit]]
path = "core"
targets = ["echo core >> ../build.log"]

[[unit]]
path = "net"
depends_on = ["core"]
targets = ["echo net >> ../build.log"]

[[unit]]
path = "app"
depends_on = ["net"]
targets = ["echo app >> ../build.log"]

[[unit]]
path = "tools"
targets = ["echo tools >> ../build.log"]

[[unit]]
path = "docs"
depends_on = ["core"]
targets = ["echo docs >> ../build.log"]
enabled = false
"#;

/// Two units referencing each other
pub const CYCLIC_MANIFEST: &str = r#"
[[unit]]
path = "a"
depends_on = ["b"]

[[unit]]
path = "b"
depends_on = ["a"]
"#;
