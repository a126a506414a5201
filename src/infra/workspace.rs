//! Manifest-backed workspace
//!
//! Reads `onsave.toml` from disk. The file is read again on every call so
//! edits made while watching are picked up by the next build cycle.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::core::graph::{UnitDescriptor, UnitKey};
use crate::core::workspace::{Manifest, Workspace, WorkspaceSnapshot};
use crate::error::WorkspaceError;

/// Workspace described by a manifest file
#[derive(Debug, Clone)]
pub struct ManifestWorkspace {
    manifest: PathBuf,
    root: PathBuf,
}

impl ManifestWorkspace {
    /// Open the workspace whose manifest is at `manifest`
    ///
    /// Unit paths are resolved against the manifest's directory.
    pub fn open(manifest: &Path) -> Result<Self, WorkspaceError> {
        if !manifest.is_file() {
            return Err(WorkspaceError::NotFound {
                path: manifest.to_path_buf(),
            });
        }

        let manifest = manifest
            .canonicalize()
            .map_err(|e| WorkspaceError::Read {
                path: manifest.to_path_buf(),
                error: e.to_string(),
            })?;
        let root = manifest
            .parent()
            .map_or_else(|| PathBuf::from("/"), Path::to_path_buf);

        tracing::debug!("workspace root: {}", root.display());
        Ok(Self { manifest, root })
    }

    /// Directory the manifest lives in
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the manifest file
    pub fn manifest_path(&self) -> &Path {
        &self.manifest
    }

    /// Read and parse the manifest as it is now
    pub fn load(&self) -> Result<Manifest, WorkspaceError> {
        let content =
            std::fs::read_to_string(&self.manifest).map_err(|e| WorkspaceError::Read {
                path: self.manifest.clone(),
                error: e.to_string(),
            })?;

        Manifest::from_toml(&content).map_err(|e| WorkspaceError::Parse {
            path: self.manifest.clone(),
            error: e.to_string(),
        })
    }
}

impl Workspace for ManifestWorkspace {
    fn units(&self) -> Result<Vec<UnitDescriptor>, WorkspaceError> {
        Ok(self.load()?.descriptors(&self.root))
    }

    fn selection(&self) -> Result<BTreeSet<UnitKey>, WorkspaceError> {
        Ok(self.load()?.selection(&self.root))
    }

    fn startup_unit(&self) -> Result<Option<UnitKey>, WorkspaceError> {
        self.load()?.startup_unit()
    }

    fn snapshot(&self) -> Result<WorkspaceSnapshot, WorkspaceError> {
        self.load()?.snapshot(&self.root)
    }
}
