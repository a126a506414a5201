//! Workspace manifest (onsave.toml) and the snapshot provider interface
//!
//! A workspace describes the units, their references and build targets, and
//! which units the current configuration builds. It is read again for every
//! build cycle so the scheduler always plans against the current state.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::graph::{UnitDescriptor, UnitKey};
use crate::config::defaults;
use crate::error::WorkspaceError;

/// Everything one build cycle reads from the workspace, taken at once
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceSnapshot {
    pub units: Vec<UnitDescriptor>,
    pub selection: BTreeSet<UnitKey>,
    pub startup: Option<UnitKey>,
}

/// Provides fresh snapshots of the project model
pub trait Workspace: Send {
    /// Current units with identity, references and targets
    fn units(&self) -> Result<Vec<UnitDescriptor>, WorkspaceError>;

    /// Units enabled for building; every other unit is skipped
    fn selection(&self) -> Result<BTreeSet<UnitKey>, WorkspaceError>;

    /// Unit whose dependency closure bounds impact, if any
    fn startup_unit(&self) -> Result<Option<UnitKey>, WorkspaceError>;

    /// Units, selection and startup unit from one consistent read
    ///
    /// Implementations backed by a file should override this so an edit
    /// landing between the three reads cannot mix two versions.
    fn snapshot(&self) -> Result<WorkspaceSnapshot, WorkspaceError> {
        Ok(WorkspaceSnapshot {
            units: self.units()?,
            selection: self.selection()?,
            startup: self.startup_unit()?,
        })
    }
}

/// Which part of the graph a cycle considers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildScope {
    /// Every unit in the workspace
    #[default]
    Workspace,
    /// Only the startup unit and its dependencies
    Startup,
}

/// The workspace manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Build units
    #[serde(default, rename = "unit")]
    pub units: Vec<UnitConfig>,
}

/// Scheduler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Graph scope for impact analysis
    #[serde(default)]
    pub scope: BuildScope,

    /// Startup unit key, required when scope is `startup`
    #[serde(default)]
    pub startup: Option<String>,

    /// How long the watcher waits for saves to settle
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Directory names the watcher ignores
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
}

fn default_settle_ms() -> u64 {
    defaults::SETTLE_MS
}

fn default_ignore() -> Vec<String> {
    defaults::IGNORED_DIRS
        .iter()
        .map(ToString::to_string)
        .collect()
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scope: BuildScope::default(),
            startup: None,
            settle_ms: default_settle_ms(),
            ignore: default_ignore(),
        }
    }
}

/// One build unit in the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitConfig {
    /// Unit key; defaults to the directory name
    #[serde(default)]
    pub key: Option<String>,

    /// Unit directory, relative to the manifest
    pub path: PathBuf,

    /// Keys of referenced units
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Commands run, in order, to build the unit
    #[serde(default)]
    pub targets: Vec<String>,

    /// Paths the targets write, relative to the unit directory
    #[serde(default)]
    pub outputs: Vec<PathBuf>,

    /// Whether the current configuration builds this unit
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Manifest {
    /// Parse a manifest from TOML
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Unit descriptors with locations resolved against `root`
    pub fn descriptors(&self, root: &Path) -> Vec<UnitDescriptor> {
        self.units
            .iter()
            .map(|unit| {
                let location = root.join(&unit.path);
                UnitDescriptor {
                    key: unit.key.clone().map(UnitKey::from),
                    outputs: unit.outputs.iter().map(|out| location.join(out)).collect(),
                    location,
                    depends_on: unit.depends_on.iter().cloned().map(UnitKey::from).collect(),
                    targets: unit.targets.clone(),
                }
            })
            .collect()
    }

    /// Everything a cycle needs, from this one parsed manifest
    pub fn snapshot(&self, root: &Path) -> Result<WorkspaceSnapshot, WorkspaceError> {
        Ok(WorkspaceSnapshot {
            units: self.descriptors(root),
            selection: self.selection(root),
            startup: self.startup_unit()?,
        })
    }

    /// Keys of enabled units
    ///
    /// Units without an identity are left out; graph construction reports
    /// them.
    pub fn selection(&self, root: &Path) -> BTreeSet<UnitKey> {
        self.descriptors(root)
            .into_iter()
            .zip(&self.units)
            .filter(|(_, unit)| unit.enabled)
            .filter_map(|(descriptor, _)| descriptor.identity())
            .collect()
    }

    /// The startup unit, when the configured scope asks for one
    pub fn startup_unit(&self) -> Result<Option<UnitKey>, WorkspaceError> {
        match self.scheduler.scope {
            BuildScope::Workspace => Ok(None),
            BuildScope::Startup => self
                .scheduler
                .startup
                .clone()
                .map(|key| Some(UnitKey::from(key)))
                .ok_or(WorkspaceError::MissingStartup),
        }
    }
}
