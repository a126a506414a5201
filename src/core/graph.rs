//! Project graph snapshot
//!
//! An immutable arena of build units indexed by key. Edges are key
//! references, never owning pointers, so cyclic declarations are
//! representable and detected later by the orderer.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// Stable identity of a build unit
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitKey(String);

impl UnitKey {
    /// Create a key from anything string-like
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for UnitKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// A unit as reported by a workspace, before its identity is resolved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitDescriptor {
    /// Explicit key; falls back to the location's file name
    pub key: Option<UnitKey>,
    /// Directory the unit lives in
    pub location: PathBuf,
    /// Direct declared references
    pub depends_on: Vec<UnitKey>,
    /// Targets invoked when the unit is built
    pub targets: Vec<String>,
    /// Paths the unit's targets write; saves under them are not changes
    pub outputs: Vec<PathBuf>,
}

impl UnitDescriptor {
    /// Resolve the unit's identity
    pub fn identity(&self) -> Option<UnitKey> {
        if let Some(key) = &self.key {
            return (!key.as_str().is_empty()).then(|| key.clone());
        }
        self.location
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .map(UnitKey::from)
    }
}

/// A buildable unit with a resolved identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unit {
    /// Unit identity
    pub key: UnitKey,
    /// Direct declared references (may point outside the snapshot)
    pub depends_on: BTreeSet<UnitKey>,
    /// Targets invoked when the unit is built
    pub targets: Vec<String>,
    /// Handle passed to the executor
    pub location: PathBuf,
    /// Build products under the location
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<PathBuf>,
}

/// Immutable snapshot of units and their dependency edges
#[derive(Debug, Default, Clone)]
pub struct ProjectGraph {
    units: BTreeMap<UnitKey, Unit>,
    /// Inverse edges: unit -> units that reference it
    dependents: BTreeMap<UnitKey, BTreeSet<UnitKey>>,
}

impl ProjectGraph {
    /// Build a snapshot from unit descriptors
    ///
    /// References to keys that are not part of the snapshot are kept on the
    /// unit but never surface as edges.
    pub fn build(
        descriptors: impl IntoIterator<Item = UnitDescriptor>,
    ) -> Result<Self, GraphError> {
        let mut units = BTreeMap::new();

        for descriptor in descriptors {
            let key = descriptor
                .identity()
                .ok_or_else(|| GraphError::MissingIdentity {
                    location: descriptor.location.clone(),
                })?;

            if units.contains_key(&key) {
                return Err(GraphError::DuplicateKey { key });
            }

            let unit = Unit {
                key: key.clone(),
                depends_on: descriptor.depends_on.into_iter().collect(),
                targets: descriptor.targets,
                location: descriptor.location,
                outputs: descriptor.outputs,
            };
            units.insert(key, unit);
        }

        let mut dependents: BTreeMap<UnitKey, BTreeSet<UnitKey>> = BTreeMap::new();
        for unit in units.values() {
            for dep in unit.depends_on.iter().filter(|d| units.contains_key(*d)) {
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .insert(unit.key.clone());
            }
        }

        Ok(Self { units, dependents })
    }

    /// Direct dependencies of a unit that are part of this snapshot
    pub fn direct_dependencies<'a>(
        &'a self,
        key: &UnitKey,
    ) -> impl Iterator<Item = &'a UnitKey> + 'a {
        self.units
            .get(key)
            .into_iter()
            .flat_map(|unit| unit.depends_on.iter())
            .filter(|dep| self.units.contains_key(*dep))
    }

    /// Units that directly depend on `key`
    pub fn direct_dependents<'a>(
        &'a self,
        key: &UnitKey,
    ) -> impl Iterator<Item = &'a UnitKey> + 'a {
        self.dependents.get(key).into_iter().flatten()
    }

    /// Look up a unit
    pub fn get(&self, key: &UnitKey) -> Option<&Unit> {
        self.units.get(key)
    }

    /// Whether the snapshot contains `key`
    pub fn contains(&self, key: &UnitKey) -> bool {
        self.units.contains_key(key)
    }

    /// All keys in ascending order
    pub fn keys(&self) -> impl Iterator<Item = &UnitKey> {
        self.units.keys()
    }

    /// All units in key order
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// Number of units
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// The unit owning `path`: the one whose location is the longest prefix
    ///
    /// Paths under one of the owner's declared outputs belong to nobody.
    pub fn owner_of(&self, path: &Path) -> Option<&UnitKey> {
        self.units
            .values()
            .filter(|unit| path.starts_with(&unit.location))
            .max_by_key(|unit| unit.location.components().count())
            .filter(|unit| !unit.outputs.iter().any(|output| path.starts_with(output)))
            .map(|unit| &unit.key)
    }

    /// Resolve changed paths to the set of owning units
    pub fn owners_of<'a>(&self, paths: impl IntoIterator<Item = &'a Path>) -> BTreeSet<UnitKey> {
        paths
            .into_iter()
            .filter_map(|path| self.owner_of(path))
            .cloned()
            .collect()
    }
}
