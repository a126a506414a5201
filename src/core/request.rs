//! Build request planning
//!
//! Turns a graph snapshot, a change set and the current selection into the
//! ordered list of units a cycle has to walk.

use std::collections::BTreeSet;

use serde::Serialize;

use super::graph::{ProjectGraph, Unit, UnitKey};
use super::{impact, order};
use crate::error::{OrderError, PlanError};

/// Units to build in one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildRequest {
    /// Units selected for building
    pub primary: BTreeSet<UnitKey>,
    /// Units excluded by configuration; ordered but never executed
    pub skipped: BTreeSet<UnitKey>,
    /// `primary ∪ skipped`, dependencies first
    pub ordered: Vec<Unit>,
}

impl BuildRequest {
    /// Create a request, ordering `primary ∪ skipped` over `graph`
    pub fn new(
        graph: &ProjectGraph,
        primary: BTreeSet<UnitKey>,
        skipped: BTreeSet<UnitKey>,
    ) -> Result<Self, OrderError> {
        let all: BTreeSet<UnitKey> = primary.union(&skipped).cloned().collect();
        let ordered = order::order(graph, &all)?
            .iter()
            .filter_map(|key| graph.get(key).cloned())
            .collect();

        Ok(Self {
            primary,
            skipped,
            ordered,
        })
    }

    /// Whether `key` must not be handed to the executor
    pub fn must_be_skipped(&self, key: &UnitKey) -> bool {
        self.skipped.contains(key)
    }

    /// Keys in build order
    pub fn ordered_keys(&self) -> impl Iterator<Item = &UnitKey> {
        self.ordered.iter().map(|unit| &unit.key)
    }

    /// Whether nothing would be executed
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }
}

/// Plan a cycle for `changed`
///
/// Without a startup unit the whole graph is considered. With one, impact is
/// computed only inside the startup unit's dependency closure. Returns
/// `Ok(None)` when no affected unit is selected for building.
pub fn plan(
    graph: &ProjectGraph,
    changed: &BTreeSet<UnitKey>,
    selection: &BTreeSet<UnitKey>,
    startup: Option<&UnitKey>,
) -> Result<Option<BuildRequest>, PlanError> {
    let affected = match startup {
        None => impact::affected_projects(graph, changed),
        Some(startup) => {
            if !graph.contains(startup) {
                return Err(PlanError::UnknownStartup {
                    key: startup.clone(),
                });
            }
            let mut closure = impact::dependencies(graph, [startup]);
            closure.insert(startup.clone());

            let changed_in_closure: BTreeSet<&UnitKey> = changed.intersection(&closure).collect();
            impact::affected_projects(graph, changed_in_closure)
                .into_iter()
                .filter(|key| closure.contains(key))
                .collect()
        }
    };

    let (primary, skipped): (BTreeSet<UnitKey>, BTreeSet<UnitKey>) =
        affected.into_iter().partition(|key| selection.contains(key));

    if primary.is_empty() {
        tracing::debug!("no selected unit affected by {} changes", changed.len());
        return Ok(None);
    }

    Ok(Some(BuildRequest::new(graph, primary, skipped)?))
}
