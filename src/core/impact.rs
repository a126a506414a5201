//! Impact analysis
//!
//! Set algebra over a [`ProjectGraph`]: which units are affected by a change
//! and which units a selection needs present in the build.

use std::collections::{BTreeSet, VecDeque};

use super::graph::{ProjectGraph, UnitKey};

/// Roots plus every unit that transitively depends on one of them
///
/// Roots are always part of the result, even when they depend on each other,
/// so a changed leaf and a changed consumer of that leaf are both rebuilt.
/// Roots unknown to the graph are dropped.
pub fn affected_projects<'a>(
    graph: &ProjectGraph,
    roots: impl IntoIterator<Item = &'a UnitKey>,
) -> BTreeSet<UnitKey> {
    let mut affected = BTreeSet::new();
    let mut queue = VecDeque::new();

    for root in roots {
        if !graph.contains(root) {
            tracing::debug!("ignoring unknown changed unit '{root}'");
            continue;
        }
        if affected.insert(root.clone()) {
            queue.push_back(root.clone());
        }
    }

    while let Some(next) = queue.pop_front() {
        for dependent in graph.direct_dependents(&next) {
            if affected.insert(dependent.clone()) {
                queue.push_back(dependent.clone());
            }
        }
    }

    affected
}

/// Transitive dependencies of `roots`, never including a root itself
pub fn dependencies<'a>(
    graph: &ProjectGraph,
    roots: impl IntoIterator<Item = &'a UnitKey>,
) -> BTreeSet<UnitKey> {
    let roots: BTreeSet<&UnitKey> = roots.into_iter().collect();
    let mut found = BTreeSet::new();
    let mut queue: VecDeque<&UnitKey> = roots.iter().copied().collect();

    while let Some(next) = queue.pop_front() {
        for dep in graph.direct_dependencies(next) {
            if !roots.contains(dep) && found.insert(dep.clone()) {
                queue.push_back(dep);
            }
        }
    }

    found
}
