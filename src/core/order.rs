//! Build ordering
//!
//! Topological ordering of a subset of a [`ProjectGraph`], dependencies
//! before dependents.

use std::collections::{BTreeSet, HashMap};

use super::graph::{ProjectGraph, UnitKey};
use crate::error::OrderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Order `nodes` so that every dependency precedes its dependents
///
/// Only edges whose target is also in `nodes` are followed. Traversal starts
/// from each node in ascending key order, so the result is deterministic.
/// The walk keeps its own stack, so chain depth is bounded by memory only.
pub fn order(graph: &ProjectGraph, nodes: &BTreeSet<UnitKey>) -> Result<Vec<UnitKey>, OrderError> {
    let mut marks = HashMap::with_capacity(nodes.len());
    let mut result = Vec::with_capacity(nodes.len());

    for node in nodes {
        visit(graph, nodes, node, &mut marks, &mut result)?;
    }

    Ok(result)
}

/// A node being visited and the dependencies it has left to visit
struct Frame<'a> {
    node: &'a UnitKey,
    deps: std::vec::IntoIter<&'a UnitKey>,
}

impl<'a> Frame<'a> {
    fn new(graph: &'a ProjectGraph, nodes: &BTreeSet<UnitKey>, node: &'a UnitKey) -> Self {
        let deps: Vec<&UnitKey> = graph
            .direct_dependencies(node)
            .filter(|dep| nodes.contains(*dep))
            .collect();
        Self {
            node,
            deps: deps.into_iter(),
        }
    }
}

/// Depth-first post-order walk from `root`
///
/// The frames on `stack` are the current path, so a dependency that is
/// still in progress closes a cycle running from its frame to the top.
fn visit<'a>(
    graph: &'a ProjectGraph,
    nodes: &'a BTreeSet<UnitKey>,
    root: &'a UnitKey,
    marks: &mut HashMap<&'a UnitKey, Mark>,
    result: &mut Vec<UnitKey>,
) -> Result<(), OrderError> {
    if marks.contains_key(root) {
        return Ok(());
    }

    marks.insert(root, Mark::InProgress);
    let mut stack = vec![Frame::new(graph, nodes, root)];

    while let Some(frame) = stack.last_mut() {
        let Some(dep) = frame.deps.next() else {
            let node = frame.node;
            stack.pop();
            marks.insert(node, Mark::Done);
            result.push(node.clone());
            continue;
        };

        match marks.get(dep) {
            Some(Mark::Done) => {}
            Some(Mark::InProgress) => {
                let start = stack.iter().position(|f| f.node == dep).unwrap_or(0);
                let mut cycle: Vec<UnitKey> =
                    stack[start..].iter().map(|f| f.node.clone()).collect();
                cycle.push(dep.clone());
                return Err(OrderError::CycleDetected { path: cycle });
            }
            None => {
                marks.insert(dep, Mark::InProgress);
                stack.push(Frame::new(graph, nodes, dep));
            }
        }
    }

    Ok(())
}
