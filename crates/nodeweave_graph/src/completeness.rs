// SPDX-License-Identifier: MIT OR Apache-2.0
//! Readiness tracking.
//!
//! A node is *locally complete* when every required input field is filled,
//! either by a link or by a non-empty editable value. It is *chain complete*
//! when it and every node it transitively depends on are locally complete.
//! Cycles are walked with a visited set, so a cycle of filled nodes is
//! complete.

use crate::graph::Graph;
use crate::node::{NodeId, NodeInstance};
use crate::port::value_is_empty;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Readiness flags of a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readiness {
    /// Every required field is filled
    pub local: bool,
    /// The node and all of its upstream closure are locally complete
    pub chain: bool,
    /// Required fields still unfilled, in slot order
    pub missing: Vec<String>,
}

/// Required input fields of a node that are not filled yet.
///
/// A multi-input field counts once and is filled when any of its slots is
/// linked.
pub fn missing_fields(node: &NodeInstance) -> Vec<String> {
    let mut missing = Vec::new();
    let mut seen_multi = HashSet::new();

    for (index, slot) in node.inputs.iter().enumerate() {
        let meta = &slot.meta;
        if meta.is_multi {
            if !seen_multi.insert(meta.field_name.as_str()) || meta.optional {
                continue;
            }
            let linked = node
                .multi_input_slots
                .get(&meta.field_name)
                .is_some_and(|indices| {
                    indices
                        .iter()
                        .any(|&i| node.inputs.get(i).is_some_and(|s| s.link.is_some()))
                });
            if !linked {
                missing.push(meta.field_name.clone());
            }
            continue;
        }

        let native = node.native_inputs.get(&index);
        if meta.optional || native.is_some_and(|n| n.optional) {
            continue;
        }
        let filled = slot.link.is_some() || native.is_some_and(|n| !value_is_empty(&n.value));
        if !filled {
            missing.push(meta.field_name.clone());
        }
    }
    missing
}

/// Check whether a node has every required field filled
pub fn is_locally_complete(node: &NodeInstance) -> bool {
    missing_fields(node).is_empty()
}

/// Chain completeness of one node, from the cached local flags.
///
/// `memo` holds results already known in this pass. A known-complete
/// node has a complete closure, so its upstream is not walked again.
fn chain_complete(graph: &Graph, start: NodeId, memo: &mut HashMap<NodeId, bool>) -> bool {
    if let Some(&known) = memo.get(&start) {
        return known;
    }

    let mut visited = HashSet::new();
    let mut stack = vec![start];
    let mut complete = true;

    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        if id != start {
            match memo.get(&id) {
                Some(true) => continue,
                Some(false) => {
                    complete = false;
                    break;
                }
                None => {}
            }
        }
        if !graph.node(id).is_some_and(|n| n.readiness.local) {
            complete = false;
            break;
        }
        stack.extend(graph.upstream(id).filter(|up| !visited.contains(up)));
    }

    memo.insert(start, complete);
    complete
}

fn refresh_local(graph: &mut Graph, ids: &[NodeId]) {
    for &id in ids {
        if let Some(node) = graph.node_mut(id) {
            let missing = missing_fields(node);
            node.readiness.local = missing.is_empty();
            node.readiness.missing = missing;
        }
    }
}

fn refresh_chain(graph: &mut Graph, ids: &[NodeId]) {
    let mut memo = HashMap::new();
    let results: Vec<(NodeId, bool)> = ids
        .iter()
        .map(|&id| (id, chain_complete(graph, id, &mut memo)))
        .collect();
    for (id, chain) in results {
        if let Some(node) = graph.node_mut(id) {
            node.readiness.chain = chain;
        }
    }
}

/// Recompute both flags for every node; returns the nodes touched
pub fn refresh_all(graph: &mut Graph) -> Vec<NodeId> {
    let ids: Vec<NodeId> = graph.node_ids().collect();
    refresh_local(graph, &ids);
    refresh_chain(graph, &ids);
    trace!(nodes = ids.len(), "Full readiness refresh");
    ids
}

/// Recompute the local flag of `start`, then the chain flag of `start` and
/// everything downstream of it; returns the nodes touched
pub fn refresh_from(graph: &mut Graph, start: NodeId) -> Vec<NodeId> {
    if graph.node(start).is_none() {
        return Vec::new();
    }
    refresh_local(graph, &[start]);
    let ids = graph.downstream_closure(start);
    refresh_chain(graph, &ids);
    trace!(%start, nodes = ids.len(), "Downstream readiness refresh");
    ids
}
