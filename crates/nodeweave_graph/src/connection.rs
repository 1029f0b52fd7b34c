// SPDX-License-Identifier: MIT OR Apache-2.0
//! Link (edge) definitions for the graph.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Unique identifier for a link, allocated monotonically by the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(pub u64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

/// A link from an output slot to an input slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Unique link ID
    pub id: LinkId,
    /// Producing node
    pub origin_node: NodeId,
    /// Output slot index on the producing node
    pub origin_slot: usize,
    /// Consuming node
    pub target_node: NodeId,
    /// Input slot index on the consuming node
    pub target_slot: usize,
    /// Loop-back marker (visual hint only)
    #[serde(default)]
    pub looped: bool,
    /// Auxiliary data carried by the link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Extra presentation metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl Link {
    /// Create a new link
    pub fn new(
        id: LinkId,
        origin_node: NodeId,
        origin_slot: usize,
        target_node: NodeId,
        target_slot: usize,
    ) -> Self {
        Self {
            id,
            origin_node,
            origin_slot,
            target_node,
            target_slot,
            looped: false,
            data: None,
            extra: None,
        }
    }

    /// Check if this link involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.origin_node == node_id || self.target_node == node_id
    }
}
