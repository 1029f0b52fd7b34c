// SPDX-License-Identifier: MIT OR Apache-2.0
//! Change notifications published to session subscribers.

use crate::connection::LinkId;
use crate::node::NodeId;
use serde::Serialize;

/// A change to the graph or the registry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GraphEvent {
    /// A schema was parsed and registered under a name
    SchemaRegistered {
        /// Schema name
        name: String,
        /// Number of models it declared
        models: usize,
    },
    /// A schema was removed (existing nodes are kept)
    SchemaRemoved {
        /// Schema name
        name: String,
    },
    /// A node was added
    NodeCreated {
        /// The new node
        node: NodeId,
    },
    /// A node and all its links were removed
    NodeRemoved {
        /// The removed node
        node: NodeId,
    },
    /// A link was created
    LinkCreated {
        /// The new link
        link: LinkId,
        /// Producing node
        origin: NodeId,
        /// Consuming node
        target: NodeId,
    },
    /// A link was removed
    LinkRemoved {
        /// The removed link
        link: LinkId,
        /// Producing node
        origin: NodeId,
        /// Consuming node
        target: NodeId,
    },
    /// An editable input value changed
    FieldChanged {
        /// Edited node
        node: NodeId,
        /// Input slot index
        slot: usize,
    },
    /// A constant value changed
    ConstantChanged {
        /// Edited node
        node: NodeId,
        /// Constant field name
        field: String,
    },
    /// Multi-slots of a field were added, removed or renamed
    SlotsChanged {
        /// Edited node
        node: NodeId,
        /// Multi-field name
        field: String,
    },
    /// A node was moved or resized
    LayoutChanged {
        /// Moved node
        node: NodeId,
    },
    /// The graph was emptied
    GraphCleared,
    /// A document replaced the graph contents
    DocumentImported {
        /// Nodes created
        nodes: usize,
        /// Links created
        links: usize,
    },
    /// Readiness of a node was recomputed
    ReadinessChanged {
        /// Recomputed node
        node: NodeId,
        /// Required fields are all filled
        local: bool,
        /// The node and everything upstream is locally complete
        chain: bool,
    },
}

/// Which readiness flags an event invalidates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshScope {
    /// Nothing
    None,
    /// A node and everything downstream of it
    From(NodeId),
    /// Every node
    Full,
}

impl GraphEvent {
    /// The readiness flags this event invalidates
    pub fn refresh_scope(&self) -> RefreshScope {
        match self {
            Self::NodeCreated { node }
            | Self::FieldChanged { node, .. }
            | Self::SlotsChanged { node, .. }
            | Self::ConstantChanged { node, .. } => RefreshScope::From(*node),
            Self::LinkCreated { target, .. } | Self::LinkRemoved { target, .. } => {
                RefreshScope::From(*target)
            }
            Self::NodeRemoved { .. } | Self::GraphCleared | Self::DocumentImported { .. } => {
                RefreshScope::Full
            }
            Self::SchemaRegistered { .. }
            | Self::SchemaRemoved { .. }
            | Self::LayoutChanged { .. }
            | Self::ReadinessChanged { .. } => RefreshScope::None,
        }
    }
}
