// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editing session: one registry, one graph, readiness kept current.
//!
//! Every mutating call drains the graph's pending events, refreshes the
//! affected readiness flags and publishes the events to subscribers.

use crate::completeness::{self, Readiness};
use crate::connection::{Link, LinkId};
use crate::document::{self, Document, ExportOptions, ImportOptions, ImportReport};
use crate::evaluation::{self, NodeOutput};
use crate::events::{GraphEvent, RefreshScope};
use crate::graph::{ConnectError, Graph, SlotEditError};
use crate::node::{NodeId, NodeInstance};
use crate::port::NativeKind;
use crate::registry::{RegistryOptions, SchemaRegistry};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, info};

/// An editing session
#[derive(Debug, Default)]
pub struct Session {
    registry: SchemaRegistry,
    graph: Graph,
    subscribers: Vec<Sender<GraphEvent>>,
}

impl Session {
    /// Create an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty session with custom type resolution
    pub fn with_options(options: RegistryOptions) -> Self {
        Self {
            registry: SchemaRegistry::with_options(options),
            ..Self::default()
        }
    }

    /// The schema registry
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// The graph
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Receive every change published from now on
    pub fn subscribe(&mut self) -> Receiver<GraphEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    fn publish(&mut self, event: GraphEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Refresh readiness for the pending events and publish them
    fn commit(&mut self) {
        let events = self.graph.take_events();
        if events.is_empty() {
            return;
        }

        let mut full = false;
        let mut starts: Vec<NodeId> = Vec::new();
        for event in &events {
            match event.refresh_scope() {
                RefreshScope::Full => full = true,
                RefreshScope::From(id) if !starts.contains(&id) => starts.push(id),
                RefreshScope::From(_) | RefreshScope::None => {}
            }
        }

        let mut touched: Vec<NodeId> = Vec::new();
        if full {
            touched = completeness::refresh_all(&mut self.graph);
        } else {
            for start in starts {
                for id in completeness::refresh_from(&mut self.graph, start) {
                    if !touched.contains(&id) {
                        touched.push(id);
                    }
                }
            }
        }

        for event in events {
            self.publish(event);
        }
        for id in touched {
            if let Some(node) = self.graph.node(id) {
                let event = GraphEvent::ReadinessChanged {
                    node: id,
                    local: node.readiness.local,
                    chain: node.readiness.chain,
                };
                self.publish(event);
            }
        }
    }

    /// Parse and register a schema; returns how many models it declared
    pub fn register_schema(&mut self, name: &str, source: &str) -> usize {
        let models = self.registry.register(name, source).len();
        self.publish(GraphEvent::SchemaRegistered {
            name: name.to_string(),
            models,
        });
        models
    }

    /// Remove a schema; nodes already created from it stay
    pub fn remove_schema(&mut self, name: &str) -> bool {
        let removed = self.registry.remove(name);
        if removed {
            self.publish(GraphEvent::SchemaRemoved { name: name.to_string() });
        }
        removed
    }

    /// Instantiate a model by `schema.Model`, bare model name or type tag
    pub fn create_node(&mut self, model_ref: &str) -> Option<NodeId> {
        self.create_node_with(model_ref, &Map::new())
    }

    /// Instantiate a model seeded from a document fragment
    pub fn create_node_with(&mut self, model_ref: &str, fragment: &Map<String, Value>) -> Option<NodeId> {
        let qualified = self
            .registry
            .qualified(model_ref)
            .or_else(|| self.registry.resolve_type(model_ref))?;
        let model = self.registry.model(&qualified)?;
        let id = self.graph.create_node(qualified, model, Some(fragment));
        debug!(node = %id, model = model_ref, "Created node");
        self.commit();
        Some(id)
    }

    /// Create a primitive node
    pub fn create_primitive(&mut self, kind: NativeKind, payload: Option<Value>) -> NodeId {
        let id = self.graph.create_primitive(kind, payload);
        self.commit();
        id
    }

    /// Remove a node and its links
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<NodeInstance> {
        let node = self.graph.remove_node(node_id);
        self.commit();
        node
    }

    /// Link an output slot to an input slot
    pub fn connect(
        &mut self,
        origin_node: NodeId,
        origin_slot: usize,
        target_node: NodeId,
        target_slot: usize,
    ) -> Result<LinkId, ConnectError> {
        let result = self.graph.connect(origin_node, origin_slot, target_node, target_slot);
        self.commit();
        result
    }

    /// Remove a link
    pub fn disconnect(&mut self, link_id: LinkId) -> Option<Link> {
        let link = self.graph.disconnect(link_id);
        self.commit();
        link
    }

    /// Edit the value of a native input slot
    pub fn set_input_value(&mut self, node_id: NodeId, slot: usize, value: Value) -> bool {
        let changed = self.graph.set_input_value(node_id, slot, value);
        self.commit();
        changed
    }

    /// Replace the payload of a primitive node
    pub fn set_primitive_value(&mut self, node_id: NodeId, value: Value) -> bool {
        let changed = self.graph.set_primitive_value(node_id, value);
        self.commit();
        changed
    }

    /// Move a node
    pub fn set_position(&mut self, node_id: NodeId, position: [f32; 2]) -> bool {
        let moved = self.graph.set_position(node_id, position);
        self.commit();
        moved
    }

    /// Mark a node as preview-only
    pub fn set_preview_only(&mut self, node_id: NodeId, preview_only: bool) -> bool {
        self.graph.set_preview_only(node_id, preview_only)
    }

    /// Add a keyed slot to a multi-field
    pub fn add_multi_slot(&mut self, node_id: NodeId, field: &str, key: &str) -> Result<usize, SlotEditError> {
        let result = self.graph.add_multi_slot(node_id, field, key);
        self.commit();
        result
    }

    /// Remove a keyed slot from a multi-field
    pub fn remove_multi_slot(&mut self, node_id: NodeId, field: &str, key: &str) -> Result<(), SlotEditError> {
        let result = self.graph.remove_multi_slot(node_id, field, key);
        self.commit();
        result
    }

    /// Rename a keyed slot of a multi-field
    pub fn rename_multi_slot(
        &mut self,
        node_id: NodeId,
        field: &str,
        old_key: &str,
        new_key: &str,
    ) -> Result<(), SlotEditError> {
        let result = self.graph.rename_multi_slot(node_id, field, old_key, new_key);
        self.commit();
        result
    }

    /// Serialize the graph
    pub fn export_document(&self, options: &ExportOptions) -> Document {
        document::export(&self.graph, options)
    }

    /// Replace the graph with a document.
    ///
    /// Subscribers see `GraphCleared`, then one `DocumentImported` summary
    /// instead of per-node events, then the refreshed readiness.
    pub fn import_document(&mut self, document: &Document, options: &ImportOptions) -> ImportReport {
        let report = document::import(&mut self.graph, &self.registry, document, options);
        self.graph.take_events();

        let touched = completeness::refresh_all(&mut self.graph);
        self.publish(GraphEvent::GraphCleared);
        self.publish(GraphEvent::DocumentImported {
            nodes: report.nodes,
            links: report.links,
        });
        for id in touched {
            if let Some(node) = self.graph.node(id) {
                let event = GraphEvent::ReadinessChanged {
                    node: id,
                    local: node.readiness.local,
                    chain: node.readiness.chain,
                };
                self.publish(event);
            }
        }
        info!(nodes = report.nodes, links = report.links, "Session loaded document");
        report
    }

    /// Readiness of a node
    pub fn readiness(&self, node_id: NodeId) -> Option<&Readiness> {
        self.graph.node(node_id).map(|n| &n.readiness)
    }

    /// Whether every required field of a node is filled
    pub fn is_locally_complete(&self, node_id: NodeId) -> bool {
        self.readiness(node_id).is_some_and(|r| r.local)
    }

    /// Whether a node and everything upstream of it is locally complete
    pub fn is_chain_complete(&self, node_id: NodeId) -> bool {
        self.readiness(node_id).is_some_and(|r| r.chain)
    }

    /// Run a preview of the whole graph
    pub fn evaluate_preview(&self) -> HashMap<NodeId, NodeOutput> {
        evaluation::execute(&self.graph)
    }
}
