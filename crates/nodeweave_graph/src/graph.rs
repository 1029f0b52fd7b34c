// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph store: nodes, links and slot bookkeeping.

use crate::connection::{Link, LinkId};
use crate::events::GraphEvent;
use crate::node::{NodeId, NodeInstance, PRIMITIVE_VALUE_FIELD};
use crate::port::{InputSlot, NativeKind, OutputSlot, SlotDirection};
use indexmap::IndexMap;
use nodeweave_schema::{compatible, Model};
use serde_json::{Map, Value};
use std::collections::{HashSet, VecDeque};

/// A node graph.
///
/// The graph owns every node and link. Slot indices stored in links,
/// native inputs and multi-slot maps are kept consistent by the graph
/// alone; callers only ever see shared references to nodes.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: IndexMap<NodeId, NodeInstance>,
    links: IndexMap<LinkId, Link>,
    next_node_id: u64,
    next_link_id: u64,
    events: Vec<GraphEvent>,
    /// Document type the graph was imported from
    pub kind: Option<String>,
    /// Document-level metadata, carried through import/export
    pub metadata: Map<String, Value>,
}

impl Graph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self {
            nodes: IndexMap::new(),
            links: IndexMap::new(),
            next_node_id: 1,
            next_link_id: 1,
            events: Vec::new(),
            kind: None,
            metadata: Map::new(),
        }
    }

    fn allocate_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    fn insert_node(&mut self, node: NodeInstance) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        self.events.push(GraphEvent::NodeCreated { node: id });
        id
    }

    /// Instantiate a model, optionally seeded from a document fragment
    pub fn create_node(
        &mut self,
        model_ref: impl Into<String>,
        model: &Model,
        fragment: Option<&Map<String, Value>>,
    ) -> NodeId {
        let id = self.allocate_node_id();
        self.insert_node(NodeInstance::from_model(id, model_ref, model, fragment))
    }

    /// Create a primitive node carrying a single literal payload
    pub fn create_primitive(&mut self, kind: NativeKind, payload: Option<Value>) -> NodeId {
        let id = self.allocate_node_id();
        self.insert_node(NodeInstance::primitive(id, kind, payload))
    }

    /// Remove a node and every link touching it
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<NodeInstance> {
        if !self.nodes.contains_key(&node_id) {
            return None;
        }
        let incident: Vec<LinkId> = self
            .links
            .values()
            .filter(|l| l.involves_node(node_id))
            .map(|l| l.id)
            .collect();
        for link_id in incident {
            self.disconnect(link_id);
        }
        let node = self.nodes.shift_remove(&node_id)?;
        self.events.push(GraphEvent::NodeRemoved { node: node_id });
        Some(node)
    }

    /// Remove every node and link
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.links.clear();
        self.kind = None;
        self.metadata.clear();
        self.events.push(GraphEvent::GraphCleared);
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&NodeInstance> {
        self.nodes.get(&node_id)
    }

    pub(crate) fn node_mut(&mut self, node_id: NodeId) -> Option<&mut NodeInstance> {
        self.nodes.get_mut(&node_id)
    }

    /// Get all nodes, in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &NodeInstance> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Link an output slot to an input slot.
    ///
    /// Self-links and cycles are allowed. An input accepts one link; an
    /// occupied input is rejected rather than replaced.
    pub fn connect(
        &mut self,
        origin_node: NodeId,
        origin_slot: usize,
        target_node: NodeId,
        target_slot: usize,
    ) -> Result<LinkId, ConnectError> {
        let origin = self
            .nodes
            .get(&origin_node)
            .ok_or(ConnectError::NodeNotFound(origin_node))?;
        let target = self
            .nodes
            .get(&target_node)
            .ok_or(ConnectError::NodeNotFound(target_node))?;

        let output = origin.outputs.get(origin_slot).ok_or(ConnectError::SlotOutOfRange {
            node: origin_node,
            direction: SlotDirection::Output,
            slot: origin_slot,
        })?;
        let input = target.inputs.get(target_slot).ok_or(ConnectError::SlotOutOfRange {
            node: target_node,
            direction: SlotDirection::Input,
            slot: target_slot,
        })?;

        if !compatible(&output.raw_type, &input.raw_type) {
            return Err(ConnectError::IncompatibleTypes {
                producer: output.raw_type.clone(),
                consumer: input.raw_type.clone(),
            });
        }

        if let Some(existing) = input.link {
            return Err(ConnectError::SlotOccupied {
                node: target_node,
                slot: target_slot,
                link: existing,
            });
        }

        let id = LinkId(self.next_link_id);
        self.next_link_id += 1;
        self.links
            .insert(id, Link::new(id, origin_node, origin_slot, target_node, target_slot));

        if let Some(slot) = self.nodes.get_mut(&origin_node).and_then(|n| n.outputs.get_mut(origin_slot)) {
            slot.links.push(id);
        }
        if let Some(slot) = self.nodes.get_mut(&target_node).and_then(|n| n.inputs.get_mut(target_slot)) {
            slot.link = Some(id);
        }

        self.events.push(GraphEvent::LinkCreated {
            link: id,
            origin: origin_node,
            target: target_node,
        });
        Ok(id)
    }

    /// Remove a link and clear the slot back-references
    pub fn disconnect(&mut self, link_id: LinkId) -> Option<Link> {
        let link = self.links.shift_remove(&link_id)?;

        if let Some(slot) = self
            .nodes
            .get_mut(&link.origin_node)
            .and_then(|n| n.outputs.get_mut(link.origin_slot))
        {
            slot.links.retain(|&l| l != link_id);
        }
        if let Some(slot) = self
            .nodes
            .get_mut(&link.target_node)
            .and_then(|n| n.inputs.get_mut(link.target_slot))
        {
            if slot.link == Some(link_id) {
                slot.link = None;
            }
        }

        self.events.push(GraphEvent::LinkRemoved {
            link: link_id,
            origin: link.origin_node,
            target: link.target_node,
        });
        Some(link)
    }

    /// Get a link by ID
    pub fn link(&self, link_id: LinkId) -> Option<&Link> {
        self.links.get(&link_id)
    }

    pub(crate) fn link_mut(&mut self, link_id: LinkId) -> Option<&mut Link> {
        self.links.get_mut(&link_id)
    }

    /// Get all links, in creation order
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Get links feeding a node
    pub fn links_into(&self, node_id: NodeId) -> impl Iterator<Item = &Link> {
        self.links.values().filter(move |l| l.target_node == node_id)
    }

    /// Get links leaving a node
    pub fn links_from(&self, node_id: NodeId) -> impl Iterator<Item = &Link> {
        self.links.values().filter(move |l| l.origin_node == node_id)
    }

    /// Get the number of links
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Nodes that feed `node_id` directly
    pub fn upstream(&self, node_id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.links_into(node_id).map(|l| l.origin_node)
    }

    /// Nodes fed by `node_id` directly
    pub fn downstream(&self, node_id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.links_from(node_id).map(|l| l.target_node)
    }

    /// Edit the value of a native input slot
    pub fn set_input_value(&mut self, node_id: NodeId, slot: usize, value: Value) -> bool {
        let Some(native) = self
            .nodes
            .get_mut(&node_id)
            .and_then(|n| n.native_inputs.get_mut(&slot))
        else {
            return false;
        };
        native.value = value;
        native.explicit = true;
        self.events.push(GraphEvent::FieldChanged { node: node_id, slot });
        true
    }

    /// Replace a constant value, such as the payload of a primitive node
    pub fn set_constant(&mut self, node_id: NodeId, field: &str, value: Value) -> bool {
        let Some(slot) = self
            .nodes
            .get_mut(&node_id)
            .and_then(|n| n.constant_fields.get_mut(field))
        else {
            return false;
        };
        *slot = value;
        self.events.push(GraphEvent::ConstantChanged {
            node: node_id,
            field: field.to_string(),
        });
        true
    }

    /// Replace the payload of a primitive node
    pub fn set_primitive_value(&mut self, node_id: NodeId, value: Value) -> bool {
        if !self.node(node_id).is_some_and(NodeInstance::is_primitive) {
            return false;
        }
        self.set_constant(node_id, PRIMITIVE_VALUE_FIELD, value)
    }

    /// Move a node
    pub fn set_position(&mut self, node_id: NodeId, position: [f32; 2]) -> bool {
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return false;
        };
        node.position = position;
        self.events.push(GraphEvent::LayoutChanged { node: node_id });
        true
    }

    /// Mark a node as preview-only; such nodes are never exported
    pub fn set_preview_only(&mut self, node_id: NodeId, preview_only: bool) -> bool {
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return false;
        };
        node.preview_only = preview_only;
        true
    }

    fn multi_field(&self, node_id: NodeId, field: &str) -> Result<(SlotDirection, Vec<usize>), SlotEditError> {
        let node = self.nodes.get(&node_id).ok_or(SlotEditError::NodeNotFound(node_id))?;
        if let Some(indices) = node.multi_input_slots.get(field) {
            return Ok((SlotDirection::Input, indices.clone()));
        }
        if let Some(indices) = node.multi_output_slots.get(field) {
            return Ok((SlotDirection::Output, indices.clone()));
        }
        Err(SlotEditError::NotMultiField(field.to_string()))
    }

    fn slot_key(&self, node_id: NodeId, direction: SlotDirection, index: usize) -> Option<Option<&str>> {
        let node = self.nodes.get(&node_id)?;
        let meta = match direction {
            SlotDirection::Input => &node.inputs.get(index)?.meta,
            SlotDirection::Output => &node.outputs.get(index)?.meta,
        };
        Some(meta.key.as_deref())
    }

    fn find_keyed(
        &self,
        node_id: NodeId,
        direction: SlotDirection,
        indices: &[usize],
        key: &str,
    ) -> Option<usize> {
        indices
            .iter()
            .copied()
            .find(|&i| self.slot_key(node_id, direction, i) == Some(Some(key)))
    }

    /// Add a keyed slot to a multi-field.
    ///
    /// A field still showing its unkeyed placeholder has the placeholder
    /// converted instead, so the slot count stays `max(1, keys)`.
    pub fn add_multi_slot(&mut self, node_id: NodeId, field: &str, key: &str) -> Result<usize, SlotEditError> {
        let key = validate_key(key)?;
        let (direction, indices) = self.multi_field(node_id, field)?;
        if self.find_keyed(node_id, direction, &indices, &key).is_some() {
            return Err(SlotEditError::DuplicateKey(key));
        }

        let placeholder = match indices.as_slice() {
            [only] if self.slot_key(node_id, direction, *only) == Some(None) => Some(*only),
            _ => None,
        };
        let template = *indices.first().ok_or_else(|| SlotEditError::NotMultiField(field.to_string()))?;
        let node = self.nodes.get_mut(&node_id).ok_or(SlotEditError::NodeNotFound(node_id))?;

        let index = match (direction, placeholder) {
            (SlotDirection::Input, Some(index)) => {
                rekey_input(&mut node.inputs[index], Some(key));
                index
            }
            (SlotDirection::Output, Some(index)) => {
                rekey_output(&mut node.outputs[index], Some(key));
                index
            }
            (SlotDirection::Input, None) => {
                let mut meta = node.inputs[template].meta.clone();
                meta.key = Some(key);
                node.inputs.push(InputSlot::new(meta));
                let index = node.inputs.len() - 1;
                if let Some(list) = node.multi_input_slots.get_mut(field) {
                    list.push(index);
                }
                index
            }
            (SlotDirection::Output, None) => {
                let mut meta = node.outputs[template].meta.clone();
                meta.key = Some(key);
                node.outputs.push(OutputSlot::new(meta));
                let index = node.outputs.len() - 1;
                if let Some(list) = node.multi_output_slots.get_mut(field) {
                    list.push(index);
                }
                index
            }
        };

        self.events.push(GraphEvent::SlotsChanged {
            node: node_id,
            field: field.to_string(),
        });
        Ok(index)
    }

    /// Remove a keyed slot from a multi-field, severing its links.
    ///
    /// The last remaining slot of a field cannot be removed.
    pub fn remove_multi_slot(&mut self, node_id: NodeId, field: &str, key: &str) -> Result<(), SlotEditError> {
        let (direction, indices) = self.multi_field(node_id, field)?;
        if indices.len() <= 1 {
            return Err(SlotEditError::LastSlot(field.to_string()));
        }
        let index = self
            .find_keyed(node_id, direction, &indices, key)
            .ok_or_else(|| SlotEditError::KeyNotFound(key.to_string()))?;

        let severed: Vec<LinkId> = match direction {
            SlotDirection::Input => self
                .links
                .values()
                .filter(|l| l.target_node == node_id && l.target_slot == index)
                .map(|l| l.id)
                .collect(),
            SlotDirection::Output => self
                .links
                .values()
                .filter(|l| l.origin_node == node_id && l.origin_slot == index)
                .map(|l| l.id)
                .collect(),
        };
        for link_id in severed {
            self.disconnect(link_id);
        }

        self.remove_slot(node_id, direction, index);
        if let Some(values) = self
            .nodes
            .get_mut(&node_id)
            .and_then(|n| n.keyed_as_object.get_mut(field))
        {
            values.remove(key);
        }
        self.events.push(GraphEvent::SlotsChanged {
            node: node_id,
            field: field.to_string(),
        });
        Ok(())
    }

    /// Change the key of a multi-slot; its links are kept
    pub fn rename_multi_slot(
        &mut self,
        node_id: NodeId,
        field: &str,
        old_key: &str,
        new_key: &str,
    ) -> Result<(), SlotEditError> {
        let new_key = validate_key(new_key)?;
        let (direction, indices) = self.multi_field(node_id, field)?;
        let index = self
            .find_keyed(node_id, direction, &indices, old_key)
            .ok_or_else(|| SlotEditError::KeyNotFound(old_key.to_string()))?;
        if new_key == old_key {
            return Ok(());
        }
        if self.find_keyed(node_id, direction, &indices, &new_key).is_some() {
            return Err(SlotEditError::DuplicateKey(new_key));
        }

        let node = self.nodes.get_mut(&node_id).ok_or(SlotEditError::NodeNotFound(node_id))?;
        if let Some(values) = node.keyed_as_object.get_mut(field) {
            if let Some(value) = values.remove(old_key) {
                values.insert(new_key.clone(), value);
            }
        }
        match direction {
            SlotDirection::Input => rekey_input(&mut node.inputs[index], Some(new_key)),
            SlotDirection::Output => rekey_output(&mut node.outputs[index], Some(new_key)),
        }
        self.events.push(GraphEvent::SlotsChanged {
            node: node_id,
            field: field.to_string(),
        });
        Ok(())
    }

    /// Delete one slot and shift every index above it down by one.
    ///
    /// This is the only place slot indices are renumbered: link endpoints,
    /// native-input keys and both multi-slot maps move together. The slot
    /// must have no links left.
    fn remove_slot(&mut self, node_id: NodeId, direction: SlotDirection, index: usize) {
        let shift = move |i: usize| if i > index { i - 1 } else { i };
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return;
        };

        let multi = match direction {
            SlotDirection::Input => {
                node.inputs.remove(index);
                node.native_inputs = std::mem::take(&mut node.native_inputs)
                    .into_iter()
                    .filter(|(i, _)| *i != index)
                    .map(|(i, native)| (shift(i), native))
                    .collect();
                &mut node.multi_input_slots
            }
            SlotDirection::Output => {
                node.outputs.remove(index);
                &mut node.multi_output_slots
            }
        };
        for list in multi.values_mut() {
            list.retain(|&i| i != index);
            for i in list.iter_mut() {
                *i = shift(*i);
            }
        }

        for link in self.links.values_mut() {
            match direction {
                SlotDirection::Input if link.target_node == node_id => {
                    link.target_slot = shift(link.target_slot);
                }
                SlotDirection::Output if link.origin_node == node_id => {
                    link.origin_slot = shift(link.origin_slot);
                }
                _ => {}
            }
        }
    }

    /// Nodes reachable downstream of `start`, including `start`, breadth first
    pub fn downstream_closure(&self, start: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut order = Vec::new();
        while let Some(id) = queue.pop_front() {
            order.push(id);
            for next in self.downstream(id) {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        order
    }

    /// Get nodes in topological order (for evaluation)
    pub fn topological_order(&self) -> Result<Vec<NodeId>, CycleError> {
        let (order, cyclic) = self.kahn();
        if cyclic.is_empty() {
            Ok(order)
        } else {
            Err(CycleError(cyclic))
        }
    }

    /// Topological order with the members of cycles appended in insertion
    /// order; never fails
    pub fn evaluation_order(&self) -> Vec<NodeId> {
        let (mut order, cyclic) = self.kahn();
        order.extend(cyclic);
        order
    }

    fn kahn(&self) -> (Vec<NodeId>, Vec<NodeId>) {
        let mut in_degree: IndexMap<NodeId, usize> = self.nodes.keys().map(|&id| (id, 0)).collect();
        for link in self.links.values() {
            if let Some(degree) = in_degree.get_mut(&link.target_node) {
                *degree += 1;
            }
        }

        let mut queue: VecDeque<NodeId> = in_degree
            .iter()
            .filter(|(_, &d)| d == 0)
            .map(|(&id, _)| id)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(id) = queue.pop_front() {
            order.push(id);
            for next in self.downstream(id) {
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }

        let placed: HashSet<NodeId> = order.iter().copied().collect();
        let cyclic = self.nodes.keys().filter(|id| !placed.contains(id)).copied().collect();
        (order, cyclic)
    }

    /// Drain pending change events
    pub fn take_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_key(key: &str) -> Result<String, SlotEditError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(SlotEditError::EmptyKey);
    }
    Ok(key.to_string())
}

fn rekey_input(slot: &mut InputSlot, key: Option<String>) {
    slot.meta.key = key;
    slot.name = slot.meta.display_name();
}

fn rekey_output(slot: &mut OutputSlot, key: Option<String>) {
    slot.meta.key = key;
    slot.name = slot.meta.display_name();
}

/// Error when creating a link
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Slot index out of range
    #[error("{direction:?} slot {slot} out of range on {node}")]
    SlotOutOfRange {
        /// Node
        node: NodeId,
        /// Slot direction
        direction: SlotDirection,
        /// Requested index
        slot: usize,
    },

    /// Producer type cannot feed consumer type
    #[error("Incompatible types: {producer} -> {consumer}")]
    IncompatibleTypes {
        /// Output type
        producer: String,
        /// Input type
        consumer: String,
    },

    /// Input already has a link
    #[error("Input slot {slot} on {node} already linked by {link}")]
    SlotOccupied {
        /// Node
        node: NodeId,
        /// Input slot index
        slot: usize,
        /// Existing link
        link: LinkId,
    },
}

/// Error when editing multi-slots
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SlotEditError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Field is not a multi-input or multi-output field
    #[error("Not a multi-slot field: {0}")]
    NotMultiField(String),

    /// Key is blank
    #[error("Slot key must not be empty")]
    EmptyKey,

    /// Key already used by this field
    #[error("Duplicate slot key: {0}")]
    DuplicateKey(String),

    /// No slot with this key
    #[error("No slot with key: {0}")]
    KeyNotFound(String),

    /// Field would be left without slots
    #[error("Cannot remove the last slot of {0}")]
    LastSlot(String),
}

/// Error when graph contains a cycle
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Graph contains a cycle through {} node(s)", .0.len())]
pub struct CycleError(pub Vec<NodeId>);

#[cfg(test)]
mod tests {
    use super::*;
    use nodeweave_schema::parse_schema;
    use serde_json::json;

    const SCHEMA: &str = r#"
class Source(BaseModel):
    type: Annotated[Literal["source"], FieldRole.CONSTANT] = "source"
    seed: Annotated[int, FieldRole.INPUT] = 1
    out: Annotated[int, FieldRole.OUTPUT] = None
    text: Annotated[str, FieldRole.OUTPUT] = None

class Fan(BaseModel):
    type: Annotated[Literal["fan"], FieldRole.CONSTANT] = "fan"
    input: Annotated[Dict[str, Any], FieldRole.MULTI_INPUT] = None
    level: Annotated[int, FieldRole.INPUT] = 0
    output: Annotated[Dict[str, Any], FieldRole.MULTI_OUTPUT] = None
"#;

    fn setup() -> (Graph, Model, Model) {
        let schema = parse_schema(SCHEMA);
        let source = schema.model("Source").cloned().expect("Source");
        let fan = schema.model("Fan").cloned().expect("Fan");
        (Graph::new(), source, fan)
    }

    fn fan_with_keys(graph: &mut Graph, fan: &Model, keys: &[&str]) -> NodeId {
        let fragment = json!({ "input": keys });
        graph.create_node("t.Fan", fan, fragment.as_object())
    }

    #[test]
    fn test_connect_and_disconnect() {
        let (mut graph, source, _) = setup();
        let a = graph.create_node("t.Source", &source, None);
        let b = graph.create_node("t.Source", &source, None);

        let link = graph.connect(a, 0, b, 0).unwrap();
        assert_eq!(graph.link_count(), 1);
        assert_eq!(graph.node(b).unwrap().inputs[0].link, Some(link));
        assert_eq!(graph.node(a).unwrap().outputs[0].links, vec![link]);

        let removed = graph.disconnect(link).unwrap();
        assert_eq!(removed.target_node, b);
        assert!(graph.node(b).unwrap().inputs[0].link.is_none());
        assert!(graph.node(a).unwrap().outputs[0].links.is_empty());
    }

    #[test]
    fn test_connect_rejections() {
        let (mut graph, source, _) = setup();
        let a = graph.create_node("t.Source", &source, None);
        let b = graph.create_node("t.Source", &source, None);

        assert!(matches!(graph.connect(a, 1, b, 0), Err(ConnectError::IncompatibleTypes { .. })));
        assert!(matches!(graph.connect(a, 9, b, 0), Err(ConnectError::SlotOutOfRange { .. })));
        assert!(matches!(graph.connect(a, 0, NodeId(99), 0), Err(ConnectError::NodeNotFound(_))));

        graph.connect(a, 0, b, 0).unwrap();
        assert!(matches!(graph.connect(b, 0, b, 0), Err(ConnectError::SlotOccupied { .. })));
        assert_eq!(graph.link_count(), 1);
    }

    #[test]
    fn test_self_link_allowed() {
        let (mut graph, source, _) = setup();
        let a = graph.create_node("t.Source", &source, None);
        assert!(graph.connect(a, 0, a, 0).is_ok());
    }

    #[test]
    fn test_remove_node_cascades() {
        let (mut graph, source, _) = setup();
        let a = graph.create_node("t.Source", &source, None);
        let b = graph.create_node("t.Source", &source, None);
        graph.connect(a, 0, b, 0).unwrap();
        graph.connect(b, 0, a, 0).unwrap();

        graph.remove_node(b);
        assert_eq!(graph.link_count(), 0);
        assert!(graph.node(a).unwrap().inputs[0].link.is_none());
        assert!(graph.node(a).unwrap().outputs[0].links.is_empty());
    }

    #[test]
    fn test_remove_multi_slot_renumbers() {
        let (mut graph, source, fan) = setup();
        let producer = graph.create_node("t.Source", &source, None);
        let node = fan_with_keys(&mut graph, &fan, &["a", "b", "c"]);
        graph.connect(producer, 0, node, 3).unwrap();
        graph.connect(producer, 0, node, 2).unwrap();

        graph.remove_multi_slot(node, "input", "a").unwrap();

        let n = graph.node(node).unwrap();
        assert_eq!(n.multi_input_slots["input"], vec![0, 1]);
        assert_eq!(n.inputs[0].meta.internal_name(), "input.b");
        assert_eq!(n.inputs[2].meta.field_name, "level");
        assert!(n.native_inputs.contains_key(&2));
        assert!(!n.native_inputs.contains_key(&3));

        let targets: Vec<usize> = graph.links_into(node).map(|l| l.target_slot).collect();
        assert_eq!(targets, vec![2, 1]);
        for link in graph.links() {
            assert_eq!(graph.node(node).unwrap().inputs[link.target_slot].link, Some(link.id));
        }
    }

    #[test]
    fn test_remove_multi_slot_severs_link() {
        let (mut graph, source, fan) = setup();
        let producer = graph.create_node("t.Source", &source, None);
        let node = fan_with_keys(&mut graph, &fan, &["a", "b"]);
        graph.connect(producer, 0, node, 0).unwrap();

        graph.remove_multi_slot(node, "input", "a").unwrap();
        assert_eq!(graph.link_count(), 0);
        assert!(graph.node(producer).unwrap().outputs[0].links.is_empty());
    }

    #[test]
    fn test_last_slot_cannot_be_removed() {
        let (mut graph, _, fan) = setup();
        let node = fan_with_keys(&mut graph, &fan, &["a"]);
        assert_eq!(
            graph.remove_multi_slot(node, "input", "a"),
            Err(SlotEditError::LastSlot("input".to_string()))
        );
    }

    #[test]
    fn test_add_converts_placeholder() {
        let (mut graph, _, fan) = setup();
        let node = graph.create_node("t.Fan", &fan, None);
        assert_eq!(graph.node(node).unwrap().inputs[0].meta.key, None);

        assert_eq!(graph.add_multi_slot(node, "input", "x"), Ok(0));
        let n = graph.node(node).unwrap();
        assert_eq!(n.multi_input_slots["input"], vec![0]);
        assert_eq!(n.inputs[0].meta.internal_name(), "input.x");

        let index = graph.add_multi_slot(node, "input", "y").unwrap();
        assert_eq!(index, 2);
        assert_eq!(graph.node(node).unwrap().multi_input_slots["input"], vec![0, 2]);
        assert_eq!(graph.add_multi_slot(node, "input", "y"), Err(SlotEditError::DuplicateKey("y".to_string())));
        assert_eq!(graph.add_multi_slot(node, "input", "  "), Err(SlotEditError::EmptyKey));
        assert!(matches!(graph.add_multi_slot(node, "level", "z"), Err(SlotEditError::NotMultiField(_))));
    }

    #[test]
    fn test_output_multi_slots() {
        let (mut graph, source, fan) = setup();
        let node = graph.create_node("t.Fan", &fan, None);
        let sink = graph.create_node("t.Source", &source, None);
        graph.add_multi_slot(node, "output", "left").unwrap();
        graph.add_multi_slot(node, "output", "right").unwrap();
        graph.connect(node, 1, sink, 0).unwrap();

        graph.remove_multi_slot(node, "output", "left").unwrap();
        let link = graph.links().next().unwrap();
        assert_eq!(link.origin_slot, 0);
        assert_eq!(graph.node(node).unwrap().outputs[0].meta.internal_name(), "output.right");
    }

    #[test]
    fn test_rename_keeps_links() {
        let (mut graph, source, fan) = setup();
        let producer = graph.create_node("t.Source", &source, None);
        let node = fan_with_keys(&mut graph, &fan, &["a", "b"]);
        let link = graph.connect(producer, 0, node, 1).unwrap();

        graph.rename_multi_slot(node, "input", "b", "beta").unwrap();
        let n = graph.node(node).unwrap();
        assert_eq!(n.inputs[1].meta.internal_name(), "input.beta");
        assert_eq!(n.inputs[1].link, Some(link));
        assert_eq!(
            graph.rename_multi_slot(node, "input", "a", "beta"),
            Err(SlotEditError::DuplicateKey("beta".to_string()))
        );
    }

    #[test]
    fn test_set_input_value_marks_explicit() {
        let (mut graph, source, _) = setup();
        let a = graph.create_node("t.Source", &source, None);
        assert!(graph.set_input_value(a, 0, json!(7)));
        let native = &graph.node(a).unwrap().native_inputs[&0];
        assert_eq!(native.value, json!(7));
        assert!(native.explicit);
        assert!(!graph.set_input_value(a, 5, json!(1)));
    }

    #[test]
    fn test_evaluation_order_with_cycle() {
        let (mut graph, source, _) = setup();
        let a = graph.create_node("t.Source", &source, None);
        let b = graph.create_node("t.Source", &source, None);
        let c = graph.create_node("t.Source", &source, None);
        graph.connect(a, 0, b, 0).unwrap();
        assert_eq!(graph.topological_order().unwrap(), vec![a, c, b]);

        graph.connect(b, 0, a, 0).unwrap();
        assert!(graph.topological_order().is_err());
        assert_eq!(graph.evaluation_order(), vec![c, a, b]);
    }

    #[test]
    fn test_events_are_recorded() {
        let (mut graph, source, _) = setup();
        let a = graph.create_node("t.Source", &source, None);
        graph.set_position(a, [10.0, 20.0]);
        let events = graph.take_events();
        assert_eq!(events.len(), 2);
        assert!(graph.take_events().is_empty());
    }
}
