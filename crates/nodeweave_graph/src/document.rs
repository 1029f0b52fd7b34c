// SPDX-License-Identifier: MIT OR Apache-2.0
//! Workflow document codec.
//!
//! A document is a JSON object `{type, nodes, edges}` where edges refer to
//! nodes by their position in `nodes` and to slots by internal name.
//! Import is best effort: anything that cannot be resolved is skipped and
//! reported, never fatal.

use crate::connection::LinkId;
use crate::graph::Graph;
use crate::node::{NodeId, NodeInstance, PRIMITIVE_VALUE_FIELD};
use crate::port::{NativeKind, SlotDirection};
use crate::registry::SchemaRegistry;
use nodeweave_schema::TYPE_TAG_FIELD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Document type written on export
pub const DOCUMENT_TYPE: &str = "workflow";

/// Edge type written on export
pub const EDGE_TYPE: &str = "edge";

/// Keys of a node object that are never field values
const RESERVED_KEYS: &[&str] = &[TYPE_TAG_FIELD, "extra"];

/// A serialized workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document kind
    #[serde(rename = "type", default = "default_document_type")]
    pub kind: String,
    /// Nodes, in document order
    #[serde(default)]
    pub nodes: Vec<NodeDoc>,
    /// Edges between nodes, by node index
    #[serde(default)]
    pub edges: Vec<EdgeDoc>,
    /// Any other top-level keys
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

fn default_document_type() -> String {
    DOCUMENT_TYPE.to_string()
}

fn default_edge_type() -> String {
    EDGE_TYPE.to_string()
}

impl Default for Document {
    fn default() -> Self {
        Self {
            kind: default_document_type(),
            nodes: Vec::new(),
            edges: Vec::new(),
            metadata: Map::new(),
        }
    }
}

impl Document {
    /// Parse a document from JSON text
    pub fn from_json(text: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize to pretty JSON text
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A serialized node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDoc {
    /// Document type name of the node
    #[serde(rename = "type")]
    pub node_type: String,
    /// Presentation metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<NodeExtra>,
    /// Field values: annotations, constants, multi-field keys and edited inputs
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Presentation metadata of a serialized node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeExtra {
    /// Position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<[f32; 2]>,
    /// Size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<[f32; 2]>,
    /// Custom title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Custom display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Custom color
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Anything else
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl NodeExtra {
    fn is_empty(&self) -> bool {
        self.pos.is_none()
            && self.size.is_none()
            && self.title.is_none()
            && self.name.is_none()
            && self.color.is_none()
            && self.other.is_empty()
    }
}

/// A serialized edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDoc {
    /// Edge kind
    #[serde(rename = "type", default = "default_edge_type")]
    pub kind: String,
    /// Index of the producing node in `nodes`
    pub source: usize,
    /// Index of the consuming node in `nodes`
    pub target: usize,
    /// Internal name of the output slot
    pub source_slot: String,
    /// Internal name of the input slot
    pub target_slot: String,
    /// Loop-back marker
    #[serde(rename = "loop", default, skip_serializing_if = "std::ops::Not::not")]
    pub looped: bool,
    /// Auxiliary data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Presentation metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

/// Export settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Write node positions and sizes
    pub include_layout: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { include_layout: true }
    }
}

/// Import settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Apply positions and sizes from the document
    pub include_layout: bool,
    /// Horizontal and vertical distance between auto-arranged nodes
    pub grid_spacing: [f32; 2],
    /// Columns of the auto-arrange grid; square-ish when unset
    pub grid_columns: Option<usize>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            include_layout: true,
            grid_spacing: [240.0, 160.0],
            grid_columns: None,
        }
    }
}

/// A node the import could not create
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedNode {
    /// Position in the document
    pub index: usize,
    /// Unresolved type name
    pub node_type: String,
}

/// An edge the import could not create
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedEdge {
    /// Position in the document
    pub index: usize,
    /// Why it was skipped
    pub reason: String,
}

/// Outcome of an import
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    /// Nodes created
    pub nodes: usize,
    /// Links created
    pub links: usize,
    /// Nodes skipped
    pub skipped_nodes: Vec<SkippedNode>,
    /// Edges skipped
    pub skipped_edges: Vec<SkippedEdge>,
}

impl ImportReport {
    /// Whether every node and edge made it in
    pub fn is_clean(&self) -> bool {
        self.skipped_nodes.is_empty() && self.skipped_edges.is_empty()
    }
}

/// Error reading or writing document text
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Malformed JSON or wrong shape
    #[error("Invalid document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialize a graph.
///
/// Nodes are ordered by their original document position, then by
/// creation; preview-only nodes are left out together with their edges.
pub fn export(graph: &Graph, options: &ExportOptions) -> Document {
    let mut nodes: Vec<&NodeInstance> = graph.nodes().filter(|n| !n.preview_only).collect();
    nodes.sort_by_key(|n| (n.order.unwrap_or(usize::MAX), n.id));
    let index: HashMap<NodeId, usize> = nodes.iter().enumerate().map(|(i, n)| (n.id, i)).collect();

    let mut links: Vec<_> = graph.links().collect();
    links.sort_by_key(|l| l.id);
    let edges = links
        .into_iter()
        .filter_map(|link| {
            let source = *index.get(&link.origin_node)?;
            let target = *index.get(&link.target_node)?;
            let origin = graph.node(link.origin_node)?.output(link.origin_slot)?;
            let consumer = graph.node(link.target_node)?.input(link.target_slot)?;
            Some(EdgeDoc {
                kind: default_edge_type(),
                source,
                target,
                source_slot: origin.meta.internal_name(),
                target_slot: consumer.meta.internal_name(),
                looped: link.looped,
                data: link.data.clone(),
                extra: link.extra.clone(),
            })
        })
        .collect();

    Document {
        kind: graph.kind.clone().unwrap_or_else(default_document_type),
        nodes: nodes.into_iter().map(|n| export_node(n, options)).collect(),
        edges,
        metadata: graph.metadata.clone(),
    }
}

fn export_node(node: &NodeInstance, options: &ExportOptions) -> NodeDoc {
    let node_type = node
        .constant_fields
        .get(TYPE_TAG_FIELD)
        .and_then(Value::as_str)
        .map_or_else(|| node.model_name().to_string(), str::to_string);

    let mut fields = Map::new();
    let mut put = |name: &str, value: Value| {
        if !RESERVED_KEYS.contains(&name) {
            fields.insert(name.to_string(), value);
        }
    };

    for (name, value) in &node.annotations {
        put(name, value.clone());
    }
    for (name, value) in &node.constant_fields {
        put(name, value.clone());
    }

    let multi = node
        .multi_input_slots
        .iter()
        .map(|(name, indices)| {
            let keys: Vec<String> = indices
                .iter()
                .filter_map(|&i| node.input(i)?.meta.key.clone())
                .collect();
            (name, keys)
        })
        .chain(node.multi_output_slots.iter().map(|(name, indices)| {
            let keys: Vec<String> = indices
                .iter()
                .filter_map(|&i| node.output(i)?.meta.key.clone())
                .collect();
            (name, keys)
        }));
    for (name, keys) in multi {
        if keys.is_empty() {
            continue;
        }
        let value = match node.keyed_as_object.get(name) {
            Some(values) => Value::Object(
                keys.into_iter()
                    .map(|k| {
                        let value = values.get(&k).cloned().unwrap_or(Value::Null);
                        (k, value)
                    })
                    .collect(),
            ),
            None => Value::Array(keys.into_iter().map(Value::String).collect()),
        };
        put(name, value);
    }

    for (&index, native) in &node.native_inputs {
        let Some(slot) = node.input(index) else {
            continue;
        };
        if native.explicit && slot.link.is_none() {
            put(&slot.meta.field_name, native.value.clone());
        }
    }

    let mut extra = NodeExtra {
        title: node.title.clone(),
        name: node.display_name.clone(),
        color: node.color.clone(),
        other: node.extra.clone(),
        ..NodeExtra::default()
    };
    if options.include_layout {
        extra.pos = Some(node.position);
        extra.size = Some(node.size);
    }

    NodeDoc {
        node_type,
        extra: (!extra.is_empty()).then_some(extra),
        fields,
    }
}

/// Replace the graph contents with a document.
///
/// Unknown node types and unresolvable edges are skipped and reported.
pub fn import(
    graph: &mut Graph,
    registry: &SchemaRegistry,
    document: &Document,
    options: &ImportOptions,
) -> ImportReport {
    graph.clear();
    graph.kind = Some(document.kind.clone());
    graph.metadata = document.metadata.clone();

    let mut report = ImportReport::default();
    let mut created: Vec<Option<NodeId>> = Vec::with_capacity(document.nodes.len());
    let columns = options
        .grid_columns
        .unwrap_or_else(|| (document.nodes.len() as f64).sqrt().ceil() as usize)
        .max(1);

    for (index, doc) in document.nodes.iter().enumerate() {
        let Some(id) = instantiate(graph, registry, doc) else {
            warn!(index, node_type = %doc.node_type, "Skipping node of unknown type");
            report.skipped_nodes.push(SkippedNode {
                index,
                node_type: doc.node_type.clone(),
            });
            created.push(None);
            continue;
        };

        let grid = [
            (index % columns) as f32 * options.grid_spacing[0],
            (index / columns) as f32 * options.grid_spacing[1],
        ];
        if let Some(node) = graph.node_mut(id) {
            node.order = Some(index);
            apply_node_doc(node, doc, options, grid);
        }
        created.push(Some(id));
        report.nodes += 1;
    }

    for (index, edge) in document.edges.iter().enumerate() {
        match import_edge(graph, &created, edge) {
            Ok(link_id) => {
                if let Some(link) = graph.link_mut(link_id) {
                    link.looped = edge.looped;
                    link.data = edge.data.clone();
                    link.extra = edge.extra.clone();
                }
                report.links += 1;
            }
            Err(reason) => {
                debug!(index, %reason, "Skipping edge");
                report.skipped_edges.push(SkippedEdge { index, reason });
            }
        }
    }

    info!(
        nodes = report.nodes,
        links = report.links,
        skipped_nodes = report.skipped_nodes.len(),
        skipped_edges = report.skipped_edges.len(),
        "Imported document"
    );
    report
}

fn instantiate(graph: &mut Graph, registry: &SchemaRegistry, doc: &NodeDoc) -> Option<NodeId> {
    if let Some(kind) = NativeKind::from_primitive_tag(&doc.node_type) {
        let payload = doc.fields.get(PRIMITIVE_VALUE_FIELD).cloned();
        return Some(graph.create_primitive(kind, payload));
    }
    let model_ref = registry.resolve_type(&doc.node_type)?;
    let model = registry.model(&model_ref)?;
    Some(graph.create_node(model_ref, model, Some(&doc.fields)))
}

fn apply_node_doc(node: &mut NodeInstance, doc: &NodeDoc, options: &ImportOptions, grid: [f32; 2]) {
    node.position = grid;
    if let Some(extra) = &doc.extra {
        if options.include_layout {
            if let Some(pos) = extra.pos {
                node.position = pos;
            }
            if let Some(size) = extra.size {
                node.size = size;
            }
        }
        node.title = extra.title.clone();
        node.display_name = extra.name.clone();
        node.color = extra.color.clone();
        node.extra = extra.other.clone();
    }

    for (name, value) in &doc.fields {
        let Some(index) = node.input_for_field(name) else {
            continue;
        };
        if let Some(native) = node.native_inputs.get_mut(&index) {
            native.value = value.clone();
            native.explicit = true;
        }
    }
}

fn import_edge(graph: &mut Graph, created: &[Option<NodeId>], edge: &EdgeDoc) -> Result<LinkId, String> {
    let source = created
        .get(edge.source)
        .copied()
        .flatten()
        .ok_or_else(|| format!("unknown source node {}", edge.source))?;
    let target = created
        .get(edge.target)
        .copied()
        .flatten()
        .ok_or_else(|| format!("unknown target node {}", edge.target))?;
    let origin_slot = resolve_slot(graph, source, SlotDirection::Output, &edge.source_slot)
        .ok_or_else(|| format!("unknown output slot {:?}", edge.source_slot))?;
    let target_slot = resolve_slot(graph, target, SlotDirection::Input, &edge.target_slot)
        .ok_or_else(|| format!("unknown input slot {:?}", edge.target_slot))?;
    graph
        .connect(source, origin_slot, target, target_slot)
        .map_err(|e| e.to_string())
}

/// Find a slot by internal name, display name, `field.key` of a multi-field
/// (adding the key when missing), numeric index, or as the only slot.
fn resolve_slot(graph: &mut Graph, node_id: NodeId, direction: SlotDirection, name: &str) -> Option<usize> {
    let node = graph.node(node_id)?;
    let (internal, display, count, multi_field) = match direction {
        SlotDirection::Input => (
            node.input_named(name),
            node.inputs.iter().position(|s| s.name == name),
            node.inputs.len(),
            name.split_once('.')
                .filter(|(field, _)| node.multi_input_slots.contains_key(*field)),
        ),
        SlotDirection::Output => (
            node.output_named(name),
            node.outputs.iter().position(|s| s.name == name),
            node.outputs.len(),
            name.split_once('.')
                .filter(|(field, _)| node.multi_output_slots.contains_key(*field)),
        ),
    };

    if let Some(index) = internal.or(display) {
        return Some(index);
    }
    if let Some((field, key)) = multi_field {
        return graph.add_multi_slot(node_id, field, key).ok();
    }
    if let Ok(index) = name.parse::<usize>() {
        return (index < count).then_some(index);
    }
    (count == 1).then_some(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SCHEMA: &str = r#"
class Base(BaseModel):
    id: Annotated[str, FieldRole.ANNOTATION] = Field(default_factory=generate_id)
    type: Annotated[Literal["base"], FieldRole.CONSTANT] = "base"

class Source(Base):
    type: Annotated[Literal["source"], FieldRole.CONSTANT] = "source"
    seed: Annotated[int, FieldRole.INPUT] = 1
    out: Annotated[int, FieldRole.OUTPUT] = None

class Merge(Base):
    type: Annotated[Literal["merge"], FieldRole.CONSTANT] = "merge"
    input: Annotated[Dict[str, int], FieldRole.MULTI_INPUT] = None
    mode: Annotated[str, FieldRole.INPUT] = "first"
    output: Annotated[int, FieldRole.OUTPUT] = None
"#;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry.register("t", SCHEMA);
        registry
    }

    fn document(value: Value) -> Document {
        serde_json::from_value(value).expect("document")
    }

    #[test]
    fn test_import_resolves_and_links() {
        let registry = registry();
        let mut graph = Graph::new();
        let doc = document(json!({
            "type": "workflow",
            "nodes": [
                {"type": "source", "id": "s1", "seed": 4, "extra": {"pos": [10.0, 20.0]}},
                {"type": "merge", "id": "m1", "input": ["a", "b"]}
            ],
            "edges": [
                {"type": "edge", "source": 0, "target": 1, "source_slot": "out", "target_slot": "input.b"}
            ]
        }));

        let report = import(&mut graph, &registry, &doc, &ImportOptions::default());
        assert!(report.is_clean());
        assert_eq!((report.nodes, report.links), (2, 1));

        let ids: Vec<NodeId> = graph.node_ids().collect();
        let source = graph.node(ids[0]).unwrap();
        assert_eq!(source.position, [10.0, 20.0]);
        assert_eq!(source.native_inputs[&0].value, json!(4));
        assert_eq!(graph.links().next().unwrap().target_slot, 1);
    }

    #[test]
    fn test_import_skips_bad_items() {
        let registry = registry();
        let mut graph = Graph::new();
        let doc = document(json!({
            "nodes": [
                {"type": "source"},
                {"type": "mystery"},
                {"type": "merge"}
            ],
            "edges": [
                {"source": 0, "target": 1, "source_slot": "out", "target_slot": "x"},
                {"source": 0, "target": 2, "source_slot": "nope", "target_slot": "mode"},
                {"source": 0, "target": 2, "source_slot": "out", "target_slot": "input.k"},
                {"source": 0, "target": 2, "source_slot": "out", "target_slot": "input.k"}
            ]
        }));

        let report = import(&mut graph, &registry, &doc, &ImportOptions::default());
        assert_eq!(report.nodes, 2);
        assert_eq!(report.skipped_nodes, vec![SkippedNode { index: 1, node_type: "mystery".into() }]);
        assert_eq!(report.links, 1);
        let skipped: Vec<usize> = report.skipped_edges.iter().map(|e| e.index).collect();
        assert_eq!(skipped, vec![0, 1, 3]);

        let merge = graph.nodes().nth(1).unwrap();
        assert_eq!(merge.inputs[0].meta.internal_name(), "input.k");
    }

    #[test]
    fn test_grid_layout_without_positions() {
        let registry = registry();
        let mut graph = Graph::new();
        let doc = document(json!({
            "nodes": [{"type": "source"}, {"type": "source"}, {"type": "source"}]
        }));
        let options = ImportOptions {
            grid_columns: Some(2),
            ..ImportOptions::default()
        };
        import(&mut graph, &registry, &doc, &options);
        let positions: Vec<[f32; 2]> = graph.nodes().map(|n| n.position).collect();
        assert_eq!(positions, vec![[0.0, 0.0], [240.0, 0.0], [0.0, 160.0]]);
    }

    #[test]
    fn test_export_emits_only_explicit_values() {
        let registry = registry();
        let mut graph = Graph::new();
        let model = registry.model("Source").unwrap();
        let id = graph.create_node("t.Source", model, None);

        let doc = export(&graph, &ExportOptions { include_layout: false });
        let node = &doc.nodes[0];
        assert_eq!(node.node_type, "source");
        assert!(node.extra.is_none());
        assert!(!node.fields.contains_key("seed"));
        assert!(node.fields["id"].is_string());

        graph.set_input_value(id, 0, json!(9));
        let doc = export(&graph, &ExportOptions::default());
        assert_eq!(doc.nodes[0].fields["seed"], json!(9));
        assert!(doc.nodes[0].extra.as_ref().is_some_and(|e| e.pos.is_some()));
    }

    #[test]
    fn test_object_keys_round_trip() {
        let registry = registry();
        let mut graph = Graph::new();
        let doc = document(json!({
            "nodes": [{"type": "merge", "id": "m", "input": {"left": {"weight": 2}, "right": null}}]
        }));
        import(&mut graph, &registry, &doc, &ImportOptions::default());
        let out = export(&graph, &ExportOptions { include_layout: false });
        assert_eq!(out.nodes[0].fields["input"], json!({"left": {"weight": 2}, "right": null}));

        let id = graph.node_ids().next().unwrap();
        graph.rename_multi_slot(id, "input", "left", "first").unwrap();
        graph.add_multi_slot(id, "input", "extra").unwrap();
        let out = export(&graph, &ExportOptions { include_layout: false });
        assert_eq!(
            out.nodes[0].fields["input"],
            json!({"first": {"weight": 2}, "right": null, "extra": null})
        );
    }

    #[test]
    fn test_import_records_document_index() {
        let registry = registry();
        let mut graph = Graph::new();
        let doc = document(json!({
            "nodes": [
                {"type": "source", "seed": 1},
                {"type": "mystery"},
                {"type": "merge", "input": ["a"]},
                {"type": "source", "seed": 3}
            ],
            "edges": [
                {"source": 3, "target": 2, "source_slot": "out", "target_slot": "input.a"}
            ]
        }));
        import(&mut graph, &registry, &doc, &ImportOptions::default());
        let orders: Vec<Option<usize>> = graph.nodes().map(|n| n.order).collect();
        assert_eq!(orders, vec![Some(0), Some(2), Some(3)]);

        let model = registry.model("Source").unwrap();
        graph.create_node("t.Source", model, None);

        let out = export(&graph, &ExportOptions { include_layout: false });
        let types: Vec<&str> = out.nodes.iter().map(|n| n.node_type.as_str()).collect();
        assert_eq!(types, ["source", "merge", "source", "source"]);
        assert_eq!(out.nodes[0].fields["seed"], json!(1));
        assert_eq!(out.nodes[2].fields["seed"], json!(3));
        assert_eq!((out.edges[0].source, out.edges[0].target), (2, 1));
    }

    #[test]
    fn test_lenient_slot_references() {
        let registry = registry();
        let mut graph = Graph::new();
        let doc = document(json!({
            "nodes": [{"type": "source"}, {"type": "merge"}, {"type": "source"}],
            "edges": [
                {"source": 0, "target": 1, "source_slot": "0", "target_slot": "0"},
                {"source": 0, "target": 2, "source_slot": "out", "target_slot": "7"},
                {"source": 0, "target": 2, "source_slot": "result", "target_slot": "anything"}
            ]
        }));
        let report = import(&mut graph, &registry, &doc, &ImportOptions::default());
        assert_eq!(report.links, 2);
        assert_eq!(report.skipped_edges.len(), 1);
        assert_eq!(report.skipped_edges[0].index, 1);
        assert!(report.skipped_edges[0].reason.contains("\"7\""));

        let ids: Vec<NodeId> = graph.node_ids().collect();
        let slots: Vec<(NodeId, usize, NodeId, usize)> = graph
            .links()
            .map(|l| (l.origin_node, l.origin_slot, l.target_node, l.target_slot))
            .collect();
        assert_eq!(slots, vec![(ids[0], 0, ids[1], 0), (ids[0], 0, ids[2], 0)]);
    }

    #[test]
    fn test_document_type_is_preserved() {
        let registry = registry();
        let mut graph = Graph::new();
        assert_eq!(export(&graph, &ExportOptions::default()).kind, DOCUMENT_TYPE);

        let doc = document(json!({"type": "pipeline", "nodes": [{"type": "source"}]}));
        import(&mut graph, &registry, &doc, &ImportOptions::default());
        assert_eq!(export(&graph, &ExportOptions::default()).kind, "pipeline");

        graph.clear();
        assert_eq!(export(&graph, &ExportOptions::default()).kind, DOCUMENT_TYPE);
    }

    #[test]
    fn test_primitive_nodes() {
        let registry = registry();
        let mut graph = Graph::new();
        let doc = document(json!({
            "nodes": [{"type": "$int", "value": 3}, {"type": "merge", "input": ["n"]}],
            "edges": [{"source": 0, "target": 1, "source_slot": "value", "target_slot": "input.n"}]
        }));
        let report = import(&mut graph, &registry, &doc, &ImportOptions::default());
        assert!(report.is_clean());

        let out = export(&graph, &ExportOptions { include_layout: false });
        assert_eq!(out.nodes[0].node_type, "$int");
        assert_eq!(out.nodes[0].fields["value"], json!(3));
    }

    #[test]
    fn test_preview_nodes_are_not_exported() {
        let registry = registry();
        let mut graph = Graph::new();
        let model = registry.model("Source").unwrap();
        let a = graph.create_node("t.Source", model, None);
        let b = graph.create_node("t.Source", model, None);
        graph.connect(a, 0, b, 0).unwrap();
        assert!(graph.set_preview_only(b, true));

        let doc = export(&graph, &ExportOptions::default());
        assert_eq!(doc.nodes.len(), 1);
        assert!(doc.edges.is_empty());
    }

    #[test]
    fn test_document_json() {
        let doc = Document::from_json(r#"{"type": "workflow", "nodes": [], "edges": [], "name": "demo"}"#).unwrap();
        assert_eq!(doc.metadata["name"], json!("demo"));
        assert!(Document::from_json("[1, 2]").is_err());
        let text = doc.to_json().unwrap();
        assert_eq!(Document::from_json(&text).unwrap(), doc);
    }
}
