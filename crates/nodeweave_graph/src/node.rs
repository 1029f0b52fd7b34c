// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node instances and the factory that expands a model into slots.

use crate::completeness::Readiness;
use crate::port::{InputSlot, NativeInput, NativeKind, OutputSlot, SlotMeta};
use indexmap::IndexMap;
use nodeweave_schema::{DefaultValue, FieldDecl, Model, Role, TypeExpr, TYPE_TAG_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a node, allocated monotonically by the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Default node size in graph units
pub const DEFAULT_NODE_SIZE: [f32; 2] = [180.0, 60.0];

/// Field name of the payload of a primitive node
pub const PRIMITIVE_VALUE_FIELD: &str = "value";

/// Default factories the node factory knows how to run
const UUID_FACTORY: &str = "generate_id";

/// A node instance in the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInstance {
    /// Unique instance ID
    pub id: NodeId,
    /// Qualified model reference (`schema.Model`) or a primitive tag
    pub model_ref: String,
    /// Position in graph space
    pub position: [f32; 2],
    /// Size in graph space
    pub size: [f32; 2],
    /// Input slots, in field declaration order
    pub inputs: Vec<InputSlot>,
    /// Output slots, in field declaration order
    pub outputs: Vec<OutputSlot>,
    /// Editable values keyed by input slot index
    pub native_inputs: BTreeMap<usize, NativeInput>,
    /// Multi-input field name to its input slot indices
    pub multi_input_slots: IndexMap<String, Vec<usize>>,
    /// Multi-output field name to its output slot indices
    pub multi_output_slots: IndexMap<String, Vec<usize>>,
    /// Multi-fields whose keys arrived as an object rather than a list,
    /// with the values that object carried
    pub keyed_as_object: BTreeMap<String, Map<String, Value>>,
    /// Constant field values (including the type tag)
    pub constant_fields: IndexMap<String, Value>,
    /// Annotation field values
    pub annotations: IndexMap<String, Value>,
    /// Custom title
    pub title: Option<String>,
    /// Custom display name
    pub display_name: Option<String>,
    /// Custom color
    pub color: Option<String>,
    /// Unrecognized presentation metadata, kept for round-trips
    pub extra: Map<String, Value>,
    /// Position in the source document; unset for nodes created interactively
    pub order: Option<usize>,
    /// Preview-only nodes are never exported
    pub preview_only: bool,
    /// Readiness flags, maintained by the completeness engine
    pub readiness: Readiness,
}

impl NodeInstance {
    fn empty(id: NodeId, model_ref: String) -> Self {
        Self {
            id,
            model_ref,
            position: [0.0, 0.0],
            size: DEFAULT_NODE_SIZE,
            inputs: Vec::new(),
            outputs: Vec::new(),
            native_inputs: BTreeMap::new(),
            multi_input_slots: IndexMap::new(),
            multi_output_slots: IndexMap::new(),
            keyed_as_object: BTreeMap::new(),
            constant_fields: IndexMap::new(),
            annotations: IndexMap::new(),
            title: None,
            display_name: None,
            color: None,
            extra: Map::new(),
            order: None,
            preview_only: false,
            readiness: Readiness::default(),
        }
    }

    /// Expand a model into a node instance.
    ///
    /// Every field becomes slots or values according to its role:
    /// - annotations take the fragment value or run the default factory
    /// - constants take the fragment value, then the model default
    /// - ordinary inputs get one slot, plus an editable value when native
    /// - multi-fields get one slot per key found in the fragment, or a
    ///   single placeholder slot when there are none
    ///
    /// The type tag is never taken from the fragment.
    pub fn from_model(
        id: NodeId,
        model_ref: impl Into<String>,
        model: &Model,
        fragment: Option<&Map<String, Value>>,
    ) -> Self {
        let mut node = Self::empty(id, model_ref.into());
        let provided = |name: &str| fragment.and_then(|f| f.get(name));

        for (field, role) in model.fields_with_roles() {
            let name = field.name.as_str();
            match role {
                Role::Annotation => {
                    let value = provided(name).cloned().or_else(|| match model.default_of(name) {
                        Some(DefaultValue::Factory(factory)) => run_factory(factory),
                        _ => None,
                    });
                    if let Some(value) = value {
                        node.annotations.insert(field.name.clone(), value);
                    }
                }
                Role::Constant => {
                    let value = provided(name)
                        .filter(|_| name != TYPE_TAG_FIELD)
                        .cloned()
                        .or_else(|| model.default_of(name).map(DefaultValue::to_json))
                        .unwrap_or(Value::Null);
                    node.constant_fields.insert(field.name.clone(), value);
                }
                Role::Input => {
                    let index = node.inputs.len();
                    node.inputs.push(InputSlot::new(slot_meta(field, role, None)));
                    if let Some(kind) = NativeKind::of(&field.ty) {
                        let value = model.default_of(name).map(DefaultValue::to_json).unwrap_or(Value::Null);
                        node.native_inputs.insert(
                            index,
                            NativeInput {
                                kind,
                                value,
                                optional: field.ty.is_optional(),
                                explicit: false,
                            },
                        );
                    }
                }
                Role::Output => {
                    node.outputs.push(OutputSlot::new(slot_meta(field, role, None)));
                }
                Role::MultiInput | Role::MultiOutput => {
                    let (keys, object) = multi_keys(provided(name));
                    if let Some(values) = object {
                        node.keyed_as_object.insert(field.name.clone(), values);
                    }
                    node.expand_multi(field, role, keys);
                }
            }
        }
        node
    }

    /// Create a primitive node carrying a single literal payload
    pub fn primitive(id: NodeId, kind: NativeKind, payload: Option<Value>) -> Self {
        let mut node = Self::empty(id, kind.primitive_tag());
        let meta = SlotMeta {
            field_name: PRIMITIVE_VALUE_FIELD.to_string(),
            title: None,
            description: None,
            raw_type: kind.raw_type().to_string(),
            is_multi: false,
            key: None,
            optional: false,
        };
        node.outputs.push(OutputSlot::new(meta));
        node.constant_fields
            .insert(PRIMITIVE_VALUE_FIELD.to_string(), payload.unwrap_or(Value::Null));
        node
    }

    fn expand_multi(&mut self, field: &FieldDecl, role: Role, keys: Vec<String>) {
        let keys: Vec<Option<String>> = if keys.is_empty() {
            vec![None]
        } else {
            keys.into_iter().map(Some).collect()
        };
        let mut indices = Vec::with_capacity(keys.len());
        for key in keys {
            let meta = slot_meta(field, role, key);
            if role == Role::MultiInput {
                indices.push(self.inputs.len());
                self.inputs.push(InputSlot::new(meta));
            } else {
                indices.push(self.outputs.len());
                self.outputs.push(OutputSlot::new(meta));
            }
        }
        let slots = if role == Role::MultiInput {
            &mut self.multi_input_slots
        } else {
            &mut self.multi_output_slots
        };
        slots.insert(field.name.clone(), indices);
    }

    /// Check if this node is a primitive (schema-less) node
    pub fn is_primitive(&self) -> bool {
        NativeKind::from_primitive_tag(&self.model_ref).is_some()
    }

    /// Short model name, without the schema qualifier
    pub fn model_name(&self) -> &str {
        self.model_ref
            .rsplit_once('.')
            .map_or(self.model_ref.as_str(), |(_, name)| name)
    }

    /// Get an input slot by index
    pub fn input(&self, index: usize) -> Option<&InputSlot> {
        self.inputs.get(index)
    }

    /// Get an output slot by index
    pub fn output(&self, index: usize) -> Option<&OutputSlot> {
        self.outputs.get(index)
    }

    /// Find an input slot by its internal name
    pub fn input_named(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|s| s.meta.internal_name() == name)
    }

    /// Find an output slot by its internal name
    pub fn output_named(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|s| s.meta.internal_name() == name)
    }

    /// Index of the ordinary (non-multi) input slot expanded from `field`
    pub fn input_for_field(&self, field: &str) -> Option<usize> {
        self.inputs
            .iter()
            .position(|s| !s.meta.is_multi && s.meta.field_name == field)
    }
}

/// Each slot of a multi-field carries the collection's element type
fn slot_type(field: &FieldDecl, role: Role) -> String {
    if role.is_multi() {
        if let Some(element) = element_type(field.ty.without_optional()) {
            return element;
        }
    }
    field.raw_type.clone()
}

/// Element type of a collection; for a union of collections the dict value
/// wins over the list item, since slots are keyed.
fn element_type(ty: &TypeExpr) -> Option<String> {
    let dict_value = |t: &TypeExpr| match t.without_optional() {
        TypeExpr::Dict(value) => Some(value.clone()),
        _ => None,
    };
    let list_item = |t: &TypeExpr| match t.without_optional() {
        TypeExpr::List(item) => Some(item.to_string()),
        _ => None,
    };
    match ty {
        TypeExpr::Union(variants) => variants
            .iter()
            .find_map(dict_value)
            .or_else(|| variants.iter().find_map(list_item)),
        other => dict_value(other).or_else(|| list_item(other)),
    }
}

fn slot_meta(field: &FieldDecl, role: Role, key: Option<String>) -> SlotMeta {
    SlotMeta {
        field_name: field.name.clone(),
        title: field.title.clone(),
        description: field.description.clone(),
        raw_type: slot_type(field, role),
        is_multi: role.is_multi(),
        key,
        optional: field.ty.is_optional(),
    }
}

/// Keys of a multi-field as provided in a document fragment.
///
/// Returns the keys in order (duplicates dropped) and, when they arrived as
/// an object, that object.
fn multi_keys(value: Option<&Value>) -> (Vec<String>, Option<Map<String, Value>>) {
    let (raw, object): (Vec<String>, Option<Map<String, Value>>) = match value {
        Some(Value::Array(items)) => (
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    Value::Bool(b) => Some(b.to_string()),
                    _ => None,
                })
                .collect(),
            None,
        ),
        Some(Value::Object(map)) => (map.keys().cloned().collect(), Some(map.clone())),
        _ => (Vec::new(), None),
    };
    let mut seen = BTreeSet::new();
    let keys = raw
        .into_iter()
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .collect();
    (keys, object)
}

fn run_factory(name: &str) -> Option<Value> {
    match name.rsplit('.').next()? {
        UUID_FACTORY => Some(Value::String(Uuid::new_v4().to_string())),
        _ => None,
    }
}
