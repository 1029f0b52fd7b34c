// SPDX-License-Identifier: MIT OR Apache-2.0
//! Slot definitions for node inputs/outputs.

use crate::connection::LinkId;
use nodeweave_schema::TypeExpr;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Slot direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotDirection {
    /// Input slot
    Input,
    /// Output slot
    Output,
}

/// Types that can be edited in place when no link feeds the slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeKind {
    /// Boolean value
    Boolean,
    /// Integer value
    Integer,
    /// Floating point value
    Real,
    /// String value
    String,
    /// One of a fixed set of literals
    Choice,
    /// JSON array
    List,
    /// JSON object
    Dictionary,
}

impl NativeKind {
    /// Classify a field type, looking through one optional wrapper
    pub fn of(ty: &TypeExpr) -> Option<Self> {
        match ty.without_optional() {
            TypeExpr::Basic(name) => Self::from_name(name),
            TypeExpr::List(_) => Some(Self::List),
            TypeExpr::Dict(_) => Some(Self::Dictionary),
            _ => None,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "bool" => Some(Self::Boolean),
            "int" | "index" => Some(Self::Integer),
            "float" => Some(Self::Real),
            "str" | "string" => Some(Self::String),
            _ if name.starts_with("Literal[") => Some(Self::Choice),
            _ => None,
        }
    }

    /// The wire tag of this kind
    pub fn tag(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::String => "string",
            Self::Choice => "choice",
            Self::List => "list",
            Self::Dictionary => "dictionary",
        }
    }

    /// The raw type a primitive node of this kind produces
    pub fn raw_type(self) -> &'static str {
        match self {
            Self::Boolean => "bool",
            Self::Integer => "int",
            Self::Real => "float",
            Self::String | Self::Choice => "str",
            Self::List => "List[Any]",
            Self::Dictionary => "Dict[str, Any]",
        }
    }

    /// Resolve a reserved primitive document type such as `$int`
    pub fn from_primitive_tag(tag: &str) -> Option<Self> {
        match tag.strip_prefix(PRIMITIVE_PREFIX)? {
            "bool" => Some(Self::Boolean),
            "int" => Some(Self::Integer),
            "float" => Some(Self::Real),
            "str" => Some(Self::String),
            "list" => Some(Self::List),
            "dict" => Some(Self::Dictionary),
            _ => None,
        }
    }

    /// The reserved primitive document type for this kind
    pub fn primitive_tag(self) -> String {
        let name = match self {
            Self::Boolean => "bool",
            Self::Integer => "int",
            Self::Real => "float",
            Self::String | Self::Choice => "str",
            Self::List => "list",
            Self::Dictionary => "dict",
        };
        format!("{PRIMITIVE_PREFIX}{name}")
    }
}

/// Prefix marking document types that bypass schema lookup
pub const PRIMITIVE_PREFIX: &str = "$";

/// Whether a value counts as "nothing entered".
///
/// Booleans are never empty; `false` is a real answer.
pub fn value_is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Wiring metadata of a slot, independent of its display name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotMeta {
    /// Name of the schema field the slot was expanded from
    pub field_name: String,
    /// Field title
    pub title: Option<String>,
    /// Field description
    pub description: Option<String>,
    /// Field type as declared
    pub raw_type: String,
    /// Whether the field expands to keyed slots
    pub is_multi: bool,
    /// Key of an expanded multi-slot; `None` for ordinary slots and the
    /// placeholder slot of a multi-field with no keys yet
    pub key: Option<String>,
    /// Whether the field type admits absence
    pub optional: bool,
}

impl SlotMeta {
    /// Name used for wiring and serialization: `field` or `field.key`
    pub fn internal_name(&self) -> String {
        match &self.key {
            Some(key) => format!("{}.{}", self.field_name, key),
            None => self.field_name.clone(),
        }
    }

    /// Human label: the field title, suffixed with the key for multi-slots
    pub fn display_name(&self) -> String {
        let base = self.title.as_deref().unwrap_or(&self.field_name);
        match &self.key {
            Some(key) => format!("{base} [{key}]"),
            None => base.to_string(),
        }
    }
}

/// An input slot on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSlot {
    /// Display name
    pub name: String,
    /// Accepted type
    pub raw_type: String,
    /// Inbound link, at most one
    pub link: Option<LinkId>,
    /// Wiring metadata
    pub meta: SlotMeta,
}

impl InputSlot {
    /// Create an unlinked input slot
    pub fn new(meta: SlotMeta) -> Self {
        Self {
            name: meta.display_name(),
            raw_type: meta.raw_type.clone(),
            link: None,
            meta,
        }
    }
}

/// An output slot on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSlot {
    /// Display name
    pub name: String,
    /// Produced type
    pub raw_type: String,
    /// Outbound links (fan-out allowed)
    pub links: Vec<LinkId>,
    /// Wiring metadata
    pub meta: SlotMeta,
}

impl OutputSlot {
    /// Create an unlinked output slot
    pub fn new(meta: SlotMeta) -> Self {
        Self {
            name: meta.display_name(),
            raw_type: meta.raw_type.clone(),
            links: Vec::new(),
            meta,
        }
    }
}

/// Editable value of an ordinary input slot whose type is native
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeInput {
    /// Value kind
    pub kind: NativeKind,
    /// Current value
    pub value: Value,
    /// Whether the slot may be left empty
    pub optional: bool,
    /// Set once the value comes from a document or an edit rather than
    /// from the schema default
    pub explicit: bool,
}
