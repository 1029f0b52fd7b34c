// SPDX-License-Identifier: MIT OR Apache-2.0
//! Resolved schema data: models, fields, roles and defaults.

use crate::type_expr::TypeExpr;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the constant field that carries a model's document type tag.
pub const TYPE_TAG_FIELD: &str = "type";

/// What a field is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Metadata only, never materialized as a slot
    Annotation,
    /// Baked literal stored on the instance
    Constant,
    /// One input slot
    Input,
    /// One output slot
    Output,
    /// Variable-arity keyed input slots
    MultiInput,
    /// Variable-arity keyed output slots
    MultiOutput,
}

impl Role {
    /// Parse a role marker such as `FieldRole.MULTI_INPUT` or `input`.
    pub fn from_marker(marker: &str) -> Option<Self> {
        let name = marker.trim().rsplit('.').next()?.trim();
        match name.to_ascii_lowercase().as_str() {
            "annotation" => Some(Self::Annotation),
            "constant" => Some(Self::Constant),
            "input" => Some(Self::Input),
            "output" => Some(Self::Output),
            "multi_input" => Some(Self::MultiInput),
            "multi_output" => Some(Self::MultiOutput),
            _ => None,
        }
    }

    /// Whether the role expands to keyed slots
    pub fn is_multi(self) -> bool {
        matches!(self, Self::MultiInput | Self::MultiOutput)
    }

    /// Whether the role produces input-side slots
    pub fn is_input(self) -> bool {
        matches!(self, Self::Input | Self::MultiInput)
    }

    /// Whether the role produces output-side slots
    pub fn is_output(self) -> bool {
        matches!(self, Self::Output | Self::MultiOutput)
    }
}

/// A normalized default value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    /// `None`, booleans, strings, numbers, `[]` and `{}`
    Literal(Value),
    /// A two-argument message constructor: type label plus payload
    Message {
        /// Message type label
        kind: String,
        /// Message payload
        value: Value,
    },
    /// `default_factory=<name>`, evaluated at instantiation time
    Factory(String),
    /// Any expression the scanner does not understand, kept verbatim
    Opaque(String),
}

impl DefaultValue {
    /// The JSON value a fresh instance starts with.
    ///
    /// Factories have no static value and map to `null`.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Message { kind, value } => {
                serde_json::json!({ "type": kind, "value": value })
            }
            Self::Factory(_) => Value::Null,
            Self::Opaque(text) => Value::String(text.clone()),
        }
    }

    /// The literal string, if this default is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Literal(Value::String(s)) => Some(s),
            _ => None,
        }
    }
}

/// One declared field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    /// Field name as declared
    pub name: String,
    /// Parsed type
    pub ty: TypeExpr,
    /// Type text with annotations stripped and aliases substituted
    pub raw_type: String,
    /// Human title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Human description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared as a computed accessor rather than a stored field
    #[serde(default)]
    pub computed: bool,
}

impl FieldDecl {
    /// Create a field from a raw type string
    pub fn new(name: impl Into<String>, raw_type: impl Into<String>) -> Self {
        let raw_type = raw_type.into();
        Self {
            name: name.into(),
            ty: TypeExpr::parse(&raw_type),
            raw_type,
            title: None,
            description: None,
            computed: false,
        }
    }

    /// The title, falling back to the field name
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }
}

/// Presentation metadata attached to a declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Display title
    pub title: Option<String>,
    /// Short description
    pub description: Option<String>,
    /// Icon glyph
    pub icon: Option<String>,
    /// Palette section
    pub section: Option<String>,
    /// Whether the model is offered in palettes
    pub visible: bool,
}

impl Default for ModelInfo {
    fn default() -> Self {
        Self {
            title: None,
            description: None,
            icon: None,
            section: None,
            visible: true,
        }
    }
}

/// A flattened model: inherited fields merged, roles and defaults resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Declaration name
    pub name: String,
    /// Declared parent, if it is part of the same schema
    pub parent: Option<String>,
    /// Presentation metadata
    pub info: ModelInfo,
    /// Fields in resolved order
    pub fields: Vec<FieldDecl>,
    /// Role of every field
    pub roles: IndexMap<String, Role>,
    /// Defaults of the fields that declare one
    pub defaults: IndexMap<String, DefaultValue>,
}

impl Model {
    /// Create an empty model
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            info: ModelInfo::default(),
            fields: Vec::new(),
            roles: IndexMap::new(),
            defaults: IndexMap::new(),
        }
    }

    /// Append a field with its role and optional default
    pub fn with_field(mut self, field: FieldDecl, role: Role, default: Option<DefaultValue>) -> Self {
        if let Some(default) = default {
            self.defaults.insert(field.name.clone(), default);
        }
        self.roles.insert(field.name.clone(), role);
        self.fields.push(field);
        self
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Role of a field
    pub fn role(&self, name: &str) -> Option<Role> {
        self.roles.get(name).copied()
    }

    /// Default of a field
    pub fn default_of(&self, name: &str) -> Option<&DefaultValue> {
        self.defaults.get(name)
    }

    /// Fields paired with their roles, in order
    pub fn fields_with_roles(&self) -> impl Iterator<Item = (&FieldDecl, Role)> {
        self.fields
            .iter()
            .map(|f| (f, self.roles.get(&f.name).copied().unwrap_or(Role::Input)))
    }

    /// The document type tag: the literal default of the `type` constant.
    pub fn type_tag(&self) -> Option<&str> {
        if self.role(TYPE_TAG_FIELD) != Some(Role::Constant) {
            return None;
        }
        self.default_of(TYPE_TAG_FIELD)?.as_str()
    }
}

/// Everything extracted from one schema source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Models by declaration name, in declaration order
    pub models: IndexMap<String, Model>,
    /// Module-level constants
    pub constants: IndexMap<String, DefaultValue>,
    /// Module-level type aliases (name to raw type)
    pub aliases: IndexMap<String, String>,
}

impl Schema {
    /// Look up a model
    pub fn model(&self, name: &str) -> Option<&Model> {
        self.models.get(name)
    }

    /// Number of models
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether no model was found
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
