// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry of named schemas and document type resolution.

use indexmap::IndexMap;
use nodeweave_schema::{parse_schema, Model, Schema};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// How document type names are matched to models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryOptions {
    /// Suffixes tried when a document type names a model without its
    /// conventional suffix (`start` finds `StartFlow`)
    pub suffixes: Vec<String>,
    /// Explicit document type to model name mappings, checked first
    pub aliases: IndexMap<String, String>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            suffixes: ["Flow", "Config", "Type"].map(String::from).to_vec(),
            aliases: IndexMap::new(),
        }
    }
}

/// Registry of parsed schemas, keyed by schema name
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: IndexMap<String, Schema>,
    by_tag: HashMap<String, String>,
    options: RegistryOptions,
}

impl SchemaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry with custom type resolution
    pub fn with_options(options: RegistryOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Type resolution options
    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    /// Parse and register a schema, replacing one with the same name
    pub fn register(&mut self, name: impl Into<String>, source: &str) -> &Schema {
        self.register_parsed(name, parse_schema(source))
    }

    /// Register an already parsed schema
    pub fn register_parsed(&mut self, name: impl Into<String>, schema: Schema) -> &Schema {
        let name = name.into();
        info!(schema = %name, models = schema.len(), "Registered schema");
        self.schemas.insert(name.clone(), schema);
        self.reindex();
        &self.schemas[&name]
    }

    /// Remove a schema; returns whether it existed
    pub fn remove(&mut self, name: &str) -> bool {
        let removed = self.schemas.shift_remove(name).is_some();
        if removed {
            info!(schema = %name, "Removed schema");
            self.reindex();
        }
        removed
    }

    fn reindex(&mut self) {
        self.by_tag.clear();
        for (schema_name, schema) in &self.schemas {
            for model in schema.models.values() {
                if let Some(tag) = model.type_tag() {
                    self.by_tag
                        .entry(tag.to_string())
                        .or_insert_with(|| qualify(schema_name, &model.name));
                }
            }
        }
    }

    /// Get a schema by name
    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    /// Registered schema names, in registration order
    pub fn schema_names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Every model with its qualified name
    pub fn models(&self) -> impl Iterator<Item = (String, &Model)> {
        self.schemas.iter().flat_map(|(schema_name, schema)| {
            schema
                .models
                .values()
                .map(move |model| (qualify(schema_name, &model.name), model))
        })
    }

    /// Look up a model by `schema.Model` or by bare model name
    pub fn model(&self, reference: &str) -> Option<&Model> {
        let qualified = self.qualified(reference)?;
        let (schema, model) = qualified.rsplit_once('.')?;
        self.schemas.get(schema)?.model(model)
    }

    /// The qualified name of a model given by `schema.Model` or bare name
    pub fn qualified(&self, reference: &str) -> Option<String> {
        if let Some((schema, model)) = reference.rsplit_once('.') {
            if self.schemas.get(schema).is_some_and(|s| s.model(model).is_some()) {
                return Some(reference.to_string());
            }
        }
        self.schemas
            .iter()
            .find(|(_, schema)| schema.model(reference).is_some())
            .map(|(schema_name, _)| qualify(schema_name, reference))
    }

    /// Resolve a document type name to a qualified model name.
    ///
    /// Tries, in order: the alias table, the declared type tags, the name
    /// itself, its `PascalCase` form, then each conventional suffix.
    pub fn resolve_type(&self, doc_type: &str) -> Option<String> {
        if let Some(target) = self.options.aliases.get(doc_type) {
            if let Some(found) = self.qualified(target) {
                return Some(found);
            }
        }
        if let Some(found) = self.by_tag.get(doc_type) {
            return Some(found.clone());
        }

        let pascal = pascal_case(doc_type);
        let mut candidates = vec![doc_type.to_string(), pascal.clone()];
        for suffix in &self.options.suffixes {
            candidates.push(format!("{pascal}{suffix}"));
            candidates.push(format!("{doc_type}{suffix}"));
        }
        let found = candidates.iter().find_map(|c| self.qualified(c));
        if found.is_none() {
            debug!(doc_type, "No model for document type");
        }
        found
    }
}

fn qualify(schema: &str, model: &str) -> String {
    format!("{schema}.{model}")
}

/// `snake_case`, `kebab-case` and spaced names to `PascalCase`
fn pascal_case(name: &str) -> String {
    name.split(['_', '-', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLOW: &str = r#"
class StartFlow(BaseModel):
    type: Annotated[Literal["start_flow"], FieldRole.CONSTANT] = "start_flow"

class BackendConfig(BaseModel):
    type: Annotated[Literal["backend"], FieldRole.CONSTANT] = "backend"

class DataTensor(BaseModel):
    rank: Annotated[int, FieldRole.INPUT] = 1
"#;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry.register("flow", FLOW);
        registry
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = registry();
        assert!(registry.model("StartFlow").is_some());
        assert!(registry.model("flow.BackendConfig").is_some());
        assert!(registry.model("other.BackendConfig").is_none());
        assert_eq!(registry.models().count(), 3);
    }

    #[test]
    fn test_resolve_type() {
        let registry = registry();
        assert_eq!(registry.resolve_type("start_flow").as_deref(), Some("flow.StartFlow"));
        assert_eq!(registry.resolve_type("backend").as_deref(), Some("flow.BackendConfig"));
        assert_eq!(registry.resolve_type("data_tensor").as_deref(), Some("flow.DataTensor"));
        assert_eq!(registry.resolve_type("start").as_deref(), Some("flow.StartFlow"));
        assert_eq!(registry.resolve_type("nothing"), None);
    }

    #[test]
    fn test_alias_table() {
        let mut options = RegistryOptions::default();
        options.aliases.insert("entry".to_string(), "StartFlow".to_string());
        let mut registry = SchemaRegistry::with_options(options);
        registry.register("flow", FLOW);
        assert_eq!(registry.resolve_type("entry").as_deref(), Some("flow.StartFlow"));
    }

    #[test]
    fn test_remove_schema() {
        let mut registry = registry();
        assert!(registry.remove("flow"));
        assert!(!registry.remove("flow"));
        assert_eq!(registry.resolve_type("backend"), None);
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(pascal_case("data_tensor"), "DataTensor");
        assert_eq!(pascal_case("loop-start"), "LoopStart");
        assert_eq!(pascal_case("Agent"), "Agent");
    }
}
