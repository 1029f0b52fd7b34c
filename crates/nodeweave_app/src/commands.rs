// SPDX-License-Identifier: MIT OR Apache-2.0
//! Subcommand implementations.
//!
//! Each command builds a session from schema files, works on it and
//! returns a printable or serializable result; `main` does the I/O.

use crate::settings::{schema_name, SchemaEntry, Settings};
use anyhow::{bail, Context, Result};
use nodeweave_graph::{Document, ExportOptions, ImportOptions, ImportReport, Session};
use nodeweave_schema::Role;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Register the given schema files, or the configured ones when none are given
pub fn load_session(settings: &Settings, schemas: &[PathBuf]) -> Result<Session> {
    let entries: Vec<SchemaEntry> = if schemas.is_empty() {
        settings.schemas.clone()
    } else {
        schemas
            .iter()
            .map(|path| SchemaEntry {
                name: None,
                path: path.clone(),
            })
            .collect()
    };
    if entries.is_empty() {
        bail!("No schema files given and none configured");
    }

    let mut session = Session::with_options(settings.registry.clone());
    for entry in &entries {
        let source = fs::read_to_string(&entry.path)
            .with_context(|| format!("Failed to read schema {}", entry.path.display()))?;
        let name = entry.registry_name();
        let models = session.register_schema(&name, &source);
        if models == 0 {
            warn!(schema = %name, "Schema declares no models");
        }
    }
    Ok(session)
}

/// Read a workflow document
pub fn load_document(path: &Path) -> Result<Document> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read document {}", path.display()))?;
    Document::from_json(&text).with_context(|| format!("Failed to parse document {}", path.display()))
}

/// Human-readable listing of every registered model
pub fn describe_models(session: &Session) -> String {
    let mut out = String::new();
    for (qualified, model) in session.registry().models() {
        let _ = write!(out, "{qualified}");
        if let Some(parent) = &model.parent {
            let _ = write!(out, " ({parent})");
        }
        if let Some(title) = &model.info.title {
            let _ = write!(out, " - {title}");
        }
        out.push('\n');
        for (field, role) in model.fields_with_roles() {
            let marker = match role {
                Role::Annotation => "annotation",
                Role::Constant => "constant",
                Role::Input => "input",
                Role::Output => "output",
                Role::MultiInput => "multi-input",
                Role::MultiOutput => "multi-output",
            };
            let _ = write!(out, "  {:<12} {}: {}", marker, field.name, field.raw_type);
            if let Some(default) = model.default_of(&field.name) {
                let _ = write!(out, " = {}", default.to_json());
            }
            out.push('\n');
        }
    }
    out
}

/// Every registered model, serialized, keyed by qualified name
pub fn models_json(session: &Session) -> Result<Value> {
    let mut map = Map::new();
    for (qualified, model) in session.registry().models() {
        map.insert(qualified, serde_json::to_value(model)?);
    }
    Ok(Value::Object(map))
}

/// Readiness of one imported node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeStatus {
    /// Position in the document
    pub index: Option<usize>,
    /// Model the node was created from
    pub model: String,
    /// Every required field is filled
    pub local: bool,
    /// The node and its upstream are complete
    pub chain: bool,
    /// Required fields still unfilled
    pub missing: Vec<String>,
}

/// Outcome of `check`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckReport {
    /// Import outcome
    pub import: ImportReport,
    /// Per-node readiness, in document order
    pub nodes: Vec<NodeStatus>,
}

impl CheckReport {
    /// Every node made it in and is chain complete
    pub fn is_ready(&self) -> bool {
        self.import.is_clean() && self.nodes.iter().all(|n| n.chain)
    }

    /// Human-readable summary
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} node(s), {} link(s)", self.import.nodes, self.import.links);
        for skipped in &self.import.skipped_nodes {
            let _ = writeln!(out, "  skipped node #{} of unknown type {:?}", skipped.index, skipped.node_type);
        }
        for skipped in &self.import.skipped_edges {
            let _ = writeln!(out, "  skipped edge #{}: {}", skipped.index, skipped.reason);
        }
        for node in &self.nodes {
            let index = node.index.map_or_else(|| "-".to_string(), |i| i.to_string());
            let state = match (node.local, node.chain) {
                (_, true) => "ready",
                (true, false) => "waiting on upstream",
                (false, false) => "incomplete",
            };
            let _ = write!(out, "  #{index} {} {state}", node.model);
            if !node.missing.is_empty() {
                let _ = write!(out, " (missing: {})", node.missing.join(", "));
            }
            out.push('\n');
        }
        out
    }
}

/// Import a document and collect readiness per node
pub fn check(session: &mut Session, document: &Document, options: &ImportOptions) -> CheckReport {
    let import = session.import_document(document, options);
    let nodes = session
        .graph()
        .nodes()
        .map(|node| NodeStatus {
            index: node.order,
            model: node.model_ref.clone(),
            local: node.readiness.local,
            chain: node.readiness.chain,
            missing: node.readiness.missing.clone(),
        })
        .collect();
    CheckReport { import, nodes }
}

/// Import a document and export it again
pub fn roundtrip(
    session: &mut Session,
    document: &Document,
    import: &ImportOptions,
    export: &ExportOptions,
) -> (ImportReport, Document) {
    let report = session.import_document(document, import);
    let exported = session.export_document(export);
    debug!(nodes = exported.nodes.len(), edges = exported.edges.len(), "Round trip done");
    (report, exported)
}

/// Import a document and run a pass-through preview; results are keyed by
/// document index
pub fn preview(session: &mut Session, document: &Document, options: &ImportOptions) -> Value {
    session.import_document(document, options);
    let outputs = session.evaluate_preview();
    let mut nodes: Vec<_> = session.graph().nodes().collect();
    nodes.sort_by_key(|n| (n.order, n.id));

    let mut map = Map::new();
    for node in nodes {
        let key = node.order.map_or_else(|| node.id.to_string(), |i| i.to_string());
        let value = outputs.get(&node.id).cloned().map(Value::Object).unwrap_or(Value::Null);
        map.insert(key, value);
    }
    Value::Object(map)
}

/// Write a default settings file listing the given schemas
pub fn init_config(path: &Path, schemas: &[PathBuf], force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let mut settings = Settings::default();
    settings.schemas = schemas
        .iter()
        .map(|p| SchemaEntry {
            name: Some(schema_name(p)),
            path: p.clone(),
        })
        .collect();
    settings
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SCHEMA: &str = r#"
@node_info(title="Counter", section="Demo")
class Counter(BaseModel):
    type: Annotated[Literal["counter"], FieldRole.CONSTANT] = "counter"
    start: Annotated[int, FieldRole.INPUT]
    value: Annotated[int, FieldRole.OUTPUT] = None
"#;

    fn session() -> Session {
        let mut session = Session::new();
        session.register_schema("demo", SCHEMA);
        session
    }

    fn document() -> Document {
        serde_json::from_value(json!({
            "type": "workflow",
            "nodes": [
                {"type": "counter", "start": 1},
                {"type": "counter"},
                {"type": "ghost"}
            ],
            "edges": [
                {"type": "edge", "source": 0, "target": 1, "source_slot": "value", "target_slot": "start"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_describe_models() {
        let text = describe_models(&session());
        assert!(text.starts_with("demo.Counter - Counter\n"));
        assert!(text.contains("  constant     type: Literal[\"counter\"] = \"counter\""));
        assert!(text.contains("  input        start: int\n"));
    }

    #[test]
    fn test_check_reports_readiness() {
        let mut session = session();
        let report = check(&mut session, &document(), &ImportOptions::default());
        assert_eq!(report.import.skipped_nodes.len(), 1);
        assert_eq!(report.nodes.len(), 2);
        assert!(report.nodes.iter().all(|n| n.chain));
        assert!(!report.is_ready());
        assert!(report.render().contains("skipped node #2"));
    }

    #[test]
    fn test_preview_is_keyed_by_index() {
        let mut session = session();
        let value = preview(&mut session, &document(), &ImportOptions::default());
        assert_eq!(value["0"]["start"], json!(1));
        assert_eq!(value["1"]["type"], json!("counter"));
    }

    #[test]
    fn test_load_session_needs_schemas() {
        let err = load_session(&Settings::default(), &[]).unwrap_err();
        assert!(err.to_string().contains("No schema files"));
    }
}
