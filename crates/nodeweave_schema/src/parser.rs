// SPDX-License-Identifier: MIT OR Apache-2.0
//! Declaration scanner.
//!
//! The schema language is a narrow, fixed subset of class-style declarations:
//!
//! ```text
//! DEFAULT_STEP : int = 1
//! Payload = Union[List[str], Dict[str, Any]]
//!
//! @node_info(title="Counter", section="Tutorial")
//! class Counter(InteractiveType):
//!     type  : Annotated[Literal["counter"], FieldRole.CONSTANT] = "counter"
//!     step  : Annotated[int, FieldRole.INPUT] = Field(default=DEFAULT_STEP, description="Increment")
//!     items : Annotated[Payload, FieldRole.MULTI_INPUT] = None
//!
//!     @property
//!     def value(self) -> Annotated[int, FieldRole.OUTPUT]:
//!         return self.step
//! ```
//!
//! Scanning is best-effort: a line that does not fit the grammar is skipped,
//! never reported as an error.

use crate::model::{DefaultValue, FieldDecl, Model, ModelInfo, Role, Schema};
use crate::text::{
    bracket_delta, find_top_level_assign, indent_of, split_call, split_top_level, strip_comment,
    unquote,
};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

/// Prefix of implementation-private members, which are never fields.
const PRIVATE_PREFIX: char = '_';

/// Bases that belong to the host language rather than to the schema.
const FOREIGN_BASES: &[&str] = &["BaseModel", "object", "str", "int", "Enum", "Generic", "ABC"];

/// The host base every declared model ultimately derives from.
const MODEL_BASE: &str = "BaseModel";

/// Decorator that carries presentation metadata for the next block.
const INFO_DECORATOR: &str = "node_info";

/// Member decorators that turn the next `def` into a computed field.
const ACCESSOR_DECORATORS: &[&str] = &["property", "computed_field"];

/// Call forms recognized as two-argument message constructors.
const MESSAGE_CONSTRUCTORS: &[&str] = &["Message", "Message.of"];

/// Maximum alias expansion passes (aliases may refer to aliases).
const ALIAS_PASSES: usize = 4;

static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^class\s+([A-Za-z_]\w*)\s*(?:\((.*)\))?\s*:$").unwrap());
static DECORATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@([A-Za-z_][\w.]*)\s*(?:\((.*)\))?$").unwrap());
static FIELD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Za-z_]\w*)\s*:\s*(\S.*)$").unwrap());
static ACCESSOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^def\s+([A-Za-z_]\w*)\s*\(.*\)\s*->\s*(.+):$").unwrap());
static BINDING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_]\w*)\s*(?::\s*([^=]+?))?\s*=\s*(.+)$").unwrap());
static CONSTANT_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").unwrap());
static IDENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z_][\w.]*").unwrap());
static INT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+]?\d+$").unwrap());
static FLOAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-+]?(?:\d+\.\d*|\.\d+|\d+)(?:[eE][-+]?\d+)?$").unwrap());

/// Parse one schema source into resolved models.
pub fn parse_schema(source: &str) -> Schema {
    let lines = logical_lines(source);
    let (constants, aliases) = module_bindings(&lines);

    let mut scanner = Scanner {
        constants: &constants,
        aliases: &aliases,
        current: None,
        pending_info: None,
        blocks: IndexMap::new(),
    };
    for line in &lines {
        scanner.feed(line);
    }
    let blocks = scanner.finish();
    let models = resolve(&blocks);

    tracing::debug!(
        models = models.len(),
        constants = constants.len(),
        aliases = aliases.len(),
        "parsed schema source"
    );

    Schema {
        models,
        constants,
        aliases,
    }
}

/// Join declarations that span lines and drop docstrings and comments.
fn logical_lines(source: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut pending = String::new();
    let mut depth = 0i32;
    let mut in_docstring = false;

    for raw in source.lines() {
        let trimmed = raw.trim();
        let fences = trimmed.matches("\"\"\"").count() + trimmed.matches("'''").count();

        if in_docstring {
            if fences % 2 == 1 {
                in_docstring = false;
            }
            continue;
        }
        if depth == 0 && (trimmed.starts_with("\"\"\"") || trimmed.starts_with("'''")) {
            in_docstring = fences % 2 == 1;
            continue;
        }

        let line = strip_comment(raw).trim_end();
        if depth == 0 {
            pending.push_str(line);
        } else {
            pending.push(' ');
            pending.push_str(line.trim());
        }

        depth += bracket_delta(line);
        if depth <= 0 {
            depth = 0;
            out.push(std::mem::take(&mut pending));
        }
    }

    if !pending.is_empty() {
        out.push(pending);
    }
    out
}

/// Collect module-level `NAME = literal` constants and `Name = type` aliases.
fn module_bindings(lines: &[String]) -> (IndexMap<String, DefaultValue>, IndexMap<String, String>) {
    let mut constants = IndexMap::new();
    let mut aliases: IndexMap<String, String> = IndexMap::new();

    for line in lines {
        if line.trim().is_empty() || indent_of(line) > 0 {
            continue;
        }
        let Some(caps) = BINDING_RE.captures(line.trim()) else {
            continue;
        };
        let name = &caps[1];
        let annotation = caps.get(2).map(|m| m.as_str().trim());
        let rhs = caps[3].trim();

        if CONSTANT_NAME_RE.is_match(name) {
            if let Some(value) = parse_default(rhs, &constants) {
                constants.insert(name.to_string(), value);
            }
        } else if name.starts_with(|c: char| c.is_ascii_uppercase())
            && annotation.map_or(true, |a| a == "TypeAlias")
            && looks_like_type(rhs)
        {
            let expanded = substitute_aliases(rhs, &aliases);
            aliases.insert(name.to_string(), expanded);
        }
    }

    (constants, aliases)
}

fn looks_like_type(rhs: &str) -> bool {
    rhs.starts_with(|c: char| c.is_ascii_alphabetic())
        && !rhs.contains('(')
        && unquote(rhs).is_none()
        && !CONSTANT_NAME_RE.is_match(rhs)
}

/// Replace alias names appearing as identifiers in a type expression.
fn substitute_aliases(raw: &str, aliases: &IndexMap<String, String>) -> String {
    let mut current = raw.trim().to_string();
    if aliases.is_empty() {
        return current;
    }
    for _ in 0..ALIAS_PASSES {
        let next = IDENT_RE
            .replace_all(&current, |caps: &regex::Captures<'_>| {
                let ident = &caps[0];
                aliases.get(ident).cloned().unwrap_or_else(|| ident.to_string())
            })
            .into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Normalize a default-value expression.
///
/// Returns `None` for "no default" (`...` or empty).
fn parse_default(expr: &str, constants: &IndexMap<String, DefaultValue>) -> Option<DefaultValue> {
    let e = expr.trim();
    let literal = |v: Value| Some(DefaultValue::Literal(v));

    match e {
        "" | "..." => return None,
        "None" | "null" => return literal(Value::Null),
        "True" | "true" => return literal(Value::Bool(true)),
        "False" | "false" => return literal(Value::Bool(false)),
        "[]" | "list()" => return literal(Value::Array(Vec::new())),
        "{}" | "dict()" => return literal(Value::Object(serde_json::Map::new())),
        _ => {}
    }

    if let Some(text) = unquote(e) {
        return literal(Value::String(text));
    }
    if INT_RE.is_match(e) {
        if let Ok(n) = e.parse::<i64>() {
            return literal(Value::from(n));
        }
    }
    if FLOAT_RE.is_match(e) {
        if let Ok(n) = e.parse::<f64>() {
            return literal(Value::from(n));
        }
    }
    if let Some((head, inner)) = split_call(e, '(') {
        if MESSAGE_CONSTRUCTORS.contains(&head) {
            let args = split_top_level(inner, ',');
            if let [kind, value] = args.as_slice() {
                let kind = unquote(kind).unwrap_or_else(|| kind.to_string());
                let value = parse_default(value, constants)
                    .map(|d| d.to_json())
                    .unwrap_or(Value::Null);
                return Some(DefaultValue::Message { kind, value });
            }
        }
    }
    if let Some(constant) = constants.get(e) {
        return Some(constant.clone());
    }

    Some(DefaultValue::Opaque(e.to_string()))
}

/// Metadata gathered from `Field(...)` calls and defaults.
#[derive(Default)]
struct FieldMeta {
    title: Option<String>,
    description: Option<String>,
    default: Option<DefaultValue>,
}

/// A declaration block as scanned, before inheritance is applied.
#[derive(Default)]
struct Block {
    parent: Option<String>,
    /// Derives from the model base or from another declaration
    model_root: bool,
    info: ModelInfo,
    fields: Vec<FieldDecl>,
    roles: IndexMap<String, Role>,
    defaults: IndexMap<String, DefaultValue>,
    member_indent: Option<usize>,
    accessor_pending: bool,
}

impl Block {
    fn add_field(&mut self, field: FieldDecl, role: Role, default: Option<DefaultValue>) {
        match default {
            Some(default) => {
                self.defaults.insert(field.name.clone(), default);
            }
            None => {
                self.defaults.shift_remove(&field.name);
            }
        }
        self.roles.insert(field.name.clone(), role);
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(slot) => *slot = field,
            None => self.fields.push(field),
        }
    }
}

struct Scanner<'a> {
    constants: &'a IndexMap<String, DefaultValue>,
    aliases: &'a IndexMap<String, String>,
    current: Option<(String, Block)>,
    pending_info: Option<ModelInfo>,
    blocks: IndexMap<String, Block>,
}

impl Scanner<'_> {
    fn feed(&mut self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }

        if indent_of(line) == 0 {
            self.feed_top_level(trimmed);
        } else {
            self.feed_member(line, trimmed);
        }
    }

    fn feed_top_level(&mut self, trimmed: &str) {
        if let Some(caps) = DECORATOR_RE.captures(trimmed) {
            self.close_block();
            if &caps[1] == INFO_DECORATOR {
                let args = caps.get(2).map_or("", |m| m.as_str());
                self.pending_info = Some(self.parse_info(args));
            }
            return;
        }

        if let Some(caps) = HEADER_RE.captures(trimmed) {
            self.close_block();
            let name = caps[1].to_string();
            let bases = caps.get(2).map_or("", |m| m.as_str());
            let parent = first_schema_base(bases);
            let model_root = parent.is_some() || has_model_base(bases);
            let block = Block {
                parent,
                model_root,
                info: self.pending_info.take().unwrap_or_default(),
                ..Block::default()
            };
            self.current = Some((name, block));
            return;
        }

        self.close_block();
        self.pending_info = None;
    }

    fn feed_member(&mut self, line: &str, trimmed: &str) {
        let constants = self.constants;
        let aliases = self.aliases;
        let Some((_, block)) = self.current.as_mut() else {
            return;
        };

        let indent = indent_of(line);
        let member_indent = *block.member_indent.get_or_insert(indent);
        if indent != member_indent {
            return;
        }

        if let Some(decorator) = trimmed.strip_prefix('@') {
            let name = decorator.split('(').next().unwrap_or("").trim();
            block.accessor_pending = ACCESSOR_DECORATORS.contains(&name);
            return;
        }

        if trimmed.starts_with("def ") {
            let is_accessor = std::mem::take(&mut block.accessor_pending);
            if !is_accessor {
                return;
            }
            let Some(caps) = ACCESSOR_RE.captures(trimmed) else {
                tracing::trace!(line = trimmed, "skipping unrecognized accessor");
                return;
            };
            let name = &caps[1];
            if name.starts_with(PRIVATE_PREFIX) {
                return;
            }
            let mut meta = FieldMeta::default();
            let (raw_type, role) = unwrap_annotated(caps[2].trim(), &mut meta, constants);
            let mut field = FieldDecl::new(name, substitute_aliases(&raw_type, aliases));
            field.title = meta.title;
            field.description = meta.description;
            field.computed = true;
            block.add_field(field, role.unwrap_or(Role::Output), None);
            return;
        }
        block.accessor_pending = false;

        let Some(caps) = FIELD_RE.captures(trimmed) else {
            tracing::trace!(line = trimmed, "skipping non-field member line");
            return;
        };
        let name = &caps[1];
        if name.starts_with(PRIVATE_PREFIX) {
            return;
        }
        if let Some((field, role, default)) = parse_field(name, &caps[2], constants, aliases) {
            block.add_field(field, role, default);
        }
    }

    fn parse_info(&self, args: &str) -> ModelInfo {
        let mut info = ModelInfo::default();
        for arg in split_top_level(args, ',') {
            let Some(eq) = find_top_level_assign(arg) else {
                continue;
            };
            let key = arg[..eq].trim();
            let value = arg[eq + 1..].trim();
            match key {
                "title" => info.title = text_value(value, self.constants),
                "description" => info.description = text_value(value, self.constants),
                "icon" => info.icon = text_value(value, self.constants),
                "section" => info.section = text_value(value, self.constants),
                "visible" => info.visible = value != "False",
                _ => {}
            }
        }
        info
    }

    fn close_block(&mut self) {
        if let Some((name, block)) = self.current.take() {
            self.blocks.insert(name, block);
        }
    }

    fn finish(mut self) -> IndexMap<String, Block> {
        self.close_block();
        self.blocks
    }
}

/// First base in a parent list that could be a schema declaration.
fn first_schema_base(bases: &str) -> Option<String> {
    split_top_level(bases, ',')
        .into_iter()
        .filter(|b| !b.is_empty() && !b.contains('='))
        .map(|b| b.split('[').next().unwrap_or(b).trim())
        .find(|b| !FOREIGN_BASES.contains(b))
        .map(str::to_string)
}

fn has_model_base(bases: &str) -> bool {
    split_top_level(bases, ',')
        .into_iter()
        .any(|b| b.split('[').next().unwrap_or(b).trim() == MODEL_BASE)
}

/// Parse the right-hand side of `name: <rhs>`.
fn parse_field(
    name: &str,
    rhs: &str,
    constants: &IndexMap<String, DefaultValue>,
    aliases: &IndexMap<String, String>,
) -> Option<(FieldDecl, Role, Option<DefaultValue>)> {
    let (type_part, default_part) = match find_top_level_assign(rhs) {
        Some(eq) => (rhs[..eq].trim(), Some(rhs[eq + 1..].trim())),
        None => (rhs.trim(), None),
    };
    if type_part.is_empty() {
        return None;
    }

    let mut meta = FieldMeta::default();
    let (raw_type, role) = unwrap_annotated(type_part, &mut meta, constants);
    if let Some(expr) = default_part {
        match split_call(expr, '(') {
            Some(("Field", inner)) => apply_field_call(inner, &mut meta, constants),
            _ => meta.default = parse_default(expr, constants),
        }
    }

    let mut field = FieldDecl::new(name, substitute_aliases(&raw_type, aliases));
    field.title = meta.title;
    field.description = meta.description;
    Some((field, role.unwrap_or(Role::Input), meta.default))
}

/// Strip an `Annotated[T, marker, ...]` wrapper, returning `T` and the role marker.
fn unwrap_annotated(
    type_part: &str,
    meta: &mut FieldMeta,
    constants: &IndexMap<String, DefaultValue>,
) -> (String, Option<Role>) {
    let Some(("Annotated", inner)) = split_call(type_part, '[') else {
        return (type_part.to_string(), None);
    };

    let args = split_top_level(inner, ',');
    let mut role = None;
    for arg in args.iter().skip(1) {
        if let Some(("Field", call)) = split_call(arg, '(') {
            apply_field_call(call, meta, constants);
        } else if let Some(found) = Role::from_marker(arg) {
            role = Some(found);
        }
    }
    let raw = args.first().copied().unwrap_or("Any");
    (raw.to_string(), role)
}

/// Extract `default`, `default_factory`, `title` and `description` from a `Field(...)` call.
fn apply_field_call(inner: &str, meta: &mut FieldMeta, constants: &IndexMap<String, DefaultValue>) {
    for (i, arg) in split_top_level(inner, ',').into_iter().enumerate() {
        if arg.is_empty() {
            continue;
        }
        let Some(eq) = find_top_level_assign(arg) else {
            if i == 0 {
                meta.default = parse_default(arg, constants);
            }
            continue;
        };
        let key = arg[..eq].trim();
        let value = arg[eq + 1..].trim();
        match key {
            "default" => meta.default = parse_default(value, constants),
            "default_factory" => meta.default = Some(DefaultValue::Factory(value.to_string())),
            "title" => meta.title = text_value(value, constants),
            "description" => meta.description = text_value(value, constants),
            _ => {}
        }
    }
}

/// A string literal, or a constant holding one.
fn text_value(value: &str, constants: &IndexMap<String, DefaultValue>) -> Option<String> {
    unquote(value).or_else(|| constants.get(value.trim())?.as_str().map(str::to_string))
}

/// Flatten every block against its ancestor chain.
fn resolve(blocks: &IndexMap<String, Block>) -> IndexMap<String, Model> {
    let mut models = IndexMap::new();

    for (name, block) in blocks {
        let chain = lineage(name, blocks);
        let is_model = chain
            .first()
            .and_then(|root| blocks.get(root))
            .is_some_and(|root| root.model_root);
        if !is_model {
            tracing::trace!(class = %name, "skipping class without a model base");
            continue;
        }

        let mut fields: IndexMap<String, FieldDecl> = IndexMap::new();
        let mut roles: IndexMap<String, Role> = IndexMap::new();
        let mut defaults: IndexMap<String, DefaultValue> = IndexMap::new();

        for ancestor in chain {
            let Some(source) = blocks.get(&ancestor) else {
                continue;
            };
            for field in &source.fields {
                let role = source.roles.get(&field.name).copied().unwrap_or(Role::Input);
                roles.insert(field.name.clone(), role);
                match source.defaults.get(&field.name) {
                    Some(default) => {
                        defaults.insert(field.name.clone(), default.clone());
                    }
                    None => {
                        defaults.shift_remove(&field.name);
                    }
                }
                fields.insert(field.name.clone(), field.clone());
            }
        }

        let model = Model {
            name: name.clone(),
            parent: block.parent.clone().filter(|p| blocks.contains_key(p)),
            info: block.info.clone(),
            fields: fields.into_values().collect(),
            roles,
            defaults,
        };
        tracing::trace!(model = %model.name, fields = model.fields.len(), "resolved model");
        models.insert(name.clone(), model);
    }

    models
}

/// Ancestor chain of `name`, root first. Cycles are cut at the first repeat.
fn lineage(name: &str, blocks: &IndexMap<String, Block>) -> Vec<String> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor = Some(name.to_string());

    while let Some(current) = cursor {
        if !seen.insert(current.clone()) {
            break;
        }
        let Some(block) = blocks.get(&current) else {
            break;
        };
        cursor = block.parent.clone();
        chain.push(current);
    }

    chain.reverse();
    chain
}
