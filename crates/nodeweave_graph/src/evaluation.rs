// SPDX-License-Identifier: MIT OR Apache-2.0
//! Preview evaluation.
//!
//! Nodes run in dependency order (cycle members last). Each node receives
//! a merged view of its constants, edited values and upstream results,
//! and produces a result map that downstream nodes read by output field.

use crate::connection::LinkId;
use crate::graph::Graph;
use crate::node::{NodeId, NodeInstance};
use crate::port::{value_is_empty, NativeKind};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::trace;

/// Result map of one node
pub type NodeOutput = Map<String, Value>;

/// Produces a node's result from its merged inputs
pub trait NodeExecutor {
    /// Run a node
    fn execute(&self, node: &NodeInstance, inputs: NodeOutput) -> NodeOutput;
}

/// Passes the merged inputs through.
///
/// Output fields that no input shares a name with take the first non-empty
/// input value, so previews keep flowing through differently named ports.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl NodeExecutor for PassThrough {
    fn execute(&self, node: &NodeInstance, mut inputs: NodeOutput) -> NodeOutput {
        let Some(fallback) = first_input_value(node, &inputs).cloned() else {
            return inputs;
        };
        for slot in &node.outputs {
            let field = slot.meta.field_name.clone();
            match &slot.meta.key {
                None => {
                    inputs.entry(field).or_insert_with(|| fallback.clone());
                }
                Some(key) => {
                    let entry = inputs.entry(field).or_insert_with(|| Value::Object(Map::new()));
                    if let Value::Object(keyed) = entry {
                        keyed.entry(key.clone()).or_insert_with(|| fallback.clone());
                    }
                }
            }
        }
        inputs
    }
}

/// First non-empty value among a node's inputs, in slot order
fn first_input_value<'a>(node: &NodeInstance, inputs: &'a NodeOutput) -> Option<&'a Value> {
    node.inputs.iter().find_map(|slot| {
        let meta = &slot.meta;
        let value = inputs.get(&meta.field_name)?;
        let value = if meta.is_multi {
            value.get(meta.key.as_deref().unwrap_or(&meta.field_name))?
        } else {
            value
        };
        (!value_is_empty(value)).then_some(value)
    })
}

/// Context for graph evaluation
pub struct EvaluationContext<'a> {
    /// The graph being evaluated
    pub graph: &'a Graph,
    /// Cached node outputs
    outputs: HashMap<NodeId, NodeOutput>,
    /// Evaluation order
    order: Vec<NodeId>,
    executors: HashMap<String, Box<dyn NodeExecutor + 'a>>,
    fallback: Box<dyn NodeExecutor + 'a>,
}

impl<'a> EvaluationContext<'a> {
    /// Create a new evaluation context
    pub fn new(graph: &'a Graph) -> Self {
        Self {
            graph,
            outputs: HashMap::new(),
            order: graph.evaluation_order(),
            executors: HashMap::new(),
            fallback: Box::new(PassThrough),
        }
    }

    /// Use `executor` for nodes whose short model name is `model`
    pub fn with_executor(mut self, model: impl Into<String>, executor: impl NodeExecutor + 'a) -> Self {
        self.executors.insert(model.into(), Box::new(executor));
        self
    }

    /// Use `executor` for nodes without a dedicated one
    pub fn with_fallback(mut self, executor: impl NodeExecutor + 'a) -> Self {
        self.fallback = Box::new(executor);
        self
    }

    /// Run every node once, in order
    pub fn run(&mut self) {
        let graph = self.graph;
        for id in self.order.clone() {
            let Some(node) = graph.node(id) else {
                continue;
            };
            let inputs = self.gather_inputs(node);
            let executor = self
                .executors
                .get(node.model_name())
                .unwrap_or(&self.fallback);
            let output = executor.execute(node, inputs);
            trace!(node = %id, keys = output.len(), "Evaluated node");
            self.outputs.insert(id, output);
        }
    }

    /// Merge a node's constants, filled editable values and upstream results
    pub fn gather_inputs(&self, node: &NodeInstance) -> NodeOutput {
        let mut merged: NodeOutput = node
            .constant_fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        for (index, slot) in node.inputs.iter().enumerate() {
            if slot.meta.is_multi {
                continue;
            }
            if let Some(link) = slot.link {
                merged.insert(slot.meta.field_name.clone(), self.producer_value(link));
            } else if let Some(native) = node.native_inputs.get(&index) {
                if native.kind == NativeKind::Boolean || !value_is_empty(&native.value) {
                    merged.insert(slot.meta.field_name.clone(), native.value.clone());
                }
            }
        }

        for (field, indices) in &node.multi_input_slots {
            let keyed: Map<String, Value> = indices
                .iter()
                .filter_map(|&i| {
                    let slot = node.input(i)?;
                    let link = slot.link?;
                    let key = slot.meta.key.clone().unwrap_or_else(|| field.clone());
                    Some((key, self.producer_value(link)))
                })
                .collect();
            if !keyed.is_empty() {
                merged.insert(field.clone(), Value::Object(keyed));
            }
        }
        merged
    }

    /// The value a link carries: the producer's result under the output
    /// field name, narrowed to the key for keyed output slots
    fn producer_value(&self, link_id: LinkId) -> Value {
        let Some(link) = self.graph.link(link_id) else {
            return Value::Null;
        };
        let Some(meta) = self
            .graph
            .node(link.origin_node)
            .and_then(|n| n.output(link.origin_slot))
            .map(|s| &s.meta)
        else {
            return Value::Null;
        };
        let value = self
            .outputs
            .get(&link.origin_node)
            .and_then(|out| out.get(&meta.field_name));
        match (&meta.key, value) {
            (Some(key), Some(value)) => value.get(key).cloned().unwrap_or(Value::Null),
            (None, Some(value)) => value.clone(),
            (_, None) => Value::Null,
        }
    }

    /// Get the output of a node
    pub fn output(&self, node_id: NodeId) -> Option<&NodeOutput> {
        self.outputs.get(&node_id)
    }

    /// Get the evaluation order
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Get all outputs
    pub fn outputs(&self) -> &HashMap<NodeId, NodeOutput> {
        &self.outputs
    }

    /// Consume the context, keeping the outputs
    pub fn into_outputs(self) -> HashMap<NodeId, NodeOutput> {
        self.outputs
    }
}

/// Run the whole graph with the pass-through executor
pub fn execute(graph: &Graph) -> HashMap<NodeId, NodeOutput> {
    let mut ctx = EvaluationContext::new(graph);
    ctx.run();
    ctx.into_outputs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeweave_schema::parse_schema;
    use serde_json::json;

    const SCHEMA: &str = r#"
class Num(BaseModel):
    type: Annotated[Literal["num"], FieldRole.CONSTANT] = "num"
    value: Annotated[int, FieldRole.INPUT] = 0
    label: Annotated[str, FieldRole.INPUT] = ""
    value_out: Annotated[int, FieldRole.OUTPUT] = None

class Sum(BaseModel):
    type: Annotated[Literal["sum"], FieldRole.CONSTANT] = "sum"
    input: Annotated[Dict[str, int], FieldRole.MULTI_INPUT] = None
    output: Annotated[int, FieldRole.OUTPUT] = None
"#;

    struct Doubler;

    impl NodeExecutor for Doubler {
        fn execute(&self, _node: &NodeInstance, inputs: NodeOutput) -> NodeOutput {
            let value = inputs.get("value").and_then(Value::as_i64).unwrap_or(0);
            let mut out = inputs;
            out.insert("value_out".to_string(), json!(value * 2));
            out
        }
    }

    struct Adder;

    impl NodeExecutor for Adder {
        fn execute(&self, _node: &NodeInstance, inputs: NodeOutput) -> NodeOutput {
            let total: i64 = inputs
                .get("input")
                .and_then(Value::as_object)
                .map(|m| m.values().filter_map(Value::as_i64).sum())
                .unwrap_or(0);
            let mut out = NodeOutput::new();
            out.insert("output".to_string(), json!(total));
            out
        }
    }

    #[test]
    fn test_pass_through_merges_values() {
        let schema = parse_schema(SCHEMA);
        let mut graph = Graph::new();
        let id = graph.create_node("t.Num", schema.model("Num").unwrap(), None);
        graph.set_input_value(id, 0, json!(5));

        let outputs = execute(&graph);
        let out = &outputs[&id];
        assert_eq!(out["type"], json!("num"));
        assert_eq!(out["value"], json!(5));
        assert!(!out.contains_key("label"));
    }

    #[test]
    fn test_custom_executors_feed_downstream() {
        let schema = parse_schema(SCHEMA);
        let mut graph = Graph::new();
        let sum = graph.create_node("t.Sum", schema.model("Sum").unwrap(), None);
        let a = graph.create_node("t.Num", schema.model("Num").unwrap(), None);
        let b = graph.create_node("t.Num", schema.model("Num").unwrap(), None);
        graph.set_input_value(a, 0, json!(2));
        graph.set_input_value(b, 0, json!(5));
        graph.add_multi_slot(sum, "input", "a").unwrap();
        graph.add_multi_slot(sum, "input", "b").unwrap();
        graph.connect(a, 0, sum, 0).unwrap();
        graph.connect(b, 0, sum, 1).unwrap();

        let mut ctx = EvaluationContext::new(&graph)
            .with_executor("Num", Doubler)
            .with_executor("Sum", Adder);
        ctx.run();
        assert_eq!(ctx.order().last(), Some(&sum));
        assert_eq!(ctx.output(sum).unwrap()["output"], json!(14));
    }

    #[test]
    fn test_pass_through_fills_unmatched_outputs() {
        let schema = parse_schema(SCHEMA);
        let mut graph = Graph::new();
        let a = graph.create_node("t.Num", schema.model("Num").unwrap(), None);
        let b = graph.create_node("t.Num", schema.model("Num").unwrap(), None);
        let sum = graph.create_node("t.Sum", schema.model("Sum").unwrap(), None);
        graph.set_input_value(a, 0, json!(5));
        graph.connect(a, 0, b, 0).unwrap();
        graph.add_multi_slot(sum, "input", "k").unwrap();
        graph.connect(b, 0, sum, 0).unwrap();

        let outputs = execute(&graph);
        assert_eq!(outputs[&a]["value_out"], json!(5));
        assert_eq!(outputs[&b]["value"], json!(5));
        assert_eq!(outputs[&sum]["input"], json!({"k": 5}));
        assert_eq!(outputs[&sum]["output"], json!(5));
    }

    #[test]
    fn test_cycle_still_runs() {
        let schema = parse_schema(SCHEMA);
        let mut graph = Graph::new();
        let a = graph.create_node("t.Num", schema.model("Num").unwrap(), None);
        let b = graph.create_node("t.Num", schema.model("Num").unwrap(), None);
        graph.connect(a, 0, b, 0).unwrap();
        graph.connect(b, 0, a, 0).unwrap();

        let outputs = execute(&graph);
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[&a]["value"], Value::Null);
    }
}
