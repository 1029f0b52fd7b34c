// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end tests for sessions built from a registered schema.
use nodeweave_graph::{Document, ExportOptions, ImportOptions, NodeId, Session};
use serde_json::json;

const MINIMAL: &str = r#"
class M(BaseModel):
    x: Annotated[int, FieldRole.INPUT]
    y: Annotated[int, FieldRole.OUTPUT] = None
"#;

const FLOW: &str = r#"
PROMPT = "Say hello"

class Element(BaseModel):
    id: Annotated[str, FieldRole.ANNOTATION] = Field(default_factory=generate_id)
    type: Annotated[Literal["element"], FieldRole.CONSTANT] = "element"

class Text(Element):
    type: Annotated[Literal["text"], FieldRole.CONSTANT] = "text"
    value: Annotated[str, FieldRole.INPUT] = PROMPT
    text: Annotated[str, FieldRole.OUTPUT] = None

class Router(Element):
    type: Annotated[Literal["router"], FieldRole.CONSTANT] = "router"
    first: Annotated[str, FieldRole.INPUT] = ""
    second: Annotated[Optional[int], FieldRole.INPUT] = None
    input: Annotated[Dict[str, str], FieldRole.MULTI_INPUT] = None
    output: Annotated[Dict[str, str], FieldRole.MULTI_OUTPUT] = None
"#;

fn minimal_session() -> Session {
    let mut session = Session::new();
    session.register_schema("demo", MINIMAL);
    session
}

fn flow_session() -> Session {
    let mut session = Session::new();
    session.register_schema("flow", FLOW);
    session
}

fn round_trip(session: &Session) -> (Session, Document) {
    let exported = session.export_document(&ExportOptions::default());
    let text = exported.to_json().unwrap();
    let mut restored = flow_session();
    restored.register_schema("demo", MINIMAL);
    let report = restored.import_document(&Document::from_json(&text).unwrap(), &ImportOptions::default());
    assert!(report.is_clean(), "{report:?}");
    (restored, exported)
}

#[test]
fn test_minimal_model_end_to_end() {
    let mut session = minimal_session();
    let n1 = session.create_node("M").unwrap();
    let n2 = session.create_node("M").unwrap();

    session.connect(n1, 0, n2, 0).unwrap();
    assert!(session.is_locally_complete(n2));
    assert!(!session.is_chain_complete(n2));

    session.set_input_value(n1, 0, json!(42));
    assert!(session.is_chain_complete(n1));
    assert!(session.is_chain_complete(n2));

    let (restored, _) = round_trip(&session);
    let doc = restored.export_document(&ExportOptions { include_layout: false });
    assert_eq!(doc.edges.len(), 1);
    let edge = &doc.edges[0];
    assert_eq!((edge.source, edge.target), (0, 1));
    assert_eq!((edge.source_slot.as_str(), edge.target_slot.as_str()), ("y", "x"));
    assert_eq!(edge.kind, "edge");
}

#[test]
fn test_round_trip_reproduces_graph() {
    let mut session = flow_session();
    let text = session.create_node("text").unwrap();
    let router = session.create_node("router").unwrap();
    let sink = session.create_node("router").unwrap();

    session.set_input_value(text, 0, json!("Hi there"));
    session.set_input_value(router, 1, json!(3));
    session.add_multi_slot(router, "input", "left").unwrap();
    session.add_multi_slot(router, "input", "right").unwrap();
    session.add_multi_slot(router, "output", "yes").unwrap();
    session.connect(text, 0, router, 0).unwrap();
    session.connect(text, 0, router, 3).unwrap();
    session.connect(router, 0, sink, 2).unwrap();
    session.set_position(sink, [480.0, 120.5]);

    let (restored, exported) = round_trip(&session);
    assert_eq!(restored.graph().node_count(), 3);
    assert_eq!(restored.graph().link_count(), 3);

    let original: Vec<_> = session.graph().nodes().collect();
    let copies: Vec<_> = restored.graph().nodes().collect();
    for (a, b) in original.iter().zip(&copies) {
        assert_eq!(a.model_ref, b.model_ref);
        assert_eq!(a.position, b.position);
        assert_eq!(a.annotations, b.annotations);
        assert_eq!(a.multi_input_slots, b.multi_input_slots);
        assert_eq!(a.multi_output_slots, b.multi_output_slots);
        let values = |n: &nodeweave_graph::NodeInstance| {
            n.native_inputs
                .iter()
                .filter(|(_, v)| v.explicit)
                .map(|(i, v)| (*i, v.value.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(values(a), values(b));
    }

    let again = restored.export_document(&ExportOptions::default());
    assert_eq!(again, exported);
}

#[test]
fn test_renumbering_after_middle_slot_removal() {
    let mut session = flow_session();
    let text = session.create_node("text").unwrap();
    let fragment = json!({"input": ["a", "b", "c"]});
    let router = session
        .create_node_with("router", fragment.as_object().unwrap())
        .unwrap();

    let node = session.graph().node(router).unwrap();
    assert_eq!(node.multi_input_slots["input"], vec![2, 3, 4]);

    let low = session.connect(text, 0, router, 0).unwrap();
    let high = session.connect(text, 0, router, 4).unwrap();

    session.remove_multi_slot(router, "input", "b").unwrap();

    let node = session.graph().node(router).unwrap();
    assert_eq!(node.multi_input_slots["input"], vec![2, 3]);
    assert_eq!(node.inputs.len(), 4);
    assert_eq!(node.inputs[3].meta.internal_name(), "input.c");
    assert_eq!(node.inputs[3].link, Some(high));
    assert_eq!(node.inputs[0].link, Some(low));
    assert!(node.native_inputs.contains_key(&0));
    assert!(node.native_inputs.contains_key(&1));

    assert_eq!(session.graph().link(high).unwrap().target_slot, 3);
    assert_eq!(session.graph().link(low).unwrap().target_slot, 0);
}

#[test]
fn test_chain_completeness_is_monotonic() {
    let mut session = minimal_session();
    let ids: Vec<NodeId> = (0..4).map(|_| session.create_node("M").unwrap()).collect();
    for pair in ids.windows(2) {
        session.connect(pair[0], 0, pair[1], 0).unwrap();
    }

    let snapshot = |s: &Session| ids.iter().map(|&id| s.is_chain_complete(id)).collect::<Vec<_>>();
    let before = snapshot(&session);
    assert_eq!(before, vec![false; 4]);

    session.set_input_value(ids[0], 0, json!(1));
    let after = snapshot(&session);
    for (was, now) in before.iter().zip(&after) {
        assert!(!(*was && !now));
    }
    assert_eq!(after, vec![true; 4]);

    let middle = session.graph().node(ids[2]).unwrap().inputs[0].link.unwrap();
    session.disconnect(middle);
    let cut = snapshot(&session);
    assert_eq!(cut, vec![true, true, false, false]);
}

#[test]
fn test_three_node_cycle_terminates() {
    let mut session = minimal_session();
    let a = session.create_node("M").unwrap();
    let b = session.create_node("M").unwrap();
    let c = session.create_node("M").unwrap();
    session.connect(a, 0, b, 0).unwrap();
    session.connect(b, 0, c, 0).unwrap();
    session.connect(c, 0, a, 0).unwrap();

    for id in [a, b, c] {
        assert!(session.is_chain_complete(id));
    }

    let outputs = session.evaluate_preview();
    assert_eq!(outputs.len(), 3);
}

#[test]
fn test_removing_node_refreshes_downstream() {
    let mut session = minimal_session();
    let a = session.create_node("M").unwrap();
    let b = session.create_node("M").unwrap();
    session.set_input_value(a, 0, json!(5));
    session.connect(a, 0, b, 0).unwrap();
    assert!(session.is_chain_complete(b));

    session.remove_node(a);
    assert_eq!(session.graph().link_count(), 0);
    assert!(!session.is_locally_complete(b));
    assert_eq!(session.readiness(b).unwrap().missing, vec!["x"]);
}

#[test]
fn test_constant_defaults_and_layout_suppression() {
    let mut session = flow_session();
    let text = session.create_node("text").unwrap();
    let node = session.graph().node(text).unwrap();
    assert_eq!(node.native_inputs[&0].value, json!("Say hello"));
    assert!(session.is_locally_complete(text));

    let doc = session.export_document(&ExportOptions { include_layout: false });
    assert!(doc.nodes[0].extra.is_none());
    assert!(!doc.nodes[0].fields.contains_key("value"));
}

const CHAIN: &str = r#"
class FlowType(BaseModel):
    flow_in: Annotated[Optional[Any], FieldRole.INPUT] = None
    flow_out: Annotated[Optional[Any], FieldRole.OUTPUT] = None

class Start(FlowType):
    type: Annotated[Literal["start"], FieldRole.CONSTANT] = "start"
    prompt: Annotated[str, FieldRole.INPUT] = ""

class MergeFlow(FlowType):
    type: Annotated[Literal["merge_flow"], FieldRole.CONSTANT] = "merge_flow"
    input: Annotated[Union[List[str], Dict[str, Any]], FieldRole.MULTI_INPUT] = None
"#;

#[test]
fn test_flow_chain_feeds_union_multi_input() {
    let mut session = Session::new();
    assert_eq!(session.register_schema("chain", CHAIN), 3);
    let text = json!({
        "nodes": [
            {"type": "start", "prompt": "go"},
            {"type": "merge_flow", "input": ["c"]}
        ],
        "edges": [{"source": 0, "target": 1, "source_slot": "flow_out", "target_slot": "input.c"}]
    })
    .to_string();
    let report = session.import_document(&Document::from_json(&text).unwrap(), &ImportOptions::default());
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(report.links, 1);

    let ids: Vec<NodeId> = session.graph().node_ids().collect();
    let outputs = session.evaluate_preview();
    assert_eq!(outputs[&ids[0]]["flow_out"], json!("go"));
    assert_eq!(outputs[&ids[1]]["input"], json!({"c": "go"}));
    assert_eq!(outputs[&ids[1]]["flow_out"], json!("go"));
}
