//! Integration tests: document import/export (fp-core).
//!
//! Loads a realistic saved flow, checks the repairs the importer applies,
//! and verifies that exported documents load back to the same structure.

use fp_core::codec::{DocumentMeta, decode_document, export_json, import_json};
use fp_core::error::CodecError;
use fp_core::geometry::Point;
use fp_core::id::NodeId;
use fp_core::model::*;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn load() -> fp_core::Imported {
    import_json(include_str!("fixtures/order_flow.json")).unwrap()
}

fn id(s: &str) -> NodeId {
    NodeId::intern(s)
}

// ─── Import ─────────────────────────────────────────────────────────────

#[test]
fn groups_are_ordered_before_other_nodes() {
    let imported = load();
    let order: Vec<&str> = imported.state.nodes().iter().map(|n| n.id.as_str()).collect();
    assert_eq!(
        order,
        vec!["intake", "bare-group", "start", "receive", "check", "orphan"]
    );
}

#[test]
fn dangling_connector_is_omitted() {
    let imported = load();
    assert_eq!(imported.dropped_connectors, vec!["e-check-ghost".to_string()]);
    assert_eq!(imported.state.edges().len(), 2);
    assert!(imported.state.edge(id("e-check-ghost")).is_none());
}

#[test]
fn document_metadata_is_kept() {
    let imported = load();
    assert_eq!(imported.meta.id, "business-flow-v1");
    assert_eq!(imported.meta.name, "Order handling");
    assert_eq!(imported.meta.description.as_deref(), Some("Intake to fulfilment"));
}

#[test]
fn group_defaults_fill_missing_geometry() {
    let imported = load();
    let bare = imported.state.node(id("bare-group")).unwrap();
    assert_eq!(bare.position, Point::new(0.0, 0.0));
    assert_eq!(bare.size, NodeSize::fixed(200.0, 150.0));
    let group = bare.group_data().unwrap();
    assert_eq!(group.label, "Misc");
    assert_eq!(group.color, DEFAULT_GROUP_COLOR);

    let intake = imported.state.node(id("intake")).unwrap();
    assert_eq!(intake.group_data().unwrap().color, "#aabbcc");
}

#[test]
fn transient_keys_are_stripped_on_import() {
    let imported = load();
    let receive = imported.state.node(id("receive")).unwrap();
    assert_eq!(receive.style.len(), 1);
    assert_eq!(receive.style.get("fontSize"), Some(&json!(12)));
    let cfg = receive.details.detail_config.as_ref().unwrap();
    assert!(cfg.get("internals").is_none());
    assert!(cfg.get("databaseTables").is_some());
    assert_eq!(receive.related_ids.as_slice(), &[id("check")]);
}

#[test]
fn legacy_top_handle_and_default_marker() {
    let imported = load();
    let edge = imported.state.edge(id("e-start-receive")).unwrap();
    assert_eq!(edge.source_handle.as_deref(), Some("bottom-source"));
    assert_eq!(edge.target_handle.as_deref(), Some("top-target"));
    assert_eq!(edge.marker_end, Some(Marker::arrow_closed("#64748b")));
    assert_eq!(edge.style.get("stroke"), Some(&json!("#64748b")));
    assert_eq!(edge.style.get("strokeWidth"), Some(&json!(1)));
}

#[test]
fn explicit_markers_and_flags_survive() {
    let imported = load();
    let edge = imported.state.edge(id("e-receive-check")).unwrap();
    assert_eq!(edge.marker_start, Some(Marker::Named("arrow".into())));
    assert_eq!(edge.marker_end, None);
    assert_eq!(edge.style.get("stroke"), Some(&json!("#ef4444")));
    assert_eq!(edge.not_implemented, Some(true));
    assert_eq!(edge.label.as_deref(), Some("submit"));
}

#[test]
fn missing_parent_is_left_for_healing() {
    let imported = load();
    let orphan = imported.state.node(id("orphan")).unwrap();
    assert_eq!(orphan.parent_id, Some(id("deleted-group")));
    assert_eq!(orphan.position, Point::new(900.0, 400.0));
}

#[test]
fn background_colour_is_normalized() {
    let imported = load();
    let check = imported.state.node(id("check")).unwrap();
    assert_eq!(check.details.background_color.as_deref(), Some("#fef3c7"));
    assert_eq!(check.kind, NodeKind::Decision);
}

// ─── Malformed input ────────────────────────────────────────────────────

#[test]
fn missing_nodes_array_is_rejected() {
    let err = import_json(r#"{"connectors": []}"#).unwrap_err();
    assert!(matches!(err, CodecError::MissingField("nodes")));
}

#[test]
fn broken_json_is_rejected() {
    assert!(matches!(import_json("{nodes"), Err(CodecError::Json(_))));
}

#[test]
fn malformed_record_names_its_index() {
    let err = decode_document(r#"{"nodes":[{"id":"ok"},{"name":"no id"}],"connectors":[]}"#)
        .unwrap_err();
    assert!(matches!(
        err,
        CodecError::InvalidRecord {
            field: "nodes",
            index: 1,
            ..
        }
    ));
}

// ─── Export ─────────────────────────────────────────────────────────────

#[test]
fn export_uses_document_schema() {
    let imported = load();
    let json = export_json(&imported.state, &imported.meta).unwrap();
    let value: Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["id"], json!("business-flow-v1"));
    let connectors = value["connectors"].as_array().unwrap();
    assert_eq!(connectors[0]["sourceID"], json!("start"));
    assert_eq!(connectors[0]["targetHandle"], json!("top-target"));

    let nodes = value["nodes"].as_array().unwrap();
    let intake = nodes.iter().find(|n| n["id"] == json!("intake")).unwrap();
    assert_eq!(intake["type"], json!("group"));
    assert_eq!(intake["relatedNodeIds"], json!([]));
    assert_eq!(intake["collapsed"], json!(false));
    assert_eq!(intake["expandable"], json!(false));

    let orphan = nodes.iter().find(|n| n["id"] == json!("orphan")).unwrap();
    assert_eq!(orphan["size"], json!({"width": 150.0, "height": 40.0}));
    assert!(!json.contains("__rf"));
    assert!(!json.contains("internals"));
}

#[test]
fn exported_document_reimports_to_same_structure() {
    let first = load();
    let json = export_json(&first.state, &DocumentMeta::default()).unwrap();
    let second = import_json(&json).unwrap();

    assert!(second.dropped_connectors.is_empty());
    assert_eq!(first.state.nodes().len(), second.state.nodes().len());
    for (a, b) in first.state.nodes().iter().zip(second.state.nodes()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.position, b.position);
        assert_eq!(a.parent_id, b.parent_id);
        assert_eq!(a.style, b.style);
        assert_eq!(a.details, b.details);
    }
    assert_eq!(first.state.edges(), second.state.edges());
}
