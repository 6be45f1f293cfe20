//! Persisted flow document schema and its conversion to and from
//! [`GraphState`].
//!
//! The on-disk shape is camelCase JSON with `nodes` and `connectors`
//! arrays; connectors name their endpoints `sourceID` / `targetID`.
//! Decoding is strict about the two arrays and lenient about everything
//! inside them: dangling connectors are dropped, legacy handle ids are
//! migrated, and missing group geometry falls back to defaults.

use crate::color::normalize_color;
use crate::error::CodecError;
use crate::geometry::{Point, Size};
use crate::id::NodeId;
use crate::model::{
    DEFAULT_GROUP_COLOR, DEFAULT_GROUP_SIZE, Edge, GroupData, Marker, Node, NodeKind, NodeSize,
    StyleMap, TerminatorKind,
};
use crate::store::{GraphState, sort_parents_first};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Document id used when the host doesn't supply one.
pub const DEFAULT_DOCUMENT_ID: &str = "business-flow-v1";

/// Stroke for connectors that don't carry one.
pub const DEFAULT_EDGE_STROKE: &str = "#64748b";

/// Export size for a non-group node that was never sized or measured.
pub const EXPORT_NODE_FALLBACK: Size = Size::new(150.0, 40.0);

// ─── Schema ──────────────────────────────────────────────────────────────

/// Document-level metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMeta {
    #[serde(default = "default_document_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_document_id() -> String {
    DEFAULT_DOCUMENT_ID.to_string()
}

impl Default for DocumentMeta {
    fn default() -> Self {
        Self {
            id: default_document_id(),
            name: "Business flow".to_string(),
            description: None,
        }
    }
}

/// The complete persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDocument {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub nodes: Vec<NodeRecord>,
    pub connectors: Vec<ConnectorRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SizeRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default = "default_node_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<SizeRecord>,
    #[serde(default)]
    pub expandable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_config: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_size: Option<Size>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_node_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
}

fn default_node_type() -> String {
    "process".to_string()
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorRecord {
    pub id: String,
    #[serde(rename = "sourceID")]
    pub source_id: String,
    #[serde(rename = "targetID")]
    pub target_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_style: Option<StyleMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_bg_style: Option<StyleMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker_start: Option<Marker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker_end: Option<Marker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_implemented: Option<bool>,
}

// ─── Sanitizing ──────────────────────────────────────────────────────────

/// Keys that only make sense inside a live renderer.
fn is_transient_key(key: &str) -> bool {
    key.starts_with("__") || key == "measured" || key == "internals"
}

/// Deep copy of `value` with renderer-internal keys removed.
pub fn sanitize(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !is_transient_key(k))
                .map(|(k, v)| (k.clone(), sanitize(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize).collect()),
        other => other.clone(),
    }
}

pub fn sanitize_map(map: &StyleMap) -> StyleMap {
    map.iter()
        .filter(|(k, _)| !is_transient_key(k))
        .map(|(k, v)| (k.clone(), sanitize(v)))
        .collect()
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

fn finite_point(p: Point) -> Point {
    if !(p.x.is_finite() && p.y.is_finite()) {
        log::warn!("non-finite position ({}, {}) zeroed", p.x, p.y);
    }
    Point::new(finite(p.x).unwrap_or(0.0), finite(p.y).unwrap_or(0.0))
}

fn finite_size(s: Size) -> Option<Size> {
    Some(Size::new(finite(s.width)?, finite(s.height)?))
}

fn finite_marker(m: &Marker) -> Marker {
    match m {
        Marker::Named(n) => Marker::Named(n.clone()),
        Marker::Detailed {
            kind,
            color,
            width,
            height,
        } => Marker::Detailed {
            kind: kind.clone(),
            color: color.clone(),
            width: width.and_then(finite),
            height: height.and_then(finite),
        },
    }
}

// ─── Handles ─────────────────────────────────────────────────────────────

/// Which end of a connector a handle id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleRole {
    Source,
    Target,
}

/// Rewrite the legacy bare `"top"` handle to its role-specific id.
pub fn migrate_handle(handle: Option<String>, role: HandleRole) -> Option<String> {
    match (handle.as_deref(), role) {
        (Some("top"), HandleRole::Source) => Some("top-source".to_string()),
        (Some("top"), HandleRole::Target) => Some("top-target".to_string()),
        _ => handle,
    }
}

// ─── Decoding ────────────────────────────────────────────────────────────

/// Result of importing a document.
#[derive(Debug, Clone)]
pub struct Imported {
    pub meta: DocumentMeta,
    pub state: GraphState,
    /// Connector ids omitted because an endpoint was missing.
    pub dropped_connectors: Vec<String>,
    /// Node or connector ids that appeared more than once (first one wins).
    pub duplicate_ids: Vec<String>,
}

fn take_array(value: &mut Value, field: &'static str) -> Result<Vec<Value>, CodecError> {
    match value.get_mut(field).map(Value::take) {
        None | Some(Value::Null) => Err(CodecError::MissingField(field)),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(CodecError::NotAnArray { field }),
    }
}

fn decode_records<T>(items: Vec<Value>, field: &'static str) -> Result<Vec<T>, CodecError>
where
    T: for<'de> Deserialize<'de>,
{
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item).map_err(|source| CodecError::InvalidRecord {
                field,
                index,
                source,
            })
        })
        .collect()
}

/// Parse document JSON. Both `nodes` and `connectors` must be present.
pub fn decode_document(json: &str) -> Result<FlowDocument, CodecError> {
    let value: Value = serde_json::from_str(json)?;
    decode_value(value)
}

pub fn decode_value(mut value: Value) -> Result<FlowDocument, CodecError> {
    let nodes = take_array(&mut value, "nodes")?;
    let connectors = take_array(&mut value, "connectors")?;
    let meta: DocumentMeta = serde_json::from_value(value)?;
    Ok(FlowDocument {
        meta,
        nodes: decode_records(nodes, "nodes")?,
        connectors: decode_records(connectors, "connectors")?,
    })
}

/// Parse and convert in one step.
pub fn import_json(json: &str) -> Result<Imported, CodecError> {
    Ok(decode_document(json)?.into_graph())
}

fn node_from_record(rec: NodeRecord) -> Node {
    let id = NodeId::intern(&rec.id);
    let is_group = rec.kind == "group";
    let kind = if is_group {
        let label = rec
            .label
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| rec.name.clone());
        NodeKind::Group(GroupData {
            label,
            color: rec
                .color
                .map(|c| normalize_color(&c))
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_GROUP_COLOR.to_string()),
            collapsed: rec.collapsed.unwrap_or(false),
            expanded_size: rec.expanded_size.and_then(finite_size),
        })
    } else {
        NodeKind::from_type_name(&rec.kind).unwrap_or_else(|| {
            log::warn!("node {}: unknown type {:?}, treating as process", rec.id, rec.kind);
            NodeKind::Process
        })
    };

    let mut node = Node::new(id, kind);
    node.name = rec.name;
    node.position = rec.position.map(finite_point).unwrap_or_default();
    let size = rec.size.unwrap_or_default();
    node.size = NodeSize {
        width: size.width.and_then(finite),
        height: size.height.and_then(finite),
    };
    if is_group {
        node.size.width.get_or_insert(DEFAULT_GROUP_SIZE.width);
        node.size.height.get_or_insert(DEFAULT_GROUP_SIZE.height);
    }
    node.parent_id = rec
        .parent_id
        .filter(|p| !p.is_empty())
        .map(|p| NodeId::intern(&p));
    node.style = rec.style.as_ref().map(sanitize_map).unwrap_or_default();
    for related in rec.related_node_ids.unwrap_or_default() {
        node.relate(NodeId::intern(&related));
    }
    node.details.expandable = rec.expandable;
    node.details.description = rec.description;
    node.details.detail_config = rec.detail_config.as_ref().map(sanitize);
    node.details.sub_type = rec.sub_type.as_deref().and_then(|s| match s {
        "start" => Some(TerminatorKind::Start),
        "end" => Some(TerminatorKind::End),
        other => {
            log::warn!("node {}: unknown subType {other:?} dropped", node.id);
            None
        }
    });
    node.details.background_color = rec
        .background_color
        .map(|c| normalize_color(&c))
        .filter(|c| !c.is_empty());
    node.hidden = rec.hidden.unwrap_or(false);
    node
}

fn edge_from_record(rec: ConnectorRecord) -> Edge {
    let mut edge = Edge::new(
        NodeId::intern(&rec.id),
        NodeId::intern(&rec.source_id),
        NodeId::intern(&rec.target_id),
    );
    edge.source_handle = migrate_handle(rec.source_handle, HandleRole::Source);
    edge.target_handle = migrate_handle(rec.target_handle, HandleRole::Target);
    edge.label = rec.label;

    let mut style = rec.style.as_ref().map(sanitize_map).unwrap_or_default();
    let stroke = match style.get("stroke") {
        Some(Value::String(s)) if !s.is_empty() => normalize_color(s),
        _ => DEFAULT_EDGE_STROKE.to_string(),
    };
    style.insert("stroke".into(), Value::String(stroke.clone()));
    style.entry("strokeWidth".into()).or_insert(Value::from(1));
    edge.style = style;

    edge.label_style = rec.label_style.as_ref().map(sanitize_map);
    edge.label_bg_style = rec.label_bg_style.as_ref().map(sanitize_map);
    edge.marker_start = rec.marker_start;
    edge.marker_end = rec.marker_end;
    if edge.marker_start.is_none() && edge.marker_end.is_none() {
        edge.marker_end = Some(Marker::arrow_closed(&stroke));
    }
    edge.data = rec.data.as_ref().map(sanitize);
    edge.not_implemented = rec.not_implemented;
    edge
}

impl FlowDocument {
    /// Convert to a graph. Never fails: structural problems are repaired
    /// or reported in [`Imported`].
    pub fn into_graph(self) -> Imported {
        let mut seen = HashSet::new();
        let mut duplicate_ids = Vec::new();

        let mut nodes: Vec<Node> = Vec::with_capacity(self.nodes.len());
        for rec in self.nodes {
            if !seen.insert(rec.id.clone()) {
                log::warn!("duplicate node id {:?} skipped", rec.id);
                duplicate_ids.push(rec.id);
                continue;
            }
            nodes.push(node_from_record(rec));
        }
        // Groups first, then nested groups after their parents.
        nodes.sort_by_key(|n| !n.is_group());
        sort_parents_first(&mut nodes);

        let present: HashSet<NodeId> = nodes.iter().map(|n| n.id).collect();
        let mut edge_ids = HashSet::new();
        let mut dropped_connectors = Vec::new();
        let mut edges = Vec::with_capacity(self.connectors.len());
        for rec in self.connectors {
            let endpoints_exist = [&rec.source_id, &rec.target_id]
                .iter()
                .all(|id| NodeId::is_known(id) && present.contains(&NodeId::intern(id)));
            if !endpoints_exist {
                log::warn!(
                    "connector {:?} dropped: {} -> {} has a missing endpoint",
                    rec.id,
                    rec.source_id,
                    rec.target_id
                );
                dropped_connectors.push(rec.id);
                continue;
            }
            if !edge_ids.insert(rec.id.clone()) {
                log::warn!("duplicate connector id {:?} skipped", rec.id);
                duplicate_ids.push(rec.id);
                continue;
            }
            edges.push(edge_from_record(rec));
        }

        log::info!(
            "imported {} nodes, {} connectors ({} dropped)",
            nodes.len(),
            edges.len(),
            dropped_connectors.len()
        );
        Imported {
            meta: self.meta,
            state: GraphState::new(nodes, edges),
            dropped_connectors,
            duplicate_ids,
        }
    }

    /// Build the persisted form of `state`.
    pub fn from_state(state: &GraphState, meta: &DocumentMeta) -> Self {
        Self {
            meta: meta.clone(),
            nodes: state.nodes().iter().map(node_record).collect(),
            connectors: state.edges().iter().map(connector_record).collect(),
        }
    }
}

// ─── Encoding ────────────────────────────────────────────────────────────

fn export_size(node: &Node) -> SizeRecord {
    let fallback = if node.is_group() {
        node.measured.unwrap_or(DEFAULT_GROUP_SIZE)
    } else {
        node.measured.unwrap_or(EXPORT_NODE_FALLBACK)
    };
    let pick = |explicit: Option<f64>, measured: f64, default: f64| {
        explicit
            .and_then(finite)
            .or_else(|| finite(measured))
            .unwrap_or(default)
    };
    let default = if node.is_group() {
        DEFAULT_GROUP_SIZE
    } else {
        EXPORT_NODE_FALLBACK
    };
    SizeRecord {
        width: Some(pick(node.size.width, fallback.width, default.width)),
        height: Some(pick(node.size.height, fallback.height, default.height)),
    }
}

fn related_record(node: &Node) -> Vec<String> {
    node.related_ids.iter().map(|id| id.to_string()).collect()
}

fn node_record(node: &Node) -> NodeRecord {
    let style = (!node.style.is_empty()).then(|| sanitize_map(&node.style));
    let mut rec = NodeRecord {
        id: node.id.to_string(),
        name: node.name.clone(),
        kind: node.kind.type_name().to_string(),
        position: Some(finite_point(node.position)),
        size: Some(export_size(node)),
        style,
        parent_id: node.parent_id.map(|p| p.to_string()),
        hidden: node.hidden.then_some(true),
        ..NodeRecord::default()
    };

    match &node.kind {
        NodeKind::Group(g) => {
            if !g.label.is_empty() {
                rec.name = g.label.clone();
            } else if rec.name.is_empty() {
                rec.name = "Group".to_string();
            }
            rec.expandable = false;
            rec.label = Some(g.label.clone());
            rec.color = Some(g.color.clone());
            rec.collapsed = Some(g.collapsed);
            rec.expanded_size = g.expanded_size.and_then(finite_size);
            rec.related_node_ids = Some(related_record(node));
        }
        _ => {
            let d = &node.details;
            rec.expandable = d.expandable;
            rec.description = d.description.clone();
            rec.detail_config = d.detail_config.as_ref().map(sanitize);
            rec.sub_type = d.sub_type.map(|s| match s {
                TerminatorKind::Start => "start".to_string(),
                TerminatorKind::End => "end".to_string(),
            });
            rec.background_color = d.background_color.clone();
            rec.related_node_ids = (!node.related_ids.is_empty()).then(|| related_record(node));
        }
    }
    rec
}

fn connector_record(edge: &Edge) -> ConnectorRecord {
    let mut style = StyleMap::new();
    for key in ["stroke", "strokeDasharray"] {
        if let Some(v @ Value::String(_)) = edge.style.get(key) {
            style.insert(key.to_string(), v.clone());
        }
    }
    if let Some(v @ Value::Number(_)) = edge.style.get("strokeWidth") {
        style.insert("strokeWidth".to_string(), v.clone());
    }

    ConnectorRecord {
        id: edge.id.to_string(),
        source_id: edge.source.to_string(),
        target_id: edge.target.to_string(),
        source_handle: edge.source_handle.clone().filter(|h| !h.is_empty()),
        target_handle: edge.target_handle.clone().filter(|h| !h.is_empty()),
        label: edge.label.clone(),
        style: (!style.is_empty()).then_some(style),
        label_style: edge.label_style.as_ref().map(sanitize_map),
        label_bg_style: edge.label_bg_style.as_ref().map(sanitize_map),
        marker_start: edge.marker_start.as_ref().map(finite_marker),
        marker_end: edge.marker_end.as_ref().map(finite_marker),
        data: edge.data.as_ref().map(sanitize),
        not_implemented: edge.not_implemented,
    }
}

/// Pretty-printed document JSON.
pub fn encode_document(doc: &FlowDocument) -> Result<String, CodecError> {
    Ok(serde_json::to_string_pretty(doc)?)
}

/// Convert and serialize in one step.
pub fn export_json(state: &GraphState, meta: &DocumentMeta) -> Result<String, CodecError> {
    encode_document(&FlowDocument::from_state(state, meta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn sanitize_drops_transient_keys_recursively() {
        let v = json!({
            "__rf": 1,
            "measured": {"width": 10},
            "keep": {"internals": true, "deep": [{"__x": 0, "y": 2}]}
        });
        assert_eq!(sanitize(&v), json!({"keep": {"deep": [{"y": 2}]}}));
    }

    #[test]
    fn top_handle_migrates_by_role() {
        assert_eq!(
            migrate_handle(Some("top".into()), HandleRole::Source).as_deref(),
            Some("top-source")
        );
        assert_eq!(
            migrate_handle(Some("top".into()), HandleRole::Target).as_deref(),
            Some("top-target")
        );
        assert_eq!(
            migrate_handle(Some("right-source".into()), HandleRole::Source).as_deref(),
            Some("right-source")
        );
    }

    #[test]
    fn missing_connectors_is_an_error() {
        let err = decode_document(r#"{"id":"x","name":"x","nodes":[]}"#).unwrap_err();
        assert!(matches!(err, CodecError::MissingField("connectors")));
    }

    #[test]
    fn non_array_nodes_is_an_error() {
        let err = decode_document(r#"{"nodes":{},"connectors":[]}"#).unwrap_err();
        assert!(matches!(err, CodecError::NotAnArray { field: "nodes" }));
    }

    #[test]
    fn non_finite_position_is_zeroed_on_export() {
        let node = Node::process("nf_export", "N").at(f64::NAN, 12.0);
        let rec = node_record(&node);
        assert_eq!(rec.position, Some(Point::new(0.0, 12.0)));
    }

    #[test]
    fn unsized_process_exports_fallback_size() {
        let node = Node::process("fallback_export", "N");
        assert_eq!(
            export_size(&node),
            SizeRecord {
                width: Some(150.0),
                height: Some(40.0)
            }
        );
    }
}
