//! Mutation dispatch: every edit the canvas can make, as data.
//!
//! The canvas (or any other front end) describes what the user did as a
//! [`GraphMutation`]; [`reduce`] turns the current state plus that mutation
//! into the next state. The reducer is pure, so the same input always
//! produces the same output and a failed mutation leaves nothing behind.
//! Every successful result passes through the containment healer.

use crate::align::{AlignOp, align, apply_moves};
use crate::error::EditError;
use crate::grouping::{self, child_extent, heal};
use fp_core::codec::DEFAULT_EDGE_STROKE;
use fp_core::geometry::{Point, Size};
use fp_core::model::{
    DEFAULT_NODE_SIZE, Edge, Marker, Node, NodeKind, NodeSize, StyleMap, TerminatorKind,
};
use fp_core::names::unique_name;
use fp_core::store::{EdgePatch, GraphState, NodePatch};
use fp_core::{EdgeId, NodeId};
use serde_json::json;

/// A single edit to the graph.
#[derive(Debug, Clone)]
pub enum GraphMutation {
    AddNode {
        node: Box<Node>,
    },
    /// Delete nodes. Children of a deleted group stay, detached in place.
    RemoveNodes {
        ids: Vec<NodeId>,
    },
    UpdateNode {
        id: NodeId,
        patch: Box<NodePatch>,
    },
    /// Move by a delta. Children are kept inside their group.
    MoveNode {
        id: NodeId,
        dx: f64,
        dy: f64,
    },
    /// Groups never shrink below their content.
    ResizeNode {
        id: NodeId,
        width: f64,
        height: f64,
    },
    AddEdge {
        edge: Box<Edge>,
    },
    /// Connect two nodes with a default-styled edge.
    Connect(Connection),
    RemoveEdges {
        ids: Vec<EdgeId>,
    },
    UpdateEdge {
        id: EdgeId,
        patch: Box<EdgePatch>,
    },
    CreateGroup {
        ids: Vec<NodeId>,
        group_id: NodeId,
        label: Option<String>,
    },
    DissolveGroup {
        id: NodeId,
    },
    AddToGroup {
        ids: Vec<NodeId>,
        group: NodeId,
    },
    RemoveFromGroup {
        id: NodeId,
    },
    SetCollapsed {
        id: NodeId,
        collapsed: bool,
    },
    SetSelection {
        ids: Vec<NodeId>,
    },
    Align {
        ids: Vec<NodeId>,
        op: AlignOp,
    },
    RenameGroup {
        id: NodeId,
        label: String,
    },
}

impl GraphMutation {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            GraphMutation::AddNode { .. } => "add-node",
            GraphMutation::RemoveNodes { .. } => "remove-nodes",
            GraphMutation::UpdateNode { .. } => "update-node",
            GraphMutation::MoveNode { .. } => "move-node",
            GraphMutation::ResizeNode { .. } => "resize-node",
            GraphMutation::AddEdge { .. } => "add-edge",
            GraphMutation::Connect(_) => "connect",
            GraphMutation::RemoveEdges { .. } => "remove-edges",
            GraphMutation::UpdateEdge { .. } => "update-edge",
            GraphMutation::CreateGroup { .. } => "create-group",
            GraphMutation::DissolveGroup { .. } => "dissolve-group",
            GraphMutation::AddToGroup { .. } => "add-to-group",
            GraphMutation::RemoveFromGroup { .. } => "remove-from-group",
            GraphMutation::SetCollapsed { .. } => "set-collapsed",
            GraphMutation::SetSelection { .. } => "set-selection",
            GraphMutation::Align { .. } => "align",
            GraphMutation::RenameGroup { .. } => "rename-group",
        }
    }

    /// Whether the mutation only changes selection, which is not worth
    /// an undo step.
    pub fn is_selection_only(&self) -> bool {
        matches!(self, GraphMutation::SetSelection { .. })
    }
}

// ─── Connections ─────────────────────────────────────────────────────────

/// A connection request from the canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub source: NodeId,
    pub target: NodeId,
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
}

impl Connection {
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self {
            source,
            target,
            source_handle: None,
            target_handle: None,
        }
    }

    pub fn handles(mut self, source: &str, target: &str) -> Self {
        self.source_handle = Some(source.to_string());
        self.target_handle = Some(target.to_string());
        self
    }
}

/// Check a connection against the current graph.
pub fn validate_connection(state: &GraphState, conn: &Connection) -> Result<(), EditError> {
    if conn.source == conn.target {
        return Err(EditError::InvalidConnection("a node cannot connect to itself"));
    }
    if !state.contains_node(conn.source) || !state.contains_node(conn.target) {
        return Err(EditError::InvalidConnection("both endpoints must exist"));
    }
    if conn
        .source_handle
        .as_deref()
        .is_some_and(|h| h.ends_with("-target"))
    {
        return Err(EditError::InvalidConnection("a target handle cannot start a connection"));
    }
    Ok(())
}

/// `edge-{source}-{target}-{n}` with the smallest `n` not yet used.
pub fn fresh_edge_id(source: NodeId, target: NodeId) -> EdgeId {
    let mut n = 0u64;
    loop {
        let candidate = format!("edge-{source}-{target}-{n}");
        if !NodeId::is_known(&candidate) {
            return NodeId::intern(&candidate);
        }
        n += 1;
    }
}

/// The edge a fresh connection creates.
pub fn connection_edge(conn: &Connection) -> Edge {
    let mut edge = Edge::new(fresh_edge_id(conn.source, conn.target), conn.source, conn.target);
    edge.source_handle = conn.source_handle.clone();
    edge.target_handle = conn.target_handle.clone();
    edge.style.insert("stroke".into(), json!(DEFAULT_EDGE_STROKE));
    edge.style.insert("strokeWidth".into(), json!(1));
    let mut label_bg = StyleMap::new();
    label_bg.insert("fill".into(), json!("#ffffff"));
    label_bg.insert("fillOpacity".into(), json!(0.8));
    edge.label_bg_style = Some(label_bg);
    edge.marker_end = Some(Marker::arrow_closed(DEFAULT_EDGE_STROKE));
    edge
}

// ─── New nodes ───────────────────────────────────────────────────────────

fn base_name(kind: &NodeKind) -> &'static str {
    match kind {
        NodeKind::Process => "New process",
        NodeKind::Decision => "New decision",
        NodeKind::Data => "New data",
        NodeKind::Terminator => "New start",
        NodeKind::Subprocess => "New subprocess",
        NodeKind::Group(_) => grouping::DEFAULT_GROUP_LABEL,
    }
}

/// A new node of `kind` at `position`, named uniquely against `state`.
pub fn template_node(state: &GraphState, kind: NodeKind, id: NodeId, position: Point) -> Node {
    let name = unique_name(base_name(&kind), grouping::existing_names(state));
    let fill = match kind {
        NodeKind::Terminator => Some("#dcfce7"),
        NodeKind::Process | NodeKind::Decision => Some("#ffffff"),
        _ => None,
    };
    let is_decision = kind == NodeKind::Decision;
    let is_terminator = kind == NodeKind::Terminator;

    let mut node = Node::new(id, kind);
    node.name = name.clone();
    node.position = position;
    node.size = NodeSize::from(DEFAULT_NODE_SIZE);
    if let Some(g) = node.group_data_mut() {
        g.label = name;
    } else {
        node.details.expandable = true;
        node.details.detail_config = Some(json!({ "databaseTables": [] }));
        node.style.insert("fontSize".into(), json!(9));
        node.style.insert("borderColor".into(), json!("#cbd5e1"));
    }
    if let Some(fill) = fill {
        node.style.insert("backgroundColor".into(), json!(fill));
    }
    if is_decision {
        node.details.background_color = Some("#ffffff".into());
    }
    if is_terminator {
        node.details.sub_type = Some(TerminatorKind::Start);
    }
    node
}

// ─── Reducer ─────────────────────────────────────────────────────────────

fn move_node(state: &GraphState, id: NodeId, dx: f64, dy: f64) -> Result<GraphState, EditError> {
    let node = state.node(id).ok_or(fp_core::StoreError::NotFound(id))?;
    let mut target = node.position.offset(dx, dy);
    if let Some(parent) = node.parent_id.and_then(|p| state.node(p)) {
        target = child_extent(node, parent).clamp(target);
    }
    if target == node.position {
        return Ok(state.clone());
    }
    Ok(state.with_node_patch(id, NodePatch::position(target))?)
}

fn resize_node(
    state: &GraphState,
    id: NodeId,
    width: f64,
    height: f64,
) -> Result<GraphState, EditError> {
    let node = state.node(id).ok_or(fp_core::StoreError::NotFound(id))?;
    if node.is_group() {
        return Ok(grouping::resize_group(state, id, Size::new(width, height))?);
    }
    Ok(state.with_node_patch(id, NodePatch::size(NodeSize::fixed(width, height)))?)
}

/// Apply `mutation` to `state`. Pure: `state` is never modified.
pub fn reduce(state: &GraphState, mutation: GraphMutation) -> Result<GraphState, EditError> {
    let next = match mutation {
        GraphMutation::AddNode { node } => state.with_node(*node)?,
        GraphMutation::RemoveNodes { ids } => state.without_nodes(&ids),
        GraphMutation::UpdateNode { id, patch } => state.with_node_patch(id, *patch)?,
        GraphMutation::MoveNode { id, dx, dy } => move_node(state, id, dx, dy)?,
        GraphMutation::ResizeNode { id, width, height } => resize_node(state, id, width, height)?,
        GraphMutation::AddEdge { edge } => state.with_edge(*edge)?,
        GraphMutation::Connect(conn) => {
            validate_connection(state, &conn)?;
            state.with_edge(connection_edge(&conn))?
        }
        GraphMutation::RemoveEdges { ids } => state.without_edges(&ids),
        GraphMutation::UpdateEdge { id, patch } => state.with_edge_patch(id, *patch)?,
        GraphMutation::CreateGroup { ids, group_id, label } => {
            grouping::create_group(state, &ids, group_id, label.as_deref())?
        }
        GraphMutation::DissolveGroup { id } => grouping::dissolve_group(state, id)?,
        GraphMutation::AddToGroup { ids, group } => grouping::add_to_group(state, &ids, group)?,
        GraphMutation::RemoveFromGroup { id } => grouping::remove_from_group(state, id)?,
        GraphMutation::SetCollapsed { id, collapsed } => {
            grouping::set_collapsed(state, id, collapsed)?
        }
        GraphMutation::SetSelection { ids } => state.with_selection(&ids),
        GraphMutation::Align { ids, op } => apply_moves(state, &align(state, &ids, op)),
        GraphMutation::RenameGroup { id, label } => grouping::rename_group(state, id, &label)?,
    };
    let (healed, report) = heal(&next);
    if !report.is_clean() {
        log::debug!("heal after mutation: {report:?}");
    }
    Ok(healed)
}
