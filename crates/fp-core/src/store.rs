//! Immutable graph snapshots and the store that owns the live one.
//!
//! `GraphState` shares its node and edge vectors through `Arc`, so cloning a
//! state is two pointer bumps. Any mutation goes through
//! [`GraphState::nodes_mut`] / [`GraphState::edges_mut`], which copy on write
//! and stamp a new revision. A snapshot handed to history can therefore
//! never observe a later edit.

use crate::color::normalize_color;
use crate::error::StoreError;
use crate::geometry::{Point, Rect, Size};
use crate::id::{EdgeId, NodeId};
use crate::model::{Edge, Marker, Node, NodeKind, NodeSize, RelatedIds, StyleMap, TerminatorKind};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static REVISION: AtomicU64 = AtomicU64::new(1);

fn next_revision() -> u64 {
    REVISION.fetch_add(1, Ordering::Relaxed)
}

// ─── GraphState ──────────────────────────────────────────────────────────

/// One complete, immutable view of the document.
#[derive(Debug, Clone, Default)]
pub struct GraphState {
    nodes: Arc<Vec<Node>>,
    edges: Arc<Vec<Edge>>,
    revision: u64,
}

/// Equality is structural; the revision stamp is ignored.
impl PartialEq for GraphState {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || (self.nodes == other.nodes && self.edges == other.edges)
    }
}

impl GraphState {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self {
            nodes: Arc::new(nodes),
            edges: Arc::new(edges),
            revision: next_revision(),
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Stamp of the last mutation. Every write produces a larger value.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// True when both states share the same storage (no edit in between).
    pub fn ptr_eq(&self, other: &GraphState) -> bool {
        Arc::ptr_eq(&self.nodes, &other.nodes) && Arc::ptr_eq(&self.edges, &other.edges)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn node_index(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    /// Direct children of `parent`, in document order.
    pub fn children_of(&self, parent: NodeId) -> impl Iterator<Item = &Node> {
        self.nodes
            .iter()
            .filter(move |n| n.parent_id == Some(parent))
    }

    pub fn selected_ids(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.selected)
            .map(|n| n.id)
            .chain(self.edges.iter().filter(|e| e.selected).map(|e| e.id))
            .collect()
    }

    pub fn selected_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.selected)
    }

    /// Canvas-absolute position, accumulating parent origins. Missing
    /// parents end the walk; a parent cycle is cut after one lap.
    pub fn absolute_position(&self, id: NodeId) -> Option<Point> {
        let node = self.node(id)?;
        let mut pos = node.position;
        let mut next = node.parent_id;
        let mut seen = HashSet::from([id]);
        while let Some(pid) = next {
            if !seen.insert(pid) {
                break;
            }
            let Some(parent) = self.node(pid) else {
                break;
            };
            pos = pos.offset(parent.position.x, parent.position.y);
            next = parent.parent_id;
        }
        Some(pos)
    }

    /// Absolute bounds using the node's content size.
    pub fn absolute_rect(&self, id: NodeId) -> Option<Rect> {
        let pos = self.absolute_position(id)?;
        let size = self.node(id)?.content_size();
        Some(Rect::from_origin_size(pos, size))
    }

    /// Mutable node list. Copies on write and bumps the revision.
    pub fn nodes_mut(&mut self) -> &mut Vec<Node> {
        self.revision = next_revision();
        Arc::make_mut(&mut self.nodes)
    }

    /// Mutable edge list. Copies on write and bumps the revision.
    pub fn edges_mut(&mut self) -> &mut Vec<Edge> {
        self.revision = next_revision();
        Arc::make_mut(&mut self.edges)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let idx = self.node_index(id)?;
        Some(&mut self.nodes_mut()[idx])
    }

    // ─── Pure operations ─────────────────────────────────────────────────

    /// New state with `node` appended.
    pub fn with_node(&self, node: Node) -> Result<GraphState, StoreError> {
        if self.contains_node(node.id) {
            return Err(StoreError::DuplicateId(node.id));
        }
        let mut next = self.clone();
        next.nodes_mut().push(node);
        Ok(next)
    }

    /// New state with `edge` appended. Both endpoints must exist.
    pub fn with_edge(&self, edge: Edge) -> Result<GraphState, StoreError> {
        if self.edge(edge.id).is_some() {
            return Err(StoreError::DuplicateId(edge.id));
        }
        for endpoint in [edge.source, edge.target] {
            if !self.contains_node(endpoint) {
                return Err(StoreError::DanglingEndpoint {
                    edge: edge.id,
                    node: endpoint,
                });
            }
        }
        let mut next = self.clone();
        next.edges_mut().push(edge);
        Ok(next)
    }

    /// New state without `ids`. Children of removed groups are detached and
    /// keep their on-screen position; edges touching removed nodes go too.
    pub fn without_nodes(&self, ids: &[NodeId]) -> GraphState {
        let doomed: HashSet<NodeId> = ids
            .iter()
            .copied()
            .filter(|id| self.contains_node(*id))
            .collect();
        if doomed.is_empty() {
            return self.clone();
        }

        // Resolve absolute positions before anything is removed.
        let detached: HashMap<NodeId, Point> = self
            .nodes
            .iter()
            .filter(|n| !doomed.contains(&n.id))
            .filter(|n| n.parent_id.is_some_and(|p| doomed.contains(&p)))
            .filter_map(|n| Some((n.id, self.absolute_position(n.id)?)))
            .collect();

        let mut next = self.clone();
        let nodes = next.nodes_mut();
        nodes.retain(|n| !doomed.contains(&n.id));
        for node in nodes.iter_mut() {
            if let Some(abs) = detached.get(&node.id) {
                log::debug!("detaching {:?} from removed parent", node.id);
                node.position = *abs;
                node.parent_id = None;
            }
        }
        next.edges_mut()
            .retain(|e| !doomed.contains(&e.source) && !doomed.contains(&e.target));
        next
    }

    pub fn without_edges(&self, ids: &[EdgeId]) -> GraphState {
        if !self.edges.iter().any(|e| ids.contains(&e.id)) {
            return self.clone();
        }
        let mut next = self.clone();
        next.edges_mut().retain(|e| !ids.contains(&e.id));
        next
    }

    pub fn with_node_patch(&self, id: NodeId, patch: NodePatch) -> Result<GraphState, StoreError> {
        let idx = self.node_index(id).ok_or(StoreError::NotFound(id))?;
        let mut next = self.clone();
        patch.apply(&mut next.nodes_mut()[idx]);
        Ok(next)
    }

    pub fn with_edge_patch(&self, id: EdgeId, patch: EdgePatch) -> Result<GraphState, StoreError> {
        let idx = self
            .edges
            .iter()
            .position(|e| e.id == id)
            .ok_or(StoreError::NotFound(id))?;
        let mut next = self.clone();
        patch.apply(&mut next.edges_mut()[idx]);
        Ok(next)
    }

    /// Select exactly `ids` (nodes and edges), deselecting everything else.
    pub fn with_selection(&self, ids: &[NodeId]) -> GraphState {
        let unchanged = self.nodes.iter().all(|n| n.selected == ids.contains(&n.id))
            && self.edges.iter().all(|e| e.selected == ids.contains(&e.id));
        if unchanged {
            return self.clone();
        }
        let mut next = self.clone();
        for node in next.nodes_mut() {
            node.selected = ids.contains(&node.id);
        }
        for edge in next.edges_mut() {
            edge.selected = ids.contains(&edge.id);
        }
        next
    }
}

// ─── Containment ordering ────────────────────────────────────────────────

/// Number of ancestors reachable through existing parents, cycle-safe.
fn depths(nodes: &[Node]) -> HashMap<NodeId, usize> {
    let parent_of: HashMap<NodeId, Option<NodeId>> =
        nodes.iter().map(|n| (n.id, n.parent_id)).collect();
    nodes
        .iter()
        .map(|n| {
            let mut depth = 0;
            let mut next = n.parent_id;
            while let Some(pid) = next {
                if depth >= nodes.len() {
                    break;
                }
                match parent_of.get(&pid) {
                    Some(grand) => {
                        depth += 1;
                        next = *grand;
                    }
                    None => break,
                }
            }
            (n.id, depth)
        })
        .collect()
}

/// Whether every node appears after the node it names as parent.
pub fn is_parents_first(nodes: &[Node]) -> bool {
    let mut seen = HashSet::with_capacity(nodes.len());
    let all: HashSet<NodeId> = nodes.iter().map(|n| n.id).collect();
    for node in nodes {
        if node
            .parent_id
            .is_some_and(|pid| all.contains(&pid) && !seen.contains(&pid))
        {
            return false;
        }
        seen.insert(node.id);
    }
    true
}

/// Stable reorder so that parents precede their children. Nodes at the same
/// nesting depth keep their relative order.
pub fn sort_parents_first(nodes: &mut [Node]) {
    if is_parents_first(nodes) {
        return;
    }
    let depth = depths(nodes);
    nodes.sort_by_key(|n| depth.get(&n.id).copied().unwrap_or(0));
}

// ─── Patches ─────────────────────────────────────────────────────────────

/// Partial node update. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct NodePatch {
    pub name: Option<String>,
    pub position: Option<Point>,
    pub size: Option<NodeSize>,
    pub measured: Option<Size>,
    /// `Some(None)` clears the parent.
    pub parent_id: Option<Option<NodeId>>,
    /// Merged key by key; a JSON `null` removes the key.
    pub style: Option<StyleMap>,
    pub related_ids: Option<RelatedIds>,
    pub description: Option<String>,
    pub detail_config: Option<serde_json::Value>,
    pub sub_type: Option<Option<TerminatorKind>>,
    pub background_color: Option<String>,
    pub expandable: Option<bool>,
    pub label: Option<String>,
    pub color: Option<String>,
    pub selected: Option<bool>,
    pub hidden: Option<bool>,
}

impl NodePatch {
    pub fn position(pos: Point) -> Self {
        Self {
            position: Some(pos),
            ..Self::default()
        }
    }

    pub fn size(size: NodeSize) -> Self {
        Self {
            size: Some(size),
            ..Self::default()
        }
    }

    pub fn measured(size: Size) -> Self {
        Self {
            measured: Some(size),
            ..Self::default()
        }
    }

    pub fn apply(self, node: &mut Node) {
        if let Some(name) = self.name {
            node.name = name;
        }
        if let Some(pos) = self.position {
            node.position = pos;
        }
        if let Some(size) = self.size {
            node.size = size;
        }
        if let Some(m) = self.measured {
            node.measured = Some(m);
        }
        if let Some(parent) = self.parent_id {
            node.parent_id = parent;
        }
        if let Some(style) = self.style {
            merge_style(&mut node.style, style);
        }
        if let Some(related) = self.related_ids {
            node.related_ids = RelatedIds::new();
            for id in related {
                node.relate(id);
            }
        }
        if let Some(desc) = self.description {
            node.details.description = Some(desc);
        }
        if let Some(cfg) = self.detail_config {
            node.details.detail_config = Some(cfg);
        }
        if let Some(sub) = self.sub_type {
            node.details.sub_type = sub;
        }
        if let Some(bg) = self.background_color {
            node.details.background_color = Some(normalize_color(&bg));
        }
        if let Some(expandable) = self.expandable {
            node.details.expandable = expandable;
        }
        if let Some(selected) = self.selected {
            node.selected = selected;
        }
        if let Some(hidden) = self.hidden {
            node.hidden = hidden;
        }
        if let Some(group) = node.group_data_mut() {
            if let Some(label) = self.label {
                group.label = label;
            }
            if let Some(color) = self.color {
                group.color = normalize_color(&color);
            }
        }
        hoist_shape_background(node);
    }
}

/// Decision and data nodes draw their fill from `backgroundColor`, not from
/// the box style, so a plain colour set on the style is moved across.
fn hoist_shape_background(node: &mut Node) {
    if !matches!(node.kind, NodeKind::Decision | NodeKind::Data) {
        return;
    }
    let bg = ["backgroundColor", "background"]
        .iter()
        .filter_map(|k| node.style.remove(*k))
        .filter_map(|v| v.as_str().map(str::to_string))
        .find(|s| !s.is_empty() && !s.contains("gradient") && !s.contains("url"));
    if let Some(bg) = bg {
        node.details.background_color = Some(normalize_color(&bg));
    }
}

fn merge_style(target: &mut StyleMap, patch: StyleMap) {
    for (key, value) in patch {
        if value.is_null() {
            target.remove(&key);
        } else {
            target.insert(key, value);
        }
    }
}

/// Partial edge update. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct EdgePatch {
    pub label: Option<Option<String>>,
    pub style: Option<StyleMap>,
    pub label_style: Option<Option<StyleMap>>,
    pub label_bg_style: Option<Option<StyleMap>>,
    pub marker_start: Option<Option<Marker>>,
    pub marker_end: Option<Option<Marker>>,
    pub source_handle: Option<Option<String>>,
    pub target_handle: Option<Option<String>>,
    pub data: Option<Option<serde_json::Value>>,
    pub not_implemented: Option<Option<bool>>,
    pub selected: Option<bool>,
}

impl EdgePatch {
    pub fn apply(self, edge: &mut Edge) {
        if let Some(label) = self.label {
            edge.label = label;
        }
        if let Some(mut style) = self.style {
            for key in ["stroke", "fill"] {
                if let Some(serde_json::Value::String(c)) = style.get(key) {
                    let normalized = normalize_color(c);
                    style.insert(key.to_string(), serde_json::Value::String(normalized));
                }
            }
            merge_style(&mut edge.style, style);
        }
        if let Some(s) = self.label_style {
            edge.label_style = s;
        }
        if let Some(s) = self.label_bg_style {
            edge.label_bg_style = s;
        }
        if let Some(m) = self.marker_start {
            edge.marker_start = m;
        }
        if let Some(m) = self.marker_end {
            edge.marker_end = m;
        }
        if let Some(h) = self.source_handle {
            edge.source_handle = h;
        }
        if let Some(h) = self.target_handle {
            edge.target_handle = h;
        }
        if let Some(d) = self.data {
            edge.data = d;
        }
        if let Some(n) = self.not_implemented {
            edge.not_implemented = n;
        }
        if let Some(selected) = self.selected {
            edge.selected = selected;
        }
    }
}

// ─── GraphStore ──────────────────────────────────────────────────────────

/// Owner of the live graph. Every mutation swaps in a new `GraphState`
/// and returns it; rejected mutations leave the live state untouched.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    state: GraphState,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: GraphState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &GraphState {
        &self.state
    }

    /// A cheap, immutable copy of the live state.
    #[must_use]
    pub fn snapshot(&self) -> GraphState {
        self.state.clone()
    }

    fn commit(&mut self, next: GraphState) -> GraphState {
        self.state = next;
        self.state.clone()
    }

    pub fn add_node(&mut self, node: Node) -> Result<GraphState, StoreError> {
        let next = self.state.with_node(node)?;
        Ok(self.commit(next))
    }

    pub fn add_edge(&mut self, edge: Edge) -> Result<GraphState, StoreError> {
        let next = self.state.with_edge(edge)?;
        Ok(self.commit(next))
    }

    pub fn remove_nodes(&mut self, ids: &[NodeId]) -> GraphState {
        let next = self.state.without_nodes(ids);
        self.commit(next)
    }

    pub fn remove_edges(&mut self, ids: &[EdgeId]) -> GraphState {
        let next = self.state.without_edges(ids);
        self.commit(next)
    }

    pub fn update_node(&mut self, id: NodeId, patch: NodePatch) -> Result<GraphState, StoreError> {
        let next = self.state.with_node_patch(id, patch)?;
        Ok(self.commit(next))
    }

    pub fn update_edge(&mut self, id: EdgeId, patch: EdgePatch) -> Result<GraphState, StoreError> {
        let next = self.state.with_edge_patch(id, patch)?;
        Ok(self.commit(next))
    }

    /// Swap in a whole state (undo/redo, import).
    pub fn replace(&mut self, state: GraphState) -> GraphState {
        self.commit(state)
    }

    pub fn set_selection(&mut self, ids: &[NodeId]) -> GraphState {
        let next = self.state.with_selection(ids);
        self.commit(next)
    }

    pub fn selected_ids(&self) -> Vec<NodeId> {
        self.state.selected_ids()
    }

    pub fn absolute_position(&self, id: NodeId) -> Option<Point> {
        self.state.absolute_position(id)
    }

    /// Nodes in render order: every group before the nodes it contains.
    pub fn render_nodes(&self) -> Vec<&Node> {
        let nodes = self.state.nodes();
        if is_parents_first(nodes) {
            return nodes.iter().collect();
        }
        let depth = depths(nodes);
        let mut out: Vec<&Node> = nodes.iter().collect();
        out.sort_by_key(|n| depth.get(&n.id).copied().unwrap_or(0));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn id(s: &str) -> NodeId {
        NodeId::intern(s)
    }

    #[test]
    fn snapshot_is_isolated_from_later_edits() {
        let mut store = GraphStore::new();
        store.add_node(Node::process("iso_a", "A").at(10.0, 10.0)).unwrap();
        let before = store.snapshot();
        store
            .update_node(id("iso_a"), NodePatch::position(Point::new(99.0, 99.0)))
            .unwrap();
        assert_eq!(before.node(id("iso_a")).unwrap().position, Point::new(10.0, 10.0));
        assert!(!before.ptr_eq(store.state()));
        assert!(store.state().revision() > before.revision());
    }

    #[test]
    fn duplicate_node_is_rejected() {
        let mut store = GraphStore::new();
        store.add_node(Node::process("dup_a", "A")).unwrap();
        let err = store.add_node(Node::process("dup_a", "again")).unwrap_err();
        assert_eq!(err, StoreError::DuplicateId(id("dup_a")));
        assert_eq!(store.state().nodes().len(), 1);
    }

    #[test]
    fn edge_to_unknown_node_is_rejected() {
        let mut store = GraphStore::new();
        store.add_node(Node::process("de_a", "A")).unwrap();
        let err = store
            .add_edge(Edge::new(id("de_e"), id("de_a"), id("de_missing")))
            .unwrap_err();
        assert!(matches!(err, StoreError::DanglingEndpoint { .. }));
    }

    #[test]
    fn update_unknown_node_is_not_found() {
        let mut store = GraphStore::new();
        let err = store.update_node(id("nf_x"), NodePatch::default()).unwrap_err();
        assert_eq!(err, StoreError::NotFound(id("nf_x")));
    }

    #[test]
    fn removing_group_detaches_children_at_absolute_position() {
        let g = Node::group("rm_g", "G").at(100.0, 50.0).sized(300.0, 200.0);
        let c = Node::process("rm_c", "C").at(20.0, 60.0).in_group(g.id);
        let other = Node::process("rm_o", "O").at(500.0, 0.0);
        let e1 = Edge::new(id("rm_e1"), id("rm_g"), id("rm_o"));
        let e2 = Edge::new(id("rm_e2"), id("rm_c"), id("rm_o"));
        let mut store = GraphStore::from_state(GraphState::new(vec![g, c, other], vec![e1, e2]));

        let after = store.remove_nodes(&[id("rm_g")]);
        let child = after.node(id("rm_c")).unwrap();
        assert_eq!(child.position, Point::new(120.0, 110.0));
        assert_eq!(child.parent_id, None);
        assert_eq!(after.edges().len(), 1);
        assert_eq!(after.edges()[0].id, id("rm_e2"));
    }

    #[test]
    fn style_patch_merges_and_removes_null_keys() {
        let mut n = Node::process("sp_a", "A");
        n.style.insert("fontSize".into(), json!(12));
        n.style.insert("borderColor".into(), json!("#000"));
        let mut style = StyleMap::new();
        style.insert("fontSize".into(), json!(14));
        style.insert("borderColor".into(), serde_json::Value::Null);
        NodePatch {
            style: Some(style),
            ..NodePatch::default()
        }
        .apply(&mut n);
        assert_eq!(n.style.get("fontSize"), Some(&json!(14)));
        assert!(!n.style.contains_key("borderColor"));
    }

    #[test]
    fn decision_background_moves_out_of_style() {
        let mut n = Node::new(id("bg_d"), NodeKind::Decision);
        let mut style = StyleMap::new();
        style.insert("backgroundColor".into(), json!("#FFF"));
        NodePatch {
            style: Some(style),
            ..NodePatch::default()
        }
        .apply(&mut n);
        assert_eq!(n.details.background_color.as_deref(), Some("#ffffff"));
        assert!(!n.style.contains_key("backgroundColor"));
    }

    #[test]
    fn group_colour_is_normalized() {
        let mut g = Node::group("gc_g", "G");
        NodePatch {
            color: Some("rgb(255, 0, 0)".into()),
            ..NodePatch::default()
        }
        .apply(&mut g);
        assert_eq!(g.group_data().unwrap().color, "#ff0000");
    }

    #[test]
    fn render_order_puts_parents_first() {
        let g = Node::group("ro_g", "G");
        let c = Node::process("ro_c", "C").in_group(g.id);
        let store = GraphStore::from_state(GraphState::new(vec![c, g], vec![]));
        let order: Vec<&str> = store.render_nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(order, vec!["ro_g", "ro_c"]);
    }

    #[test]
    fn sort_parents_first_is_stable_within_depth() {
        let outer = Node::group("sp_outer", "Outer");
        let inner = Node::group("sp_inner", "Inner").in_group(outer.id);
        let leaf = Node::process("sp_leaf", "Leaf").in_group(inner.id);
        let free_a = Node::process("sp_a", "A");
        let free_b = Node::process("sp_b", "B");
        let mut nodes = vec![leaf, free_a, inner, free_b, outer];
        sort_parents_first(&mut nodes);
        let order: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(order, vec!["sp_a", "sp_b", "sp_outer", "sp_inner", "sp_leaf"]);
    }

    #[test]
    fn selection_covers_nodes_and_edges() {
        let a = Node::process("sel_a", "A");
        let b = Node::process("sel_b", "B");
        let e = Edge::new(id("sel_e"), a.id, b.id);
        let mut store = GraphStore::from_state(GraphState::new(vec![a, b], vec![e]));
        store.set_selection(&[id("sel_b"), id("sel_e")]);
        assert_eq!(store.selected_ids(), vec![id("sel_b"), id("sel_e")]);
    }
}
