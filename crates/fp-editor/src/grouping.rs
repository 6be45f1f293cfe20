//! Group containers: creation, dissolution, membership, sizing, and the
//! self-healing pass that keeps parent references valid.
//!
//! Every operation takes a `&GraphState` and returns a new state, leaving
//! the input untouched. Child positions are always stored relative to the
//! parent's origin; conversions go through absolute coordinates so that a
//! node never jumps on screen when its parent changes.

use crate::error::GroupError;
use fp_core::geometry::{Point, Rect, Size, bounding_box, to_relative};
use fp_core::model::{GroupData, Node, NodeKind, NodeSize};
use fp_core::names::unique_name;
use fp_core::store::{GraphState, is_parents_first, sort_parents_first};
use fp_core::{EdgeId, NodeId};
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use std::collections::{HashMap, HashSet};

/// Space between the children's bounding box and the group border.
pub const GROUP_PADDING: f64 = 20.0;
/// Height of the label band at the top of a group.
pub const GROUP_HEADER: f64 = 40.0;
/// Minimum gap kept between a child and its group's border.
pub const EXTENT_PADDING: f64 = 5.0;
/// Smallest size of a group without children.
pub const EMPTY_GROUP_MIN: Size = Size::new(200.0, 80.0);
/// Size of a collapsed group.
pub const COLLAPSED_SIZE: Size = Size::new(150.0, 60.0);

pub const DEFAULT_GROUP_LABEL: &str = "New group";

/// Display names currently in use, for unique naming.
pub fn existing_names(state: &GraphState) -> Vec<&str> {
    state
        .nodes()
        .iter()
        .map(Node::display_name)
        .filter(|n| !n.is_empty())
        .collect()
}

fn require_group(state: &GraphState, id: NodeId) -> Result<&Node, GroupError> {
    let node = state.node(id).ok_or(GroupError::NotFound(id))?;
    if !node.is_group() {
        return Err(GroupError::NotAGroup(id));
    }
    Ok(node)
}

/// Whether `ancestor` is `node` or one of its parents.
fn is_ancestor_or_self(state: &GraphState, ancestor: NodeId, node: NodeId) -> bool {
    let mut cursor = Some(node);
    let mut steps = 0;
    while let Some(id) = cursor {
        if id == ancestor {
            return true;
        }
        steps += 1;
        if steps > state.nodes().len() {
            return false;
        }
        cursor = state.node(id).and_then(|n| n.parent_id);
    }
    false
}

// ─── Create / dissolve ───────────────────────────────────────────────────

/// Wrap the eligible nodes among `ids` (existing, not groups, not already
/// in a group) in a new group sized to their bounding box plus padding and
/// header. The group goes first in the node list; selection is cleared.
pub fn create_group(
    state: &GraphState,
    ids: &[NodeId],
    group_id: NodeId,
    label: Option<&str>,
) -> Result<GraphState, GroupError> {
    if state.contains_node(group_id) {
        return Err(GroupError::IdInUse(group_id));
    }
    let eligible: HashSet<NodeId> = state
        .nodes()
        .iter()
        .filter(|n| ids.contains(&n.id) && !n.is_group() && n.parent_id.is_none())
        .map(|n| n.id)
        .collect();
    let bounds = bounding_box(
        state
            .nodes()
            .iter()
            .filter(|n| eligible.contains(&n.id))
            .map(|n| Rect::from_origin_size(n.position, n.content_size())),
    )
    .ok_or(GroupError::EmptySelection)?;

    let label = unique_name(label.unwrap_or(DEFAULT_GROUP_LABEL), existing_names(state));
    let origin = Point::new(
        bounds.x - GROUP_PADDING,
        bounds.y - GROUP_PADDING - GROUP_HEADER,
    );
    let mut group = Node::new(group_id, NodeKind::Group(GroupData::new(label.clone())));
    group.name = label;
    group.position = origin;
    group.size = NodeSize::fixed(
        bounds.width + GROUP_PADDING * 2.0,
        bounds.height + GROUP_PADDING * 2.0 + GROUP_HEADER,
    );

    let mut next = state.clone();
    let nodes = next.nodes_mut();
    for node in nodes.iter_mut() {
        node.selected = false;
        if eligible.contains(&node.id) {
            node.position = to_relative(node.position, origin);
            node.parent_id = Some(group_id);
        }
    }
    nodes.insert(0, group);
    log::debug!("grouped {} nodes into {:?}", eligible.len(), group_id);
    Ok(next)
}

/// Remove a group, handing its children to the group's own parent (or the
/// canvas) without moving them on screen. Edges attached to the group are
/// dropped with it.
pub fn dissolve_group(state: &GraphState, id: NodeId) -> Result<GraphState, GroupError> {
    let group = require_group(state, id)?;
    let offset = group.position;
    let grandparent = group.parent_id;

    let mut next = state.clone();
    let nodes = next.nodes_mut();
    nodes.retain(|n| n.id != id);
    for node in nodes.iter_mut().filter(|n| n.parent_id == Some(id)) {
        node.position = node.position.offset(offset.x, offset.y);
        node.parent_id = grandparent;
    }
    next.edges_mut().retain(|e| !e.touches(id));
    Ok(next)
}

// ─── Membership ──────────────────────────────────────────────────────────

/// Move nodes into `group`, keeping their on-screen position. Nodes
/// already in the group are left alone. Nesting a group inside itself or
/// one of its descendants is refused.
pub fn add_to_group(
    state: &GraphState,
    ids: &[NodeId],
    group: NodeId,
) -> Result<GraphState, GroupError> {
    require_group(state, group)?;
    let origin = state
        .absolute_position(group)
        .ok_or(GroupError::NotFound(group))?;

    let mut moves = Vec::new();
    for &id in ids {
        let node = state.node(id).ok_or(GroupError::NotFound(id))?;
        if node.parent_id == Some(group) {
            continue;
        }
        if is_ancestor_or_self(state, id, group) {
            return Err(GroupError::Cycle { node: id, group });
        }
        if let Some(abs) = state.absolute_position(id) {
            moves.push((id, to_relative(abs, origin)));
        }
    }
    if moves.is_empty() {
        return Ok(state.clone());
    }

    let mut next = state.clone();
    for (id, rel) in moves {
        if let Some(node) = next.node_mut(id) {
            node.position = rel;
            node.parent_id = Some(group);
        }
    }
    sort_parents_first(next.nodes_mut());
    Ok(next)
}

/// Take a node out of its group, keeping its on-screen position. A node
/// without a parent is returned unchanged.
pub fn remove_from_group(state: &GraphState, id: NodeId) -> Result<GraphState, GroupError> {
    let node = state.node(id).ok_or(GroupError::NotFound(id))?;
    if node.parent_id.is_none() {
        return Ok(state.clone());
    }
    let abs = state.absolute_position(id).unwrap_or(node.position);
    let mut next = state.clone();
    if let Some(node) = next.node_mut(id) {
        node.position = abs;
        node.parent_id = None;
    }
    Ok(next)
}

/// Relabel a group. The label is made unique among the other nodes.
pub fn rename_group(state: &GraphState, id: NodeId, label: &str) -> Result<GraphState, GroupError> {
    let group = require_group(state, id)?;
    if group.display_name() == label {
        return Ok(state.clone());
    }
    let others: Vec<&str> = state
        .nodes()
        .iter()
        .filter(|n| n.id != id)
        .map(Node::display_name)
        .collect();
    let label = unique_name(label, others);
    let mut next = state.clone();
    if let Some(node) = next.node_mut(id) {
        node.name = label.clone();
        if let Some(g) = node.group_data_mut() {
            g.label = label;
        }
    }
    Ok(next)
}

// ─── Extents and sizing ──────────────────────────────────────────────────

/// Allowed range for a child's relative position inside its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min: Point,
    pub max: Point,
}

impl Extent {
    pub fn clamp(&self, p: Point) -> Point {
        Point::new(
            p.x.max(self.min.x).min(self.max.x),
            p.y.max(self.min.y).min(self.max.y),
        )
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// Movement bounds for `child` inside `parent`: below the header band and
/// inside the border, never inverted even when the child is larger than
/// the parent.
pub fn child_extent(child: &Node, parent: &Node) -> Extent {
    let c = child.content_size();
    let p = parent.frame_size();
    let min = Point::new(EXTENT_PADDING, GROUP_HEADER + EXTENT_PADDING);
    let max = Point::new(
        min.x.max(p.width - c.width - EXTENT_PADDING),
        min.y.max(p.height - c.height - EXTENT_PADDING),
    );
    Extent { min, max }
}

/// Extent of every child whose parent exists. Computed fresh each call.
pub fn extents(state: &GraphState) -> HashMap<NodeId, Extent> {
    state
        .nodes()
        .iter()
        .filter_map(|child| {
            let parent = state.node(child.parent_id?)?;
            Some((child.id, child_extent(child, parent)))
        })
        .collect()
}

/// Smallest size `group` may be resized to without clipping a child.
pub fn min_container_size(state: &GraphState, group: &Node) -> Size {
    if group.group_data().is_some_and(|g| g.collapsed) {
        return COLLAPSED_SIZE;
    }
    let mut children = state.children_of(group.id).peekable();
    if children.peek().is_none() {
        return EMPTY_GROUP_MIN;
    }
    let (w, h) = children.fold((0.0_f64, 0.0_f64), |(w, h), c| {
        let s = c.content_size();
        (w.max(c.position.x + s.width), h.max(c.position.y + s.height))
    });
    Size::new(w + EXTENT_PADDING, h + EXTENT_PADDING)
}

/// Resize a group, never below [`min_container_size`].
pub fn resize_group(state: &GraphState, id: NodeId, size: Size) -> Result<GraphState, GroupError> {
    let group = require_group(state, id)?;
    let min = min_container_size(state, group);
    let clamped = Size::new(size.width.max(min.width), size.height.max(min.height));
    if group.size.resolved() == Some(clamped) {
        return Ok(state.clone());
    }
    let mut next = state.clone();
    if let Some(node) = next.node_mut(id) {
        node.size = NodeSize::from(clamped);
    }
    Ok(next)
}

/// Collapse or expand a group. Collapsing remembers the explicit size and
/// hides the direct children; expanding restores both.
pub fn set_collapsed(
    state: &GraphState,
    id: NodeId,
    collapsed: bool,
) -> Result<GraphState, GroupError> {
    let group = require_group(state, id)?;
    if group.group_data().is_some_and(|g| g.collapsed == collapsed) {
        return Ok(state.clone());
    }

    let mut next = state.clone();
    let nodes = next.nodes_mut();
    for node in nodes.iter_mut() {
        if node.id == id {
            let current = node.size;
            let mut restored = NodeSize::AUTO;
            if let Some(g) = node.group_data_mut() {
                g.collapsed = collapsed;
                if collapsed {
                    g.expanded_size = current.resolved();
                } else if let Some(size) = g.expanded_size.take() {
                    restored = NodeSize::from(size);
                }
            }
            node.size = if collapsed {
                NodeSize::from(COLLAPSED_SIZE)
            } else {
                restored
            };
        } else if node.parent_id == Some(id) {
            node.hidden = collapsed;
        }
    }
    Ok(next)
}

// ─── Self-healing ────────────────────────────────────────────────────────

/// What a [`heal`] pass repaired.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealReport {
    /// Nodes whose parent reference was cleared.
    pub cleared_parents: Vec<NodeId>,
    /// Edges removed because an endpoint no longer exists.
    pub dropped_edges: Vec<EdgeId>,
    /// Whether nodes were reordered parent-before-child.
    pub reordered: bool,
}

impl HealReport {
    pub fn is_clean(&self) -> bool {
        self.cleared_parents.is_empty() && self.dropped_edges.is_empty() && !self.reordered
    }
}

/// Repair structural problems in place of failing on them: parent
/// references to missing nodes, to non-groups, to self, or forming a cycle
/// are cleared (position left as-is); dangling edges are removed; nodes are
/// reordered parent-before-child. Returns the input unchanged (same
/// storage) when there is nothing to fix.
pub fn heal(state: &GraphState) -> (GraphState, HealReport) {
    let mut report = HealReport::default();
    let groups: HashSet<NodeId> = state
        .nodes()
        .iter()
        .filter(|n| n.is_group())
        .map(|n| n.id)
        .collect();

    let mut clear: HashSet<NodeId> = HashSet::new();
    let mut links = DiGraphMap::<NodeId, ()>::new();
    for node in state.nodes() {
        links.add_node(node.id);
        let Some(pid) = node.parent_id else {
            continue;
        };
        if pid == node.id || !groups.contains(&pid) {
            clear.insert(node.id);
        } else {
            links.add_edge(pid, node.id, ());
        }
    }
    // Break containment cycles one link at a time.
    while let Err(cycle) = toposort(&links, None) {
        let id = cycle.node_id();
        let parents: Vec<NodeId> = links
            .neighbors_directed(id, petgraph::Direction::Incoming)
            .collect();
        for p in parents {
            links.remove_edge(p, id);
        }
        clear.insert(id);
    }

    let ids: HashSet<NodeId> = state.nodes().iter().map(|n| n.id).collect();
    let dangling: Vec<EdgeId> = state
        .edges()
        .iter()
        .filter(|e| !ids.contains(&e.source) || !ids.contains(&e.target))
        .map(|e| e.id)
        .collect();

    // Order check must assume the cleared links are already gone.
    let needs_reorder = if clear.is_empty() {
        !is_parents_first(state.nodes())
    } else {
        let probe: Vec<Node> = state
            .nodes()
            .iter()
            .cloned()
            .map(|mut n| {
                if clear.contains(&n.id) {
                    n.parent_id = None;
                }
                n
            })
            .collect();
        !is_parents_first(&probe)
    };

    if clear.is_empty() && dangling.is_empty() && !needs_reorder {
        return (state.clone(), report);
    }

    let mut next = state.clone();
    if !clear.is_empty() {
        for node in next.nodes_mut().iter_mut() {
            if clear.contains(&node.id) {
                log::debug!("heal: clearing invalid parent {:?} on {:?}", node.parent_id, node.id);
                node.parent_id = None;
                report.cleared_parents.push(node.id);
            }
        }
    }
    if !dangling.is_empty() {
        log::debug!("heal: dropping {} dangling edges", dangling.len());
        next.edges_mut().retain(|e| !dangling.contains(&e.id));
        report.dropped_edges = dangling;
    }
    if needs_reorder {
        sort_parents_first(next.nodes_mut());
        report.reordered = true;
    }
    (next, report)
}
