//! In-session copy/paste of nodes.
//!
//! Only nodes are copied. Connectors are left behind, since a pasted
//! set rarely carries both endpoints of every edge that touched it.

use fp_core::geometry::Point;
use fp_core::model::Node;
use fp_core::store::{GraphState, GraphStore};
use fp_core::NodeId;
use std::collections::HashMap;

/// Offset applied to pasted top-level nodes.
pub const PASTE_OFFSET: Point = Point::new(30.0, 30.0);

#[derive(Debug, Clone, Default)]
pub struct Clipboard {
    buffer: Vec<Node>,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn contents(&self) -> &[Node] {
        &self.buffer
    }

    /// Replace the buffer with deep copies of `nodes`. An empty slice
    /// leaves the previous contents in place.
    pub fn copy<'a>(&mut self, nodes: impl IntoIterator<Item = &'a Node>) -> usize {
        let copied: Vec<Node> = nodes.into_iter().cloned().collect();
        if copied.is_empty() {
            return 0;
        }
        log::debug!("clipboard: copied {} node(s)", copied.len());
        self.buffer = copied;
        self.buffer.len()
    }

    pub fn copy_selection(&mut self, state: &GraphState) -> usize {
        self.copy(state.selected_nodes())
    }

    /// Build the state that results from pasting into `state`, plus the
    /// ids of the inserted nodes. `None` when the buffer is empty.
    ///
    /// Every pasted node gets a fresh id and ends up selected; everything
    /// already on the canvas is deselected. A child copied together with
    /// its group follows the pasted group and keeps its relative
    /// position; any other node is offset by [`PASTE_OFFSET`].
    pub fn paste(&self, state: &GraphState) -> Option<(GraphState, Vec<NodeId>)> {
        if self.buffer.is_empty() {
            return None;
        }
        let remap: HashMap<NodeId, NodeId> = self
            .buffer
            .iter()
            .map(|n| (n.id, NodeId::fresh(&format!("copied_{}", n.id))))
            .collect();

        let mut pasted = Vec::with_capacity(self.buffer.len());
        for original in &self.buffer {
            let mut node = original.clone();
            node.id = remap[&original.id];
            node.selected = true;
            node.measured = None;
            match original.parent_id {
                Some(pid) if remap.contains_key(&pid) => {
                    node.parent_id = Some(remap[&pid]);
                }
                Some(pid) if !state.contains_node(pid) => {
                    node.parent_id = None;
                    node.position = node.position.offset(PASTE_OFFSET.x, PASTE_OFFSET.y);
                }
                _ => node.position = node.position.offset(PASTE_OFFSET.x, PASTE_OFFSET.y),
            }
            if node.related_ids.iter().any(|r| remap.contains_key(r)) {
                for related in node.related_ids.iter_mut() {
                    if let Some(fresh) = remap.get(related) {
                        *related = *fresh;
                    }
                }
            }
            pasted.push(node);
        }

        let ids: Vec<NodeId> = pasted.iter().map(|n| n.id).collect();
        let mut next = state.with_selection(&[]);
        next.nodes_mut().extend(pasted);
        Some((next, ids))
    }

    /// Paste into the live store.
    pub fn paste_into(&self, store: &mut GraphStore) -> Option<Vec<NodeId>> {
        let (next, ids) = self.paste(store.state())?;
        store.replace(next);
        log::debug!("clipboard: pasted {} node(s)", ids.len());
        Some(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> NodeId {
        NodeId::intern(s)
    }

    fn sample() -> GraphState {
        GraphState::new(
            vec![
                Node::process("cb_a", "A").at(10.0, 20.0),
                Node::process("cb_b", "B").at(200.0, 20.0),
            ],
            vec![],
        )
    }

    #[test]
    fn empty_copy_keeps_previous_buffer() {
        let state = sample();
        let mut clip = Clipboard::new();
        clip.copy(state.nodes());
        assert_eq!(clip.copy(std::iter::empty()), 0);
        assert_eq!(clip.len(), 2);
    }

    #[test]
    fn paste_with_empty_buffer_is_none() {
        assert!(Clipboard::new().paste(&sample()).is_none());
    }

    #[test]
    fn paste_offsets_and_selects_only_new_nodes() {
        let state = sample().with_selection(&[id("cb_a"), id("cb_b")]);
        let mut clip = Clipboard::new();
        clip.copy_selection(&state);
        let (next, ids) = clip.paste(&state).unwrap();

        assert_eq!(ids.len(), 2);
        assert!(ids.iter().all(|i| !state.contains_node(*i)));
        assert!(ids.iter().all(|i| i.as_str().starts_with("copied_cb_")));
        assert_eq!(next.node(ids[0]).unwrap().position, Point::new(40.0, 50.0));
        assert_eq!(next.node(ids[1]).unwrap().position, Point::new(230.0, 50.0));

        let mut selected = next.selected_ids();
        selected.sort();
        let mut expected = ids.clone();
        expected.sort();
        assert_eq!(selected, expected);
    }

    #[test]
    fn group_copied_with_child_is_remapped() {
        let g = Node::group("cb_g", "G").at(100.0, 100.0);
        let child = Node::process("cb_c", "C").at(20.0, 50.0).in_group(g.id);
        let state = GraphState::new(vec![g, child], vec![]);
        let mut clip = Clipboard::new();
        clip.copy(state.nodes());
        let (next, ids) = clip.paste(&state).unwrap();

        let pasted_child = next.node(ids[1]).unwrap();
        assert_eq!(pasted_child.parent_id, Some(ids[0]));
        assert_eq!(pasted_child.position, Point::new(20.0, 50.0));
        assert_eq!(next.node(ids[0]).unwrap().position, Point::new(130.0, 130.0));
    }

    #[test]
    fn child_of_deleted_group_pastes_top_level() {
        let g = Node::group("cb_gone", "G");
        let child = Node::process("cb_kid", "K").at(5.0, 5.0).in_group(g.id);
        let mut clip = Clipboard::new();
        clip.copy([&child]);
        let (next, ids) = clip.paste(&GraphState::new(vec![], vec![])).unwrap();
        let pasted = next.node(ids[0]).unwrap();
        assert_eq!(pasted.parent_id, None);
        assert_eq!(pasted.position, Point::new(35.0, 35.0));
    }
}
