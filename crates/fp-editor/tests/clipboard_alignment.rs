//! Integration tests: copy/paste and alignment through the editor (fp-editor).

use fp_core::geometry::Point;
use fp_core::id::NodeId;
use fp_core::model::Node;
use fp_core::store::GraphState;
use fp_editor::{AlignOp, Editor, EditorConfig};
use pretty_assertions::assert_eq;
use std::collections::HashSet;

fn id(s: &str) -> NodeId {
    NodeId::intern(s)
}

fn row() -> Editor {
    Editor::from_state(
        GraphState::new(
            vec![
                Node::process("row_a", "A").at(0.0, 0.0).sized(100.0, 40.0),
                Node::process("row_b", "B").at(50.0, 100.0).sized(100.0, 40.0),
                Node::process("row_c", "C").at(500.0, 30.0).sized(100.0, 40.0),
            ],
            vec![],
        ),
        EditorConfig::default(),
    )
}

// ─── Clipboard ──────────────────────────────────────────────────────────

#[test]
fn paste_two_nodes() {
    let mut editor = row();
    editor.select(0, &[id("row_a"), id("row_c")]).unwrap();
    assert_eq!(editor.copy_selection(), 2);

    let existing: HashSet<NodeId> = editor.state().nodes().iter().map(|n| n.id).collect();
    let pasted = editor.paste(10);
    assert_eq!(pasted.len(), 2);
    assert!(pasted.iter().all(|p| !existing.contains(p)));

    let positions: Vec<Point> = pasted
        .iter()
        .map(|p| editor.state().node(*p).unwrap().position)
        .collect();
    assert_eq!(positions, vec![Point::new(30.0, 30.0), Point::new(530.0, 60.0)]);

    let selected: HashSet<NodeId> = editor.state().selected_ids().into_iter().collect();
    assert_eq!(selected, pasted.iter().copied().collect());
}

#[test]
fn pasting_twice_yields_distinct_ids() {
    let mut editor = row();
    editor.select(0, &[id("row_b")]).unwrap();
    editor.copy_selection();
    let first = editor.paste(10);
    let second = editor.paste(20);
    assert_ne!(first, second);
    assert_eq!(editor.state().nodes().len(), 5);
}

#[test]
fn paste_is_one_undo_step() {
    let mut editor = row();
    editor.select(0, &[id("row_a"), id("row_b")]).unwrap();
    editor.copy_selection();
    editor.paste(10);
    assert_eq!(editor.history().len(), 2);
    assert!(editor.undo(20));
    assert_eq!(editor.state().nodes().len(), 3);
}

#[test]
fn empty_clipboard_pastes_nothing() {
    let mut editor = row();
    assert!(editor.paste(0).is_empty());
    assert_eq!(editor.history().len(), 1);
}

// ─── Alignment ──────────────────────────────────────────────────────────

#[test]
fn distribute_h_anchors_ends_and_respaces_middle() {
    let mut editor = row();
    editor
        .select(0, &[id("row_a"), id("row_b"), id("row_c")])
        .unwrap();
    editor.align(10, AlignOp::DistributeH).unwrap();
    let xs: Vec<f64> = ["row_a", "row_b", "row_c"]
        .iter()
        .map(|n| editor.state().node(id(n)).unwrap().position.x)
        .collect();
    assert_eq!(xs, vec![0.0, 250.0, 500.0]);
}

#[test]
fn alignment_is_undoable_in_one_step() {
    let mut editor = row();
    editor
        .select(0, &[id("row_a"), id("row_b"), id("row_c")])
        .unwrap();
    editor.align(10, AlignOp::Top).unwrap();
    assert!(editor.state().nodes().iter().all(|n| n.position.y == 0.0));
    assert!(editor.undo(20));
    assert_eq!(editor.state().node(id("row_b")).unwrap().position.y, 100.0);
}

#[test]
fn alignment_after_a_drag_keeps_the_drag_in_history() {
    let mut editor = row();
    editor.begin_drag(&[id("row_c")]);
    editor.drag_by(0, 0.0, 70.0).unwrap();
    editor.end_drag(5);
    editor
        .select(10, &[id("row_a"), id("row_b"), id("row_c")])
        .unwrap();
    editor.align(20, AlignOp::Bottom).unwrap();

    // Undo the alignment: the dragged position comes back, not the original.
    assert!(editor.undo(30));
    assert_eq!(editor.state().node(id("row_c")).unwrap().position.y, 100.0);
    assert!(editor.undo(40));
    assert_eq!(editor.state().node(id("row_c")).unwrap().position.y, 30.0);
}

#[test]
fn single_node_alignment_changes_nothing() {
    let mut editor = row();
    editor.select(0, &[id("row_a")]).unwrap();
    editor.align(10, AlignOp::Right).unwrap();
    assert_eq!(editor.history().len(), 1);
}
