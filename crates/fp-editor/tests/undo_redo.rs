//! Integration tests: snapshot history driven through the editor (fp-editor).
//!
//! Loads a saved flow, runs sequences of edits, and checks that undo and
//! redo walk back and forth through exactly the recorded states.

use fp_core::geometry::{Point, Size};
use fp_core::id::NodeId;
use fp_core::model::{Node, NodeKind};
use fp_core::store::{GraphState, GraphStore, NodePatch};
use fp_editor::history::{DEFAULT_MAX_HISTORY, History};
use fp_editor::sync::{Connection, GraphMutation};
use fp_editor::{Editor, EditorConfig};
use pretty_assertions::assert_eq;

fn id(s: &str) -> NodeId {
    NodeId::intern(s)
}

fn load() -> Editor {
    let mut editor = Editor::default();
    editor
        .import_json(0, include_str!("fixtures/review_flow.json"))
        .unwrap();
    editor
}

// ─── Round trips ────────────────────────────────────────────────────────

#[test]
fn n_edits_then_n_undos_restore_initial_state() {
    let mut editor = load();
    let initial = editor.state().clone();

    editor
        .update_node(10, id("publish"), NodePatch::position(Point::new(720.0, 160.0)))
        .unwrap();
    editor
        .connect(20, Connection::new(id("publish"), id("archive")))
        .unwrap();
    editor.add_node(30, NodeKind::Terminator, Point::new(0.0, 0.0)).unwrap();
    editor.rename_group(40, id("lane"), "Editorial review").unwrap();

    for t in 0..4 {
        assert!(editor.undo(100 + t));
    }
    assert_eq!(*editor.state(), initial);
}

#[test]
fn undo_then_redo_is_identity() {
    let mut editor = load();
    editor
        .dispatch(
            0,
            GraphMutation::ResizeNode {
                id: id("archive"),
                width: 200.0,
                height: 90.0,
            },
        )
        .unwrap();
    let before_undo = editor.state().clone();

    assert!(editor.undo(10));
    assert_ne!(*editor.state(), before_undo);
    assert!(editor.redo(20));
    assert_eq!(*editor.state(), before_undo);
    assert!(!editor.redo(30));
}

#[test]
fn new_edit_after_undo_discards_redo() {
    let mut editor = load();
    editor.rename_group(0, id("lane"), "First").unwrap();
    editor.undo(10);
    assert!(editor.can_redo());
    editor.rename_group(20, id("lane"), "Second").unwrap();
    assert!(!editor.can_redo());
    assert_eq!(
        editor.state().node(id("lane")).unwrap().display_name(),
        "Second"
    );
}

#[test]
fn rejected_edit_records_nothing() {
    let mut editor = load();
    let len = editor.history().len();
    assert!(
        editor
            .connect(0, Connection::new(id("draft"), id("draft")))
            .is_err()
    );
    assert!(editor.dissolve_group(0, id("publish")).is_err());
    assert_eq!(editor.history().len(), len);
}

// ─── Capacity ───────────────────────────────────────────────────────────

#[test]
fn history_never_exceeds_cap() {
    let mut store = GraphStore::from_state(GraphState::new(
        vec![Node::process("cap_n", "N")],
        vec![],
    ));
    let mut history = History::default();
    history.init(store.snapshot());
    for i in 1..=DEFAULT_MAX_HISTORY {
        store
            .update_node(id("cap_n"), NodePatch::position(Point::new(i as f64, 0.0)))
            .unwrap();
        history.record(store.snapshot());
    }
    // 51 snapshots pushed in total: the baseline has been evicted.
    assert_eq!(history.len(), DEFAULT_MAX_HISTORY);
    assert_eq!(history.cursor(), DEFAULT_MAX_HISTORY - 1);

    let mut undos = 0;
    while history.undo(&mut store) {
        undos += 1;
    }
    assert_eq!(undos, DEFAULT_MAX_HISTORY - 1);
    assert_eq!(store.state().node(id("cap_n")).unwrap().position.x, 1.0);
}

#[test]
fn configured_depth_is_respected() {
    let config = EditorConfig {
        history_depth: 3,
        ..EditorConfig::default()
    };
    let mut editor = Editor::from_state(
        GraphState::new(vec![Node::group("depth_g", "G").sized(300.0, 300.0)], vec![]),
        config,
    );
    for (t, w) in [400.0, 500.0, 600.0, 700.0].into_iter().enumerate() {
        editor
            .dispatch(
                t as u64,
                GraphMutation::ResizeNode {
                    id: id("depth_g"),
                    width: w,
                    height: 300.0,
                },
            )
            .unwrap();
    }
    assert_eq!(editor.history().len(), 3);
    while editor.undo(100) {}
    let size = editor.state().node(id("depth_g")).unwrap().size.resolved();
    assert_eq!(size, Some(Size::new(500.0, 300.0)));
}
