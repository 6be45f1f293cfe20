//! Integration tests: group containers on a loaded document (fp-editor).
//!
//! Grouping and ungrouping must never move anything on screen, and
//! structural damage in a loaded file must be repaired without moving
//! the affected nodes either.

use fp_core::codec::import_json;
use fp_core::geometry::Point;
use fp_core::id::NodeId;
use fp_core::model::Node;
use fp_core::store::GraphState;
use fp_editor::grouping::{
    COLLAPSED_SIZE, GROUP_HEADER, GROUP_PADDING, create_group, dissolve_group, heal,
};
use fp_editor::{Editor, EditorConfig};
use pretty_assertions::assert_eq;
use std::collections::HashMap;

fn id(s: &str) -> NodeId {
    NodeId::intern(s)
}

fn fixture() -> GraphState {
    import_json(include_str!("fixtures/review_flow.json"))
        .unwrap()
        .state
}

fn absolute_positions(state: &GraphState) -> HashMap<NodeId, Point> {
    state
        .nodes()
        .iter()
        .filter_map(|n| Some((n.id, state.absolute_position(n.id)?)))
        .collect()
}

fn close(a: Point, b: Point) -> bool {
    (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
}

// ─── Create / dissolve ──────────────────────────────────────────────────

#[test]
fn grouping_preserves_absolute_positions() {
    let (state, _) = heal(&fixture());
    let before = absolute_positions(&state);
    let members = [id("publish"), id("archive")];
    let grouped = create_group(&state, &members, id("g_out"), Some("Output")).unwrap();

    let group = grouped.node(id("g_out")).unwrap();
    assert_eq!(
        group.position,
        Point::new(700.0 - GROUP_PADDING, 150.0 - GROUP_PADDING - GROUP_HEADER)
    );
    for m in members {
        let child = grouped.node(m).unwrap();
        assert_eq!(child.parent_id, Some(id("g_out")));
        let abs = Point::new(
            group.position.x + child.position.x,
            group.position.y + child.position.y,
        );
        assert!(close(abs, before[&m]), "{m:?} moved: {abs:?} vs {:?}", before[&m]);
    }
    assert!(grouped.selected_ids().is_empty());
}

#[test]
fn dissolve_right_after_create_restores_positions_exactly() {
    let state = GraphState::new(
        vec![
            Node::process("dc_a", "A").at(40.5, 80.25),
            Node::process("dc_b", "B").at(310.75, 12.125),
        ],
        vec![],
    );
    let before = absolute_positions(&state);
    let grouped = create_group(&state, &[id("dc_a"), id("dc_b")], id("dc_g"), None).unwrap();
    let dissolved = dissolve_group(&grouped, id("dc_g")).unwrap();

    assert!(dissolved.node(id("dc_g")).is_none());
    for n in dissolved.nodes() {
        assert_eq!(n.parent_id, None);
        assert_eq!(n.position, before[&n.id]);
    }
}

#[test]
fn nodes_already_grouped_are_not_regrouped() {
    let (state, _) = heal(&fixture());
    let grouped = create_group(&state, &[id("draft"), id("publish")], id("g_mix"), None).unwrap();
    assert_eq!(grouped.node(id("draft")).unwrap().parent_id, Some(id("lane")));
    assert_eq!(grouped.node(id("publish")).unwrap().parent_id, Some(id("g_mix")));
}

#[test]
fn group_label_is_made_unique() {
    let (state, _) = heal(&fixture());
    let grouped = create_group(&state, &[id("publish")], id("g_dup"), Some("Review")).unwrap();
    assert_eq!(grouped.node(id("g_dup")).unwrap().display_name(), "Review_1");
}

// ─── Healing ────────────────────────────────────────────────────────────

#[test]
fn missing_parent_is_cleared_without_moving() {
    let raw = fixture();
    let stray = raw.node(id("stray")).unwrap();
    assert_eq!(stray.parent_id, Some(id("missing-lane")));

    let (healed, report) = heal(&raw);
    let stray = healed.node(id("stray")).unwrap();
    assert_eq!(stray.parent_id, None);
    assert_eq!(stray.position, Point::new(40.5, 80.25));
    assert_eq!(report.cleared_parents, vec![id("stray")]);
}

#[test]
fn healing_a_clean_graph_is_free() {
    let (once, _) = heal(&fixture());
    let (twice, report) = heal(&once);
    assert!(report.is_clean());
    assert!(twice.ptr_eq(&once));
}

#[test]
fn dangling_connector_never_reaches_the_graph() {
    let state = fixture();
    assert!(state.edge(id("c-publish-nowhere")).is_none());
    assert_eq!(state.edges().len(), 2);
}

// ─── Through the editor ─────────────────────────────────────────────────

#[test]
fn collapse_and_expand_round_trip() {
    let mut editor = Editor::from_state(fixture(), EditorConfig::default());
    editor.set_collapsed(0, id("lane"), true).unwrap();
    let lane = editor.state().node(id("lane")).unwrap();
    assert_eq!(lane.size.resolved(), Some(COLLAPSED_SIZE));
    assert!(editor.state().node(id("draft")).unwrap().hidden);

    editor.set_collapsed(10, id("lane"), false).unwrap();
    let lane = editor.state().node(id("lane")).unwrap();
    assert_eq!(lane.size.resolved().map(|s| s.width), Some(400.0));
    assert!(!editor.state().node(id("approve")).unwrap().hidden);

    assert!(editor.undo(20));
    assert!(editor.state().node(id("lane")).unwrap().group_data().unwrap().collapsed);
}

#[test]
fn grouping_the_selection_is_one_undo_step() {
    let mut editor = Editor::from_state(fixture(), EditorConfig::default());
    editor.select(0, &[id("publish"), id("archive")]).unwrap();
    let group = editor.create_group(10, Some("Output")).unwrap();
    assert_eq!(editor.history().len(), 2);
    assert_eq!(editor.state().children_of(group).count(), 2);

    assert!(editor.undo(20));
    assert!(editor.state().node(group).is_none());
    assert_eq!(editor.state().node(id("publish")).unwrap().parent_id, None);
}
