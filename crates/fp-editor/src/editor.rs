//! The editor facade: one object a front end drives.
//!
//! The editor owns the live graph and everything that reacts to it:
//! history, clipboard, the recovery autosave and the deferred snapshots
//! that coalesce drags and keyboard deletes. Time never advances on its
//! own; the host passes `now` (milliseconds) into every call and drives
//! deadlines with [`Editor::tick`].
//!
//! History discipline:
//! - discrete actions (connect, group, paste, align, ...) record one
//!   snapshot right after the change;
//! - drag frames are applied live and recorded once, `drag_settle_ms`
//!   after the gesture ends;
//! - deletes are recorded `delete_settle_ms` later;
//! - a pending deferred snapshot is recorded before any other action
//!   touches the graph, so history always holds the state an action
//!   started from.

use crate::align::AlignOp;
use crate::autosave::{AutoSave, DocumentSink};
use crate::clipboard::Clipboard;
use crate::config::EditorConfig;
use crate::debounce::{Debouncer, Millis};
use crate::error::EditError;
use crate::grouping::heal;
use crate::history::History;
use crate::persist::{SaveBackend, SaveReceipt};
use crate::sync::{Connection, GraphMutation, reduce, template_node};
use fp_core::codec::{DocumentMeta, FlowDocument, Imported, export_json, import_json};
use fp_core::geometry::Point;
use fp_core::model::NodeKind;
use fp_core::store::{EdgePatch, GraphState, GraphStore, NodePatch};
use fp_core::{EdgeId, NodeId};

/// What a call to [`Editor::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// A deferred history snapshot was recorded.
    pub recorded: bool,
    /// The recovery copy was written.
    pub saved: bool,
}

/// An in-progress drag of one or more nodes.
#[derive(Debug, Clone)]
struct DragGesture {
    ids: Vec<NodeId>,
    moved: bool,
}

pub struct Editor {
    config: EditorConfig,
    store: GraphStore,
    history: History,
    clipboard: Clipboard,
    autosave: Option<AutoSave>,
    meta: DocumentMeta,
    drag: Option<DragGesture>,
    drag_settle: Debouncer,
    delete_settle: Debouncer,
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("nodes", &self.store.state().nodes().len())
            .field("edges", &self.store.state().edges().len())
            .field("history", &self.history.len())
            .field("cursor", &self.history.cursor())
            .finish_non_exhaustive()
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        Self::from_state(GraphState::default(), config)
    }

    /// Start from an existing graph. The graph is healed and becomes the
    /// history baseline.
    pub fn from_state(state: GraphState, config: EditorConfig) -> Self {
        let (healed, report) = heal(&state);
        if !report.is_clean() {
            log::debug!("editor: healed initial graph: {report:?}");
        }
        let mut history = History::new(config.history_depth);
        history.init(healed.clone());
        Self {
            drag_settle: Debouncer::new(config.drag_settle_ms),
            delete_settle: Debouncer::new(config.delete_settle_ms),
            config,
            store: GraphStore::from_state(healed),
            history,
            clipboard: Clipboard::new(),
            autosave: None,
            meta: DocumentMeta::default(),
            drag: None,
        }
    }

    /// Attach a recovery sink written `autosave_delay_ms` after each burst
    /// of edits.
    pub fn with_autosave(mut self, sink: Box<dyn DocumentSink>) -> Self {
        self.autosave =
            Some(AutoSave::new(sink, self.config.autosave_delay_ms).with_meta(self.meta.clone()));
        self
    }

    // ─── Accessors ──────────────────────────────────────────────────────

    pub fn state(&self) -> &GraphState {
        self.store.state()
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn meta(&self) -> &DocumentMeta {
        &self.meta
    }

    pub fn set_meta(&mut self, meta: DocumentMeta) {
        if let Some(save) = &mut self.autosave {
            save.set_meta(meta.clone());
        }
        self.meta = meta;
    }

    pub fn autosave(&self) -> Option<&AutoSave> {
        self.autosave.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo() || self.has_deferred()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo() && !self.has_deferred()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    // ─── Internals ──────────────────────────────────────────────────────

    fn has_deferred(&self) -> bool {
        self.drag_settle.is_pending() || self.delete_settle.is_pending()
    }

    /// Record any deferred snapshot now so the next action starts from a
    /// state that is in history.
    fn settle(&mut self) {
        let pending = self.drag_settle.cancel() | self.delete_settle.cancel();
        if pending {
            self.history.ensure_current(self.store.snapshot());
        }
    }

    fn touch_autosave(&mut self, now: Millis) {
        if self.history.is_replaying() {
            return;
        }
        if let Some(save) = &mut self.autosave {
            save.trigger(now, Some(self.store.snapshot()));
        }
    }

    /// Swap `next` in and record it as one undo step.
    fn commit_recorded(&mut self, now: Millis, next: GraphState) -> GraphState {
        self.store.replace(next);
        self.history.record(self.store.snapshot());
        self.touch_autosave(now);
        self.store.snapshot()
    }

    // ─── Dispatch ───────────────────────────────────────────────────────

    /// Apply a mutation as one undoable step. Selection changes are
    /// applied but not recorded. A mutation that changes nothing records
    /// nothing.
    pub fn dispatch(
        &mut self,
        now: Millis,
        mutation: GraphMutation,
    ) -> Result<GraphState, EditError> {
        self.settle();
        let name = mutation.name();
        let selection_only = mutation.is_selection_only();
        let next = reduce(self.store.state(), mutation)?;
        if next == *self.store.state() {
            log::trace!("editor: {name} changed nothing");
            return Ok(self.store.snapshot());
        }
        if selection_only {
            return Ok(self.store.replace(next));
        }
        log::debug!("editor: {name}");
        Ok(self.commit_recorded(now, next))
    }

    pub fn add_node(
        &mut self,
        now: Millis,
        kind: NodeKind,
        position: Point,
    ) -> Result<NodeId, EditError> {
        let id = NodeId::fresh("node");
        let node = template_node(self.store.state(), kind, id, position);
        self.dispatch(now, GraphMutation::AddNode { node: Box::new(node) })?;
        Ok(id)
    }

    pub fn update_node(
        &mut self,
        now: Millis,
        id: NodeId,
        patch: NodePatch,
    ) -> Result<GraphState, EditError> {
        self.dispatch(
            now,
            GraphMutation::UpdateNode {
                id,
                patch: Box::new(patch),
            },
        )
    }

    pub fn update_edge(
        &mut self,
        now: Millis,
        id: EdgeId,
        patch: EdgePatch,
    ) -> Result<GraphState, EditError> {
        self.dispatch(
            now,
            GraphMutation::UpdateEdge {
                id,
                patch: Box::new(patch),
            },
        )
    }

    /// Connect two nodes. Returns the new edge id.
    pub fn connect(&mut self, now: Millis, conn: Connection) -> Result<EdgeId, EditError> {
        let before: Vec<EdgeId> = self.store.state().edges().iter().map(|e| e.id).collect();
        let next = self.dispatch(now, GraphMutation::Connect(conn))?;
        next.edges()
            .iter()
            .map(|e| e.id)
            .find(|id| !before.contains(id))
            .ok_or(EditError::InvalidConnection("connection was not created"))
    }

    pub fn select(&mut self, now: Millis, ids: &[NodeId]) -> Result<GraphState, EditError> {
        self.dispatch(now, GraphMutation::SetSelection { ids: ids.to_vec() })
    }

    /// Delete the selected nodes and edges. The deletion is recorded once
    /// the delete settle period has passed.
    pub fn delete_selection(&mut self, now: Millis) -> GraphState {
        self.settle();
        let state = self.store.state();
        let nodes: Vec<NodeId> = state.selected_nodes().map(|n| n.id).collect();
        let edges: Vec<EdgeId> = state
            .edges()
            .iter()
            .filter(|e| e.selected)
            .map(|e| e.id)
            .collect();
        if nodes.is_empty() && edges.is_empty() {
            return self.store.snapshot();
        }
        let (next, _) = heal(&state.without_edges(&edges).without_nodes(&nodes));
        self.store.replace(next);
        self.delete_settle.schedule(now);
        self.touch_autosave(now);
        log::debug!("editor: deleted {} node(s), {} edge(s)", nodes.len(), edges.len());
        self.store.snapshot()
    }

    // ─── Drag gestures ──────────────────────────────────────────────────

    /// Start dragging `ids`. Frames are applied live; history sees the
    /// gesture once it has settled.
    pub fn begin_drag(&mut self, ids: &[NodeId]) {
        self.settle();
        let ids = ids
            .iter()
            .copied()
            .filter(|id| self.store.state().contains_node(*id))
            .collect();
        self.drag = Some(DragGesture { ids, moved: false });
    }

    /// Move every dragged node by a delta. Children stay inside their
    /// group.
    pub fn drag_by(&mut self, now: Millis, dx: f64, dy: f64) -> Result<GraphState, EditError> {
        let Some(ids) = self.drag.as_ref().map(|d| d.ids.clone()) else {
            return Ok(self.store.snapshot());
        };
        let mut next = self.store.snapshot();
        for id in ids {
            next = reduce(&next, GraphMutation::MoveNode { id, dx, dy })?;
        }
        if next != *self.store.state() {
            if let Some(drag) = &mut self.drag {
                drag.moved = true;
            }
            self.store.replace(next);
            self.touch_autosave(now);
        }
        Ok(self.store.snapshot())
    }

    /// Finish the gesture. A drag that moved anything schedules one
    /// deferred snapshot.
    pub fn end_drag(&mut self, now: Millis) {
        if let Some(drag) = self.drag.take()
            && drag.moved
        {
            self.drag_settle.schedule(now);
        }
    }

    // ─── Time ───────────────────────────────────────────────────────────

    /// Fire whatever deadlines have passed.
    pub fn tick(&mut self, now: Millis) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        let drag_due = self.drag_settle.fire_if_due(now);
        let delete_due = self.delete_settle.fire_if_due(now);
        if (drag_due || delete_due) && !self.history.is_replaying() {
            outcome.recorded = self.history.ensure_current(self.store.snapshot());
            if outcome.recorded {
                log::debug!("editor: recorded deferred snapshot");
            }
        }
        if let Some(save) = &mut self.autosave {
            match save.poll(now, self.history.is_replaying()) {
                Ok(saved) => outcome.saved = saved,
                Err(e) => log::warn!("autosave failed: {e}"),
            }
        }
        outcome
    }

    // ─── History ────────────────────────────────────────────────────────

    pub fn undo(&mut self, now: Millis) -> bool {
        self.drag = None;
        self.settle();
        let undone = self.history.undo(&mut self.store);
        if undone {
            self.touch_autosave(now);
        }
        undone
    }

    pub fn redo(&mut self, now: Millis) -> bool {
        self.drag = None;
        self.settle();
        let redone = self.history.redo(&mut self.store);
        if redone {
            self.touch_autosave(now);
        }
        redone
    }

    // ─── Clipboard ──────────────────────────────────────────────────────

    pub fn copy_selection(&mut self) -> usize {
        self.clipboard.copy_selection(self.store.state())
    }

    /// Paste the clipboard as one undo step. Returns the new node ids.
    pub fn paste(&mut self, now: Millis) -> Vec<NodeId> {
        self.settle();
        let Some((next, ids)) = self.clipboard.paste(self.store.state()) else {
            return Vec::new();
        };
        self.commit_recorded(now, next);
        log::debug!("editor: pasted {} node(s)", ids.len());
        ids
    }

    // ─── Groups and alignment ───────────────────────────────────────────

    /// Align the current selection.
    pub fn align(&mut self, now: Millis, op: AlignOp) -> Result<GraphState, EditError> {
        let ids: Vec<NodeId> = self.store.state().selected_nodes().map(|n| n.id).collect();
        self.dispatch(now, GraphMutation::Align { ids, op })
    }

    /// Group the selected top-level nodes. Returns the new group id.
    pub fn create_group(&mut self, now: Millis, label: Option<&str>) -> Result<NodeId, EditError> {
        let ids: Vec<NodeId> = self.store.state().selected_nodes().map(|n| n.id).collect();
        let group_id = NodeId::fresh("group");
        self.dispatch(
            now,
            GraphMutation::CreateGroup {
                ids,
                group_id,
                label: label.map(str::to_string),
            },
        )?;
        Ok(group_id)
    }

    pub fn dissolve_group(&mut self, now: Millis, id: NodeId) -> Result<GraphState, EditError> {
        self.dispatch(now, GraphMutation::DissolveGroup { id })
    }

    pub fn rename_group(
        &mut self,
        now: Millis,
        id: NodeId,
        label: &str,
    ) -> Result<GraphState, EditError> {
        self.dispatch(
            now,
            GraphMutation::RenameGroup {
                id,
                label: label.to_string(),
            },
        )
    }

    pub fn set_collapsed(
        &mut self,
        now: Millis,
        id: NodeId,
        collapsed: bool,
    ) -> Result<GraphState, EditError> {
        self.dispatch(now, GraphMutation::SetCollapsed { id, collapsed })
    }

    // ─── Documents ──────────────────────────────────────────────────────

    /// Replace the graph with a decoded document. On error the live graph
    /// is left as it was.
    pub fn import_json(&mut self, now: Millis, json: &str) -> Result<Imported, EditError> {
        let imported = import_json(json)?;
        self.load(now, imported.clone());
        Ok(imported)
    }

    /// Install an already-decoded document as one undo step.
    pub fn load(&mut self, now: Millis, imported: Imported) {
        self.settle();
        self.drag = None;
        let (healed, report) = heal(&imported.state);
        if !report.is_clean() {
            log::debug!("editor: healed imported graph: {report:?}");
        }
        if !imported.dropped_connectors.is_empty() {
            log::warn!("import dropped connectors: {:?}", imported.dropped_connectors);
        }
        log::info!(
            "loaded {} node(s), {} edge(s)",
            healed.nodes().len(),
            healed.edges().len()
        );
        self.set_meta(imported.meta);
        self.commit_recorded(now, healed);
    }

    pub fn export_json(&self) -> Result<String, EditError> {
        Ok(export_json(self.store.state(), &self.meta)?)
    }

    pub fn document(&self) -> FlowDocument {
        FlowDocument::from_state(self.store.state(), &self.meta)
    }

    /// Explicit save to a folder or version store.
    pub fn save_to(&mut self, backend: &mut dyn SaveBackend) -> Result<SaveReceipt, EditError> {
        let receipt = backend.save_document(self.document())?;
        log::info!("saved to {}", receipt.location);
        Ok(receipt)
    }

    /// Restore the last recovery copy, if the sink has one.
    pub fn recover(&mut self, now: Millis) -> Result<bool, EditError> {
        let saved = self.autosave.as_ref().map(|s| s.sink().read()).transpose()?;
        let Some(json) = saved.flatten() else {
            return Ok(false);
        };
        self.import_json(now, &json)?;
        Ok(true)
    }

    /// Record any deferred snapshot and flush a pending autosave.
    pub fn shutdown(&mut self) -> Result<(), EditError> {
        self.drag = None;
        self.settle();
        if let Some(save) = &mut self.autosave {
            save.shutdown()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fp_core::model::Node;
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> NodeId {
        NodeId::intern(s)
    }

    fn editor() -> Editor {
        Editor::from_state(
            GraphState::new(
                vec![
                    Node::process("ed_a", "A").at(0.0, 0.0),
                    Node::process("ed_b", "B").at(300.0, 0.0),
                ],
                vec![],
            ),
            EditorConfig::default(),
        )
    }

    #[test]
    fn drag_is_recorded_once_after_settling() {
        let mut ed = editor();
        ed.begin_drag(&[id("ed_a")]);
        for t in 0..10 {
            ed.drag_by(t * 16, 5.0, 0.0).unwrap();
        }
        ed.end_drag(200);
        assert_eq!(ed.history().len(), 1);
        assert!(!ed.tick(300).recorded);
        assert!(ed.tick(350).recorded);
        assert_eq!(ed.history().len(), 2);

        assert!(ed.undo(400));
        assert_eq!(ed.state().node(id("ed_a")).unwrap().position, Point::new(0.0, 0.0));
    }

    #[test]
    fn undo_records_pending_drag_first() {
        let mut ed = editor();
        ed.begin_drag(&[id("ed_b")]);
        ed.drag_by(0, 0.0, 40.0).unwrap();
        ed.end_drag(10);
        assert!(ed.can_undo());
        assert!(ed.undo(20));
        assert_eq!(ed.state().node(id("ed_b")).unwrap().position, Point::new(300.0, 0.0));
        assert!(ed.redo(30));
        assert_eq!(ed.state().node(id("ed_b")).unwrap().position, Point::new(300.0, 40.0));
    }

    #[test]
    fn selection_is_not_an_undo_step() {
        let mut ed = editor();
        ed.select(0, &[id("ed_a")]).unwrap();
        assert_eq!(ed.history().len(), 1);
        assert_eq!(ed.state().selected_ids(), vec![id("ed_a")]);
    }

    #[test]
    fn delete_is_deferred() {
        let mut ed = editor();
        ed.select(0, &[id("ed_a")]).unwrap();
        ed.delete_selection(10);
        assert!(!ed.state().contains_node(id("ed_a")));
        assert_eq!(ed.history().len(), 1);
        assert!(ed.tick(110).recorded);
        assert!(ed.undo(120));
        assert!(ed.state().contains_node(id("ed_a")));
    }

    #[test]
    fn failed_import_keeps_graph() {
        let mut ed = editor();
        let before = ed.state().clone();
        assert!(ed.import_json(0, r#"{"nodes": []}"#).is_err());
        assert!(ed.state().ptr_eq(&before));
        assert_eq!(ed.history().len(), 1);
    }

    #[test]
    fn add_node_uses_template() {
        let mut ed = Editor::default();
        let id = ed.add_node(0, NodeKind::Process, Point::new(10.0, 10.0)).unwrap();
        let node = ed.state().node(id).unwrap();
        assert_eq!(node.name, "New process");
        assert!(node.details.expandable);
        assert_eq!(ed.history().len(), 2);
    }
}
