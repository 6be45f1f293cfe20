//! WASM bridge for Flowpad: exposes the editing core to the browser.
//!
//! Built with `wasm-pack build --target web`. The page owns rendering and
//! input; it forwards user actions here and re-renders from
//! [`FlowCanvas::get_document`]. All calls take `now` in milliseconds
//! (`performance.now()`), and the page should call [`FlowCanvas::tick`]
//! from a timer so deferred history and autosave deadlines fire.

mod storage;

pub use storage::LocalStorageSink;

use fp_core::geometry::Point;
use fp_core::model::NodeKind;
use fp_core::store::NodePatch;
use fp_core::{NodeId, lint_document};
use fp_editor::persist::RECOVERY_KEY;
use fp_editor::sync::Connection;
use fp_editor::{AlignOp, Editor, EditorConfig, Millis};
use serde_json::json;
use wasm_bindgen::prelude::*;

/// The JS-facing editor controller.
///
/// Methods that can fail return a JSON string
/// `{"ok":true,...}` / `{"ok":false,"error":"..."}` rather than throwing.
#[wasm_bindgen]
pub struct FlowCanvas {
    editor: Editor,
}

fn millis(now: f64) -> Millis {
    if now.is_finite() && now > 0.0 { now as Millis } else { 0 }
}

fn ok(extra: serde_json::Value) -> String {
    let mut out = json!({ "ok": true });
    if let (Some(out), serde_json::Value::Object(extra)) = (out.as_object_mut(), extra) {
        out.extend(extra);
    }
    out.to_string()
}

fn fail(err: impl std::fmt::Display) -> String {
    json!({ "ok": false, "error": err.to_string() }).to_string()
}

fn parse_ids(ids_json: &str) -> Vec<NodeId> {
    serde_json::from_str::<Vec<String>>(ids_json)
        .map(|ids| ids.iter().map(|s| NodeId::intern(s)).collect())
        .unwrap_or_default()
}

fn ids_json(ids: &[NodeId]) -> String {
    let ids: Vec<&str> = ids.iter().map(NodeId::as_str).collect();
    serde_json::to_string(&ids).unwrap_or_else(|_| "[]".to_string())
}

#[wasm_bindgen]
impl FlowCanvas {
    /// Create a controller. `config_json` is an optional `EditorConfig`
    /// object; an unreadable config falls back to the defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Self {
        console_error_panic_hook_setup();
        let config = match config_json.as_deref().map(EditorConfig::from_json) {
            Some(Ok(config)) => config,
            Some(Err(e)) => {
                log::warn!("ignoring editor config: {e}");
                EditorConfig::default()
            }
            None => EditorConfig::default(),
        };
        Self {
            editor: Editor::new(config),
        }
    }

    /// Attach `localStorage` as the recovery sink. Returns `false` when
    /// storage is unavailable.
    pub fn enable_recovery(&mut self) -> bool {
        let Some(sink) = LocalStorageSink::open(RECOVERY_KEY) else {
            return false;
        };
        let editor = std::mem::take(&mut self.editor);
        self.editor = editor.with_autosave(Box::new(sink));
        true
    }

    /// Restore the recovery copy, if any. Returns `true` when a copy was
    /// loaded.
    pub fn recover(&mut self, now: f64) -> bool {
        match self.editor.recover(millis(now)) {
            Ok(restored) => restored,
            Err(e) => {
                log::warn!("recovery failed: {e}");
                false
            }
        }
    }

    // ─── Documents ───────────────────────────────────────────────────────

    /// Load a saved flow. On error the current graph is kept.
    pub fn load_json(&mut self, now: f64, json: &str) -> String {
        match self.editor.import_json(millis(now), json) {
            Ok(imported) => {
                let dropped: Vec<&str> = imported
                    .dropped_connectors
                    .iter()
                    .map(String::as_str)
                    .collect();
                ok(json!({ "droppedConnectors": dropped }))
            }
            Err(e) => fail(e),
        }
    }

    /// The current graph in the persisted document shape.
    pub fn get_document(&self) -> String {
        self.editor.export_json().unwrap_or_else(fail)
    }

    // ─── Editing ─────────────────────────────────────────────────────────

    /// Add a node of `kind` ("process", "decision", ...). Returns the new
    /// id, or an empty string for an unknown kind.
    pub fn add_node(&mut self, now: f64, kind: &str, x: f64, y: f64) -> String {
        let Some(kind) = NodeKind::from_type_name(kind) else {
            return String::new();
        };
        match self.editor.add_node(millis(now), kind, Point::new(x, y)) {
            Ok(id) => id.as_str().to_string(),
            Err(e) => {
                log::warn!("add_node: {e}");
                String::new()
            }
        }
    }

    /// Set a node's position in its own frame. Returns `true` if the graph
    /// changed.
    pub fn move_node(&mut self, now: f64, id: &str, x: f64, y: f64) -> bool {
        let before = self.editor.state().clone();
        self.editor
            .update_node(millis(now), NodeId::intern(id), NodePatch::position(Point::new(x, y)))
            .is_ok_and(|after| after != before)
    }

    /// Connect two nodes. Handles may be empty. Returns the new edge id,
    /// or an empty string if the connection was rejected.
    pub fn connect(
        &mut self,
        now: f64,
        source: &str,
        target: &str,
        source_handle: &str,
        target_handle: &str,
    ) -> String {
        let mut conn = Connection::new(NodeId::intern(source), NodeId::intern(target));
        conn.source_handle = (!source_handle.is_empty()).then(|| source_handle.to_string());
        conn.target_handle = (!target_handle.is_empty()).then(|| target_handle.to_string());
        match self.editor.connect(millis(now), conn) {
            Ok(id) => id.as_str().to_string(),
            Err(e) => {
                log::debug!("connect rejected: {e}");
                String::new()
            }
        }
    }

    /// Replace the selection with the ids in a JSON array.
    pub fn select(&mut self, now: f64, ids: &str) -> bool {
        self.editor.select(millis(now), &parse_ids(ids)).is_ok()
    }

    pub fn get_selected_ids(&self) -> String {
        ids_json(&self.editor.state().selected_ids())
    }

    pub fn delete_selection(&mut self, now: f64) {
        self.editor.delete_selection(millis(now));
    }

    // ─── Drag gestures ───────────────────────────────────────────────────

    pub fn begin_drag(&mut self, ids: &str) {
        self.editor.begin_drag(&parse_ids(ids));
    }

    pub fn drag_by(&mut self, now: f64, dx: f64, dy: f64) -> bool {
        self.editor.drag_by(millis(now), dx, dy).is_ok()
    }

    pub fn end_drag(&mut self, now: f64) {
        self.editor.end_drag(millis(now));
    }

    /// Fire due deadlines. Returns `{"recorded":bool,"saved":bool}`.
    pub fn tick(&mut self, now: f64) -> String {
        let outcome = self.editor.tick(millis(now));
        json!({ "recorded": outcome.recorded, "saved": outcome.saved }).to_string()
    }

    // ─── History ─────────────────────────────────────────────────────────

    pub fn undo(&mut self, now: f64) -> bool {
        self.editor.undo(millis(now))
    }

    pub fn redo(&mut self, now: f64) -> bool {
        self.editor.redo(millis(now))
    }

    pub fn can_undo(&self) -> bool {
        self.editor.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.editor.can_redo()
    }

    // ─── Clipboard ───────────────────────────────────────────────────────

    /// Copy the selected nodes. Returns how many were copied.
    pub fn copy(&mut self) -> usize {
        self.editor.copy_selection()
    }

    /// Paste the clipboard. Returns the new ids as a JSON array.
    pub fn paste(&mut self, now: f64) -> String {
        ids_json(&self.editor.paste(millis(now)))
    }

    // ─── Groups and alignment ────────────────────────────────────────────

    /// Align the selection: "left", "center", "right", "top", "middle",
    /// "bottom", "distribute-h" or "distribute-v".
    pub fn align(&mut self, now: f64, op: &str) -> String {
        let result = op
            .parse::<AlignOp>()
            .and_then(|op| self.editor.align(millis(now), op));
        match result {
            Ok(_) => ok(json!({})),
            Err(e) => fail(e),
        }
    }

    /// Group the selection. Returns `{"ok":true,"id":"..."}`.
    pub fn group_selection(&mut self, now: f64, label: Option<String>) -> String {
        match self.editor.create_group(millis(now), label.as_deref()) {
            Ok(id) => ok(json!({ "id": id.as_str() })),
            Err(e) => fail(e),
        }
    }

    pub fn ungroup(&mut self, now: f64, id: &str) -> String {
        match self.editor.dissolve_group(millis(now), NodeId::intern(id)) {
            Ok(_) => ok(json!({})),
            Err(e) => fail(e),
        }
    }

    pub fn rename_group(&mut self, now: f64, id: &str, label: &str) -> String {
        match self.editor.rename_group(millis(now), NodeId::intern(id), label) {
            Ok(_) => ok(json!({})),
            Err(e) => fail(e),
        }
    }

    pub fn set_collapsed(&mut self, now: f64, id: &str, collapsed: bool) -> String {
        match self.editor.set_collapsed(millis(now), NodeId::intern(id), collapsed) {
            Ok(_) => ok(json!({})),
            Err(e) => fail(e),
        }
    }

    /// Flush pending work. Call from `beforeunload`.
    pub fn shutdown(&mut self) -> bool {
        match self.editor.shutdown() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("shutdown flush failed: {e}");
                false
            }
        }
    }
}

fn console_error_panic_hook_setup() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("Flowpad WASM panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
        });
    }
}

// ─── Standalone validation (no canvas needed) ────────────────────────────

/// Lint a saved flow. Returns `{"ok":true,"diagnostics":[...]}` or
/// `{"ok":false,"error":"..."}` when the document cannot be decoded.
#[wasm_bindgen]
pub fn validate(json: &str) -> String {
    match fp_core::codec::decode_document(json) {
        Ok(doc) => {
            let diagnostics: Vec<serde_json::Value> = lint_document(&doc)
                .iter()
                .map(|d| {
                    json!({
                        "id": d.node_id.as_str(),
                        "rule": d.rule,
                        "message": d.message,
                        "severity": format!("{:?}", d.severity).to_lowercase(),
                    })
                })
                .collect();
            ok(json!({ "diagnostics": diagnostics }))
        }
        Err(e) => fail(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    const FLOW: &str = r#"{
        "id": "flow-1",
        "name": "Tiny",
        "nodes": [
            {"id": "w_a", "name": "A", "type": "process", "position": {"x": 0, "y": 0},
             "size": {"width": 100, "height": 40}},
            {"id": "w_b", "name": "B", "type": "decision", "position": {"x": 200, "y": 80},
             "size": {"width": 100, "height": 40}}
        ],
        "connectors": [
            {"id": "w_ab", "sourceID": "w_a", "targetID": "w_b"},
            {"id": "w_gone", "sourceID": "w_a", "targetID": "w_missing"}
        ]
    }"#;

    fn parse(s: &str) -> Value {
        serde_json::from_str(s).unwrap()
    }

    fn loaded() -> FlowCanvas {
        let mut canvas = FlowCanvas::new(None);
        let out = parse(&canvas.load_json(0.0, FLOW));
        assert_eq!(out["ok"], Value::Bool(true));
        canvas
    }

    #[test]
    fn load_reports_dropped_connectors() {
        let mut canvas = FlowCanvas::new(None);
        let out = parse(&canvas.load_json(0.0, FLOW));
        assert_eq!(out["droppedConnectors"], json!(["w_gone"]));
        let doc = parse(&canvas.get_document());
        assert_eq!(doc["connectors"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn bad_document_is_an_error_and_keeps_graph() {
        let mut canvas = loaded();
        let out = parse(&canvas.load_json(1.0, "{\"nodes\": []}"));
        assert_eq!(out["ok"], Value::Bool(false));
        let doc = parse(&canvas.get_document());
        assert_eq!(doc["nodes"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn add_then_undo() {
        let mut canvas = loaded();
        let id = canvas.add_node(10.0, "data", 50.0, 50.0);
        assert!(!id.is_empty());
        assert!(canvas.can_undo());
        assert!(canvas.undo(20.0));
        assert!(!canvas.get_document().contains(&id));
        assert!(canvas.add_node(30.0, "cloud", 0.0, 0.0).is_empty());
    }

    #[test]
    fn self_loop_is_rejected() {
        let mut canvas = loaded();
        assert_eq!(canvas.connect(0.0, "w_a", "w_a", "", ""), "");
        assert!(!canvas.connect(0.0, "w_b", "w_a", "", "").is_empty());
    }

    #[test]
    fn drag_settles_on_tick() {
        let mut canvas = loaded();
        canvas.begin_drag(r#"["w_a"]"#);
        assert!(canvas.drag_by(0.0, 10.0, 0.0));
        canvas.end_drag(5.0);
        let first = parse(&canvas.tick(50.0));
        assert_eq!(first["recorded"], Value::Bool(false));
        let second = parse(&canvas.tick(200.0));
        assert_eq!(second["recorded"], Value::Bool(true));
    }

    #[test]
    fn unknown_alignment_is_reported() {
        let mut canvas = loaded();
        canvas.select(0.0, r#"["w_a","w_b"]"#);
        assert_eq!(parse(&canvas.align(1.0, "diagonal"))["ok"], Value::Bool(false));
        assert_eq!(parse(&canvas.align(2.0, "top"))["ok"], Value::Bool(true));
        let doc = parse(&canvas.get_document());
        let b = doc["nodes"]
            .as_array()
            .unwrap()
            .iter()
            .find(|n| n["id"] == "w_b")
            .unwrap();
        assert_eq!(b["position"]["y"].as_f64(), Some(0.0));
    }

    #[test]
    fn group_and_ungroup_selection() {
        let mut canvas = loaded();
        canvas.select(0.0, r#"["w_a","w_b"]"#);
        let out = parse(&canvas.group_selection(1.0, Some("Lane".into())));
        let id = out["id"].as_str().unwrap().to_string();
        assert_eq!(parse(&canvas.ungroup(2.0, &id))["ok"], Value::Bool(true));
        assert_eq!(parse(&canvas.ungroup(3.0, "w_a"))["ok"], Value::Bool(false));
    }

    #[test]
    fn validate_lists_dangling_connector() {
        let out = parse(&validate(FLOW));
        let rules: Vec<&str> = out["diagnostics"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|d| d["rule"].as_str())
            .collect();
        assert!(rules.contains(&"dangling-connector"));
        assert_eq!(parse(&validate("not json"))["ok"], Value::Bool(false));
    }
}
