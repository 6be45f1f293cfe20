//! Core data model for flowchart documents.
//!
//! A document is a flat list of nodes plus a list of edges. Containment is
//! expressed through `parent_id`: a node with a parent stores its position
//! relative to the parent's origin, everything else is canvas-absolute.
//! Groups are ordinary nodes whose kind carries the container state.

use crate::geometry::{Point, Size};
use crate::id::{EdgeId, NodeId};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Free-form style properties (`borderColor`, `fontSize`, ...). Opaque to the core.
pub type StyleMap = BTreeMap<String, serde_json::Value>;

/// Related-node references; usually empty or a handful.
pub type RelatedIds = SmallVec<[NodeId; 4]>;

/// Fallback size for a node that has neither been measured nor sized.
pub const DEFAULT_NODE_SIZE: Size = Size::new(120.0, 60.0);

/// Fallback frame for a group with no explicit or measured size.
pub const DEFAULT_GROUP_SIZE: Size = Size::new(200.0, 150.0);

/// Default group accent colour.
pub const DEFAULT_GROUP_COLOR: &str = "#3b82f6";

// ─── Node kinds ──────────────────────────────────────────────────────────

/// Start/end flavour of a terminator node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminatorKind {
    Start,
    End,
}

/// Container state carried by group nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupData {
    pub label: String,
    pub color: String,
    pub collapsed: bool,
    /// Size to restore when a collapsed group is expanded again.
    pub expanded_size: Option<Size>,
}

impl GroupData {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            color: DEFAULT_GROUP_COLOR.to_string(),
            collapsed: false,
            expanded_size: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    Process,
    Decision,
    Data,
    Terminator,
    Subprocess,
    Group(GroupData),
}

impl NodeKind {
    /// The `type` string used by the document schema.
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Process => "process",
            NodeKind::Decision => "decision",
            NodeKind::Data => "data",
            NodeKind::Terminator => "terminator",
            NodeKind::Subprocess => "subprocess",
            NodeKind::Group(_) => "group",
        }
    }

    /// Parse a non-group `type` string. Unknown types fall back to `None`.
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "process" => Some(NodeKind::Process),
            "decision" => Some(NodeKind::Decision),
            "data" => Some(NodeKind::Data),
            "terminator" => Some(NodeKind::Terminator),
            "subprocess" => Some(NodeKind::Subprocess),
            _ => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, NodeKind::Group(_))
    }
}

// ─── Node ────────────────────────────────────────────────────────────────

/// Explicit size. A missing dimension means "auto" (let the renderer or the
/// group minimum decide).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeSize {
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl NodeSize {
    pub const AUTO: NodeSize = NodeSize {
        width: None,
        height: None,
    };

    pub fn fixed(width: f64, height: f64) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
        }
    }

    pub fn is_auto(&self) -> bool {
        self.width.is_none() && self.height.is_none()
    }

    /// Both dimensions, when both are explicit.
    pub fn resolved(&self) -> Option<Size> {
        Some(Size::new(self.width?, self.height?))
    }
}

impl From<Size> for NodeSize {
    fn from(s: Size) -> Self {
        NodeSize::fixed(s.width, s.height)
    }
}

/// Business payload of a flow step, carried through the editor untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDetails {
    pub expandable: bool,
    pub description: Option<String>,
    /// Database tables, screenshots and the like. Opaque to the core.
    pub detail_config: Option<serde_json::Value>,
    pub sub_type: Option<TerminatorKind>,
    pub background_color: Option<String>,
}

/// A single node on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    /// Relative to the parent when `parent_id` is set, canvas-absolute otherwise.
    pub position: Point,
    pub size: NodeSize,
    /// Size reported by the renderer. Runtime only, never persisted.
    #[serde(skip)]
    pub measured: Option<Size>,
    pub parent_id: Option<NodeId>,
    pub style: StyleMap,
    pub related_ids: RelatedIds,
    pub details: FlowDetails,
    pub selected: bool,
    pub hidden: bool,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            name: String::new(),
            kind,
            position: Point::default(),
            size: NodeSize::AUTO,
            measured: None,
            parent_id: None,
            style: StyleMap::new(),
            related_ids: RelatedIds::new(),
            details: FlowDetails::default(),
            selected: false,
            hidden: false,
        }
    }

    /// A plain process step.
    pub fn process(id: &str, name: &str) -> Self {
        let mut node = Self::new(NodeId::intern(id), NodeKind::Process);
        node.name = name.to_string();
        node.details.expandable = true;
        node
    }

    /// An empty group container.
    pub fn group(id: &str, label: &str) -> Self {
        let mut node = Self::new(NodeId::intern(id), NodeKind::Group(GroupData::new(label)));
        node.name = label.to_string();
        node
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Point::new(x, y);
        self
    }

    pub fn sized(mut self, width: f64, height: f64) -> Self {
        self.size = NodeSize::fixed(width, height);
        self
    }

    pub fn in_group(mut self, parent: NodeId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    pub fn is_group(&self) -> bool {
        self.kind.is_group()
    }

    pub fn group_data(&self) -> Option<&GroupData> {
        match &self.kind {
            NodeKind::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn group_data_mut(&mut self) -> Option<&mut GroupData> {
        match &mut self.kind {
            NodeKind::Group(g) => Some(g),
            _ => None,
        }
    }

    /// Label shown to the user: group label, otherwise the node name.
    pub fn display_name(&self) -> &str {
        match &self.kind {
            NodeKind::Group(g) if !g.label.is_empty() => &g.label,
            _ => &self.name,
        }
    }

    /// Size of the node as content: measured, then explicit, then default.
    pub fn content_size(&self) -> Size {
        if let Some(m) = self.measured {
            return m;
        }
        Size::new(
            self.size.width.unwrap_or(DEFAULT_NODE_SIZE.width),
            self.size.height.unwrap_or(DEFAULT_NODE_SIZE.height),
        )
    }

    /// Size of the node as a container: explicit first (a resize wins over
    /// the last measurement), then measured, then the group default.
    pub fn frame_size(&self) -> Size {
        let measured = self.measured.unwrap_or(DEFAULT_GROUP_SIZE);
        Size::new(
            self.size.width.unwrap_or(measured.width),
            self.size.height.unwrap_or(measured.height),
        )
    }

    /// Add a related-node reference, keeping the set free of duplicates.
    pub fn relate(&mut self, other: NodeId) {
        if other != self.id && !self.related_ids.contains(&other) {
            self.related_ids.push(other);
        }
    }
}

// ─── Edges ───────────────────────────────────────────────────────────────

/// Arrowhead at either end of an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Marker {
    /// A marker id understood by the renderer (e.g. `"arrowclosed"`).
    Named(String),
    Detailed {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        height: Option<f64>,
    },
}

impl Marker {
    /// The standard closed arrowhead.
    pub fn arrow_closed(color: &str) -> Self {
        Marker::Detailed {
            kind: "arrowclosed".to_string(),
            color: Some(color.to_string()),
            width: Some(16.0),
            height: Some(16.0),
        }
    }
}

/// A directed connection between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
    pub label: Option<String>,
    pub style: StyleMap,
    pub label_style: Option<StyleMap>,
    pub label_bg_style: Option<StyleMap>,
    pub marker_start: Option<Marker>,
    pub marker_end: Option<Marker>,
    pub data: Option<serde_json::Value>,
    /// The business flow exists on paper but not in the system yet.
    pub not_implemented: Option<bool>,
    pub selected: bool,
}

impl Edge {
    pub fn new(id: EdgeId, source: NodeId, target: NodeId) -> Self {
        Self {
            id,
            source,
            target,
            source_handle: None,
            target_handle: None,
            label: None,
            style: StyleMap::new(),
            label_style: None,
            label_bg_style: None,
            marker_start: None,
            marker_end: None,
            data: None,
            not_implemented: None,
            selected: false,
        }
    }

    pub fn touches(&self, node: NodeId) -> bool {
        self.source == node || self.target == node
    }
}
