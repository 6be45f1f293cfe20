//! Alignment and distribution of a node selection.
//!
//! Geometry is computed in canvas-absolute coordinates so that a selection
//! mixing top-level nodes and group children lines up on screen; results
//! are converted back to each node's own frame.

use crate::error::EditError;
use crate::grouping::child_extent;
use fp_core::geometry::{Point, Rect};
use fp_core::store::GraphState;
use fp_core::NodeId;
use std::fmt;
use std::str::FromStr;

/// Moves smaller than this are not worth a history entry.
const DISTRIBUTE_EPSILON: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignOp {
    Left,
    Center,
    Right,
    Top,
    Middle,
    Bottom,
    DistributeH,
    DistributeV,
}

impl AlignOp {
    pub const ALL: [AlignOp; 8] = [
        AlignOp::Left,
        AlignOp::Center,
        AlignOp::Right,
        AlignOp::Top,
        AlignOp::Middle,
        AlignOp::Bottom,
        AlignOp::DistributeH,
        AlignOp::DistributeV,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlignOp::Left => "left",
            AlignOp::Center => "center",
            AlignOp::Right => "right",
            AlignOp::Top => "top",
            AlignOp::Middle => "middle",
            AlignOp::Bottom => "bottom",
            AlignOp::DistributeH => "distribute-h",
            AlignOp::DistributeV => "distribute-v",
        }
    }

    /// Minimum selection size the operation acts on.
    pub fn min_nodes(&self) -> usize {
        match self {
            AlignOp::DistributeH | AlignOp::DistributeV => 3,
            _ => 2,
        }
    }
}

impl fmt::Display for AlignOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlignOp {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlignOp::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| EditError::UnknownAlignment(s.to_string()))
    }
}

/// Compute new positions for `ids` under `op`. Only nodes that actually
/// move are returned, as `(id, position in the node's own frame)`.
/// Selections below [`AlignOp::min_nodes`] yield nothing.
pub fn align(state: &GraphState, ids: &[NodeId], op: AlignOp) -> Vec<(NodeId, Point)> {
    let targets: Vec<(NodeId, Rect, Point)> = state
        .nodes()
        .iter()
        .filter(|n| ids.contains(&n.id))
        .filter_map(|n| {
            let rect = state.absolute_rect(n.id)?;
            let frame = n
                .parent_id
                .and_then(|p| state.absolute_position(p))
                .unwrap_or_default();
            Some((n.id, rect, frame))
        })
        .collect();
    if targets.len() < op.min_nodes() {
        return Vec::new();
    }

    let min_x = targets.iter().map(|t| t.1.x).fold(f64::INFINITY, f64::min);
    let min_y = targets.iter().map(|t| t.1.y).fold(f64::INFINITY, f64::min);
    let max_x = targets.iter().map(|t| t.1.max_x()).fold(f64::NEG_INFINITY, f64::max);
    let max_y = targets.iter().map(|t| t.1.max_y()).fold(f64::NEG_INFINITY, f64::max);
    let count = targets.len() as f64;
    let avg_x = targets.iter().map(|t| t.1.center().x).sum::<f64>() / count;
    let avg_y = targets.iter().map(|t| t.1.center().y).sum::<f64>() / count;

    let mut moved: Vec<(NodeId, Point)> = Vec::new();
    let mut emit = |id: NodeId, rect: &Rect, frame: Point, x: f64, y: f64| {
        if x != rect.x || y != rect.y {
            moved.push((id, Point::new(x - frame.x, y - frame.y)));
        }
    };

    match op {
        AlignOp::Left => {
            for (id, r, f) in &targets {
                emit(*id, r, *f, min_x, r.y);
            }
        }
        AlignOp::Right => {
            for (id, r, f) in &targets {
                emit(*id, r, *f, max_x - r.width, r.y);
            }
        }
        AlignOp::Center => {
            for (id, r, f) in &targets {
                emit(*id, r, *f, avg_x - r.width / 2.0, r.y);
            }
        }
        AlignOp::Top => {
            for (id, r, f) in &targets {
                emit(*id, r, *f, r.x, min_y);
            }
        }
        AlignOp::Bottom => {
            for (id, r, f) in &targets {
                emit(*id, r, *f, r.x, max_y - r.height);
            }
        }
        AlignOp::Middle => {
            for (id, r, f) in &targets {
                emit(*id, r, *f, r.x, avg_y - r.height / 2.0);
            }
        }
        AlignOp::DistributeH | AlignOp::DistributeV => {
            let horizontal = op == AlignOp::DistributeH;
            let axis = |r: &Rect| if horizontal { r.x } else { r.y };
            let mut sorted: Vec<&(NodeId, Rect, Point)> = targets.iter().collect();
            sorted.sort_by(|a, b| axis(&a.1).total_cmp(&axis(&b.1)));

            let first = axis(&sorted[0].1);
            let last = axis(&sorted[sorted.len() - 1].1);
            let interval = (last - first) / (sorted.len() - 1) as f64;
            for (i, (id, r, f)) in sorted.into_iter().enumerate() {
                let target = first + interval * i as f64;
                if (axis(r) - target).abs() <= DISTRIBUTE_EPSILON {
                    continue;
                }
                if horizontal {
                    emit(*id, r, *f, target, r.y);
                } else {
                    emit(*id, r, *f, r.x, target);
                }
            }
        }
    }
    moved
}

/// Apply the output of [`align`]. Group children are kept inside their
/// group's extent, as drags are. When nothing ends up moving, `state`
/// itself is returned.
pub fn apply_moves(state: &GraphState, moves: &[(NodeId, Point)]) -> GraphState {
    let moves: Vec<(NodeId, Point)> = moves
        .iter()
        .filter_map(|&(id, pos)| {
            let node = state.node(id)?;
            let pos = match node.parent_id.and_then(|p| state.node(p)) {
                Some(parent) => child_extent(node, parent).clamp(pos),
                None => pos,
            };
            (pos != node.position).then_some((id, pos))
        })
        .collect();
    if moves.is_empty() {
        return state.clone();
    }
    let mut next = state.clone();
    for node in next.nodes_mut() {
        if let Some((_, pos)) = moves.iter().find(|(id, _)| *id == node.id) {
            node.position = *pos;
        }
    }
    next
}
