//! Pure geometry helpers: points, sizes, bounding boxes, and the
//! relative ↔ absolute coordinate transforms used by grouping.

use serde::{Deserialize, Serialize};

/// A 2D point in canvas units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// A width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.max_x() && p.y >= self.y && p.y <= self.max_y()
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.max_x().max(other.max_x()) - x,
            self.max_y().max(other.max_y()) - y,
        )
    }
}

/// Union bounding box of a set of rectangles. `None` for an empty set.
pub fn bounding_box<I>(rects: I) -> Option<Rect>
where
    I: IntoIterator<Item = Rect>,
{
    rects.into_iter().reduce(|acc, r| acc.union(&r))
}

/// Express an absolute point relative to `origin`.
pub fn to_relative(abs: Point, origin: Point) -> Point {
    Point::new(abs.x - origin.x, abs.y - origin.y)
}

/// Inverse of [`to_relative`].
pub fn to_absolute(rel: Point, origin: Point) -> Point {
    Point::new(rel.x + origin.x, rel.y + origin.y)
}

/// Euclidean distance between two points.
pub fn distance(a: Point, b: Point) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}

// ─── Edge routing ────────────────────────────────────────────────────────

/// Below this endpoint distance an edge is drawn as a straight line.
pub const STRAIGHT_EDGE_THRESHOLD: f64 = 30.0;
/// Below this endpoint distance the step offset shrinks with the distance.
pub const TIGHT_EDGE_THRESHOLD: f64 = 50.0;
/// Base bend offset for smooth-step edges.
pub const BASE_STEP_OFFSET: f64 = 20.0;

/// Path shape chosen for an edge between two handle positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeRoute {
    Straight,
    SmoothStep { offset: f64 },
}

/// Pick the path shape for an edge so that close endpoints don't produce
/// overlapping step segments. `extra_offset` is the user-dragged bend offset.
pub fn edge_route(source: Point, target: Point, extra_offset: f64) -> EdgeRoute {
    let d = distance(source, target);
    if d < STRAIGHT_EDGE_THRESHOLD {
        return EdgeRoute::Straight;
    }
    let base = BASE_STEP_OFFSET + extra_offset;
    let offset = if d < TIGHT_EDGE_THRESHOLD {
        (d / 2.5).min(base).max(5.0)
    } else {
        base
    };
    EdgeRoute::SmoothStep { offset }
}
