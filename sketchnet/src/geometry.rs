//! Grid Geometry Primitives
//!
//! Everything in a sketch lives on an integer grid. Floating pointer
//! coordinates are snapped once at the boundary (`Point::snapped`) and every
//! comparison afterwards is exact, so coincidence never depends on float
//! rounding.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Default grid unit in canvas pixels
pub const DEFAULT_GRID: i64 = 20;

/// A canonical grid coordinate
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Snap a floating coordinate to the nearest grid intersection.
    pub fn snapped(x: f64, y: f64, grid: i64) -> Self {
        let g = grid.max(1) as f64;
        Self {
            x: ((x / g).round() * g) as i64,
            y: ((y / g).round() * g) as i64,
        }
    }

    /// Round an integer coordinate onto the grid.
    pub fn snap_to(self, grid: i64) -> Self {
        Self::snapped(self.x as f64, self.y as f64, grid)
    }

    /// True when the two points share an x or a y coordinate.
    pub fn aligned_with(&self, other: &Point) -> bool {
        self.x == other.x || self.y == other.y
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn manhattan(&self, other: &Point) -> i64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

impl From<(i64, i64)> for Point {
    fn from((x, y): (i64, i64)) -> Self {
        Point::new(x, y)
    }
}

/// Orientation of an axis-aligned segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    pub fn other(self) -> Axis {
        match self {
            Axis::Horizontal => Axis::Vertical,
            Axis::Vertical => Axis::Horizontal,
        }
    }
}

/// A straight piece of wire between two grid points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    /// Orientation of the segment, `None` when diagonal.
    ///
    /// A zero-length segment reports `Horizontal`.
    pub fn axis(&self) -> Option<Axis> {
        if self.start.y == self.end.y {
            Some(Axis::Horizontal)
        } else if self.start.x == self.end.x {
            Some(Axis::Vertical)
        } else {
            None
        }
    }

    pub fn is_orthogonal(&self) -> bool {
        self.axis().is_some()
    }

    pub fn is_degenerate(&self) -> bool {
        self.start == self.end
    }

    pub fn length(&self) -> i64 {
        self.start.manhattan(&self.end)
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_corners(self.start, self.end)
    }

    /// Closed containment test for orthogonal segments.
    pub fn contains(&self, p: Point) -> bool {
        if !self.bounds().contains(p) {
            return false;
        }
        match self.axis() {
            Some(Axis::Horizontal) => p.y == self.start.y,
            Some(Axis::Vertical) => p.x == self.start.x,
            None => false,
        }
    }

    /// Containment excluding both endpoints.
    pub fn contains_interior(&self, p: Point) -> bool {
        p != self.start && p != self.end && self.contains(p)
    }

    /// Nearest point on the segment to `p`, snapped back to integers.
    pub fn closest_point(&self, p: Point) -> Point {
        let dx = (self.end.x - self.start.x) as f64;
        let dy = (self.end.y - self.start.y) as f64;
        let length_sq = dx * dx + dy * dy;
        if length_sq == 0.0 {
            return self.start;
        }
        let t = (((p.x - self.start.x) as f64) * dx + ((p.y - self.start.y) as f64) * dy)
            / length_sq;
        let t = t.clamp(0.0, 1.0);
        Point::new(
            (self.start.x as f64 + t * dx).round() as i64,
            (self.start.y as f64 + t * dy).round() as i64,
        )
    }

    /// Perpendicular distance from `p` to the segment (clamped to its ends).
    pub fn distance_to(&self, p: Point) -> f64 {
        let dx = (self.end.x - self.start.x) as f64;
        let dy = (self.end.y - self.start.y) as f64;
        let length_sq = dx * dx + dy * dy;
        let px = (p.x - self.start.x) as f64;
        let py = (p.y - self.start.y) as f64;
        if length_sq == 0.0 {
            return (px * px + py * py).sqrt();
        }
        let t = ((px * dx + py * dy) / length_sq).clamp(0.0, 1.0);
        let ex = px - t * dx;
        let ey = py - t * dy;
        (ex * ex + ey * ey).sqrt()
    }

    /// Single point where a horizontal and a vertical segment meet.
    pub fn crossing(&self, other: &Segment) -> Option<Point> {
        let candidate = match (self.axis()?, other.axis()?) {
            (Axis::Horizontal, Axis::Vertical) => Point::new(other.start.x, self.start.y),
            (Axis::Vertical, Axis::Horizontal) => Point::new(self.start.x, other.start.y),
            _ => return None,
        };
        (self.contains(candidate) && other.contains(candidate)).then_some(candidate)
    }
}

/// Axis-aligned rectangle with inclusive bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn around(center: Point, half_width: i64, half_height: i64) -> Self {
        Self {
            min: Point::new(center.x - half_width, center.y - half_height),
            max: Point::new(center.x + half_width, center.y + half_height),
        }
    }

    pub fn width(&self) -> i64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> i64 {
        self.max.y - self.min.y
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    pub fn expanded(&self, by: i64) -> Rect {
        Rect {
            min: Point::new(self.min.x - by, self.min.y - by),
            max: Point::new(self.max.x + by, self.max.y + by),
        }
    }
}
