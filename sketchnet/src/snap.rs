//! Pointer snapping
//!
//! Resolves a raw pointer position to the anchor an edit should use.
//! Priority: terminal > junction > wire segment > plain grid.

use serde::Serialize;

use crate::config::SnapConfig;
use crate::geometry::{Axis, Point, Segment};
use crate::normalize::junction_dots;
use crate::topology::{TerminalRef, TopologyModel, WireId};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SnapKind {
    Terminal { terminal: TerminalRef },
    Junction,
    Wire { wire: WireId, segment_index: usize },
    Grid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapCandidate {
    pub point: Point,
    #[serde(flatten)]
    pub kind: SnapKind,
}

impl SnapCandidate {
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, SnapKind::Terminal { .. })
    }
}

fn raw_distance(p: Point, x: f64, y: f64) -> f64 {
    let dx = p.x as f64 - x;
    let dy = p.y as f64 - y;
    (dx * dx + dy * dy).sqrt()
}

/// Best anchor for a pointer at `(x, y)` within `radius` canvas pixels.
pub fn snap_candidate(model: &TopologyModel, x: f64, y: f64, radius: f64) -> SnapCandidate {
    let nearest_terminal = model
        .terminal_refs()
        .into_iter()
        .map(|(terminal, p)| (raw_distance(p, x, y), terminal, p))
        .filter(|(d, _, _)| *d <= radius)
        .min_by(|a, b| a.0.total_cmp(&b.0));
    if let Some((_, terminal, point)) = nearest_terminal {
        return SnapCandidate {
            point,
            kind: SnapKind::Terminal { terminal },
        };
    }

    let nearest_junction = junction_dots(model)
        .into_iter()
        .map(|p| (raw_distance(p, x, y), p))
        .filter(|(d, _)| *d <= radius)
        .min_by(|a, b| a.0.total_cmp(&b.0));
    if let Some((_, point)) = nearest_junction {
        return SnapCandidate {
            point,
            kind: SnapKind::Junction,
        };
    }

    let grid = model.grid();
    let pointer = Point::new(x.round() as i64, y.round() as i64);
    if let Some(hit) = model.find_point_on_any_wire(pointer, radius) {
        let point = model
            .segments(hit.wire)
            .and_then(|segments| segments.get(hit.segment_index).copied())
            .map_or(hit.point, |seg| along_grid(&seg, hit.point, grid));
        return SnapCandidate {
            point,
            kind: SnapKind::Wire {
                wire: hit.wire,
                segment_index: hit.segment_index,
            },
        };
    }

    SnapCandidate {
        point: Point::snapped(x, y, grid),
        kind: SnapKind::Grid,
    }
}

/// [`snap_candidate`] with the pick radius taken from the sketch config.
pub fn snap_candidate_with_config(
    model: &TopologyModel,
    x: f64,
    y: f64,
    config: &SnapConfig,
) -> SnapCandidate {
    snap_candidate(model, x, y, config.radius)
}

/// Round the free coordinate of a point on `seg` to the grid, staying on the
/// segment.
fn along_grid(seg: &Segment, p: Point, grid: i64) -> Point {
    let snapped = p.snap_to(grid);
    let candidate = match seg.axis() {
        Some(Axis::Horizontal) => Point::new(snapped.x, p.y),
        Some(Axis::Vertical) => Point::new(p.x, snapped.y),
        None => p,
    };
    if seg.contains(candidate) {
        candidate
    } else {
        p
    }
}
