//! Orthogonal Router
//!
//! Produces a direct or single-bend (L-shaped) path between two anchors,
//! steering around component bodies when one of the two bends is blocked.
//!
//! - If the anchors share an x or y: straight segment
//! - Otherwise: horizontal-first or vertical-first L-route, chosen by the
//!   drag preference, then by collision, then by the shorter leg

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::DragConfig;
use crate::geometry::{Axis, Point, Rect, Segment};
use crate::topology::{Component, ComponentId};

/// Axis the user is dragging along, if one has been established
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferredAxis {
    Horizontal,
    Vertical,
    #[default]
    None,
}

impl From<Axis> for PreferredAxis {
    fn from(axis: Axis) -> Self {
        match axis {
            Axis::Horizontal => PreferredAxis::Horizontal,
            Axis::Vertical => PreferredAxis::Vertical,
        }
    }
}

/// Route a wire from `start` to `end`.
///
/// Components listed in `ignore` are the ones the endpoints are anchored to;
/// the route is expected to touch them and they never count as collisions.
pub fn route<'a>(
    start: Point,
    end: Point,
    preferred: PreferredAxis,
    obstacles: impl IntoIterator<Item = &'a Component>,
    ignore: &HashSet<ComponentId>,
    grid: i64,
) -> Vec<Point> {
    if start.aligned_with(&end) {
        return vec![start, end];
    }

    let footprints: Vec<Rect> = obstacles
        .into_iter()
        .filter(|c| !ignore.contains(&c.id))
        .map(|c| c.footprint(grid))
        .collect();

    let horizontal_first = vec![start, Point::new(end.x, start.y), end];
    let vertical_first = vec![start, Point::new(start.x, end.y), end];

    let h_clear = !collides(&horizontal_first, &footprints);
    let v_clear = !collides(&vertical_first, &footprints);

    let first_leg = choose_first_leg(preferred, h_clear, v_clear, start, end);
    tracing::trace!(
        "route {} -> {}: preferred {:?}, h_clear {}, v_clear {}, chose {:?}",
        start,
        end,
        preferred,
        h_clear,
        v_clear,
        first_leg
    );

    match first_leg {
        Axis::Horizontal => horizontal_first,
        Axis::Vertical => vertical_first,
    }
}

fn choose_first_leg(
    preferred: PreferredAxis,
    h_clear: bool,
    v_clear: bool,
    start: Point,
    end: Point,
) -> Axis {
    match preferred {
        PreferredAxis::Horizontal if h_clear => return Axis::Horizontal,
        PreferredAxis::Vertical if v_clear => return Axis::Vertical,
        _ => {}
    }
    match (h_clear, v_clear) {
        (true, false) => Axis::Horizontal,
        (false, true) => Axis::Vertical,
        _ => shorter_axis_first(start, end),
    }
}

/// The axis with the smaller displacement is traversed first.
fn shorter_axis_first(start: Point, end: Point) -> Axis {
    let dx = (end.x - start.x).abs();
    let dy = (end.y - start.y).abs();
    if dx <= dy {
        Axis::Horizontal
    } else {
        Axis::Vertical
    }
}

fn collides(path: &[Point], footprints: &[Rect]) -> bool {
    path.windows(2).any(|w| {
        let bounds = Segment::new(w[0], w[1]).bounds();
        footprints.iter().any(|f| f.intersects(&bounds))
    })
}

/// Derives the preferred routing axis from pointer-drag history.
///
/// The axis stays undetermined while the pointer is within `reset_radius`
/// of the anchor, locks to the dominant displacement once `lock_threshold`
/// is exceeded, and unlocks again if the pointer comes back near the anchor.
#[derive(Debug, Clone)]
pub struct DragAxisTracker {
    anchor: Point,
    reset_radius: f64,
    lock_threshold: f64,
    axis: PreferredAxis,
}

impl DragAxisTracker {
    pub fn new(anchor: Point, reset_radius: f64, lock_threshold: f64) -> Self {
        Self {
            anchor,
            reset_radius,
            lock_threshold: lock_threshold.max(reset_radius),
            axis: PreferredAxis::None,
        }
    }

    pub fn from_config(anchor: Point, config: &DragConfig) -> Self {
        Self::new(anchor, config.reset_radius, config.lock_threshold)
    }

    pub fn anchor(&self) -> Point {
        self.anchor
    }

    pub fn axis(&self) -> PreferredAxis {
        self.axis
    }

    /// Start tracking a new drag from `anchor`.
    pub fn reset(&mut self, anchor: Point) {
        self.anchor = anchor;
        self.axis = PreferredAxis::None;
    }

    /// Feed a raw pointer position and get the current preference.
    pub fn update(&mut self, x: f64, y: f64) -> PreferredAxis {
        let dx = x - self.anchor.x as f64;
        let dy = y - self.anchor.y as f64;
        let distance = (dx * dx + dy * dy).sqrt();

        if distance <= self.reset_radius {
            self.axis = PreferredAxis::None;
        } else if self.axis == PreferredAxis::None && distance >= self.lock_threshold {
            self.axis = if dx.abs() >= dy.abs() {
                PreferredAxis::Horizontal
            } else {
                PreferredAxis::Vertical
            };
        }
        self.axis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::ComponentKind;

    fn no_ignore() -> HashSet<ComponentId> {
        HashSet::new()
    }

    #[test]
    fn test_aligned_points_route_directly() {
        let path = route(
            Point::new(0, 0),
            Point::new(0, 100),
            PreferredAxis::Horizontal,
            std::iter::empty(),
            &no_ignore(),
            20,
        );
        assert_eq!(path, vec![Point::new(0, 0), Point::new(0, 100)]);
    }

    #[test]
    fn test_preferred_axis_wins_when_clear() {
        let start = Point::new(0, 0);
        let end = Point::new(100, 40);
        let path = route(start, end, PreferredAxis::Vertical, std::iter::empty(), &no_ignore(), 20);
        assert_eq!(path[1], Point::new(0, 40));

        let path = route(start, end, PreferredAxis::Horizontal, std::iter::empty(), &no_ignore(), 20);
        assert_eq!(path[1], Point::new(100, 0));
    }

    #[test]
    fn test_tie_breaks_by_shorter_axis_first() {
        // |dx| = 100 > |dy| = 40: the vertical leg is shorter and goes first
        let path = route(
            Point::new(0, 0),
            Point::new(100, 40),
            PreferredAxis::None,
            std::iter::empty(),
            &no_ignore(),
            20,
        );
        assert_eq!(path[1], Point::new(0, 40));

        let path = route(
            Point::new(0, 0),
            Point::new(40, 100),
            PreferredAxis::None,
            std::iter::empty(),
            &no_ignore(),
            20,
        );
        assert_eq!(path[1], Point::new(40, 0));
    }

    #[test]
    fn test_collision_overrides_preference() {
        // A capacitor sitting on the horizontal-first corner
        let blocker = Component::new("C1", ComponentKind::Capacitor, Point::new(200, 0));
        let path = route(
            Point::new(0, 0),
            Point::new(200, 200),
            PreferredAxis::Horizontal,
            [&blocker],
            &no_ignore(),
            20,
        );
        assert_eq!(path[1], Point::new(0, 200));
    }

    #[test]
    fn test_ignored_components_do_not_collide() {
        let anchor = Component::new("C1", ComponentKind::Capacitor, Point::new(200, 0));
        let mut ignore = HashSet::new();
        ignore.insert(anchor.id.clone());
        let path = route(
            Point::new(0, 0),
            Point::new(200, 200),
            PreferredAxis::Horizontal,
            [&anchor],
            &ignore,
            20,
        );
        assert_eq!(path[1], Point::new(200, 0));
    }

    #[test]
    fn test_drag_tracker_locks_and_resets() {
        let mut tracker = DragAxisTracker::new(Point::new(0, 0), 10.0, 20.0);
        assert_eq!(tracker.update(5.0, 3.0), PreferredAxis::None);
        assert_eq!(tracker.update(15.0, 2.0), PreferredAxis::None);
        assert_eq!(tracker.update(25.0, 4.0), PreferredAxis::Horizontal);
        // stays locked even when the pointer swings vertical
        assert_eq!(tracker.update(25.0, 80.0), PreferredAxis::Horizontal);
        // change of mind: back near the anchor
        assert_eq!(tracker.update(2.0, 2.0), PreferredAxis::None);
        assert_eq!(tracker.update(3.0, 40.0), PreferredAxis::Vertical);
    }

    #[test]
    fn test_drag_tracker_from_config() {
        let config = DragConfig {
            reset_radius: 5.0,
            lock_threshold: 40.0,
        };
        let mut tracker = DragAxisTracker::from_config(Point::new(100, 100), &config);
        assert_eq!(tracker.anchor(), Point::new(100, 100));
        // past the reset radius but short of the lock threshold
        assert_eq!(tracker.update(100.0, 130.0), PreferredAxis::None);
        assert_eq!(tracker.update(100.0, 145.0), PreferredAxis::Vertical);

        tracker.reset(Point::new(0, 0));
        assert_eq!(tracker.axis(), PreferredAxis::None);
    }
}
