//! Topology Model Implementation
//!
//! The model is the single owner of sketch state. Wires are sequences of
//! [`PointId`]s into a shared point arena; all edits go through
//! [`TopologyModel::commit_wire`] so the arena never holds orphans.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use super::schema::*;
use super::TopologyError;
use crate::geometry::{Axis, Point, Segment, DEFAULT_GRID};
use crate::routing::{self, PreferredAxis};

/// Wire point slot used when rebuilding a wire: existing id or a new point
pub(crate) type PointEntry = (Option<PointId>, WirePoint);

/// Result of a nearest-segment query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireHit {
    pub wire: WireId,
    pub segment_index: usize,
    pub distance: f64,
    /// Closest point on the hit segment
    pub point: Point,
}

/// In-memory sketch: components, wires and the wire point arena
#[derive(Debug, Clone)]
pub struct TopologyModel {
    grid: i64,
    components: IndexMap<ComponentId, Component>,
    wires: IndexMap<WireId, Wire>,
    points: HashMap<PointId, WirePoint>,
    next_wire: u64,
    next_point: u64,
    revision: u64,
}

impl Default for TopologyModel {
    fn default() -> Self {
        Self::new()
    }
}

impl TopologyModel {
    pub fn new() -> Self {
        Self::with_grid(DEFAULT_GRID)
    }

    pub fn with_grid(grid: i64) -> Self {
        Self {
            grid: grid.max(1),
            components: IndexMap::new(),
            wires: IndexMap::new(),
            points: HashMap::new(),
            next_wire: 1,
            next_point: 1,
            revision: 0,
        }
    }

    pub fn grid(&self) -> i64 {
        self.grid
    }

    /// Bumped by every mutation that changes the sketch.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn touch(&mut self) {
        self.revision += 1;
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub fn component(&self, id: &str) -> Option<&Component> {
        self.components.get(id)
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn wires(&self) -> impl Iterator<Item = &Wire> {
        self.wires.values()
    }

    pub fn wire(&self, id: WireId) -> Option<&Wire> {
        self.wires.get(&id)
    }

    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }

    pub fn wire_ids(&self) -> Vec<WireId> {
        self.wires.keys().copied().collect()
    }

    pub fn point(&self, id: PointId) -> Option<&WirePoint> {
        self.points.get(&id)
    }

    /// Wire points of a wire, in order.
    pub fn wire_points(&self, id: WireId) -> Option<Vec<&WirePoint>> {
        let wire = self.wires.get(&id)?;
        Some(wire.points.iter().filter_map(|p| self.points.get(p)).collect())
    }

    /// Coordinates of a wire, in order.
    pub fn wire_positions(&self, id: WireId) -> Option<Vec<Point>> {
        self.wires.get(&id).map(|w| self.positions_of(w))
    }

    pub fn segments(&self, id: WireId) -> Option<Vec<Segment>> {
        let positions = self.wire_positions(id)?;
        Some(
            positions
                .windows(2)
                .map(|w| Segment::new(w[0], w[1]))
                .collect(),
        )
    }

    pub(crate) fn positions_of(&self, wire: &Wire) -> Vec<Point> {
        wire.points
            .iter()
            .filter_map(|p| self.points.get(p))
            .map(|p| p.position)
            .collect()
    }

    pub fn terminal_position(&self, terminal: &TerminalRef) -> Option<Point> {
        self.components
            .get(&terminal.component)?
            .terminal(&terminal.terminal)
            .map(|t| t.position)
    }

    /// First terminal (in registration order) sitting exactly on `p`.
    pub fn terminal_at(&self, p: Point) -> Option<TerminalRef> {
        self.components.values().find_map(|c| {
            c.terminals()
                .iter()
                .find(|t| t.position == p)
                .map(|t| TerminalRef::new(c.id.clone(), t.id.clone()))
        })
    }

    /// Every terminal with its live position, in registration order.
    pub fn terminal_refs(&self) -> Vec<(TerminalRef, Point)> {
        self.components
            .values()
            .flat_map(|c| {
                c.terminals()
                    .iter()
                    .map(move |t| (TerminalRef::new(c.id.clone(), t.id.clone()), t.position))
            })
            .collect()
    }

    /// Nearest wire segment within `tolerance` of `p`.
    pub fn find_point_on_any_wire(&self, p: Point, tolerance: f64) -> Option<WireHit> {
        let margin = tolerance.max(0.0).ceil() as i64;
        let mut best: Option<WireHit> = None;

        for wire in self.wires.values() {
            let positions = self.positions_of(wire);
            for (i, w) in positions.windows(2).enumerate() {
                let seg = Segment::new(w[0], w[1]);
                if !seg.bounds().expanded(margin).contains(p) {
                    continue;
                }
                let distance = seg.distance_to(p);
                if distance <= tolerance && best.as_ref().map_or(true, |b| distance < b.distance) {
                    best = Some(WireHit {
                        wire: wire.id,
                        segment_index: i,
                        distance,
                        point: seg.closest_point(p),
                    });
                }
            }
        }

        best
    }

    // ------------------------------------------------------------------
    // Component mutations
    // ------------------------------------------------------------------

    /// Add a component; its origin and terminal offsets are snapped to the grid.
    pub fn add_component(&mut self, mut component: Component) -> Result<(), TopologyError> {
        if self.components.contains_key(&component.id) {
            return Err(TopologyError::DuplicateComponent(component.id));
        }
        component.snap_to_grid(self.grid);
        tracing::debug!("Adding {} {}", component.kind.name(), component.id);
        self.components.insert(component.id.clone(), component);
        self.touch();
        Ok(())
    }

    /// Move a component; unknown ids are a no-op and return `false`.
    pub fn move_component(&mut self, id: &str, position: Point) -> bool {
        let position = position.snap_to(self.grid);
        let Some(component) = self.components.get_mut(id) else {
            tracing::debug!("move_component: unknown component {}", id);
            return false;
        };
        if component.position() == position {
            return true;
        }
        component.set_position(position);
        let id = component.id.clone();
        let moved = self.resnap_pins(Some(&id));
        tracing::debug!("Moved {} to {} ({} pinned points followed)", id, position, moved);
        self.touch();
        true
    }

    /// Rotate a component by quarter turns; unknown ids are a no-op and return `false`.
    pub fn rotate_component(&mut self, id: &str, quarter_turns: i32) -> bool {
        let Some(component) = self.components.get_mut(id) else {
            tracing::debug!("rotate_component: unknown component {}", id);
            return false;
        };
        if quarter_turns.rem_euclid(4) == 0 {
            return true;
        }
        let rotation = component.rotation().rotated(quarter_turns);
        component.set_rotation(rotation);
        let id = component.id.clone();
        let moved = self.resnap_pins(Some(&id));
        tracing::debug!("Rotated {} to {}° ({} pinned points followed)", id, rotation.degrees(), moved);
        self.touch();
        true
    }

    /// Delete a component and unpin every wire point that referenced it.
    pub fn remove_component(&mut self, id: &str) -> Result<Component, TopologyError> {
        let component = self
            .components
            .shift_remove(id)
            .ok_or_else(|| TopologyError::MissingComponent(ComponentId::from(id)))?;

        let mut unpinned = 0;
        for point in self.points.values_mut() {
            if point.terminal.as_ref().map_or(false, |t| t.component == component.id) {
                point.terminal = None;
                unpinned += 1;
            }
        }
        tracing::debug!("Removed {} ({} wire points unpinned)", component.id, unpinned);
        self.touch();
        Ok(component)
    }

    /// Re-snap pinned points to their terminals' live positions.
    ///
    /// With `only` set, just the pins of that component are considered.
    /// Segments that turn diagonal get one elbow point. Points whose
    /// component no longer exists are unpinned. Returns how many points moved.
    pub(crate) fn resnap_pins(&mut self, only: Option<&ComponentId>) -> usize {
        let mut moved_total = 0;

        for wire_id in self.wire_ids() {
            let Some(mut entries) = self.wire_entries(wire_id) else {
                continue;
            };
            let before: Vec<Point> = entries.iter().map(|(_, p)| p.position).collect();
            let mut moved = vec![false; entries.len()];
            let mut changed = false;

            for (i, (_, point)) in entries.iter_mut().enumerate() {
                let Some(terminal) = point.terminal.clone() else {
                    continue;
                };
                if only.map_or(false, |c| *c != terminal.component) {
                    continue;
                }
                match self.terminal_position(&terminal) {
                    Some(live) if live != point.position => {
                        point.position = live;
                        moved[i] = true;
                        changed = true;
                    }
                    Some(_) => {}
                    None => {
                        tracing::warn!("Unpinning {} point from missing terminal {}", wire_id, terminal);
                        point.terminal = None;
                        changed = true;
                    }
                }
            }

            if changed {
                moved_total += moved.iter().filter(|m| **m).count();
                let repaired = repair_orthogonality(entries, &before, &moved);
                self.commit_wire(wire_id, repaired);
            }
        }

        moved_total
    }

    // ------------------------------------------------------------------
    // Wire mutations
    // ------------------------------------------------------------------

    /// Add a wire through `points`.
    ///
    /// Points are snapped to the grid first. Needs at least two points and
    /// only orthogonal segments; endpoints landing on a terminal are pinned
    /// to it.
    pub fn add_wire(&mut self, points: &[Point]) -> Result<WireId, TopologyError> {
        let points: Vec<Point> = points.iter().map(|p| p.snap_to(self.grid)).collect();
        validate_path(&points)?;

        let last = points.len() - 1;
        let entries: Vec<PointEntry> = points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let terminal = if i == 0 || i == last { self.terminal_at(*p) } else { None };
                (
                    None,
                    WirePoint {
                        position: *p,
                        terminal,
                        junction: false,
                    },
                )
            })
            .collect();

        let id = self.allocate_wire();
        self.commit_wire(id, entries);
        self.touch();
        tracing::debug!("Added {} with {} points", id, points.len());
        Ok(id)
    }

    /// Add a wire between two anchors using the orthogonal router.
    pub fn add_routed_wire(
        &mut self,
        start: Point,
        end: Point,
        preferred: PreferredAxis,
    ) -> Result<WireId, TopologyError> {
        let (start, end) = (start.snap_to(self.grid), end.snap_to(self.grid));
        let ignore: HashSet<ComponentId> = [self.terminal_at(start), self.terminal_at(end)]
            .into_iter()
            .flatten()
            .map(|t| t.component)
            .collect();
        let path = routing::route(start, end, preferred, self.components.values(), &ignore, self.grid);
        self.add_wire(&path)
    }

    /// Append a point, inserting one bend if the new segment would be diagonal.
    pub fn extend_wire(&mut self, id: WireId, point: Point) -> Result<(), TopologyError> {
        let point = point.snap_to(self.grid);
        let mut entries = self.wire_entries(id).ok_or(TopologyError::MissingWire(id))?;
        let last = entries
            .last()
            .map(|(_, p)| p.clone())
            .ok_or_else(|| TopologyError::InvalidWire(format!("{} has no points", id)))?;

        if last.position == point {
            return Ok(());
        }

        let target = self.terminal_at(point);
        if !last.position.aligned_with(&point) {
            let ignore: HashSet<ComponentId> = last
                .terminal
                .iter()
                .chain(target.iter())
                .map(|t| t.component.clone())
                .collect();
            let path = routing::route(
                last.position,
                point,
                PreferredAxis::None,
                self.components.values(),
                &ignore,
                self.grid,
            );
            let bends = path.len().saturating_sub(2);
            for bend in path.iter().skip(1).take(bends) {
                entries.push((None, WirePoint::free(*bend)));
            }
        }

        entries.push((
            None,
            WirePoint {
                position: point,
                terminal: target,
                junction: false,
            },
        ));
        self.commit_wire(id, entries);
        self.touch();
        Ok(())
    }

    /// Cut a wire in two at `at`, which must lie on segment `segment_index`.
    ///
    /// The split point is duplicated into both halves and marked as a
    /// junction on both, since it is now shared by two wires. The first half
    /// keeps the original id.
    pub fn split_wire(
        &mut self,
        id: WireId,
        at: Point,
        segment_index: usize,
    ) -> Result<(WireId, WireId), TopologyError> {
        let at = at.snap_to(self.grid);
        let mut entries = self.wire_entries(id).ok_or(TopologyError::MissingWire(id))?;
        if segment_index + 1 >= entries.len() {
            return Err(TopologyError::InvalidSplit(format!(
                "segment {} out of range for {} ({} segments)",
                segment_index,
                id,
                entries.len().saturating_sub(1)
            )));
        }

        let a = entries[segment_index].1.position;
        let b = entries[segment_index + 1].1.position;
        if !Segment::new(a, b).contains(at) {
            return Err(TopologyError::InvalidSplit(format!(
                "{} is not on segment {} of {}",
                at, segment_index, id
            )));
        }

        let k = if at == a {
            segment_index
        } else if at == b {
            segment_index + 1
        } else {
            entries.insert(segment_index + 1, (None, WirePoint::free(at)));
            segment_index + 1
        };
        if k == 0 || k + 1 >= entries.len() {
            return Err(TopologyError::InvalidSplit(format!(
                "{} is an end point of {}",
                at, id
            )));
        }

        entries[k].1.junction = true;
        let mut tail = entries.split_off(k + 1);
        tail.insert(0, (None, entries[k].1.clone()));

        let new_id = self.allocate_wire();
        self.commit_wire(id, entries);
        self.commit_wire(new_id, tail);
        self.touch();
        tracing::debug!("Split {} at {} into {} and {}", id, at, id, new_id);
        Ok((id, new_id))
    }

    pub fn remove_wire(&mut self, id: WireId) -> Result<Wire, TopologyError> {
        let wire = self
            .wires
            .shift_remove(&id)
            .ok_or(TopologyError::MissingWire(id))?;
        for p in &wire.points {
            self.points.remove(p);
        }
        self.touch();
        tracing::debug!("Removed {}", id);
        Ok(wire)
    }

    // ------------------------------------------------------------------
    // Arena plumbing
    // ------------------------------------------------------------------

    /// Snapshot of a wire's points with their ids.
    pub(crate) fn wire_entries(&self, id: WireId) -> Option<Vec<PointEntry>> {
        let wire = self.wires.get(&id)?;
        Some(
            wire.points
                .iter()
                .filter_map(|pid| self.points.get(pid).map(|p| (Some(*pid), p.clone())))
                .collect(),
        )
    }

    /// Replace the contents of a wire, allocating new points and freeing
    /// the ones that were dropped.
    pub(crate) fn commit_wire(&mut self, id: WireId, entries: Vec<PointEntry>) {
        let mut ids = Vec::with_capacity(entries.len());
        for (pid, point) in entries {
            let pid = match pid {
                Some(pid) => {
                    self.points.insert(pid, point);
                    pid
                }
                None => self.allocate_point(point),
            };
            ids.push(pid);
        }

        let wire = self.wires.entry(id).or_insert_with(|| Wire {
            id,
            points: Vec::new(),
        });
        let keep: HashSet<PointId> = ids.iter().copied().collect();
        for old in &wire.points {
            if !keep.contains(old) {
                self.points.remove(old);
            }
        }
        wire.points = ids;
    }

    fn allocate_point(&mut self, point: WirePoint) -> PointId {
        let id = PointId(self.next_point);
        self.next_point += 1;
        self.points.insert(id, point);
        id
    }

    fn allocate_wire(&mut self) -> WireId {
        let id = WireId(self.next_wire);
        self.next_wire += 1;
        id
    }
}

/// Check the structural wire invariants: two or more points, no diagonals.
pub fn validate_path(points: &[Point]) -> Result<(), TopologyError> {
    if points.len() < 2 {
        return Err(TopologyError::InvalidWire(format!(
            "a wire needs at least 2 points, got {}",
            points.len()
        )));
    }
    if let Some(w) = points.windows(2).find(|w| !w[0].aligned_with(&w[1])) {
        return Err(TopologyError::InvalidWire(format!(
            "segment {} -> {} is diagonal",
            w[0], w[1]
        )));
    }
    Ok(())
}

/// Insert an elbow into every segment that a pin move turned diagonal.
///
/// The elbow keeps the leg at the unmoved end on the axis that segment had
/// before the move.
fn repair_orthogonality(entries: Vec<PointEntry>, before: &[Point], moved: &[bool]) -> Vec<PointEntry> {
    let positions: Vec<Point> = entries.iter().map(|(_, p)| p.position).collect();
    let mut out = Vec::with_capacity(entries.len() + 2);

    for (i, entry) in entries.into_iter().enumerate() {
        out.push(entry);
        let Some(&b) = positions.get(i + 1) else {
            continue;
        };
        let a = positions[i];
        if a.aligned_with(&b) {
            continue;
        }
        let old_axis = match (before.get(i), before.get(i + 1)) {
            (Some(&oa), Some(&ob)) => Segment::new(oa, ob).axis().unwrap_or(Axis::Horizontal),
            _ => Axis::Horizontal,
        };
        let b_fixed = !moved.get(i + 1).copied().unwrap_or(false);
        out.push((None, WirePoint::free(elbow(a, b, old_axis, b_fixed))));
    }

    out
}

fn elbow(a: Point, b: Point, old_axis: Axis, keep_b_leg: bool) -> Point {
    match (old_axis, keep_b_leg) {
        (Axis::Horizontal, true) => Point::new(a.x, b.y),
        (Axis::Horizontal, false) => Point::new(b.x, a.y),
        (Axis::Vertical, true) => Point::new(b.x, a.y),
        (Axis::Vertical, false) => Point::new(a.x, b.y),
    }
}
