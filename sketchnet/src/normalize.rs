//! Junction & Simplification Pass
//!
//! Runs before every render and before netlist synthesis:
//!
//! 1. re-snap pinned points to their terminals
//! 2. pin wire points that sit on a terminal, insert pinned points where a
//!    terminal lies inside a segment (a wire running through a lead)
//! 3. insert wire/wire crossings and touches into every involved wire as
//!    junctions
//! 4. drop free, collinear or duplicate interior points
//!
//! Insertions are computed from a snapshot of the geometry and deduplicated
//! by coordinate, so the order wires are visited in does not matter and a
//! second run changes nothing.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::geometry::{Point, Segment};
use crate::topology::model::PointEntry;
use crate::topology::{TerminalRef, TopologyModel, WireId, WirePoint};

/// What a normalization run changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    /// Pinned points moved onto their terminal
    pub resnapped: usize,
    /// Points pinned to a terminal they were passing through
    pub pinned: usize,
    /// Junction points inserted or flagged
    pub junctions: usize,
    /// Redundant points removed
    pub removed: usize,
}

impl NormalizeReport {
    pub fn is_noop(&self) -> bool {
        self.resnapped == 0 && self.pinned == 0 && self.junctions == 0 && self.removed == 0
    }
}

/// Normalize every wire of the model in place.
pub fn normalize(model: &mut TopologyModel) -> NormalizeReport {
    let report = NormalizeReport {
        resnapped: model.resnap_pins(None),
        pinned: pin_pass_through(model),
        junctions: insert_junctions(model),
        removed: simplify(model),
    };

    if !report.is_noop() {
        model.touch();
        tracing::debug!(
            "Normalized sketch: {} resnapped, {} pinned, {} junctions, {} removed",
            report.resnapped,
            report.pinned,
            report.junctions,
            report.removed
        );
    }
    report
}

/// Wire ids touching each coordinate through one of their points.
pub fn wire_touches(model: &TopologyModel) -> BTreeMap<Point, BTreeSet<WireId>> {
    let mut touches: BTreeMap<Point, BTreeSet<WireId>> = BTreeMap::new();
    for wire in model.wires() {
        for position in model.positions_of(wire) {
            touches.entry(position).or_default().insert(wire.id);
        }
    }
    touches
}

/// Coordinates where a connection dot is drawn: touched by two or more
/// wires, or a terminal touched by at least one wire. Sorted by (x, y).
pub fn junction_dots(model: &TopologyModel) -> Vec<Point> {
    let terminals: HashSet<Point> = model.terminal_refs().into_iter().map(|(_, p)| p).collect();
    wire_touches(model)
        .into_iter()
        .filter(|(p, wires)| wires.len() >= 2 || terminals.contains(p))
        .map(|(p, _)| p)
        .collect()
}

fn pin_pass_through(model: &mut TopologyModel) -> usize {
    let terminals = model.terminal_refs();
    if terminals.is_empty() {
        return 0;
    }
    let mut changes = 0;

    for wire_id in model.wire_ids() {
        let Some(entries) = model.wire_entries(wire_id) else {
            continue;
        };
        let existing: HashSet<Point> = entries.iter().map(|(_, p)| p.position).collect();
        let mut out: Vec<PointEntry> = Vec::with_capacity(entries.len());
        let mut changed = false;

        for (i, (pid, point)) in entries.iter().enumerate() {
            let mut point = point.clone();
            if point.terminal.is_none() {
                if let Some((terminal, _)) = terminals.iter().find(|(_, t)| *t == point.position) {
                    point.terminal = Some(terminal.clone());
                    changes += 1;
                    changed = true;
                }
            }
            out.push((*pid, point.clone()));

            let Some((_, next)) = entries.get(i + 1) else {
                continue;
            };
            let seg = Segment::new(point.position, next.position);
            let mut inserts: Vec<(Point, TerminalRef)> = terminals
                .iter()
                .filter(|(_, t)| seg.contains_interior(*t) && !existing.contains(t))
                .map(|(r, t)| (*t, r.clone()))
                .collect();
            inserts.sort_by_key(|(t, _)| seg.start.manhattan(t));
            inserts.dedup_by_key(|(t, _)| *t);

            for (position, terminal) in inserts {
                tracing::trace!("{} passes through {} at {}", wire_id, terminal, position);
                out.push((None, WirePoint::pinned(position, terminal)));
                changes += 1;
                changed = true;
            }
        }

        if changed {
            model.commit_wire(wire_id, out);
        }
    }

    changes
}

fn insert_junctions(model: &mut TopologyModel) -> usize {
    let wires: Vec<(WireId, Vec<Segment>)> = model
        .wire_ids()
        .into_iter()
        .filter_map(|id| model.segments(id).map(|s| (id, s)))
        .collect();

    let mut contacts: BTreeMap<WireId, BTreeSet<Point>> = BTreeMap::new();
    for (i, (a_id, a_segments)) in wires.iter().enumerate() {
        for (b_id, b_segments) in wires.iter().skip(i + 1) {
            for a in a_segments {
                for b in b_segments {
                    for p in contact_points(a, b) {
                        contacts.entry(*a_id).or_default().insert(p);
                        contacts.entry(*b_id).or_default().insert(p);
                    }
                }
            }
        }
    }

    let mut changes = 0;
    for (wire_id, points) in contacts {
        let Some(entries) = model.wire_entries(wire_id) else {
            continue;
        };
        let existing: HashSet<Point> = entries.iter().map(|(_, p)| p.position).collect();
        let mut out: Vec<PointEntry> = Vec::with_capacity(entries.len() + points.len());
        let mut changed = false;

        for (i, (pid, point)) in entries.iter().enumerate() {
            let mut point = point.clone();
            if points.contains(&point.position) && !point.junction {
                point.junction = true;
                changes += 1;
                changed = true;
            }
            let position = point.position;
            out.push((*pid, point));

            let Some((_, next)) = entries.get(i + 1) else {
                continue;
            };
            let seg = Segment::new(position, next.position);
            let mut inserts: Vec<Point> = points
                .iter()
                .copied()
                .filter(|p| seg.contains_interior(*p) && !existing.contains(p))
                .collect();
            inserts.sort_by_key(|p| seg.start.manhattan(p));
            inserts.dedup();

            for p in inserts {
                out.push((
                    None,
                    WirePoint {
                        position: p,
                        terminal: None,
                        junction: true,
                    },
                ));
                changes += 1;
                changed = true;
            }
        }

        if changed {
            model.commit_wire(wire_id, out);
        }
    }

    changes
}

/// Points where two segments of different wires meet: a perpendicular
/// crossing, or an endpoint of one lying on the other (collinear included).
fn contact_points(a: &Segment, b: &Segment) -> Vec<Point> {
    let mut found = Vec::new();
    if let Some(p) = a.crossing(b) {
        found.push(p);
    }
    for p in [b.start, b.end] {
        if a.contains(p) {
            found.push(p);
        }
    }
    for p in [a.start, a.end] {
        if b.contains(p) {
            found.push(p);
        }
    }
    found
}

/// Drop free points that are duplicates or sit collinear between their kept
/// neighbours. Kept points are re-checked whenever a later point lands next
/// to them, so a wire that doubles back collapses in one run.
fn simplify(model: &mut TopologyModel) -> usize {
    let touches = wire_touches(model);
    let terminals: HashSet<Point> = model.terminal_refs().into_iter().map(|(_, p)| p).collect();
    let mut removed = 0;

    for wire_id in model.wire_ids() {
        let Some(entries) = model.wire_entries(wire_id) else {
            continue;
        };
        let n = entries.len();
        if n <= 2 {
            continue;
        }

        let protected = |point: &WirePoint| {
            let shared = touches
                .get(&point.position)
                .map_or(false, |wires| wires.iter().any(|w| *w != wire_id));
            point.is_pinned() || point.junction || shared || terminals.contains(&point.position)
        };

        let mut out: Vec<PointEntry> = Vec::with_capacity(n);
        for entry in entries {
            let next = entry.1.position;
            // out[0] is the wire start and never popped
            while out.len() >= 2 {
                let top = &out[out.len() - 1].1;
                let prev = out[out.len() - 2].1.position;
                let redundant = top.position == prev
                    || top.position == next
                    || collinear(prev, top.position, next);
                if !redundant || protected(top) {
                    break;
                }
                out.pop();
                removed += 1;
            }
            out.push(entry);
        }

        if out.len() != n {
            model.commit_wire(wire_id, out);
        }
    }

    removed
}

fn collinear(a: Point, b: Point, c: Point) -> bool {
    (a.x == b.x && b.x == c.x) || (a.y == b.y && b.y == c.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{Component, ComponentKind};

    fn p(x: i64, y: i64) -> Point {
        Point::new(x, y)
    }

    fn geometry(model: &TopologyModel) -> BTreeSet<Vec<Point>> {
        model
            .wires()
            .map(|w| model.wire_positions(w.id).unwrap())
            .collect()
    }

    #[test]
    fn test_crossing_wires_get_junction() {
        let mut model = TopologyModel::new();
        let h = model.add_wire(&[p(0, 0), p(100, 0)]).unwrap();
        let v = model.add_wire(&[p(60, -60), p(60, 60)]).unwrap();

        let report = normalize(&mut model);
        assert_eq!(report.junctions, 2);

        for id in [h, v] {
            let points = model.wire_points(id).unwrap();
            let mid = points.iter().find(|pt| pt.position == p(60, 0)).unwrap();
            assert!(mid.junction);
        }
        assert_eq!(junction_dots(&model), vec![p(60, 0)]);
    }

    #[test]
    fn test_tee_touch_inserts_into_through_wire() {
        let mut model = TopologyModel::new();
        let through = model.add_wire(&[p(0, 0), p(100, 0)]).unwrap();
        let branch = model.add_wire(&[p(40, 0), p(40, 80)]).unwrap();
        normalize(&mut model);

        assert_eq!(
            model.wire_positions(through).unwrap(),
            vec![p(0, 0), p(40, 0), p(100, 0)]
        );
        assert!(model.wire_points(branch).unwrap()[0].junction);
    }

    #[test]
    fn test_pass_through_terminal_is_pinned() {
        let mut model = TopologyModel::new();
        // t1 (60, 0), t2 (140, 0)
        model
            .add_component(Component::new("R1", ComponentKind::Resistor, p(100, 0)))
            .unwrap();
        let id = model.add_wire(&[p(0, 0), p(100, 0)]).unwrap();
        let report = normalize(&mut model);
        assert_eq!(report.pinned, 1);

        let points = model.wire_points(id).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[1].position, p(60, 0));
        assert_eq!(points[1].terminal, Some(TerminalRef::new("R1", "t1")));
    }

    #[test]
    fn test_redundant_collinear_points_removed() {
        let mut model = TopologyModel::new();
        let id = model
            .add_wire(&[p(0, 0), p(20, 0), p(40, 0), p(40, 0), p(40, 60), p(40, 100)])
            .unwrap();
        let report = normalize(&mut model);
        assert_eq!(report.removed, 3);
        assert_eq!(
            model.wire_positions(id).unwrap(),
            vec![p(0, 0), p(40, 0), p(40, 100)]
        );
    }

    #[test]
    fn test_shared_point_survives_simplification() {
        let mut model = TopologyModel::new();
        let a = model.add_wire(&[p(0, 0), p(60, 0), p(120, 0)]).unwrap();
        model.add_wire(&[p(60, 0), p(60, 60)]).unwrap();
        normalize(&mut model);
        assert_eq!(
            model.wire_positions(a).unwrap(),
            vec![p(0, 0), p(60, 0), p(120, 0)]
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut model = TopologyModel::new();
        model
            .add_component(Component::new("R1", ComponentKind::Resistor, p(100, 0)))
            .unwrap();
        model.add_wire(&[p(0, 0), p(200, 0)]).unwrap();
        model.add_wire(&[p(20, -40), p(20, 40), p(80, 40)]).unwrap();
        model.add_wire(&[p(160, 0), p(160, 20), p(160, 80)]).unwrap();

        normalize(&mut model);
        let once = geometry(&model);
        let revision = model.revision();

        let report = normalize(&mut model);
        assert!(report.is_noop(), "second pass changed {:?}", report);
        assert_eq!(geometry(&model), once);
        assert_eq!(model.revision(), revision);
    }

    #[test]
    fn test_wire_doubling_back_collapses_in_one_pass() {
        let mut model = TopologyModel::new();
        let stub = model
            .add_wire(&[p(0, 0), p(0, 20), p(20, 20), p(0, 20)])
            .unwrap();
        let overshoot = model
            .add_wire(&[p(200, 0), p(300, 0), p(240, 0), p(240, 60)])
            .unwrap();

        let first = normalize(&mut model);
        assert_eq!(first.removed, 3);
        assert_eq!(model.wire_positions(stub).unwrap(), vec![p(0, 0), p(0, 20)]);
        assert_eq!(
            model.wire_positions(overshoot).unwrap(),
            vec![p(200, 0), p(240, 0), p(240, 60)]
        );

        let second = normalize(&mut model);
        assert!(second.is_noop(), "second pass changed {:?}", second);
    }

    #[test]
    fn test_wire_order_does_not_matter() {
        let wires = [
            vec![p(0, 0), p(100, 0)],
            vec![p(60, -60), p(60, 60)],
            vec![p(0, 20), p(100, 20)],
            vec![p(100, 0), p(100, 60)],
        ];

        let mut forward = TopologyModel::new();
        for w in &wires {
            forward.add_wire(w).unwrap();
        }
        let mut backward = TopologyModel::new();
        for w in wires.iter().rev() {
            backward.add_wire(w).unwrap();
        }

        normalize(&mut forward);
        normalize(&mut backward);
        assert_eq!(geometry(&forward), geometry(&backward));
        assert_eq!(junction_dots(&forward), junction_dots(&backward));
    }

    #[test]
    fn test_terminal_dot_needs_one_wire() {
        let mut model = TopologyModel::new();
        model
            .add_component(Component::new("C1", ComponentKind::Capacitor, p(100, 100)))
            .unwrap();
        assert!(junction_dots(&model).is_empty());
        model.add_wire(&[p(60, 100), p(0, 100)]).unwrap();
        normalize(&mut model);
        assert_eq!(junction_dots(&model), vec![p(60, 100)]);
    }
}
