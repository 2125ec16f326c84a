//! Topology Data Types
//!
//! Components, terminals, wire points and wires as they are stored in a
//! [`TopologyModel`](super::TopologyModel). Wire points live in an arena and
//! are referenced by [`PointId`], so "is this the same point" is an id
//! comparison and never an object-identity question.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use super::TopologyError;
use crate::geometry::{Point, Rect};

/// Reference designator of a component (e.g. `"R1"`, `"V1"`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(pub String);

impl ComponentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ComponentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ComponentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ComponentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a wire, unique for the lifetime of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireId(pub u64);

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "W{}", self.0)
    }
}

/// Synthetic identity of a wire point inside the point arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointId(pub u64);

/// Pointer from a wire point to the terminal it is pinned to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TerminalRef {
    pub component: ComponentId,
    pub terminal: String,
}

impl TerminalRef {
    pub fn new(component: impl Into<ComponentId>, terminal: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            terminal: terminal.into(),
        }
    }
}

impl fmt::Display for TerminalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.component, self.terminal)
    }
}

/// Quarter-turn orientation of a component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn from_quarter_turns(turns: i32) -> Self {
        match turns.rem_euclid(4) {
            0 => Rotation::Deg0,
            1 => Rotation::Deg90,
            2 => Rotation::Deg180,
            _ => Rotation::Deg270,
        }
    }

    pub fn from_degrees(degrees: i32) -> Result<Self, TopologyError> {
        if degrees % 90 != 0 {
            return Err(TopologyError::InvalidRotation(degrees));
        }
        Ok(Self::from_quarter_turns(degrees / 90))
    }

    pub fn quarter_turns(self) -> i32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 1,
            Rotation::Deg180 => 2,
            Rotation::Deg270 => 3,
        }
    }

    pub fn degrees(self) -> i32 {
        self.quarter_turns() * 90
    }

    pub fn rotated(self, turns: i32) -> Self {
        Self::from_quarter_turns(self.quarter_turns() + turns)
    }

    /// Rotate a local offset about the component origin.
    pub fn apply(self, offset: Point) -> Point {
        match self {
            Rotation::Deg0 => offset,
            Rotation::Deg90 => Point::new(-offset.y, offset.x),
            Rotation::Deg180 => Point::new(-offset.x, -offset.y),
            Rotation::Deg270 => Point::new(offset.y, -offset.x),
        }
    }

    fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

impl TryFrom<i32> for Rotation {
    type Error = TopologyError;

    fn try_from(degrees: i32) -> Result<Self, Self::Error> {
        Rotation::from_degrees(degrees)
    }
}

impl From<Rotation> for i32 {
    fn from(r: Rotation) -> i32 {
        r.degrees()
    }
}

/// Polarity of a bipolar transistor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BjtPolarity {
    Npn,
    Pnp,
}

fn default_diode_model() -> String {
    "DMOD".to_string()
}

/// Closed set of device kinds the sketcher can place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComponentKind {
    Resistor,
    Capacitor,
    Inductor,
    /// Terminal `t1` is negative, `t2` positive.
    DcSource,
    /// Terminal `t1` is negative, `t2` positive.
    AcSource {
        #[serde(default)]
        phase: f64,
    },
    /// `t1` anode, `t2` cathode.
    Diode {
        #[serde(default = "default_diode_model")]
        model: String,
    },
    Bjt {
        polarity: BjtPolarity,
        model: String,
    },
    /// Reference symbol; its single terminal is the ground node.
    Ground,
}

impl ComponentKind {
    pub fn name(&self) -> &'static str {
        match self {
            ComponentKind::Resistor => "resistor",
            ComponentKind::Capacitor => "capacitor",
            ComponentKind::Inductor => "inductor",
            ComponentKind::DcSource => "dc_source",
            ComponentKind::AcSource { .. } => "ac_source",
            ComponentKind::Diode { .. } => "diode",
            ComponentKind::Bjt { .. } => "bjt",
            ComponentKind::Ground => "ground",
        }
    }

    /// Terminal ids and local offsets (canvas pixels at the default grid).
    pub fn default_terminals(&self) -> Vec<(&'static str, Point)> {
        match self {
            ComponentKind::Bjt { .. } => vec![
                ("c", Point::new(0, -40)),
                ("b", Point::new(-40, 0)),
                ("e", Point::new(0, 40)),
            ],
            ComponentKind::Ground => vec![("t1", Point::new(0, 0))],
            _ => vec![("t1", Point::new(-40, 0)), ("t2", Point::new(40, 0))],
        }
    }

    /// Body half-extents in grid units, before rotation.
    pub fn half_extents(&self) -> (i64, i64) {
        match self {
            ComponentKind::Resistor | ComponentKind::Inductor => (2, 1),
            ComponentKind::Capacitor | ComponentKind::Diode { .. } => (1, 1),
            ComponentKind::DcSource | ComponentKind::AcSource { .. } => (2, 2),
            ComponentKind::Bjt { .. } => (1, 2),
            ComponentKind::Ground => (1, 1),
        }
    }

    pub fn default_value(&self) -> &'static str {
        match self {
            ComponentKind::Resistor => "1k",
            ComponentKind::Capacitor => "1u",
            ComponentKind::Inductor => "1m",
            ComponentKind::DcSource => "5",
            ComponentKind::AcSource { .. } => "1",
            _ => "",
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self, ComponentKind::DcSource | ComponentKind::AcSource { .. })
    }

    pub fn is_two_terminal(&self) -> bool {
        !matches!(self, ComponentKind::Bjt { .. } | ComponentKind::Ground)
    }

    /// Device line for this kind, given node names in terminal order.
    ///
    /// Sources are emitted positive node first, which is the reverse of
    /// their declaration order. `Ground` emits nothing.
    pub fn netlist_line(&self, id: &str, value: &str, nodes: &[String]) -> Option<String> {
        match (self, nodes) {
            (
                ComponentKind::Resistor | ComponentKind::Capacitor | ComponentKind::Inductor,
                [a, b, ..],
            ) => Some(format!("{} {} {} {}", id, a, b, value)),
            (ComponentKind::DcSource, [neg, pos, ..]) => {
                Some(format!("{} {} {} DC {}", id, pos, neg, value))
            }
            (ComponentKind::AcSource { phase }, [neg, pos, ..]) => {
                Some(format!("{} {} {} AC {} {}", id, pos, neg, value, phase))
            }
            (ComponentKind::Diode { model }, [anode, cathode, ..]) => {
                Some(format!("{} {} {} {}", id, anode, cathode, model))
            }
            (ComponentKind::Bjt { model, .. }, [c, b, e, ..]) => {
                Some(format!("{} {} {} {} {}", id, c, b, e, model))
            }
            _ => None,
        }
    }

    /// `.MODEL` card for semiconductor kinds.
    pub fn model_card(&self) -> Option<String> {
        match self {
            ComponentKind::Diode { model } => Some(format!(".MODEL {} D", model)),
            ComponentKind::Bjt { polarity, model } => {
                let kind = match polarity {
                    BjtPolarity::Npn => "NPN",
                    BjtPolarity::Pnp => "PNP",
                };
                Some(format!(".MODEL {} {}", model, kind))
            }
            _ => None,
        }
    }
}

/// A pin of a component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Terminal {
    pub id: String,
    /// Offset from the component origin before rotation
    pub offset: Point,
    /// Live absolute position
    pub position: Point,
}

/// A placed device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub kind: ComponentKind,
    position: Point,
    rotation: Rotation,
    pub value: String,
    terminals: Vec<Terminal>,
}

impl Component {
    /// Create a component with the default terminal layout of its kind.
    pub fn new(id: impl Into<ComponentId>, kind: ComponentKind, position: Point) -> Self {
        let terminals = kind
            .default_terminals()
            .into_iter()
            .map(|(id, offset)| Terminal {
                id: id.to_string(),
                offset,
                position: position + offset,
            })
            .collect();
        let value = kind.default_value().to_string();
        Self {
            id: id.into(),
            kind,
            position,
            rotation: Rotation::Deg0,
            value,
            terminals,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self.refresh_terminals();
        self
    }

    /// Replace the local terminal offsets, keeping the kind's terminal ids.
    pub fn with_offsets(mut self, offsets: &[Point]) -> Result<Self, TopologyError> {
        if offsets.len() != self.terminals.len() {
            return Err(TopologyError::InvalidComponent(format!(
                "{} expects {} terminal offsets, got {}",
                self.id,
                self.terminals.len(),
                offsets.len()
            )));
        }
        for (terminal, offset) in self.terminals.iter_mut().zip(offsets) {
            terminal.offset = *offset;
        }
        self.refresh_terminals();
        Ok(self)
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn terminals(&self) -> &[Terminal] {
        &self.terminals
    }

    pub fn terminal(&self, id: &str) -> Option<&Terminal> {
        self.terminals.iter().find(|t| t.id == id)
    }

    /// Body rectangle used for route collision tests.
    pub fn footprint(&self, grid: i64) -> Rect {
        let (w, h) = self.kind.half_extents();
        let (w, h) = if self.rotation.swaps_axes() { (h, w) } else { (w, h) };
        Rect::around(self.position, w * grid, h * grid)
    }

    pub(crate) fn set_position(&mut self, position: Point) {
        self.position = position;
        self.refresh_terminals();
    }

    /// Round the origin and every terminal offset onto the grid.
    pub(crate) fn snap_to_grid(&mut self, grid: i64) {
        self.position = self.position.snap_to(grid);
        for terminal in &mut self.terminals {
            terminal.offset = terminal.offset.snap_to(grid);
        }
        self.refresh_terminals();
    }

    pub(crate) fn set_rotation(&mut self, rotation: Rotation) {
        self.rotation = rotation;
        self.refresh_terminals();
    }

    fn refresh_terminals(&mut self) {
        for terminal in &mut self.terminals {
            terminal.position = self.position + self.rotation.apply(terminal.offset);
        }
    }
}

/// A vertex of a wire polyline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePoint {
    pub position: Point,
    /// Terminal this point is pinned to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal: Option<TerminalRef>,
    /// Deliberate branch point; survives simplification
    #[serde(default)]
    pub junction: bool,
}

impl WirePoint {
    pub fn free(position: Point) -> Self {
        Self {
            position,
            terminal: None,
            junction: false,
        }
    }

    pub fn pinned(position: Point, terminal: TerminalRef) -> Self {
        Self {
            position,
            terminal: Some(terminal),
            junction: false,
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.terminal.is_some()
    }
}

/// An orthogonal polyline, stored as ids into the point arena
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wire {
    pub id: WireId,
    pub points: Vec<PointId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_apply() {
        let offset = Point::new(40, 0);
        assert_eq!(Rotation::Deg0.apply(offset), Point::new(40, 0));
        assert_eq!(Rotation::Deg90.apply(offset), Point::new(0, 40));
        assert_eq!(Rotation::Deg180.apply(offset), Point::new(-40, 0));
        assert_eq!(Rotation::Deg270.apply(offset), Point::new(0, -40));
    }

    #[test]
    fn test_rotation_from_degrees() {
        assert_eq!(Rotation::from_degrees(-90).unwrap(), Rotation::Deg270);
        assert_eq!(Rotation::from_degrees(450).unwrap(), Rotation::Deg90);
        assert!(Rotation::from_degrees(45).is_err());
        assert_eq!(Rotation::Deg270.rotated(1), Rotation::Deg0);
    }

    #[test]
    fn test_component_terminals_follow_rotation() {
        let r = Component::new("R1", ComponentKind::Resistor, Point::new(100, 100))
            .with_rotation(Rotation::Deg90);
        assert_eq!(r.terminal("t1").unwrap().position, Point::new(100, 60));
        assert_eq!(r.terminal("t2").unwrap().position, Point::new(100, 140));
    }

    #[test]
    fn test_with_offsets_rejects_wrong_count() {
        let result = Component::new("R1", ComponentKind::Resistor, Point::new(0, 0))
            .with_offsets(&[Point::new(0, 0)]);
        assert!(matches!(result, Err(TopologyError::InvalidComponent(_))));
    }

    #[test]
    fn test_footprint_swaps_on_quarter_turn() {
        let r = Component::new("R1", ComponentKind::Resistor, Point::new(0, 0));
        assert_eq!(r.footprint(20).width(), 80);
        let r = r.with_rotation(Rotation::Deg90);
        assert_eq!(r.footprint(20).width(), 40);
        assert_eq!(r.footprint(20).height(), 80);
    }

    #[test]
    fn test_netlist_line_source_polarity() {
        let nodes = vec!["0".to_string(), "N2".to_string()];
        assert_eq!(
            ComponentKind::DcSource.netlist_line("V1", "12", &nodes).unwrap(),
            "V1 N2 0 DC 12"
        );
        assert_eq!(
            ComponentKind::AcSource { phase: 0.0 }
                .netlist_line("V2", "1", &nodes)
                .unwrap(),
            "V2 N2 0 AC 1 0"
        );
        assert_eq!(
            ComponentKind::Resistor.netlist_line("R1", "1000", &nodes).unwrap(),
            "R1 0 N2 1000"
        );
        assert!(ComponentKind::Ground.netlist_line("GND1", "", &nodes).is_none());
    }

    #[test]
    fn test_kind_serde_tagged() {
        let kind: ComponentKind =
            serde_json::from_str(r#"{"type":"ac_source","phase":90}"#).unwrap();
        assert_eq!(kind, ComponentKind::AcSource { phase: 90.0 });
        let kind: ComponentKind = serde_json::from_str(r#"{"type":"diode"}"#).unwrap();
        assert_eq!(kind, ComponentKind::Diode { model: "DMOD".to_string() });
    }
}
