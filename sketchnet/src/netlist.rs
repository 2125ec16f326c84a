//! Connectivity Resolver (Netlist Synthesizer)
//!
//! Collapses a normalized sketch into electrical nodes and device lines.
//! Every terminal position and wire point is registered under its grid
//! coordinate; consecutive wire points are unioned, so coincident points of
//! different wires and terminals share a node without any tolerance games.
//!
//! Registration order is terminals (component order, then terminal order)
//! followed by wire points, and node names are handed out in that order,
//! so the same sketch always yields the same netlist text.

use indexmap::{IndexMap, IndexSet};
use petgraph::unionfind::UnionFind;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::geometry::Point;
use crate::topology::{ComponentId, ComponentKind, TerminalRef, TopologyModel};

/// Name of the reference node
pub const GROUND_NODE: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// A wire point is pinned to a component that is not in the model.
    #[error("Wire point pinned to {terminal}, but component {} does not exist", terminal.component)]
    MissingComponent { terminal: TerminalRef },
}

/// How the reference node was chosen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroundReference {
    /// Ground symbols placed in the sketch; all of them form node `0`.
    Symbol { components: Vec<ComponentId> },
    /// Negative terminal of the first DC source.
    Source { component: ComponentId },
    /// No ground symbol and no DC source: node `0` does not exist.
    Unreferenced,
}

/// One device line of the netlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceLine {
    pub component: ComponentId,
    pub text: String,
}

/// Device section of a netlist (no control cards)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Netlist {
    pub title: String,
    pub lines: Vec<DeviceLine>,
    /// Distinct `.MODEL` cards for diodes and transistors
    pub models: Vec<String>,
}

impl Netlist {
    /// Title comment, one line per device, then model cards.
    pub fn to_text(&self) -> String {
        let mut text = format!("* {}\n", self.title);
        for line in self.lines.iter().map(|l| &l.text).chain(&self.models) {
            text.push_str(line);
            text.push('\n');
        }
        text
    }

    pub fn line_for(&self, component: &str) -> Option<&str> {
        self.lines
            .iter()
            .find(|l| l.component.as_str() == component)
            .map(|l| l.text.as_str())
    }
}

/// Output of connectivity resolution
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub netlist: Netlist,
    /// `"R1.t1"` -> node name, in terminal registration order
    pub terminal_to_node: IndexMap<String, String>,
    pub ground: GroundReference,
    /// Distinct electrical nodes, ground included, sentinels excluded
    pub node_count: usize,
    /// Terminals that touch no wire and no other terminal
    pub unconnected: Vec<TerminalRef>,
    #[serde(skip)]
    position_to_node: HashMap<Point, String>,
}

impl Resolution {
    pub fn node_for(&self, terminal: &TerminalRef) -> Option<&str> {
        self.terminal_to_node
            .get(&terminal.to_string())
            .map(String::as_str)
    }

    /// Node of a wire point or wired terminal coordinate.
    pub fn node_at(&self, p: Point) -> Option<&str> {
        self.position_to_node.get(&p).map(String::as_str)
    }

    /// Distinct node names in first-seen terminal order.
    pub fn node_names(&self) -> Vec<&str> {
        let mut seen = IndexSet::new();
        for name in self.terminal_to_node.values() {
            if !is_unconnected_node(name) {
                seen.insert(name.as_str());
            }
        }
        seen.into_iter().collect()
    }

    pub fn has_ground(&self) -> bool {
        !matches!(self.ground, GroundReference::Unreferenced)
    }
}

/// Sentinel node name for a terminal that resolved to no node.
pub fn unconnected_node(terminal: &TerminalRef) -> String {
    format!("{}_{}_unconnected", terminal.component, terminal.terminal)
}

pub fn is_unconnected_node(name: &str) -> bool {
    name.ends_with("_unconnected")
}

/// Builds nodes and device lines from a topology model
pub struct NetlistBuilder;

impl NetlistBuilder {
    pub const DEFAULT_TITLE: &'static str = "sketchnet circuit";

    pub fn resolve(model: &TopologyModel) -> Result<Resolution, ResolveError> {
        Self::resolve_with_title(model, Self::DEFAULT_TITLE)
    }

    /// Resolve nodes for a normalized model.
    ///
    /// Read-only over the model; fails only for pins referencing a
    /// component that no longer exists.
    pub fn resolve_with_title(
        model: &TopologyModel,
        title: &str,
    ) -> Result<Resolution, ResolveError> {
        Self::check_pins(model)?;

        let terminals = model.terminal_refs();
        let wires: Vec<Vec<Point>> = model.wires().map(|w| model.positions_of(w)).collect();

        // Step 1: register coordinates, terminals first
        let mut keys: IndexSet<Point> = IndexSet::new();
        for (_, position) in &terminals {
            keys.insert(*position);
        }
        for positions in &wires {
            keys.extend(positions.iter().copied());
        }

        // Step 2: union along wires
        let mut sets: UnionFind<usize> = UnionFind::new(keys.len());
        for positions in &wires {
            for w in positions.windows(2) {
                if let (Some(a), Some(b)) = (keys.get_index_of(&w[0]), keys.get_index_of(&w[1])) {
                    sets.union(a, b);
                }
            }
        }

        let ground_symbols: Vec<&(TerminalRef, Point)> = terminals
            .iter()
            .filter(|(t, _)| {
                model
                    .component(t.component.as_str())
                    .map_or(false, |c| c.kind == ComponentKind::Ground)
            })
            .collect();
        let ground_indices: Vec<usize> = ground_symbols
            .iter()
            .filter_map(|(_, p)| keys.get_index_of(p))
            .collect();
        for pair in ground_indices.windows(2) {
            sets.union(pair[0], pair[1]);
        }

        // Terminals alone at their coordinate with no wire there are floating
        let wired: HashSet<Point> = wires.iter().flatten().copied().collect();
        let mut terminals_at: HashMap<Point, usize> = HashMap::new();
        for (_, position) in &terminals {
            *terminals_at.entry(*position).or_default() += 1;
        }
        let is_floating = |p: &Point| !wired.contains(p) && terminals_at.get(p).copied() == Some(1);

        // Step 3: name roots in discovery order
        let mut root_names: HashMap<usize, String> = HashMap::new();
        let mut next_node = 1;
        for (index, position) in keys.iter().enumerate() {
            if is_floating(position) && !ground_indices.contains(&index) {
                continue;
            }
            let root = sets.find_mut(index);
            root_names.entry(root).or_insert_with(|| {
                let name = format!("N{}", next_node);
                next_node += 1;
                name
            });
        }

        // Step 4: ground selection
        let (ground, ground_index) = Self::select_ground(model, &terminals, &ground_symbols, &keys);
        if let Some(index) = ground_index {
            let root = sets.find_mut(index);
            root_names.insert(root, GROUND_NODE.to_string());
        }
        if ground == GroundReference::Unreferenced && !terminals.is_empty() {
            tracing::warn!("No ground symbol or DC source; netlist has no node 0");
        }

        let mut position_to_node = HashMap::new();
        for (index, position) in keys.iter().enumerate() {
            if let Some(name) = root_names.get(&sets.find_mut(index)) {
                position_to_node.insert(*position, name.clone());
            }
        }

        let mut terminal_to_node = IndexMap::new();
        let mut unconnected = Vec::new();
        for (terminal, position) in &terminals {
            if is_floating(position) {
                unconnected.push(terminal.clone());
            }
            let name = position_to_node
                .get(position)
                .cloned()
                .unwrap_or_else(|| unconnected_node(terminal));
            terminal_to_node.insert(terminal.to_string(), name);
        }

        // Step 5: device lines
        let mut lines = Vec::new();
        let mut models = IndexSet::new();
        for component in model.components() {
            if let Some(card) = component.kind.model_card() {
                models.insert(card);
            }
            let nodes: Vec<String> = component
                .terminals()
                .iter()
                .map(|t| {
                    let key = format!("{}.{}", component.id, t.id);
                    terminal_to_node.get(&key).cloned().unwrap_or_else(|| {
                        unconnected_node(&TerminalRef::new(component.id.clone(), t.id.clone()))
                    })
                })
                .collect();
            if let Some(text) = component
                .kind
                .netlist_line(component.id.as_str(), &component.value, &nodes)
            {
                lines.push(DeviceLine {
                    component: component.id.clone(),
                    text,
                });
            }
        }

        let node_count = root_names.values().collect::<HashSet<_>>().len();
        tracing::debug!(
            "Resolved {} nodes for {} components ({} unconnected terminals)",
            node_count,
            model.component_count(),
            unconnected.len()
        );

        Ok(Resolution {
            netlist: Netlist {
                title: title.to_string(),
                lines,
                models: models.into_iter().collect(),
            },
            terminal_to_node,
            ground,
            node_count,
            unconnected,
            position_to_node,
        })
    }

    fn check_pins(model: &TopologyModel) -> Result<(), ResolveError> {
        for wire in model.wires() {
            for point in model.wire_points(wire.id).unwrap_or_default() {
                if let Some(terminal) = &point.terminal {
                    if model.component(terminal.component.as_str()).is_none() {
                        return Err(ResolveError::MissingComponent {
                            terminal: terminal.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn select_ground(
        model: &TopologyModel,
        terminals: &[(TerminalRef, Point)],
        ground_symbols: &[&(TerminalRef, Point)],
        keys: &IndexSet<Point>,
    ) -> (GroundReference, Option<usize>) {
        if let Some((_, position)) = ground_symbols.first() {
            let components = ground_symbols
                .iter()
                .map(|(t, _)| t.component.clone())
                .collect();
            return (
                GroundReference::Symbol { components },
                keys.get_index_of(position),
            );
        }

        let source = model
            .components()
            .find(|c| c.kind == ComponentKind::DcSource);
        if let Some(source) = source {
            // t1 is the declared negative terminal
            let negative = source.terminals().first().map(|t| t.id.clone());
            let index = negative.and_then(|id| {
                terminals
                    .iter()
                    .find(|(t, _)| t.component == source.id && t.terminal == id)
                    .and_then(|(_, p)| keys.get_index_of(p))
            });
            return (
                GroundReference::Source {
                    component: source.id.clone(),
                },
                index,
            );
        }

        (GroundReference::Unreferenced, None)
    }
}
