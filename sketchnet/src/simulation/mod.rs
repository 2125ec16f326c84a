//! Simulation boundary
//!
//! The numeric solver is external and asynchronous. A request snapshots the
//! model revision together with the deck and terminal map; when the result
//! comes back it is only applied if the model has not been edited since.

pub mod http;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::netlist::{is_unconnected_node, Netlist, NetlistBuilder, ResolveError, GROUND_NODE};
use crate::normalize::normalize;
use crate::topology::TopologyModel;

pub use http::HttpSolver;

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("Solver request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Solver error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Failed to parse solver response: {0}")]
    ParseError(String),
    /// Electrical failure reported by the solver (no DC path, singular matrix, ...)
    #[error("Simulation failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("{source}")]
    Solver {
        #[source]
        source: SolverError,
        /// Deck that was submitted, kept for diagnosis
        deck: String,
    },
    #[error("Result is for revision {prepared}, model is at revision {current}")]
    Stale { prepared: u64, current: u64 },
    #[error("Solver returned no operating point")]
    NoOperatingPoint,
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl SimulationError {
    /// The deck attached to a solver failure.
    pub fn deck(&self) -> Option<&str> {
        match self {
            SimulationError::Solver { deck, .. } => Some(deck),
            _ => None,
        }
    }
}

/// Analysis directive appended after the device lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "analysis", rename_all = "lowercase")]
pub enum ControlCard {
    Op,
    /// Decade sweep
    Ac { points: u32, start: f64, stop: f64 },
    Tran { step: f64, stop: f64 },
}

impl fmt::Display for ControlCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlCard::Op => write!(f, ".OP"),
            ControlCard::Ac { points, start, stop } => {
                write!(f, ".AC DEC {} {} {}", points, start, stop)
            }
            ControlCard::Tran { step, stop } => write!(f, ".TRAN {} {}", step, stop),
        }
    }
}

/// Full solver input: netlist, blank line, control cards, `.END`.
pub fn render_deck(netlist: &Netlist, cards: &[ControlCard]) -> String {
    let mut deck = netlist.to_text();
    deck.push('\n');
    for card in cards {
        deck.push_str(&card.to_string());
        deck.push('\n');
    }
    deck.push_str(".END\n");
    deck
}

/// DC operating point
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatingPoint {
    pub voltages: IndexMap<String, f64>,
}

/// Solver response; analyses other than `op` are passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolveResult {
    #[serde(default)]
    pub op: Option<OperatingPoint>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

#[async_trait]
pub trait Solver: Send + Sync {
    fn name(&self) -> &str;

    async fn solve(&self, deck: &str) -> Result<SolveResult, SolverError>;
}

/// Snapshot of everything needed to submit and later apply a solve
#[derive(Debug, Clone)]
pub struct SimulationRequest {
    revision: u64,
    deck: String,
    terminal_to_node: IndexMap<String, String>,
}

impl SimulationRequest {
    /// Normalize the model, then snapshot its revision, deck and terminal map.
    ///
    /// Normalizing first means the revision recorded here is the one the
    /// result will be checked against; an edit made after this call makes
    /// the result stale.
    pub fn prepare(
        model: &mut TopologyModel,
        cards: &[ControlCard],
    ) -> Result<Self, SimulationError> {
        normalize(model);
        let resolution = NetlistBuilder::resolve(model)?;
        Ok(Self {
            revision: model.revision(),
            deck: render_deck(&resolution.netlist, cards),
            terminal_to_node: resolution.terminal_to_node,
        })
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn deck(&self) -> &str {
        &self.deck
    }

    /// Submit once. Failures are not retried; the deck travels with the error.
    pub async fn submit<S>(self, solver: &S) -> Result<SimulationOutcome, SimulationError>
    where
        S: Solver + ?Sized,
    {
        tracing::info!(
            "Submitting revision {} to solver {}",
            self.revision,
            solver.name()
        );
        match solver.solve(&self.deck).await {
            Ok(result) => Ok(SimulationOutcome {
                revision: self.revision,
                terminal_to_node: self.terminal_to_node,
                result,
            }),
            Err(source) => {
                tracing::warn!("Solver {} failed: {}", solver.name(), source);
                Err(SimulationError::Solver {
                    source,
                    deck: self.deck,
                })
            }
        }
    }
}

/// Solver result tied to the revision it was computed for
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    revision: u64,
    terminal_to_node: IndexMap<String, String>,
    result: SolveResult,
}

impl SimulationOutcome {
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn result(&self) -> &SolveResult {
        &self.result
    }

    /// Operating-point voltage per terminal (`"R1.t1"`), if the model is
    /// still at the revision the deck was generated from. Unconnected
    /// terminals are left out.
    pub fn apply(&self, model: &TopologyModel) -> Result<IndexMap<String, f64>, SimulationError> {
        if model.revision() != self.revision {
            tracing::debug!(
                "Discarding stale solve for revision {} (model at {})",
                self.revision,
                model.revision()
            );
            return Err(SimulationError::Stale {
                prepared: self.revision,
                current: model.revision(),
            });
        }
        let op = self
            .result
            .op
            .as_ref()
            .ok_or(SimulationError::NoOperatingPoint)?;

        let mut voltages = IndexMap::new();
        for (terminal, node) in &self.terminal_to_node {
            if is_unconnected_node(node) {
                continue;
            }
            if let Some(v) = node_voltage(op, node) {
                voltages.insert(terminal.clone(), v);
            }
        }
        Ok(voltages)
    }
}

/// Solvers may fold node names to lower case; ground is 0 V when omitted.
fn node_voltage(op: &OperatingPoint, node: &str) -> Option<f64> {
    op.voltages
        .get(node)
        .or_else(|| {
            op.voltages
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(node))
                .map(|(_, v)| v)
        })
        .copied()
        .or_else(|| (node == GROUND_NODE).then_some(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlist::DeviceLine;
    use crate::topology::ComponentId;

    #[test]
    fn test_control_cards() {
        assert_eq!(ControlCard::Op.to_string(), ".OP");
        assert_eq!(
            ControlCard::Ac {
                points: 10,
                start: 10.0,
                stop: 10000.0
            }
            .to_string(),
            ".AC DEC 10 10 10000"
        );
        assert_eq!(
            ControlCard::Tran {
                step: 0.001,
                stop: 0.1
            }
            .to_string(),
            ".TRAN 0.001 0.1"
        );
    }

    #[test]
    fn test_render_deck() {
        let netlist = Netlist {
            title: "rc".to_string(),
            lines: vec![DeviceLine {
                component: ComponentId::from("R1"),
                text: "R1 N1 0 1k".to_string(),
            }],
            models: vec![],
        };
        assert_eq!(
            render_deck(&netlist, &[ControlCard::Op]),
            "* rc\nR1 N1 0 1k\n\n.OP\n.END\n"
        );
    }

    #[test]
    fn test_node_voltage_lookup() {
        let op: OperatingPoint =
            serde_json::from_str(r#"{"voltages": {"n2": 6.0, "N3": 1.5}}"#).unwrap();
        assert_eq!(node_voltage(&op, "N2"), Some(6.0));
        assert_eq!(node_voltage(&op, "N3"), Some(1.5));
        assert_eq!(node_voltage(&op, "0"), Some(0.0));
        assert_eq!(node_voltage(&op, "N9"), None);
    }

    #[test]
    fn test_solve_result_keeps_other_analyses() {
        let result: SolveResult =
            serde_json::from_str(r#"{"op": {"voltages": {"N1": 5.0}}, "ac": {"points": 3}}"#)
                .unwrap();
        assert_eq!(result.op.unwrap().voltages["N1"], 5.0);
        assert!(result.other.contains_key("ac"));
    }
}
