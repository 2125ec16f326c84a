//! Connectivity rules over a resolved sketch
//!
//! Each [`Rule`] inspects the model and its [`Resolution`] and reports [`Issue`]s.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::geometry::Point;
use crate::netlist::{is_unconnected_node, GroundReference, Resolution};
use crate::normalize::wire_touches;
use crate::topology::TopologyModel;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Suggestion,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Suggestion => "suggestion",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    pub component: Option<String>,
    pub location: Option<Point>,
    pub suggestion: Option<String>,
}

impl Issue {
    fn new(rule: &dyn Rule, severity: Severity, message: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            rule_id: rule.id().to_string(),
            severity,
            message,
            component: None,
            location: None,
            suggestion: None,
        }
    }

    fn on(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    fn at(mut self, location: Point) -> Self {
        self.location = Some(location);
        self
    }

    fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

pub trait Rule: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn severity(&self) -> Severity;
    fn check(&self, model: &TopologyModel, resolution: &Resolution) -> Vec<Issue>;
}

pub struct RulesEngine {
    rules: Vec<Arc<dyn Rule>>,
}

impl RulesEngine {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_default_rules() -> Self {
        let mut engine = Self::new();
        engine.add_rule(Arc::new(UnconnectedTerminalRule));
        engine.add_rule(Arc::new(GroundReferenceRule));
        engine.add_rule(Arc::new(ShortedComponentRule));
        engine.add_rule(Arc::new(DanglingWireRule));
        engine
    }

    pub fn add_rule(&mut self, rule: Arc<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    pub fn analyze(&self, model: &TopologyModel, resolution: &Resolution) -> Vec<Issue> {
        let mut issues = Vec::new();
        for rule in &self.rules {
            let found = rule.check(model, resolution);
            tracing::debug!("Rule {} produced {} issues", rule.id(), found.len());
            issues.extend(found);
        }
        issues
    }

    /// Run only the rules whose ids are listed; an empty filter runs all.
    pub fn analyze_only(
        &self,
        model: &TopologyModel,
        resolution: &Resolution,
        only: &[String],
    ) -> Vec<Issue> {
        if only.is_empty() {
            return self.analyze(model, resolution);
        }
        self.rules
            .iter()
            .filter(|r| only.iter().any(|id| id == r.id()))
            .flat_map(|r| r.check(model, resolution))
            .collect()
    }
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

// Rule implementations

pub struct UnconnectedTerminalRule;

impl Rule for UnconnectedTerminalRule {
    fn id(&self) -> &str {
        "unconnected_terminal"
    }

    fn name(&self) -> &str {
        "Unconnected Terminal Check"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, model: &TopologyModel, resolution: &Resolution) -> Vec<Issue> {
        resolution
            .unconnected
            .iter()
            .map(|terminal| {
                let mut issue = Issue::new(
                    self,
                    self.severity(),
                    format!("Terminal {} is not connected to anything", terminal),
                )
                .on(terminal.component.as_str())
                .suggest(format!(
                    "Draw a wire to {} or remove {}",
                    terminal, terminal.component
                ));
                if let Some(position) = model.terminal_position(terminal) {
                    issue = issue.at(position);
                }
                issue
            })
            .collect()
    }
}

pub struct GroundReferenceRule;

impl Rule for GroundReferenceRule {
    fn id(&self) -> &str {
        "ground_reference"
    }

    fn name(&self) -> &str {
        "Ground Reference Check"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, model: &TopologyModel, resolution: &Resolution) -> Vec<Issue> {
        if model.component_count() == 0 {
            return Vec::new();
        }
        match &resolution.ground {
            GroundReference::Unreferenced => vec![Issue::new(
                self,
                Severity::Warning,
                "Circuit has no ground reference; node 0 is missing".to_string(),
            )
            .suggest("Place a ground symbol or a DC source")],
            GroundReference::Source { component } => vec![Issue::new(
                self,
                Severity::Info,
                format!("Node 0 is the negative terminal of {}", component),
            )
            .on(component.as_str())
            .suggest("Place a ground symbol to choose the reference explicitly")],
            GroundReference::Symbol { .. } => Vec::new(),
        }
    }
}

pub struct ShortedComponentRule;

impl Rule for ShortedComponentRule {
    fn id(&self) -> &str {
        "shorted_component"
    }

    fn name(&self) -> &str {
        "Shorted Component Check"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, model: &TopologyModel, resolution: &Resolution) -> Vec<Issue> {
        let mut issues = Vec::new();
        for component in model.components().filter(|c| c.kind.is_two_terminal()) {
            let nodes: Vec<&str> = component
                .terminals()
                .iter()
                .filter_map(|t| {
                    resolution
                        .terminal_to_node
                        .get(&format!("{}.{}", component.id, t.id))
                        .map(String::as_str)
                })
                .collect();
            if let [a, b] = nodes.as_slice() {
                if a == b && !is_unconnected_node(a) {
                    issues.push(
                        Issue::new(
                            self,
                            self.severity(),
                            format!("{} has both terminals on node {}", component.id, a),
                        )
                        .on(component.id.as_str())
                        .at(component.position())
                        .suggest("Check for a wire bridging the component"),
                    );
                }
            }
        }
        issues
    }
}

pub struct DanglingWireRule;

impl Rule for DanglingWireRule {
    fn id(&self) -> &str {
        "dangling_wire"
    }

    fn name(&self) -> &str {
        "Dangling Wire Check"
    }

    fn severity(&self) -> Severity {
        Severity::Info
    }

    fn check(&self, model: &TopologyModel, _resolution: &Resolution) -> Vec<Issue> {
        let touches = wire_touches(model);
        let terminals: HashSet<Point> = model.terminal_refs().into_iter().map(|(_, p)| p).collect();
        let mut issues = Vec::new();

        for wire in model.wires() {
            let Some(positions) = model.wire_positions(wire.id) else {
                continue;
            };
            let ends = [positions.first(), positions.last()];
            for end in ends.into_iter().flatten() {
                let shared = touches.get(end).map_or(0, |w| w.len()) > 1;
                if !shared && !terminals.contains(end) {
                    issues.push(
                        Issue::new(
                            self,
                            self.severity(),
                            format!("Wire {} ends at {} without a connection", wire.id, end),
                        )
                        .at(*end)
                        .suggest("Extend the wire to a terminal or delete it"),
                    );
                }
            }
        }
        issues
    }
}
