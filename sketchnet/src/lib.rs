//! Sketchnet - wire topology and connectivity engine for circuit sketches
//!
//! Keeps orthogonal polyline wires consistent while components move and
//! wires are edited, then collapses the drawing into electrical nodes and a
//! SPICE-style netlist.
//!
//! # Quick Start
//!
//! ```no_run
//! use sketchnet::{NetlistOptions, SketchnetCore};
//! use std::path::Path;
//!
//! let result = SketchnetCore::netlist_file(
//!     Path::new("divider.sketch.json"),
//!     NetlistOptions::default(),
//! ).unwrap();
//!
//! print!("{}", result.deck);
//! for issue in &result.issues {
//!     println!("{:?}: {}", issue.severity, issue.message);
//! }
//! ```
//!
//! # Pipeline
//!
//! - **Topology model**: components, wires and a shared point arena
//! - **Normalize**: junction insertion and redundant point removal
//! - **Netlist**: union-find node resolution and device lines
//! - **Simulation**: async solver boundary with stale-result detection

pub mod config;
pub mod core;
pub mod document;
pub mod geometry;
pub mod netlist;
pub mod normalize;
pub mod routing;
pub mod rules;
pub mod simulation;
pub mod snap;
pub mod topology;

// Re-export main types
pub use crate::core::{
    discover_sketch_files, CheckStats, JunctionReport, LoadedSketch, NetlistOptions,
    NetlistResult, SketchnetCore, SketchnetError,
};
pub use config::SketchConfig;
pub use document::SketchDocument;
pub use geometry::{Point, Rect, Segment};
pub use netlist::{GroundReference, Netlist, NetlistBuilder, Resolution};
pub use normalize::{junction_dots, normalize, NormalizeReport};
pub use routing::{DragAxisTracker, PreferredAxis};
pub use rules::{Issue, RulesEngine, Severity};
pub use simulation::{ControlCard, HttpSolver, SimulationRequest, Solver};
pub use snap::{snap_candidate, snap_candidate_with_config, SnapCandidate, SnapKind};
pub use topology::{Component, ComponentKind, TerminalRef, TopologyModel, WireId};

/// Load a sketch document into a normalized model (convenience wrapper).
pub fn load_sketch(path: &std::path::Path) -> Result<TopologyModel, SketchnetError> {
    SketchnetCore::load(path).map(|s| s.model)
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        Component, ComponentKind, ControlCard, Issue, NetlistBuilder, NetlistOptions,
        NetlistResult, Point, Severity, SketchnetCore, SketchnetError, TopologyModel,
    };
}
