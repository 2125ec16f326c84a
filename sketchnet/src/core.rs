//! Core API shared by the CLI and embedding applications.
//! Loads sketch documents, normalizes them and produces netlists and issues.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::SketchConfig;
use crate::document::{DocumentError, SketchDocument};
use crate::geometry::Point;
use crate::netlist::{NetlistBuilder, Resolution, ResolveError};
use crate::normalize::{junction_dots, normalize, NormalizeReport};
use crate::routing::DragAxisTracker;
use crate::rules::{Issue, RulesEngine, Severity};
use crate::simulation::{render_deck, ControlCard};
use crate::snap::{snap_candidate_with_config, SnapCandidate};
use crate::topology::{TopologyError, TopologyModel};

/// File suffix picked up by directory discovery
pub const SKETCH_SUFFIX: &str = ".sketch.json";

#[derive(Debug, thiserror::Error)]
pub enum SketchnetError {
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),
    #[error("Netlist error: {0}")]
    Resolve(#[from] ResolveError),
    #[error("{0}")]
    Other(String),
}

impl From<DocumentError> for SketchnetError {
    fn from(e: DocumentError) -> Self {
        match e {
            DocumentError::Io(e) => SketchnetError::Io(e),
            DocumentError::Wire { index, source } => {
                tracing::warn!("Rejected wire {} while loading sketch", index);
                SketchnetError::Topology(source)
            }
            DocumentError::Component { id, source } => {
                tracing::warn!("Rejected component {} while loading sketch", id);
                SketchnetError::Topology(source)
            }
            other => SketchnetError::Parse(other.to_string()),
        }
    }
}

/// Options for netlist and check runs.
#[derive(Clone, Debug)]
pub struct NetlistOptions {
    /// Control cards appended to the deck
    pub analyses: Vec<ControlCard>,
    pub run_rules: bool,
    /// Rule ids to run; empty runs every rule
    pub rules: Vec<String>,
    /// Overrides the document/config title
    pub title: Option<String>,
}

impl Default for NetlistOptions {
    fn default() -> Self {
        Self {
            analyses: vec![],
            run_rules: true,
            rules: vec![],
            title: None,
        }
    }
}

/// A document loaded into a normalized model.
#[derive(Debug, Clone)]
pub struct LoadedSketch {
    pub document: SketchDocument,
    pub config: SketchConfig,
    pub model: TopologyModel,
    pub normalized: NormalizeReport,
}

impl LoadedSketch {
    /// Snap a pointer position using the sketch's configured pick radius.
    pub fn snap(&self, x: f64, y: f64) -> SnapCandidate {
        snap_candidate_with_config(&self.model, x, y, &self.config.snap)
    }

    /// Axis tracker for a drag starting at `anchor`, with configured thresholds.
    pub fn drag_tracker(&self, anchor: Point) -> DragAxisTracker {
        DragAxisTracker::from_config(anchor, &self.config.drag)
    }
}

/// Per-file netlist result with issues and counts.
#[derive(Debug, Clone, Serialize)]
pub struct NetlistResult {
    pub file: PathBuf,
    pub deck: String,
    pub resolution: Resolution,
    pub issues: Vec<Issue>,
    pub stats: CheckStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckStats {
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
    pub suggestions: usize,
}

impl NetlistResult {
    pub fn has_errors(&self) -> bool {
        self.stats.errors > 0
    }

    pub fn total_issues(&self) -> usize {
        self.stats.errors + self.stats.warnings + self.stats.info + self.stats.suggestions
    }

    /// True when any issue is at least as severe as `threshold`.
    pub fn fails_at(&self, threshold: Severity) -> bool {
        self.issues.iter().any(|i| i.severity <= threshold)
    }
}

/// Junction dots of a normalized sketch.
#[derive(Debug, Clone, Serialize)]
pub struct JunctionReport {
    pub file: PathBuf,
    pub junctions: Vec<Point>,
    pub wires: usize,
    pub normalized: NormalizeReport,
}

fn issues_to_stats(issues: &[Issue]) -> CheckStats {
    let mut stats = CheckStats::default();
    for i in issues {
        match i.severity {
            Severity::Error => stats.errors += 1,
            Severity::Warning => stats.warnings += 1,
            Severity::Info => stats.info += 1,
            Severity::Suggestion => stats.suggestions += 1,
        }
    }
    stats
}

/// Recursively discover sketch documents in a directory.
pub fn discover_sketch_files(dir: &Path) -> Result<Vec<PathBuf>, SketchnetError> {
    let mut files = Vec::new();
    walk_dir(dir, &mut files, 0)?;
    files.sort();
    Ok(files)
}

fn walk_dir(dir: &Path, files: &mut Vec<PathBuf>, depth: usize) -> Result<(), SketchnetError> {
    if depth > 20 {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if path.is_dir() {
            if name.starts_with('.') || name == "target" || name == "node_modules" {
                continue;
            }
            walk_dir(&path, files, depth + 1)?;
        } else if path.is_file() && name.ends_with(SKETCH_SUFFIX) {
            files.push(path);
        }
    }
    Ok(())
}

/// Core API used by the CLI.
pub struct SketchnetCore;

impl SketchnetCore {
    /// Load a sketch document and normalize its wires.
    pub fn load(path: &Path) -> Result<LoadedSketch, SketchnetError> {
        let document = SketchDocument::load(path)?;
        let config = document.config();
        let mut model = document.into_model()?;
        let normalized = normalize(&mut model);
        Ok(LoadedSketch {
            document,
            config,
            model,
            normalized,
        })
    }

    /// Resolve a sketch into a deck, running the rules unless disabled.
    pub fn netlist_file(
        path: &Path,
        options: NetlistOptions,
    ) -> Result<NetlistResult, SketchnetError> {
        let sketch = Self::load(path)?;
        let title = options
            .title
            .clone()
            .or_else(|| sketch.document.config.as_ref().map(|c| c.netlist.title.clone()))
            .unwrap_or_else(|| sketch.document.metadata.title.clone());

        let resolution = NetlistBuilder::resolve_with_title(&sketch.model, &title)?;
        let deck = if options.analyses.is_empty() {
            resolution.netlist.to_text()
        } else {
            render_deck(&resolution.netlist, &options.analyses)
        };

        let issues = if options.run_rules {
            RulesEngine::with_default_rules().analyze_only(
                &sketch.model,
                &resolution,
                &options.rules,
            )
        } else {
            Vec::new()
        };
        let stats = issues_to_stats(&issues);
        tracing::info!(
            "{}: {} nodes, {} devices, {} issues",
            path.display(),
            resolution.node_count,
            resolution.netlist.lines.len(),
            issues.len()
        );

        Ok(NetlistResult {
            file: path.to_path_buf(),
            deck,
            resolution,
            issues,
            stats,
        })
    }

    /// Rules-only run over a single sketch.
    pub fn check_file(path: &Path, rules: Vec<String>) -> Result<NetlistResult, SketchnetError> {
        Self::netlist_file(
            path,
            NetlistOptions {
                rules,
                ..NetlistOptions::default()
            },
        )
    }

    /// Check every sketch document under a directory.
    pub fn check_project(
        dir: &Path,
        rules: Vec<String>,
    ) -> Result<Vec<NetlistResult>, SketchnetError> {
        let files = discover_sketch_files(dir)?;
        if files.is_empty() {
            return Err(SketchnetError::Other(format!(
                "No *{} files found in {}",
                SKETCH_SUFFIX,
                dir.display()
            )));
        }
        files
            .iter()
            .map(|path| Self::check_file(path, rules.clone()))
            .collect()
    }

    pub fn junctions_file(path: &Path) -> Result<JunctionReport, SketchnetError> {
        let sketch = Self::load(path)?;
        Ok(JunctionReport {
            file: path.to_path_buf(),
            junctions: junction_dots(&sketch.model),
            wires: sketch.model.wire_count(),
            normalized: sketch.normalized,
        })
    }
}
