//! Integration tests for the Sketchnet core API

use sketchnet::prelude::*;
use sketchnet::topology::TopologyError;
use sketchnet::{load_sketch, GroundReference};
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn no_rules() -> NetlistOptions {
    NetlistOptions {
        run_rules: false,
        ..NetlistOptions::default()
    }
}

#[test]
fn test_divider_netlist() {
    let result =
        SketchnetCore::netlist_file(&fixture_path("divider.sketch.json"), no_rules()).unwrap();

    assert_eq!(result.resolution.node_count, 2);
    assert_eq!(result.deck, "* divider\nR1 0 N2 1000\nV1 N2 0 DC 12\n");
    assert!(result.issues.is_empty());
}

#[test]
fn test_divider_with_operating_point() {
    let options = NetlistOptions {
        analyses: vec![ControlCard::Op],
        title: Some("bench divider".to_string()),
        ..no_rules()
    };
    let result = SketchnetCore::netlist_file(&fixture_path("divider.sketch.json"), options).unwrap();
    assert_eq!(
        result.deck,
        "* bench divider\nR1 0 N2 1000\nV1 N2 0 DC 12\n\n.OP\n.END\n"
    );
}

#[test]
fn test_divider_ground_comes_from_source() {
    let result = SketchnetCore::check_file(&fixture_path("divider.sketch.json"), vec![]).unwrap();
    assert!(matches!(
        result.resolution.ground,
        GroundReference::Source { .. }
    ));
    assert_eq!(result.stats.warnings, 0);
    assert_eq!(result.stats.info, 1);
    assert!(!result.fails_at(Severity::Warning));
    assert!(result.fails_at(Severity::Info));
}

#[test]
fn test_rc_filter_with_ground_symbol() {
    let sketch = SketchnetCore::load(&fixture_path("rc_filter.sketch.json")).unwrap();
    // the free corner at (180, 0) is collinear and gets dropped
    assert_eq!(sketch.normalized.removed, 1);

    let result =
        SketchnetCore::netlist_file(&fixture_path("rc_filter.sketch.json"), NetlistOptions::default())
            .unwrap();
    let netlist = &result.resolution.netlist;
    assert_eq!(netlist.title, "rc low-pass filter");
    assert_eq!(netlist.line_for("V1"), Some("V1 N2 0 AC 1 0"));
    assert_eq!(netlist.line_for("R1"), Some("R1 N2 N3 1k"));
    assert_eq!(netlist.line_for("C1"), Some("C1 N3 0 100n"));
    assert_eq!(netlist.line_for("GND1"), None);
    assert_eq!(result.resolution.node_count, 3);
    assert_eq!(result.total_issues(), 0, "issues: {:?}", result.issues);
}

#[test]
fn test_floating_terminal_reported() {
    let result = SketchnetCore::check_file(&fixture_path("floating.sketch.json"), vec![]).unwrap();

    assert_eq!(
        result.resolution.netlist.line_for("C1"),
        Some("C1 N2 C1_t2_unconnected 1u")
    );
    assert_eq!(result.stats.warnings, 2);
    assert_eq!(result.stats.info, 1);
    assert!(result
        .issues
        .iter()
        .any(|i| i.rule_id == "unconnected_terminal" && i.component.as_deref() == Some("C1")));
    assert!(result.fails_at(Severity::Warning));
    assert!(!result.fails_at(Severity::Error));
}

#[test]
fn test_rule_filter() {
    let result = SketchnetCore::check_file(
        &fixture_path("floating.sketch.json"),
        vec!["dangling_wire".to_string()],
    )
    .unwrap();
    assert_eq!(result.total_issues(), 1);
    assert_eq!(result.issues[0].location, Some(Point::new(0, 80)));
}

#[test]
fn test_crossing_junctions() {
    let report = SketchnetCore::junctions_file(&fixture_path("crossing.sketch.json")).unwrap();
    assert_eq!(report.junctions, vec![Point::new(60, 0)]);
    assert_eq!(report.wires, 2);
    assert_eq!(report.normalized.junctions, 2);
}

#[test]
fn test_diagonal_wire_is_rejected() {
    let err = SketchnetCore::netlist_file(&fixture_path("diagonal.json"), no_rules()).unwrap_err();
    assert!(matches!(
        err,
        SketchnetError::Topology(TopologyError::InvalidWire(_))
    ));
}

#[test]
fn test_missing_file() {
    let err = load_sketch(&fixture_path("nope.sketch.json")).unwrap_err();
    assert!(matches!(err, SketchnetError::Io(_)));
}

#[test]
fn test_malformed_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.sketch.json");
    std::fs::write(&path, "{ \"components\": [").unwrap();
    let err = SketchnetCore::load(&path).unwrap_err();
    assert!(matches!(err, SketchnetError::Parse(_)));
}

#[test]
fn test_check_project_discovers_sketches() {
    let results = SketchnetCore::check_project(&fixture_path(""), vec![]).unwrap();
    let names: Vec<_> = results
        .iter()
        .filter_map(|r| r.file.file_name().and_then(|n| n.to_str()).map(String::from))
        .collect();
    assert_eq!(
        names,
        vec![
            "crossing.sketch.json",
            "divider.sketch.json",
            "floating.sketch.json",
            "rc_filter.sketch.json"
        ]
    );
}

#[test]
fn test_check_project_empty_dir() {
    let dir = tempfile::tempdir().unwrap();
    let err = SketchnetCore::check_project(dir.path(), vec![]).unwrap_err();
    assert!(matches!(err, SketchnetError::Other(_)));
}

#[test]
fn test_loaded_sketch_uses_configured_snap_and_drag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tight.sketch.json");
    std::fs::write(
        &path,
        r#"{
  "config": { "snap": { "radius": 4 }, "drag": { "reset_radius": 5, "lock_threshold": 40 } },
  "components": [
    { "id": "R1", "type": "resistor", "position": { "x": 100, "y": 0 } }
  ]
}"#,
    )
    .unwrap();

    let sketch = SketchnetCore::load(&path).unwrap();
    // R1.t1 is 8 px away: outside the configured radius
    let snap = sketch.snap(68.0, 0.0);
    assert!(!snap.is_terminal());
    assert!(sketch.snap(62.0, 1.0).is_terminal());

    let mut tracker = sketch.drag_tracker(Point::new(0, 0));
    assert_eq!(tracker.update(30.0, 0.0), sketchnet::PreferredAxis::None);
    assert_eq!(tracker.update(45.0, 0.0), sketchnet::PreferredAxis::Horizontal);
}
