//! Solver boundary tests with an in-process mock solver

use async_trait::async_trait;
use sketchnet::load_sketch;
use sketchnet::prelude::*;
use sketchnet::simulation::{
    OperatingPoint, SimulationError, SimulationRequest, SolveResult, Solver, SolverError,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

fn divider() -> TopologyModel {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("divider.sketch.json");
    load_sketch(&path).unwrap()
}

enum Reply {
    Voltages(Vec<(&'static str, f64)>),
    Empty,
    Fail(&'static str),
}

struct MockSolver {
    reply: Reply,
    calls: AtomicUsize,
}

impl MockSolver {
    fn new(reply: Reply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Solver for MockSolver {
    fn name(&self) -> &str {
        "mock"
    }

    async fn solve(&self, deck: &str) -> Result<SolveResult, SolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(deck.ends_with(".END\n"));
        match &self.reply {
            Reply::Voltages(values) => Ok(SolveResult {
                op: Some(OperatingPoint {
                    voltages: values.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
                }),
                ..SolveResult::default()
            }),
            Reply::Empty => Ok(SolveResult::default()),
            Reply::Fail(message) => Err(SolverError::Failed(message.to_string())),
        }
    }
}

#[tokio::test]
async fn test_apply_operating_point_to_terminals() {
    let mut model = divider();
    let request = SimulationRequest::prepare(&mut model, &[ControlCard::Op]).unwrap();
    assert!(request.deck().contains("\n.OP\n.END\n"));

    // solver folded the node name to lower case and left ground out
    let solver = MockSolver::new(Reply::Voltages(vec![("n2", 12.0)]));
    let outcome = request.submit(&solver).await.unwrap();
    assert_eq!(outcome.revision(), model.revision());

    let voltages = outcome.apply(&model).unwrap();
    assert_eq!(voltages.get("R1.t2"), Some(&12.0));
    assert_eq!(voltages.get("R1.t1"), Some(&0.0));
    assert_eq!(voltages.get("V1.t2"), Some(&12.0));
    assert_eq!(solver.calls(), 1);
}

#[tokio::test]
async fn test_result_discarded_after_edit() {
    let mut model = divider();
    let request = SimulationRequest::prepare(&mut model, &[ControlCard::Op]).unwrap();
    let solver = MockSolver::new(Reply::Voltages(vec![("N2", 12.0)]));

    // the user keeps editing while the solve is in flight
    let pending = request.submit(&solver);
    assert!(model.move_component("R1", Point::new(60, 40)));
    let outcome = pending.await.unwrap();

    let err = outcome.apply(&model).unwrap_err();
    assert!(matches!(err, SimulationError::Stale { prepared, current } if prepared < current));
}

#[tokio::test]
async fn test_solver_failure_keeps_deck() {
    let mut model = divider();
    let request = SimulationRequest::prepare(&mut model, &[ControlCard::Op]).unwrap();
    let expected_deck = request.deck().to_string();
    let solver = MockSolver::new(Reply::Fail("singular matrix"));

    let err = request.submit(&solver).await.unwrap_err();
    assert_eq!(err.deck(), Some(expected_deck.as_str()));
    assert!(err.to_string().contains("singular matrix"));
    assert_eq!(solver.calls(), 1);
}

#[tokio::test]
async fn test_missing_operating_point() {
    let mut model = divider();
    let request = SimulationRequest::prepare(
        &mut model,
        &[ControlCard::Tran {
            step: 1e-3,
            stop: 1e-1,
        }],
    )
    .unwrap();
    let solver = MockSolver::new(Reply::Empty);
    let outcome = request.submit(&solver).await.unwrap();
    assert!(matches!(
        outcome.apply(&model),
        Err(SimulationError::NoOperatingPoint)
    ));
}

#[tokio::test]
async fn test_prepare_connects_unnormalized_tees() {
    let mut model = TopologyModel::new();
    model
        .add_component(Component::new("R1", ComponentKind::Resistor, Point::new(100, 100)))
        .unwrap();
    model
        .add_component(Component::new("R2", ComponentKind::Resistor, Point::new(100, -100)))
        .unwrap();
    model
        .add_wire(&[Point::new(0, 0), Point::new(200, 0)])
        .unwrap();
    // both branches end on the interior of the through wire
    model
        .add_wire(&[Point::new(60, 100), Point::new(60, 0)])
        .unwrap();
    model
        .add_wire(&[Point::new(140, -100), Point::new(140, 0)])
        .unwrap();

    let request = SimulationRequest::prepare(&mut model, &[ControlCard::Op]).unwrap();
    assert!(request.deck().contains("R1 N1 R1_t2_unconnected 1k\n"));
    assert!(request.deck().contains("R2 R2_t1_unconnected N1 1k\n"));
    assert_eq!(request.revision(), model.revision());

    let solver = MockSolver::new(Reply::Voltages(vec![("N1", 3.0)]));
    let voltages = request.submit(&solver).await.unwrap().apply(&model).unwrap();
    assert_eq!(voltages.get("R1.t1"), Some(&3.0));
    assert_eq!(voltages.get("R2.t2"), Some(&3.0));
    assert_eq!(voltages.get("R1.t2"), None);
}
