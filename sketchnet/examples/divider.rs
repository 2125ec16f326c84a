//! Divider example: draw a sketch in code, edit it, and print the netlist.
//!
//! Pass a solver URL to also submit an operating point analysis:
//! `cargo run --example divider -- http://localhost:8080/simulate`

use sketchnet::prelude::*;
use sketchnet::simulation::SimulationRequest;
use sketchnet::topology::Rotation;
use sketchnet::{normalize, HttpSolver, PreferredAxis, RulesEngine};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut model = TopologyModel::new();
    model.add_component(
        Component::new("V1", ComponentKind::DcSource, Point::new(0, 0))
            .with_rotation(Rotation::Deg270)
            .with_value("5"),
    )?;
    model.add_component(
        Component::new("R1", ComponentKind::Resistor, Point::new(200, -100)).with_value("10k"),
    )?;
    model.add_component(
        Component::new("R2", ComponentKind::Resistor, Point::new(300, 0))
            .with_rotation(Rotation::Deg90)
            .with_value("10k"),
    )?;
    model.add_component(Component::new("GND1", ComponentKind::Ground, Point::new(0, 120)))?;

    // V1 top to R1, R1 to R2 top, both bottoms to ground
    let routes = [
        (Point::new(0, -40), Point::new(160, -100), PreferredAxis::Vertical),
        (Point::new(240, -100), Point::new(300, -40), PreferredAxis::Horizontal),
        (Point::new(300, 40), Point::new(0, 80), PreferredAxis::Vertical),
    ];
    for (start, end, axis) in routes {
        model.add_routed_wire(start, end, axis)?;
    }
    model.add_wire(&[Point::new(0, 40), Point::new(0, 120)])?;

    let report = normalize(&mut model);
    println!("normalize: {:?}", report);

    // Dragging R2 keeps its wires attached and orthogonal
    model.move_component("R2", Point::new(320, 0));
    normalize(&mut model);

    let resolution = NetlistBuilder::resolve_with_title(&model, "resistive divider")?;
    print!("{}", resolution.netlist.to_text());

    for issue in RulesEngine::with_default_rules().analyze(&model, &resolution) {
        println!("{:?}: {}", issue.severity, issue.message);
    }

    if let Some(url) = std::env::args().nth(1) {
        let request = SimulationRequest::prepare(&mut model, &[ControlCard::Op])?;
        let solver = HttpSolver::new(url);
        let outcome = request.submit(&solver).await?;
        for (terminal, volts) in outcome.apply(&model)? {
            println!("{} = {:.3} V", terminal, volts);
        }
    }
    Ok(())
}
