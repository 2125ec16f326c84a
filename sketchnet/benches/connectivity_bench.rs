use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sketchnet::prelude::*;
use sketchnet::normalize;
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Resistor chain with every node tapped down to a shared bus.
fn ladder(stages: i64) -> TopologyModel {
    let mut model = TopologyModel::new();
    for i in 0..stages {
        let x = i * 200;
        model
            .add_component(Component::new(
                format!("R{}", i + 1),
                ComponentKind::Resistor,
                Point::new(x, 0),
            ))
            .unwrap();
        if i + 1 < stages {
            model
                .add_wire(&[Point::new(x + 40, 0), Point::new(x + 160, 0)])
                .unwrap();
        }
        model
            .add_wire(&[Point::new(x + 40, 0), Point::new(x + 40, 100)])
            .unwrap();
    }
    model
        .add_wire(&[Point::new(-100, 100), Point::new(stages * 200, 100)])
        .unwrap();
    model
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");
    for stages in [10, 100] {
        let model = ladder(stages);
        group.bench_with_input(BenchmarkId::from_parameter(stages), &model, |b, model| {
            b.iter(|| {
                let mut model = model.clone();
                normalize(black_box(&mut model))
            });
        });
    }
    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    for stages in [10, 100] {
        let mut model = ladder(stages);
        normalize(&mut model);
        group.bench_with_input(BenchmarkId::from_parameter(stages), &model, |b, model| {
            b.iter(|| NetlistBuilder::resolve(black_box(model)));
        });
    }
    group.finish();
}

fn bench_netlist_file(c: &mut Criterion) {
    c.bench_function("netlist_file", |b| {
        b.iter(|| {
            SketchnetCore::netlist_file(
                black_box(&fixture_path("rc_filter.sketch.json")),
                black_box(NetlistOptions::default()),
            )
        });
    });
}

criterion_group!(benches, bench_normalize, bench_resolve, bench_netlist_file);
criterion_main!(benches);
