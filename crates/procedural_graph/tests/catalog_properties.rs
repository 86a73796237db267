// SPDX-License-Identifier: MIT OR Apache-2.0
//! Properties every module in the standard catalog must hold.

use procedural_graph::catalog::{standard_registry, CoordinateModule, Number};
use procedural_graph::{Coordinate, Graph, PortKind, SamplePoint, ValidatedGraph, Vec3};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn sample_points() -> Vec<SamplePoint> {
    vec![
        SamplePoint::default(),
        SamplePoint::new(Vec3::new(0.3, -1.7, 2.25)),
        SamplePoint::new(Vec3::new(-4.0, 0.5, 0.125)).with_size(Vec3::splat(0.1)),
        SamplePoint::new(Vec3::new(12.5, 3.0, -0.75))
            .with_size(Vec3::new(2.0, 0.0, 0.5))
            .with_time(1.5),
    ]
}

/// Every module of the catalog with all inputs left unbound
fn unbound_graphs() -> Vec<(String, ValidatedGraph, procedural_graph::ModuleId)> {
    standard_registry()
        .types()
        .map(|entry| {
            let mut graph = Graph::new(entry.signature.type_id);
            let id = graph.add_boxed_module(entry.create());
            (entry.signature.name.clone(), ValidatedGraph::new(graph).unwrap(), id)
        })
        .collect()
}

/// Every module of the catalog with each scalar input driven by the X coordinate
fn driven_graphs() -> Vec<(String, ValidatedGraph, procedural_graph::ModuleId)> {
    standard_registry()
        .types()
        .map(|entry| {
            let mut graph = Graph::new(entry.signature.type_id);
            let id = graph.add_boxed_module(entry.create());
            let x = graph.add_module(CoordinateModule::new(Coordinate::X));
            let half = graph.add_module(Number::new(0.5));
            for port in &entry.signature.inputs {
                let source = if port.index % 2 == 0 { x } else { half };
                if port.kind != PortKind::Color {
                    graph.bind_input(id, port.index, source, 0).unwrap();
                }
            }
            (entry.signature.name.clone(), ValidatedGraph::new(graph).unwrap(), id)
        })
        .collect()
}

#[test]
fn test_errors_are_never_negative() {
    init_tracing();
    for (name, graph, id) in unbound_graphs().into_iter().chain(driven_graphs()) {
        let outputs = graph.graph().signature(id).unwrap().outputs.len();
        for point in sample_points() {
            for blur in [0.0, 0.01, 0.5, 4.0] {
                for output in 0..outputs {
                    let error = graph.estimate_error(id, output, &point, blur).unwrap();
                    assert!(error >= 0.0, "{name} output {output} reported {error}");
                }
            }
        }
    }
}

#[test]
fn test_unblurred_evaluation_is_finite() {
    init_tracing();
    for (name, graph, id) in driven_graphs() {
        let signature = graph.graph().signature(id).unwrap().clone();
        for point in sample_points() {
            for port in &signature.outputs {
                let color = graph.evaluate_color(id, port.index, &point, 0.0).unwrap();
                assert!(
                    color.red.is_finite() && color.green.is_finite() && color.blue.is_finite(),
                    "{name} output {} gave {color:?}",
                    port.name
                );
            }
        }
    }
}

#[test]
fn test_scalar_outputs_evaluate_as_gray() {
    init_tracing();
    for (name, graph, id) in unbound_graphs() {
        let signature = graph.graph().signature(id).unwrap().clone();
        let point = SamplePoint::new(Vec3::new(0.25, 0.5, 0.75));
        for port in signature.outputs.iter().filter(|p| p.kind != PortKind::Color) {
            let value = graph.evaluate_scalar(id, port.index, &point, 0.0).unwrap();
            let color = graph.evaluate_color(id, port.index, &point, 0.0).unwrap();
            assert_eq!(
                (color.red, color.green, color.blue),
                (value, value, value),
                "{name} output {}",
                port.name
            );
        }
    }
}
