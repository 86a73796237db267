// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rendering one graph with different worker counts.

use procedural_graph::catalog::{Noise, Product, Sum, Turbulence, Wood};
use procedural_graph::{Graph, ModuleId, ValidatedGraph, Vec3};
use procedural_sampler::{render, SamplerSettings, SurfacePatch, Target};

fn displacement() -> (ValidatedGraph, ModuleId) {
    let mut graph = Graph::new("displacement");
    let wood = graph.add_module(Wood::default());
    let mut turbulence = Turbulence::default();
    turbulence.settings.octaves = 4;
    let turbulence = graph.add_module(turbulence);
    let noise = graph.add_module(Noise::default());
    let mix = graph.add_module(Product);
    graph.bind_input(mix, 0, turbulence, 0).unwrap();
    graph.bind_input(mix, 1, noise, 0).unwrap();
    let height = graph.add_module(Sum);
    graph.bind_input(height, 0, wood, 0).unwrap();
    graph.bind_input(height, 1, mix, 0).unwrap();
    (ValidatedGraph::new(graph).unwrap(), height)
}

fn patch() -> SurfacePatch {
    SurfacePatch::new(
        Vec3::new(-1.5, -1.0, 0.25),
        Vec3::new(3.0, 0.0, 0.0),
        Vec3::new(0.0, 2.0, 0.5),
    )
}

#[test]
fn test_render_is_identical_for_any_thread_count() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let (graph, height) = displacement();
    let settings = SamplerSettings {
        error_tolerance: 0.05,
        max_depth: 3,
        ..SamplerSettings::default()
    };

    let single = render(
        &graph,
        Target::new(height, 0),
        patch(),
        &SamplerSettings {
            threads: Some(1),
            ..settings.clone()
        },
        12,
        9,
    )
    .unwrap();

    for threads in [2, 4, 7] {
        let parallel = render(
            &graph,
            Target::new(height, 0),
            patch(),
            &SamplerSettings {
                threads: Some(threads),
                ..settings.clone()
            },
            12,
            9,
        )
        .unwrap();
        assert_eq!(parallel.stats, single.stats);
        let same = parallel
            .pixels
            .iter()
            .zip(&single.pixels)
            .all(|(a, b)| a.to_bits() == b.to_bits());
        assert!(same, "{threads} threads changed the image");
    }

    assert!(single.pixels.iter().all(|v| v.is_finite()));
    assert!(single.stats.refined > 0);
}

#[test]
fn test_tighter_tolerance_refines_more() {
    let (graph, height) = displacement();
    let stats = |error_tolerance: f64| {
        let settings = SamplerSettings {
            error_tolerance,
            max_depth: 5,
            ..SamplerSettings::default()
        };
        render(&graph, Target::new(height, 0), patch(), &settings, 4, 4)
            .unwrap()
            .stats
    };
    let loose = stats(1.0);
    let tight = stats(0.01);
    assert!(tight.leaves > loose.leaves);
    assert!(tight.deepest >= loose.deepest);
}
