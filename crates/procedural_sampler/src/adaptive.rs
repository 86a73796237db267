// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error-driven refinement of one parameter cell.
//!
//! A cell is split in four while it is shallower than `min_depth`, or while
//! the graph's error estimate over its footprint exceeds `error_tolerance`
//! and it is shallower than `max_depth`. Every other cell becomes a leaf
//! [`Sample`] carrying the blurred value over its footprint.

use crate::error::SamplerError;
use crate::patch::{Cell, SurfacePatch};
use crate::settings::SamplerSettings;
use procedural_graph::{EvaluationError, ModuleId, PortKind, ValidatedGraph};
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// The output being sampled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Module owning the output
    pub module: ModuleId,
    /// Output index
    pub output: usize,
}

impl Target {
    /// Create a target
    pub fn new(module: ModuleId, output: usize) -> Self {
        Self { module, output }
    }
}

/// A leaf of the refinement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Parameter cell the sample covers
    pub cell: Cell,
    /// Value averaged over the cell's footprint
    pub value: f64,
    /// Error estimate over the footprint
    pub error: f64,
}

/// Work counters, summed across cells and workers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerStats {
    /// Calls into the graph, values and error estimates together
    pub evaluations: u64,
    /// Leaf samples produced
    pub leaves: u64,
    /// Cells split into quadrants
    pub refined: u64,
    /// Deepest refinement level reached
    pub deepest: u32,
}

impl AddAssign for SamplerStats {
    fn add_assign(&mut self, other: Self) {
        self.evaluations += other.evaluations;
        self.leaves += other.leaves;
        self.refined += other.refined;
        self.deepest = self.deepest.max(other.deepest);
    }
}

/// Refines cells of a surface patch against one graph output
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveSampler<'g> {
    graph: &'g ValidatedGraph,
    target: Target,
    patch: SurfacePatch,
    settings: &'g SamplerSettings,
}

impl<'g> AdaptiveSampler<'g> {
    /// Create a sampler, checking the settings and the target output once
    pub fn new(
        graph: &'g ValidatedGraph,
        target: Target,
        patch: SurfacePatch,
        settings: &'g SamplerSettings,
    ) -> Result<Self, SamplerError> {
        settings.validate()?;
        let signature = graph
            .graph()
            .signature(target.module)
            .ok_or(EvaluationError::ModuleNotFound(target.module))?;
        let port = signature
            .output(target.output)
            .ok_or(EvaluationError::OutputOutOfRange {
                module: target.module,
                output: target.output,
                count: signature.outputs.len(),
            })?;
        if port.kind == PortKind::Color {
            return Err(SamplerError::ColorTarget {
                module: target.module,
                output: target.output,
            });
        }
        Ok(Self {
            graph,
            target,
            patch,
            settings,
        })
    }

    /// The sampled output
    pub fn target(&self) -> Target {
        self.target
    }

    /// Refine `cell`, appending its leaves to `leaves` in a fixed order
    pub fn sample(
        &self,
        cell: Cell,
        leaves: &mut Vec<Sample>,
        stats: &mut SamplerStats,
    ) -> Result<(), SamplerError> {
        let point = self.patch.sample_point(&cell);
        let blur = self.settings.base_blur;
        let Target { module, output } = self.target;

        let error = if cell.depth < self.settings.min_depth {
            None
        } else {
            stats.evaluations += 1;
            Some(self.graph.estimate_error(module, output, &point, blur)?)
        };

        let split = match error {
            None => true,
            Some(error) => error > self.settings.error_tolerance && cell.depth < self.settings.max_depth,
        };
        if split {
            stats.refined += 1;
            for quadrant in cell.split() {
                self.sample(quadrant, leaves, stats)?;
            }
            return Ok(());
        }

        stats.evaluations += 1;
        stats.leaves += 1;
        stats.deepest = stats.deepest.max(cell.depth);
        leaves.push(Sample {
            cell,
            value: self.graph.evaluate_scalar(module, output, &point, blur)?,
            error: error.unwrap_or_default(),
        });
        Ok(())
    }

    /// Area-weighted mean value over `cell`
    pub fn average(&self, cell: Cell, stats: &mut SamplerStats) -> Result<f64, SamplerError> {
        let mut leaves = Vec::new();
        self.sample(cell, &mut leaves, stats)?;
        let area = cell.area();
        if area == 0.0 {
            return Ok(leaves.first().map_or(0.0, |leaf| leaf.value));
        }
        let total: f64 = leaves.iter().map(|leaf| leaf.value * leaf.cell.area()).sum();
        Ok(total / area)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procedural_graph::catalog::{ColorConstant, CoordinateModule, Number, Sine};
    use procedural_graph::{Coordinate, Graph, Vec3};

    fn graph_with<F: FnOnce(&mut Graph) -> ModuleId>(build: F) -> (ValidatedGraph, ModuleId) {
        let mut graph = Graph::new("sampler");
        let id = build(&mut graph);
        (ValidatedGraph::new(graph).unwrap(), id)
    }

    fn leaves(sampler: &AdaptiveSampler<'_>) -> (Vec<Sample>, SamplerStats) {
        let mut leaves = Vec::new();
        let mut stats = SamplerStats::default();
        sampler
            .sample(Cell::new(0.0, 0.0, 1.0, 1.0), &mut leaves, &mut stats)
            .unwrap();
        (leaves, stats)
    }

    #[test]
    fn test_constant_output_is_a_single_leaf() {
        let (graph, id) = graph_with(|g| g.add_module(Number::new(0.25)));
        let settings = SamplerSettings::default();
        let sampler =
            AdaptiveSampler::new(&graph, Target::new(id, 0), SurfacePatch::default(), &settings)
                .unwrap();
        let (leaves, stats) = leaves(&sampler);
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].value, 0.25);
        assert_eq!(
            stats,
            SamplerStats {
                evaluations: 2,
                leaves: 1,
                refined: 0,
                deepest: 0,
            }
        );
    }

    #[test]
    fn test_min_depth_forces_refinement() {
        let (graph, id) = graph_with(|g| g.add_module(Number::new(1.0)));
        let settings = SamplerSettings {
            min_depth: 2,
            ..SamplerSettings::default()
        };
        let sampler =
            AdaptiveSampler::new(&graph, Target::new(id, 0), SurfacePatch::default(), &settings)
                .unwrap();
        let (leaves, stats) = leaves(&sampler);
        assert_eq!(leaves.len(), 16);
        assert_eq!(stats.refined, 5);
        assert_eq!(stats.deepest, 2);
        assert!(leaves.iter().all(|leaf| leaf.cell.depth == 2));
    }

    #[test]
    fn test_error_drives_refinement_until_max_depth() {
        // the X coordinate's error is half the footprint: 0.5 for the root
        let (graph, id) = graph_with(|g| g.add_module(CoordinateModule::new(Coordinate::X)));
        let settings = SamplerSettings {
            error_tolerance: 0.1,
            max_depth: 6,
            ..SamplerSettings::default()
        };
        let sampler =
            AdaptiveSampler::new(&graph, Target::new(id, 0), SurfacePatch::default(), &settings)
                .unwrap();
        let (leaves, stats) = leaves(&sampler);
        // 0.5 / 2^depth <= 0.1 first holds at depth 3
        assert_eq!(leaves.len(), 64);
        assert_eq!(stats.deepest, 3);
        assert!(leaves.iter().all(|leaf| leaf.error <= 0.1));

        let average = sampler
            .average(Cell::new(0.0, 0.0, 1.0, 1.0), &mut SamplerStats::default())
            .unwrap();
        assert!((average - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_refinement_stops_at_max_depth() {
        let (graph, id) = graph_with(|g| {
            let x = g.add_module(CoordinateModule::new(Coordinate::X));
            let sine = g.add_module(Sine);
            g.bind_input(sine, 0, x, 0).unwrap();
            sine
        });
        let settings = SamplerSettings {
            error_tolerance: 0.0,
            max_depth: 2,
            ..SamplerSettings::default()
        };
        let patch = SurfacePatch::new(Vec3::ZERO, Vec3::X * 10.0, Vec3::Y);
        let sampler = AdaptiveSampler::new(&graph, Target::new(id, 0), patch, &settings).unwrap();
        let (leaves, stats) = leaves(&sampler);
        assert_eq!(leaves.len(), 16);
        assert_eq!(stats.deepest, 2);
        assert!(leaves.iter().any(|leaf| leaf.error > 0.0));
    }

    #[test]
    fn test_target_checks() {
        let (graph, color) = graph_with(|g| g.add_module(ColorConstant::default()));
        let settings = SamplerSettings::default();
        let patch = SurfacePatch::default();
        assert!(matches!(
            AdaptiveSampler::new(&graph, Target::new(color, 0), patch, &settings),
            Err(SamplerError::ColorTarget { .. })
        ));
        assert!(matches!(
            AdaptiveSampler::new(&graph, Target::new(color, 3), patch, &settings),
            Err(SamplerError::Evaluation(EvaluationError::OutputOutOfRange { count: 1, .. }))
        ));
        assert!(matches!(
            AdaptiveSampler::new(&graph, Target::new(ModuleId::new(), 0), patch, &settings),
            Err(SamplerError::Evaluation(EvaluationError::ModuleNotFound(_)))
        ));

        let invalid = SamplerSettings {
            threads: Some(0),
            ..SamplerSettings::default()
        };
        assert!(matches!(
            AdaptiveSampler::new(&graph, Target::new(color, 0), patch, &invalid),
            Err(SamplerError::Settings(_))
        ));
    }
}
