// SPDX-License-Identifier: MIT OR Apache-2.0
//! Parallel raster driver.
//!
//! Every pixel is an independent adaptive cell and rows are distributed over a
//! rayon pool. Leaves are visited in a fixed order inside each pixel, so the
//! image is bit-identical for any thread count.

use crate::adaptive::{AdaptiveSampler, SamplerStats, Target};
use crate::error::SamplerError;
use crate::patch::{Cell, SurfacePatch};
use crate::settings::SamplerSettings;
use procedural_graph::ValidatedGraph;
use rayon::prelude::*;

/// A sampled image, stored row-major with row 0 at `t = 0`
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    /// Pixels per row
    pub width: usize,
    /// Number of rows
    pub height: usize,
    /// Pixel values
    pub pixels: Vec<f64>,
    /// Work summed over all pixels
    pub stats: SamplerStats,
}

impl Raster {
    /// Value of a pixel
    pub fn get(&self, x: usize, y: usize) -> Option<f64> {
        if x < self.width {
            self.pixels.get(y * self.width + x).copied()
        } else {
            None
        }
    }
}

fn build_thread_pool(threads: Option<usize>) -> Result<rayon::ThreadPool, SamplerError> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    Ok(builder.build()?)
}

/// Sample `target` over `patch` into a `width` x `height` raster
#[tracing::instrument(skip(graph, patch, settings), fields(module = %target.module, output = target.output))]
pub fn render(
    graph: &ValidatedGraph,
    target: Target,
    patch: SurfacePatch,
    settings: &SamplerSettings,
    width: usize,
    height: usize,
) -> Result<Raster, SamplerError> {
    if width == 0 || height == 0 {
        return Err(SamplerError::EmptyRaster { width, height });
    }
    let sampler = AdaptiveSampler::new(graph, target, patch, settings)?;
    let pool = build_thread_pool(settings.threads)?;

    let ds = 1.0 / width as f64;
    let dt = 1.0 / height as f64;
    let rows = pool.install(|| {
        (0..height)
            .into_par_iter()
            .map(|y| -> Result<(Vec<f64>, SamplerStats), SamplerError> {
                let mut stats = SamplerStats::default();
                let row = (0..width)
                    .map(|x| {
                        let cell = Cell::new(x as f64 * ds, y as f64 * dt, ds, dt);
                        sampler.average(cell, &mut stats)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((row, stats))
            })
            .collect::<Vec<_>>()
    });

    let mut pixels = Vec::with_capacity(width * height);
    let mut stats = SamplerStats::default();
    for row in rows {
        let (row, row_stats) = row?;
        pixels.extend(row);
        stats += row_stats;
    }

    tracing::info!(
        width,
        height,
        threads = pool.current_num_threads(),
        evaluations = stats.evaluations,
        leaves = stats.leaves,
        deepest = stats.deepest,
        "Rendered raster"
    );

    Ok(Raster {
        width,
        height,
        pixels,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use procedural_graph::catalog::{CoordinateModule, Number};
    use procedural_graph::{Coordinate, Graph};

    #[test]
    fn test_empty_raster_is_rejected() {
        let mut graph = Graph::new("empty");
        let id = graph.add_module(Number::new(1.0));
        let graph = ValidatedGraph::new(graph).unwrap();
        let result = render(
            &graph,
            Target::new(id, 0),
            SurfacePatch::default(),
            &SamplerSettings::default(),
            0,
            4,
        );
        assert!(matches!(result, Err(SamplerError::EmptyRaster { width: 0, height: 4 })));
    }

    #[test]
    fn test_pixels_average_their_cells() {
        let mut graph = Graph::new("ramp");
        let id = graph.add_module(CoordinateModule::new(Coordinate::Y));
        let graph = ValidatedGraph::new(graph).unwrap();
        let raster = render(
            &graph,
            Target::new(id, 0),
            SurfacePatch::default(),
            &SamplerSettings::default(),
            3,
            4,
        )
        .unwrap();
        assert_eq!(raster.pixels.len(), 12);
        for y in 0..4 {
            let expected = (y as f64 + 0.5) / 4.0;
            for x in 0..3 {
                let value = raster.get(x, y).unwrap();
                assert!((value - expected).abs() < 1e-12, "pixel ({x}, {y}) = {value}");
            }
        }
        assert_eq!(raster.get(3, 0), None);
        // one error estimate per visited cell and one value per leaf
        let stats = raster.stats;
        assert_eq!(stats.evaluations, 2 * stats.leaves + stats.refined);
        assert_eq!(stats.deepest, 4);
    }
}
