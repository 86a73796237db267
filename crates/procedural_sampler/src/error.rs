// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sampler errors.

use crate::settings::SettingsError;
use procedural_graph::{EvaluationError, ModuleId};

/// Error setting up or running the sampler
#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    /// The settings are unusable
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// The graph rejected an evaluation request
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// The target output carries colors
    #[error("Output {output} of module {module} is a color; sample a scalar output")]
    ColorTarget {
        /// Target module
        module: ModuleId,
        /// Target output
        output: usize,
    },

    /// A raster needs at least one pixel
    #[error("Raster size {width}x{height} is empty")]
    EmptyRaster {
        /// Requested width
        width: usize,
        /// Requested height
        height: usize,
    },

    /// The worker pool could not start
    #[error("Failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
