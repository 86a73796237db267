// SPDX-License-Identifier: MIT OR Apache-2.0
//! Adaptive sampling of procedural graphs.
//!
//! This crate drives a [`procedural_graph::ValidatedGraph`] the way a
//! renderer does:
//! - A [`SurfacePatch`] maps parameter space onto world space
//! - An [`AdaptiveSampler`] refines cells until the graph's error estimate
//!   falls under the configured tolerance
//! - [`render`] samples a whole raster on a rayon pool, sharing one graph
//!   between all workers
//!
//! Sampling is configured by [`SamplerSettings`], stored as RON.

pub mod adaptive;
pub mod error;
pub mod patch;
pub mod raster;
pub mod settings;

pub use adaptive::{AdaptiveSampler, Sample, SamplerStats, Target};
pub use error::SamplerError;
pub use patch::{Cell, SurfacePatch};
pub use raster::{render, Raster};
pub use settings::{SamplerSettings, SettingsError, MAX_REFINEMENT_DEPTH, SETTINGS_FORMAT_VERSION};
