// SPDX-License-Identifier: MIT OR Apache-2.0
//! Procedural computation graphs for textures, materials and displacement.
//!
//! A [`Graph`] holds polymorphic [`Module`]s whose typed input ports are bound
//! to other modules' outputs. Once validated into a [`ValidatedGraph`], any
//! output can be evaluated at a [`SamplePoint`]:
//!
//! - `evaluate_scalar` / `evaluate_color` return the value averaged over the
//!   sample footprint widened by `blur`, which is what lets a renderer
//!   antialias procedural patterns without supersampling everywhere.
//! - `estimate_error` bounds how far the value may deviate across that
//!   footprint. Adaptive samplers refine where it is large.
//! - `evaluate_gradient` returns the spatial derivative, used for bump
//!   mapping.
//!
//! ## Architecture
//!
//! Evaluation is pull-based: each module pulls its inputs from upstream
//! modules on demand, with unbound inputs falling back to port defaults.
//! Modules hold configuration only, so a validated graph is shared across
//! threads without locking.
//!
//! ```
//! use procedural_graph::catalog::{CoordinateModule, Sine};
//! use procedural_graph::{Coordinate, Graph, SamplePoint, ValidatedGraph, Vec3};
//!
//! let mut graph = Graph::new("stripes");
//! let x = graph.add_module(CoordinateModule::new(Coordinate::X));
//! let sine = graph.add_module(Sine);
//! graph.bind_input(sine, 0, x, 0)?;
//!
//! let graph = ValidatedGraph::new(graph)?;
//! let point = SamplePoint::new(Vec3::new(0.5, 0.0, 0.0));
//! let value = graph.evaluate_scalar(sine, 0, &point, 0.0)?;
//! assert!((value - 0.5_f64.sin()).abs() < 1e-12);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod catalog;
pub mod color;
pub mod connection;
pub mod evaluation;
pub mod graph;
pub mod math;
pub mod module;
pub mod port;
pub mod solver;

pub use color::RgbColor;
pub use connection::{Binding, Link};
pub use evaluation::{
    Coordinate, EvaluationContext, EvaluationError, Inputs, SamplePoint, ValidatedGraph,
};
pub use graph::{Graph, GraphError, ModuleNode, Topology};
pub use math::{Mat3, Vec3};
pub use module::{
    Category, Module, ModuleId, ModuleRegistry, ModuleSignature, Parameter, ParameterError,
    ParameterKind, ParameterValue,
};
pub use port::{Port, PortDefault, PortDirection, PortKind};
pub use solver::{GaussianElimination, LinearSolver, Unsolvable};
