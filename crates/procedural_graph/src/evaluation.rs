// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph evaluation.
//!
//! Evaluation is pull-based and memo-free: asking a module for an output
//! resolves each of its bound inputs by asking the upstream module for the
//! matching output, recursively, and falls back to the port default for
//! unbound inputs. Nothing is cached between calls, so one [`ValidatedGraph`]
//! can be evaluated from any number of threads at once.

use crate::catalog::POLE_ERROR;
use crate::color::RgbColor;
use crate::connection::Binding;
use crate::graph::{Graph, GraphError, ModuleNode, Topology};
use crate::math::Vec3;
use crate::module::ModuleId;
use crate::port::{PortDefault, PortKind};
use serde::{Deserialize, Serialize};

/// A component of the sample point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Coordinate {
    /// World X
    X,
    /// World Y
    Y,
    /// World Z
    Z,
    /// Animation time
    Time,
}

impl Coordinate {
    /// All coordinates in parameter order
    pub const ALL: [Coordinate; 4] = [Self::X, Self::Y, Self::Z, Self::Time];

    /// Display name
    pub fn label(self) -> &'static str {
        match self {
            Self::X => "X",
            Self::Y => "Y",
            Self::Z => "Z",
            Self::Time => "Time",
        }
    }

    /// Value of this component at a sample point
    pub fn value(self, point: &SamplePoint) -> f64 {
        match self {
            Self::X => point.position.x,
            Self::Y => point.position.y,
            Self::Z => point.position.z,
            Self::Time => point.time,
        }
    }

    /// How far this component varies across the sample footprint
    pub fn error(self, point: &SamplePoint, blur: f64) -> f64 {
        match self {
            Self::X => 0.5 * point.size.x + blur,
            Self::Y => 0.5 * point.size.y + blur,
            Self::Z => 0.5 * point.size.z + blur,
            Self::Time => 0.0,
        }
    }

    /// Spatial gradient of this component
    pub fn gradient(self) -> Vec3 {
        match self {
            Self::X => Vec3::X,
            Self::Y => Vec3::Y,
            Self::Z => Vec3::Z,
            Self::Time => Vec3::ZERO,
        }
    }
}

/// A point supplied by the renderer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SamplePoint {
    /// World position
    pub position: Vec3,
    /// Footprint size along each axis
    pub size: Vec3,
    /// Animation time
    pub time: f64,
    /// Per-vertex texture parameters
    pub parameters: Vec<f64>,
}

impl SamplePoint {
    /// A point sample (zero footprint) at a position
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Set the footprint size
    pub fn with_size(mut self, size: Vec3) -> Self {
        self.size = size;
        self
    }

    /// Set the animation time
    pub fn with_time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }

    /// Set the texture parameters
    pub fn with_parameters(mut self, parameters: Vec<f64>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Largest footprint extent
    pub fn max_size(&self) -> f64 {
        self.size.abs().max_component()
    }
}

/// Per-call evaluation parameters
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// The sample being evaluated
    pub point: &'a SamplePoint,
    /// Area-averaging radius
    pub blur: f64,
}

impl<'a> EvaluationContext<'a> {
    /// Create a new context
    pub fn new(point: &'a SamplePoint, blur: f64) -> Self {
        Self { point, blur }
    }

    /// The same sample with a different blur radius
    pub fn with_blur(self, blur: f64) -> Self {
        Self { blur, ..self }
    }

    /// Value of a coordinate at the sample point
    pub fn coordinate(&self, axis: Coordinate) -> f64 {
        axis.value(self.point)
    }

    /// Error of a coordinate over the sample footprint
    pub fn coordinate_error(&self, axis: Coordinate) -> f64 {
        axis.error(self.point, self.blur)
    }
}

/// Resolved view of one module's inputs.
///
/// Bound inputs are pulled from the upstream module on every call.
#[derive(Clone, Copy)]
pub struct Inputs<'a> {
    graph: &'a Graph,
    node: &'a ModuleNode,
}

impl<'a> Inputs<'a> {
    pub(crate) fn new(graph: &'a Graph, node: &'a ModuleNode) -> Self {
        Self { graph, node }
    }

    /// Number of input ports
    pub fn len(&self) -> usize {
        self.node.signature().inputs.len()
    }

    /// Check if the module has no inputs
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if an input is linked to an upstream output
    pub fn is_bound(&self, input: usize) -> bool {
        self.upstream(input).is_some()
    }

    fn upstream(&self, input: usize) -> Option<(Inputs<'a>, &'a ModuleNode, usize)> {
        let Binding { module, output } = self.node.binding(input)?;
        let node = self.graph.node(module)?;
        Some((Inputs::new(self.graph, node), node, output))
    }

    fn default(&self, input: usize) -> PortDefault {
        self.node
            .signature()
            .input(input)
            .map_or(PortDefault::Scalar(0.0), |port| port.default)
    }

    /// Scalar value of an input
    pub fn value(&self, input: usize, ctx: EvaluationContext<'_>) -> f64 {
        match self.upstream(input) {
            Some((inputs, node, output)) => node.module().average_value(output, &inputs, ctx),
            None => match self.default(input) {
                PortDefault::Scalar(v) => v,
                PortDefault::Boolean(b) => f64::from(u8::from(b)),
                PortDefault::Color(c) => c.brightness(),
                PortDefault::Coordinate(axis) => ctx.coordinate(axis),
            },
        }
    }

    /// Truth value of an input (nonzero is true)
    pub fn truth(&self, input: usize, ctx: EvaluationContext<'_>) -> bool {
        self.value(input, ctx) != 0.0
    }

    /// Color value of an input; scalar sources widen to gray
    pub fn color(&self, input: usize, ctx: EvaluationContext<'_>) -> RgbColor {
        match self.upstream(input) {
            Some((inputs, node, output)) => {
                let kind = node.signature().output(output).map(|port| port.kind);
                if kind == Some(PortKind::Color) {
                    node.module().color_value(output, &inputs, ctx)
                } else {
                    RgbColor::gray(node.module().average_value(output, &inputs, ctx))
                }
            }
            None => match self.default(input) {
                PortDefault::Color(c) => c,
                PortDefault::Scalar(v) => RgbColor::gray(v),
                PortDefault::Boolean(b) => RgbColor::gray(f64::from(u8::from(b))),
                PortDefault::Coordinate(axis) => RgbColor::gray(ctx.coordinate(axis)),
            },
        }
    }

    /// Error estimate of an input
    pub fn error(&self, input: usize, ctx: EvaluationContext<'_>) -> f64 {
        match self.upstream(input) {
            Some((inputs, node, output)) => node.module().value_error(output, &inputs, ctx),
            None => match self.default(input) {
                PortDefault::Coordinate(axis) => ctx.coordinate_error(axis),
                _ => 0.0,
            },
        }
    }

    /// Spatial gradient of an input
    pub fn gradient(&self, input: usize, ctx: EvaluationContext<'_>) -> Vec3 {
        match self.upstream(input) {
            Some((inputs, node, output)) => node.module().value_gradient(output, &inputs, ctx),
            None => match self.default(input) {
                PortDefault::Coordinate(axis) => axis.gradient(),
                _ => Vec3::ZERO,
            },
        }
    }

    /// Position assembled from three scalar inputs
    pub fn position(&self, first: usize, ctx: EvaluationContext<'_>) -> Vec3 {
        Vec3::new(
            self.value(first, ctx),
            self.value(first + 1, ctx),
            self.value(first + 2, ctx),
        )
    }

    /// Per-axis errors of three scalar inputs
    pub fn position_error(&self, first: usize, ctx: EvaluationContext<'_>) -> Vec3 {
        Vec3::new(
            self.error(first, ctx),
            self.error(first + 1, ctx),
            self.error(first + 2, ctx),
        )
    }

    /// Gradients of three scalar inputs, as the columns of a Jacobian
    pub fn position_gradients(&self, first: usize, ctx: EvaluationContext<'_>) -> [Vec3; 3] {
        [
            self.gradient(first, ctx),
            self.gradient(first + 1, ctx),
            self.gradient(first + 2, ctx),
        ]
    }
}

/// Error in an evaluation request
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    /// Module not found
    #[error("Module not found: {0}")]
    ModuleNotFound(ModuleId),

    /// Output index out of range
    #[error("Module {module} has {count} outputs, output {output} requested")]
    OutputOutOfRange {
        /// Module
        module: ModuleId,
        /// Requested output
        output: usize,
        /// Number of outputs
        count: usize,
    },

    /// A scalar was requested from a color output
    #[error("Output {output} of module {module} is a color")]
    NotScalar {
        /// Module
        module: ModuleId,
        /// Requested output
        output: usize,
    },

    /// Blur must be finite and non-negative
    #[error("Invalid blur radius: {0}")]
    InvalidBlur(f64),
}

/// A graph that passed validation, frozen for evaluation.
///
/// This is the only way to evaluate a graph. It is `Send + Sync`; share it by
/// reference (or in an `Arc`) between worker threads.
#[derive(Debug, Clone)]
pub struct ValidatedGraph {
    graph: Graph,
    topology: Topology,
}

impl ValidatedGraph {
    /// Validate and freeze a graph
    pub fn new(graph: Graph) -> Result<Self, GraphError> {
        let topology = graph.validate()?;
        Ok(Self { graph, topology })
    }

    /// The underlying graph
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Dependency order and depth computed by validation
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Return the graph for further editing
    pub fn into_graph(self) -> Graph {
        self.graph
    }

    fn target(
        &self,
        module: ModuleId,
        output: usize,
        blur: f64,
    ) -> Result<(&ModuleNode, PortKind), EvaluationError> {
        if !blur.is_finite() || blur < 0.0 {
            return Err(EvaluationError::InvalidBlur(blur));
        }
        let node = self
            .graph
            .node(module)
            .ok_or(EvaluationError::ModuleNotFound(module))?;
        let port = node
            .signature()
            .output(output)
            .ok_or(EvaluationError::OutputOutOfRange {
                module,
                output,
                count: node.signature().outputs.len(),
            })?;
        Ok((node, port.kind))
    }

    /// Area-averaged value of a scalar or boolean output
    pub fn evaluate_scalar(
        &self,
        module: ModuleId,
        output: usize,
        point: &SamplePoint,
        blur: f64,
    ) -> Result<f64, EvaluationError> {
        let (node, kind) = self.target(module, output, blur)?;
        if kind == PortKind::Color {
            return Err(EvaluationError::NotScalar { module, output });
        }
        let ctx = EvaluationContext::new(point, blur);
        Ok(node
            .module()
            .average_value(output, &Inputs::new(&self.graph, node), ctx))
    }

    /// Area-averaged value of an output as a color; scalar outputs widen to gray
    pub fn evaluate_color(
        &self,
        module: ModuleId,
        output: usize,
        point: &SamplePoint,
        blur: f64,
    ) -> Result<RgbColor, EvaluationError> {
        let (node, kind) = self.target(module, output, blur)?;
        let ctx = EvaluationContext::new(point, blur);
        let inputs = Inputs::new(&self.graph, node);
        Ok(match kind {
            PortKind::Color => node.module().color_value(output, &inputs, ctx),
            PortKind::Scalar | PortKind::Boolean => {
                RgbColor::gray(node.module().average_value(output, &inputs, ctx))
            }
        })
    }

    /// Error bound of an output over the sample footprint
    pub fn estimate_error(
        &self,
        module: ModuleId,
        output: usize,
        point: &SamplePoint,
        blur: f64,
    ) -> Result<f64, EvaluationError> {
        let (node, _) = self.target(module, output, blur)?;
        let ctx = EvaluationContext::new(point, blur);
        let error = node
            .module()
            .value_error(output, &Inputs::new(&self.graph, node), ctx);
        debug_assert!(error >= 0.0 || error.is_nan(), "negative error estimate {error}");
        if error.is_finite() {
            Ok(error.max(0.0))
        } else {
            // overflow or an undefined operation: never report convergence
            Ok(POLE_ERROR)
        }
    }

    /// Spatial gradient of a scalar output
    pub fn evaluate_gradient(
        &self,
        module: ModuleId,
        output: usize,
        point: &SamplePoint,
        blur: f64,
    ) -> Result<Vec3, EvaluationError> {
        let (node, kind) = self.target(module, output, blur)?;
        if kind == PortKind::Color {
            return Err(EvaluationError::NotScalar { module, output });
        }
        let ctx = EvaluationContext::new(point, blur);
        Ok(node
            .module()
            .value_gradient(output, &Inputs::new(&self.graph, node), ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CoordinateModule, Exp, Number, Product, Sum};

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_validated_graph_is_shareable() {
        assert_send_sync::<ValidatedGraph>();
    }

    #[test]
    fn test_coordinate_error_includes_footprint_and_blur() {
        let point = SamplePoint::new(Vec3::new(1.0, 2.0, 3.0))
            .with_size(Vec3::new(0.2, 0.4, 0.0))
            .with_time(5.0);
        assert_eq!(Coordinate::Y.value(&point), 2.0);
        assert_eq!(Coordinate::Time.value(&point), 5.0);
        assert!((Coordinate::X.error(&point, 0.1) - 0.2).abs() < 1e-12);
        assert!((Coordinate::Y.error(&point, 0.0) - 0.2).abs() < 1e-12);
        assert_eq!(Coordinate::Time.error(&point, 0.1), 0.0);
    }

    #[test]
    fn test_evaluate_sum_of_position() {
        let mut graph = Graph::new("test");
        let x = graph.add_module(CoordinateModule::new(Coordinate::X));
        let y = graph.add_module(CoordinateModule::new(Coordinate::Y));
        let sum = graph.add_module(Sum::default());
        graph.bind_input(sum, 0, x, 0).unwrap();
        graph.bind_input(sum, 1, y, 0).unwrap();
        let graph = ValidatedGraph::new(graph).unwrap();

        let point = SamplePoint::new(Vec3::new(0.25, 0.5, 0.0)).with_size(Vec3::splat(0.1));
        assert_eq!(graph.evaluate_scalar(sum, 0, &point, 0.0).unwrap(), 0.75);
        assert!((graph.estimate_error(sum, 0, &point, 0.0).unwrap() - 0.1).abs() < 1e-12);
        assert_eq!(
            graph.evaluate_gradient(sum, 0, &point, 0.0).unwrap(),
            Vec3::new(1.0, 1.0, 0.0)
        );
        assert_eq!(
            graph.evaluate_color(sum, 0, &point, 0.0).unwrap(),
            RgbColor::gray(0.75)
        );
    }

    #[test]
    fn test_undefined_error_is_not_convergence() {
        let mut graph = Graph::new("overflow");
        let large = graph.add_module(Number::new(1000.0));
        let exp = graph.add_module(Exp);
        graph.bind_input(exp, 0, large, 0).unwrap();
        let zero = graph.add_module(Number::new(0.0));
        let product = graph.add_module(Product);
        graph.bind_input(product, 0, exp, 0).unwrap();
        graph.bind_input(product, 1, zero, 0).unwrap();
        let graph = ValidatedGraph::new(graph).unwrap();

        let point = SamplePoint::default();
        assert_eq!(graph.evaluate_scalar(exp, 0, &point, 0.0).unwrap(), f64::INFINITY);
        // 0 * inf
        assert_eq!(graph.estimate_error(exp, 0, &point, 0.0).unwrap(), POLE_ERROR);
        assert_eq!(graph.estimate_error(product, 0, &point, 0.0).unwrap(), POLE_ERROR);
    }

    #[test]
    fn test_request_errors() {
        let mut graph = Graph::new("test");
        let number = graph.add_module(Number::new(2.0));
        let graph = ValidatedGraph::new(graph).unwrap();
        let point = SamplePoint::default();

        let missing = ModuleId::new();
        assert_eq!(
            graph.evaluate_scalar(missing, 0, &point, 0.0),
            Err(EvaluationError::ModuleNotFound(missing))
        );
        assert!(matches!(
            graph.evaluate_scalar(number, 3, &point, 0.0),
            Err(EvaluationError::OutputOutOfRange { output: 3, count: 1, .. })
        ));
        assert!(matches!(
            graph.evaluate_scalar(number, 0, &point, -1.0),
            Err(EvaluationError::InvalidBlur(_))
        ));
        assert!(matches!(
            graph.evaluate_scalar(number, 0, &point, f64::NAN),
            Err(EvaluationError::InvalidBlur(_))
        ));
    }
}
