// SPDX-License-Identifier: MIT OR Apache-2.0
//! Modules that reshape the sample position with linear algebra.
//!
//! Both modules map the position through an affine map `q = A * p + o`, so
//! each output is linear in the inputs: its error is `sum_j |A_ij| * e_j`
//! and its gradient is row `i` of `A` applied to the input Jacobian. The
//! matrices they need inverted go through a [`LinearSolver`], which can be
//! replaced with [`Transform::with_solver`] and [`Barycentric::with_solver`].
//! The map is solved whenever the configuration changes and kept on the
//! module, so evaluation never calls the solver.

use super::noise::chain;
use crate::evaluation::{Coordinate, EvaluationContext, Inputs};
use crate::math::{Mat3, Vec3};
use crate::module::{Category, Module, ModuleSignature, Parameter, ParameterError, ParameterValue};
use crate::port::{Port, PortKind};
use crate::solver::{invert, GaussianElimination, LinearSolver};
use std::sync::Arc;

fn position_ports() -> Vec<Port> {
    vec![
        Port::coordinate("X", Coordinate::X),
        Port::coordinate("Y", Coordinate::Y),
        Port::coordinate("Z", Coordinate::Z),
    ]
}

fn default_solver() -> Arc<dyn LinearSolver> {
    Arc::new(GaussianElimination::default())
}

/// Evaluate output `row` of the affine map `a * p + offset`
#[derive(Debug, Clone, Copy)]
struct AffineRow {
    coefficients: Vec3,
    offset: f64,
}

impl AffineRow {
    const ZERO: Self = Self {
        coefficients: Vec3::ZERO,
        offset: 0.0,
    };

    fn value(self, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        self.coefficients.dot(inputs.position(0, ctx)) + self.offset
    }

    fn error(self, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        self.coefficients.abs().dot(inputs.position_error(0, ctx))
    }

    fn gradient(self, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Vec3 {
        chain(self.coefficients, inputs.position_gradients(0, ctx))
    }
}

const MATRIX_NAMES: [[&str; 3]; 3] = [
    ["m11", "m12", "m13"],
    ["m21", "m22", "m23"],
    ["m31", "m32", "m33"],
];

const OFFSET_NAMES: [&str; 3] = ["dx", "dy", "dz"];

/// Affine transform of the position
///
/// Forward mode outputs `matrix * p + offset`. Inverse mode outputs the `q`
/// solving `matrix * q = p - offset`; a singular matrix yields zero outputs
/// with zero error.
#[derive(Debug, Clone)]
pub struct Transform {
    matrix: Mat3,
    offset: Vec3,
    inverse: bool,
    solver: Arc<dyn LinearSolver>,
    rows: [AffineRow; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self::new(Mat3::IDENTITY, Vec3::ZERO)
    }
}

impl Transform {
    /// Create a forward transform
    pub fn new(matrix: Mat3, offset: Vec3) -> Self {
        let mut transform = Self {
            matrix,
            offset,
            inverse: false,
            solver: default_solver(),
            rows: [AffineRow::ZERO; 3],
        };
        transform.solve();
        transform
    }

    /// Use the inverse map
    pub fn inverted(mut self) -> Self {
        self.inverse = true;
        self.solve();
        self
    }

    /// Replace the solver used in inverse mode
    pub fn with_solver(mut self, solver: Arc<dyn LinearSolver>) -> Self {
        self.solver = solver;
        self.solve();
        self
    }

    /// Linear part
    pub fn matrix(&self) -> Mat3 {
        self.matrix
    }

    /// Translation
    pub fn offset(&self) -> Vec3 {
        self.offset
    }

    /// Whether the inverse map is applied
    pub fn is_inverse(&self) -> bool {
        self.inverse
    }

    fn solve(&mut self) {
        if !self.inverse {
            self.rows = [0, 1, 2].map(|i| AffineRow {
                coefficients: self.matrix.row(i),
                offset: self.offset.component(i),
            });
            return;
        }
        self.rows = match invert(self.solver.as_ref(), &self.matrix) {
            Ok(inverse) => [0, 1, 2].map(|i| {
                let coefficients = inverse.row(i);
                AffineRow {
                    coefficients,
                    offset: -coefficients.dot(self.offset),
                }
            }),
            Err(_) => {
                tracing::debug!("singular transform matrix, outputs fall back to zero");
                [AffineRow::ZERO; 3]
            }
        };
    }

    fn row(&self, output: usize) -> AffineRow {
        self.rows.get(output).copied().unwrap_or(AffineRow::ZERO)
    }
}

impl Module for Transform {
    fn signature(&self) -> ModuleSignature {
        ModuleSignature::new(
            "transform",
            "Transform",
            Category::Geometry,
            position_ports(),
            vec![
                Port::output("X", PortKind::Scalar),
                Port::output("Y", PortKind::Scalar),
                Port::output("Z", PortKind::Scalar),
            ],
        )
    }

    fn parameters(&self) -> Vec<Parameter> {
        let mut parameters = Vec::with_capacity(13);
        for (row, names) in MATRIX_NAMES.into_iter().enumerate() {
            for (column, name) in names.into_iter().enumerate() {
                parameters.push(Parameter::number(name, self.matrix.rows[row][column]));
            }
        }
        for (axis, name) in OFFSET_NAMES.into_iter().enumerate() {
            parameters.push(Parameter::number(name, self.offset.component(axis)));
        }
        parameters.push(Parameter::toggle("inverse", self.inverse));
        parameters
    }

    fn set_parameter(&mut self, name: &str, value: ParameterValue) -> Result<(), ParameterError> {
        if name == "inverse" {
            self.inverse = value.toggle(name)?;
        } else if let Some((row, column)) = MATRIX_NAMES
            .iter()
            .enumerate()
            .find_map(|(row, names)| names.iter().position(|n| *n == name).map(|c| (row, c)))
        {
            self.matrix.rows[row][column] = value.number(name)?;
        } else if let Some(axis) = OFFSET_NAMES.iter().position(|n| *n == name) {
            let mut offset = self.offset.to_array();
            offset[axis] = value.number(name)?;
            self.offset = Vec3::from(offset);
        } else {
            return Err(ParameterError::unknown(name));
        }
        self.solve();
        Ok(())
    }

    fn average_value(&self, output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        self.row(output).value(inputs, ctx)
    }

    fn value_error(&self, output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        self.row(output).error(inputs, ctx)
    }

    fn value_gradient(&self, output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Vec3 {
        self.row(output).gradient(inputs, ctx)
    }
}

const CORNER_NAMES: [[&str; 3]; 3] = [["ax", "ay", "az"], ["bx", "by", "bz"], ["cx", "cy", "cz"]];

/// Barycentric weights of the position projected onto a triangle, and its
/// signed distance from the triangle's plane
///
/// The weights U, V, W belong to corners A, B, C and sum to one. The
/// distance is positive on the side `(B - A) x (C - A)` points to.
#[derive(Debug, Clone)]
pub struct Barycentric {
    corners: [Vec3; 3],
    solver: Arc<dyn LinearSolver>,
    rows: [AffineRow; 4],
}

impl Default for Barycentric {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::X, Vec3::Y)
    }
}

impl Barycentric {
    /// Output index of the weight of corner A
    pub const U: usize = 0;
    /// Output index of the weight of corner B
    pub const V: usize = 1;
    /// Output index of the weight of corner C
    pub const W: usize = 2;
    /// Output index of the plane distance
    pub const DISTANCE: usize = 3;

    /// Create a module for the triangle `a`, `b`, `c`
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        let mut barycentric = Self {
            corners: [a, b, c],
            solver: default_solver(),
            rows: [AffineRow::ZERO; 4],
        };
        barycentric.solve();
        barycentric
    }

    /// Replace the solver
    pub fn with_solver(mut self, solver: Arc<dyn LinearSolver>) -> Self {
        self.solver = solver;
        self.solve();
        self
    }

    /// Triangle corners A, B, C
    pub fn corners(&self) -> [Vec3; 3] {
        self.corners
    }

    fn solve(&mut self) {
        self.rows = [AffineRow::ZERO; 4];
        let [a, b, c] = self.corners;
        let e1 = b - a;
        let e2 = c - a;
        let normal = e1.cross(e2);
        let length = normal.length();
        if length == 0.0 || !length.is_finite() {
            tracing::debug!("degenerate triangle, outputs fall back to zero");
            return;
        }
        let m = Mat3::from_columns(e1, e2, normal * (1.0 / length));
        let Ok(inverse) = invert(self.solver.as_ref(), &m) else {
            tracing::debug!("unsolvable triangle frame, outputs fall back to zero");
            return;
        };
        // solved coordinates are (V, W, Distance) relative to A
        let coefficients = [
            -(inverse.row(0) + inverse.row(1)),
            inverse.row(0),
            inverse.row(1),
            inverse.row(2),
        ];
        for (output, coefficients) in coefficients.into_iter().enumerate() {
            let constant = if output == Self::U { 1.0 } else { 0.0 };
            self.rows[output] = AffineRow {
                coefficients,
                offset: constant - coefficients.dot(a),
            };
        }
    }

    fn row(&self, output: usize) -> AffineRow {
        self.rows.get(output).copied().unwrap_or(AffineRow::ZERO)
    }
}

impl Module for Barycentric {
    fn signature(&self) -> ModuleSignature {
        ModuleSignature::new(
            "barycentric",
            "Barycentric",
            Category::Geometry,
            position_ports(),
            vec![
                Port::output("U", PortKind::Scalar),
                Port::output("V", PortKind::Scalar),
                Port::output("W", PortKind::Scalar),
                Port::output("Distance", PortKind::Scalar),
            ],
        )
    }

    fn parameters(&self) -> Vec<Parameter> {
        CORNER_NAMES
            .into_iter()
            .zip(self.corners)
            .flat_map(|(names, corner)| {
                names
                    .into_iter()
                    .enumerate()
                    .map(move |(axis, name)| Parameter::number(name, corner.component(axis)))
            })
            .collect()
    }

    fn set_parameter(&mut self, name: &str, value: ParameterValue) -> Result<(), ParameterError> {
        for (corner, names) in CORNER_NAMES.iter().enumerate() {
            if let Some(axis) = names.iter().position(|n| *n == name) {
                let mut position = self.corners[corner].to_array();
                position[axis] = value.number(name)?;
                self.corners[corner] = Vec3::from(position);
                self.solve();
                return Ok(());
            }
        }
        Err(ParameterError::unknown(name))
    }

    fn average_value(&self, output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        self.row(output).value(inputs, ctx)
    }

    fn value_error(&self, output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        self.row(output).error(inputs, ctx)
    }

    fn value_gradient(&self, output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Vec3 {
        self.row(output).gradient(inputs, ctx)
    }
}
