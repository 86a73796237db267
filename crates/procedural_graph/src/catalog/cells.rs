// SPDX-License-Identifier: MIT OR Apache-2.0
//! Worley cell pattern.

use super::noise::{chain, lattice_hash, unit_random};
use crate::evaluation::{Coordinate, EvaluationContext, Inputs};
use crate::math::Vec3;
use crate::module::{Category, Module, ModuleSignature, Parameter, ParameterError, ParameterValue};
use crate::port::{Port, PortKind};

/// Distance between a position and a feature point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metric {
    /// Straight-line distance
    #[default]
    Euclidean,
    /// Sum of axis distances
    CityBlock,
    /// Largest axis distance
    ChessBoard,
}

impl Metric {
    /// Parameter choices, in index order
    pub const CHOICES: &'static [&'static str] = &["Euclidean", "City Block", "Chess Board"];

    fn from_index(index: usize) -> Self {
        match index {
            1 => Self::CityBlock,
            2 => Self::ChessBoard,
            _ => Self::Euclidean,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Euclidean => 0,
            Self::CityBlock => 1,
            Self::ChessBoard => 2,
        }
    }

    /// Largest change of a distance when each axis of the position moves by
    /// up to `error`
    fn spread(self, error: Vec3) -> f64 {
        let error = error.abs();
        match self {
            Self::Euclidean => error.length(),
            Self::CityBlock => error.x + error.y + error.z,
            Self::ChessBoard => error.max_component(),
        }
    }

    /// Distance of `d` from the origin and its gradient with respect to `d`
    fn measure(self, d: Vec3) -> (f64, Vec3) {
        match self {
            Self::Euclidean => {
                let length = d.length();
                if length == 0.0 {
                    (0.0, Vec3::ZERO)
                } else {
                    (length, d * (1.0 / length))
                }
            }
            Self::CityBlock => (
                d.x.abs() + d.y.abs() + d.z.abs(),
                Vec3::new(sign(d.x), sign(d.y), sign(d.z)),
            ),
            Self::ChessBoard => {
                let a = d.abs();
                if a.x >= a.y && a.x >= a.z {
                    (a.x, Vec3::new(sign(d.x), 0.0, 0.0))
                } else if a.y >= a.z {
                    (a.y, Vec3::new(0.0, sign(d.y), 0.0))
                } else {
                    (a.z, Vec3::new(0.0, 0.0, sign(d.z)))
                }
            }
        }
    }
}

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Feature point of a lattice cell and the cell's random value
fn feature(cell: [i64; 3]) -> (Vec3, f64) {
    let hash = lattice_hash(cell[0], cell[1], cell[2]);
    let jitter = Vec3::new(
        unit_random(hash),
        unit_random(lattice_hash(cell[0], cell[1], hash as i64)),
        unit_random(lattice_hash(cell[0], hash as i64, cell[2])),
    );
    let origin = Vec3::new(cell[0] as f64, cell[1] as f64, cell[2] as f64);
    (origin + jitter, unit_random(lattice_hash(hash as i64, cell[1], cell[2])))
}

#[derive(Debug, Clone, Copy)]
struct Nearest {
    distance: f64,
    gradient: Vec3,
    value: f64,
}

impl Nearest {
    const NONE: Self = Self {
        distance: f64::INFINITY,
        gradient: Vec3::ZERO,
        value: 0.0,
    };
}

/// The two nearest feature points around `p`
fn nearest_two(p: Vec3, metric: Metric) -> (Nearest, Nearest) {
    let base = [p.x.floor() as i64, p.y.floor() as i64, p.z.floor() as i64];
    let mut first = Nearest::NONE;
    let mut second = Nearest::NONE;
    for dz in -1..=1 {
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (point, value) = feature([base[0] + dx, base[1] + dy, base[2] + dz]);
                let (distance, gradient) = metric.measure(p - point);
                let candidate = Nearest {
                    distance,
                    gradient,
                    value,
                };
                if distance < first.distance {
                    second = first;
                    first = candidate;
                } else if distance < second.distance {
                    second = candidate;
                }
            }
        }
    }
    (first, second)
}

/// Worley cells: a random value per cell and the distances to the two
/// nearest feature points
#[derive(Debug, Clone, Default)]
pub struct Cells {
    /// Distance metric
    pub metric: Metric,
}

impl Cells {
    /// Output index of the cell value
    pub const CELL: usize = 0;
    /// Output index of the nearest distance
    pub const DISTANCE_1: usize = 1;
    /// Output index of the second nearest distance
    pub const DISTANCE_2: usize = 2;

    /// Create a pattern with the given metric
    pub fn new(metric: Metric) -> Self {
        Self { metric }
    }

    fn nearest(&self, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> (Nearest, Nearest, f64) {
        let p = inputs.position(0, ctx);
        let error = self.metric.spread(inputs.position_error(0, ctx));
        let (first, second) = nearest_two(p, self.metric);
        (first, second, error)
    }
}

impl Module for Cells {
    fn signature(&self) -> ModuleSignature {
        ModuleSignature::new(
            "cells",
            "Cells",
            Category::Noise,
            vec![
                Port::coordinate("X", Coordinate::X),
                Port::coordinate("Y", Coordinate::Y),
                Port::coordinate("Z", Coordinate::Z),
            ],
            vec![
                Port::output("Cell", PortKind::Scalar),
                Port::output("Distance 1", PortKind::Scalar),
                Port::output("Distance 2", PortKind::Scalar),
            ],
        )
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![Parameter::choice("metric", Metric::CHOICES, self.metric.index())]
    }

    fn set_parameter(&mut self, name: &str, value: ParameterValue) -> Result<(), ParameterError> {
        match name {
            "metric" => self.metric = Metric::from_index(value.choice(name, Metric::CHOICES.len())?),
            _ => return Err(ParameterError::unknown(name)),
        }
        Ok(())
    }

    fn average_value(&self, output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        let (first, second, error) = self.nearest(inputs, ctx);
        match output {
            Self::CELL => {
                let gap = second.distance - first.distance;
                if gap < error {
                    let weight = 0.5 + 0.5 * gap / error;
                    weight * first.value + (1.0 - weight) * second.value
                } else {
                    first.value
                }
            }
            Self::DISTANCE_1 => first.distance,
            Self::DISTANCE_2 => second.distance,
            _ => 0.0,
        }
    }

    fn value_error(&self, output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        let (first, second, error) = self.nearest(inputs, ctx);
        match output {
            Self::CELL if second.distance - first.distance < error => {
                0.5 * (first.value - second.value).abs()
            }
            Self::CELL => 0.0,
            _ => error,
        }
    }

    fn value_gradient(&self, output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Vec3 {
        let (first, second, _) = self.nearest(inputs, ctx);
        let local = match output {
            Self::DISTANCE_1 => first.gradient,
            Self::DISTANCE_2 => second.gradient,
            _ => return Vec3::ZERO,
        };
        chain(local, inputs.position_gradients(0, ctx))
    }
}
