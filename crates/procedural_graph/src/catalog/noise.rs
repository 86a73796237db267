// SPDX-License-Identifier: MIT OR Apache-2.0
//! Band-limited fractal noise.
//!
//! Octave `i` has frequency `2^i`. An octave whose frequency reaches the
//! cutoff `0.5 / max(input error)` would alias across the sample footprint,
//! so it is dropped: its area average is zero. Octaves above half the cutoff
//! fade out linearly. This makes noise values blur-aware without sampling.

use crate::evaluation::{Coordinate, EvaluationContext, Inputs};
use crate::math::Vec3;
use crate::module::{Category, Module, ModuleSignature, Parameter, ParameterError, ParameterValue};
use crate::port::{Port, PortKind};

/// Largest number of octaves a fractal module accepts
pub const MAX_OCTAVES: i64 = 16;

/// Error reported where the pattern is singular
const SINGULAR_ERROR: f64 = 1.0e6;

/// SplitMix64 finalizer
fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Hash of an integer lattice point
pub(crate) fn lattice_hash(x: i64, y: i64, z: i64) -> u64 {
    mix(mix(mix(x as u64) ^ y as u64) ^ z as u64)
}

/// Map a hash to `[0, 1)` with 53 bits of precision
pub(crate) fn unit_random(hash: u64) -> f64 {
    (hash >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
}

/// The twelve edge directions of a cube
const GRADIENTS: [[f64; 3]; 12] = [
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
    [1.0, -1.0, 0.0],
    [-1.0, -1.0, 0.0],
    [1.0, 0.0, 1.0],
    [-1.0, 0.0, 1.0],
    [1.0, 0.0, -1.0],
    [-1.0, 0.0, -1.0],
    [0.0, 1.0, 1.0],
    [0.0, -1.0, 1.0],
    [0.0, 1.0, -1.0],
    [0.0, -1.0, -1.0],
];

fn fade(t: f64) -> (f64, f64) {
    let value = t * t * t * (t * (t * 6.0 - 15.0) + 10.0);
    let slope = 30.0 * t * t * (t * (t - 2.0) + 1.0);
    (value, slope)
}

/// Gradient noise at `p` and its spatial gradient. Values lie roughly in [-1, 1].
pub fn gradient_noise(p: Vec3) -> (f64, Vec3) {
    let cell = [p.x.floor(), p.y.floor(), p.z.floor()];
    let local = [p.x - cell[0], p.y - cell[1], p.z - cell[2]];
    let faded = [fade(local[0]), fade(local[1]), fade(local[2])];

    let mut value = 0.0;
    let mut gradient = [0.0; 3];
    for corner in 0..8_usize {
        let offset = [corner & 1, (corner >> 1) & 1, (corner >> 2) & 1];
        let hash = lattice_hash(
            cell[0] as i64 + offset[0] as i64,
            cell[1] as i64 + offset[1] as i64,
            cell[2] as i64 + offset[2] as i64,
        );
        let g = GRADIENTS[(hash % 12) as usize];

        let d = [
            local[0] - offset[0] as f64,
            local[1] - offset[1] as f64,
            local[2] - offset[2] as f64,
        ];
        let dot = g[0] * d[0] + g[1] * d[1] + g[2] * d[2];

        // trilinear weight and its derivative along each axis
        let mut weight = [0.0; 3];
        let mut slope = [0.0; 3];
        for axis in 0..3 {
            let (s, ds) = faded[axis];
            if offset[axis] == 1 {
                weight[axis] = s;
                slope[axis] = ds;
            } else {
                weight[axis] = 1.0 - s;
                slope[axis] = -ds;
            }
        }
        let w = weight[0] * weight[1] * weight[2];

        value += w * dot;
        gradient[0] += slope[0] * weight[1] * weight[2] * dot + w * g[0];
        gradient[1] += weight[0] * slope[1] * weight[2] * dot + w * g[1];
        gradient[2] += weight[0] * weight[1] * slope[2] * dot + w * g[2];
    }
    (value, Vec3::from(gradient))
}

/// How octaves are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FractalMode {
    /// Signed sum
    Noise,
    /// Sum of absolute values
    Turbulence,
}

/// Value, error and gradient computed together
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Estimate {
    pub value: f64,
    pub error: f64,
    pub gradient: Vec3,
}

/// Offset keeping the lattice origin away from the world origin
const LATTICE_OFFSET: f64 = 123.456;

/// Sum octaves of gradient noise at `p`, where `size` is the per-axis error
/// of `p`. The gradient is with respect to `p`.
pub(crate) fn fractal(
    p: Vec3,
    size: Vec3,
    octaves: u32,
    amplitude: f64,
    persistence: f64,
    mode: FractalMode,
) -> Estimate {
    let cutoff = 0.5 / size.max_component();
    let mut amp = amplitude;
    let mut scale = 1.0;
    let mut estimate = Estimate {
        value: 0.0,
        error: 0.0,
        gradient: Vec3::ZERO,
    };

    for _ in 0..octaves {
        if scale >= cutoff {
            break;
        }
        let q = p * scale + Vec3::splat(LATTICE_OFFSET);
        let (n, g) = gradient_noise(q);
        let mut d = amp * n;
        let mut slope = g * (amp * scale);
        if mode == FractalMode::Turbulence && d < 0.0 {
            d = -d;
            slope = -slope;
        }
        estimate.error += (size.x * slope.x).abs() + (size.y * slope.y).abs() + (size.z * slope.z).abs();
        if scale > 0.5 * cutoff {
            let fade = 2.0 * (1.0 - scale / cutoff);
            d *= fade;
            slope = slope * fade;
        }
        estimate.value += d;
        estimate.gradient += slope;
        amp *= persistence;
        scale *= 2.0;
    }
    estimate
}

/// Position, per-axis error and Jacobian columns of inputs 0..3
fn position_inputs(inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> (Vec3, Vec3, [Vec3; 3]) {
    (
        inputs.position(0, ctx),
        inputs.position_error(0, ctx),
        inputs.position_gradients(0, ctx),
    )
}

/// Map a gradient in input space back to world space
pub(crate) fn chain(g: Vec3, jacobian: [Vec3; 3]) -> Vec3 {
    jacobian[0] * g.x + jacobian[1] * g.y + jacobian[2] * g.z
}

fn position_ports(extra: Port) -> Vec<Port> {
    vec![
        Port::coordinate("X", Coordinate::X),
        Port::coordinate("Y", Coordinate::Y),
        Port::coordinate("Z", Coordinate::Z),
        extra,
    ]
}

/// Configuration shared by the fractal modules
#[derive(Debug, Clone, PartialEq)]
pub struct FractalSettings {
    /// Number of octaves summed
    pub octaves: u32,
    /// Amplitude of the first octave
    pub amplitude: f64,
}

impl FractalSettings {
    fn parameters(&self) -> Vec<Parameter> {
        vec![
            Parameter::integer("octaves", i64::from(self.octaves), 1, MAX_OCTAVES),
            Parameter::number("amplitude", self.amplitude),
        ]
    }

    /// Returns `false` when `name` is not a fractal parameter
    fn set(&mut self, name: &str, value: &ParameterValue) -> Result<bool, ParameterError> {
        match name {
            "octaves" => self.octaves = value.integer(name, 1, MAX_OCTAVES)? as u32,
            "amplitude" => self.amplitude = value.number(name)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// Fractal gradient noise centered on 0.5
#[derive(Debug, Clone)]
pub struct Noise {
    /// Octaves and amplitude
    pub settings: FractalSettings,
}

impl Default for Noise {
    fn default() -> Self {
        Self {
            settings: FractalSettings {
                octaves: 1,
                amplitude: 1.0,
            },
        }
    }
}

impl Noise {
    fn estimate(&self, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> (Estimate, [Vec3; 3]) {
        let (p, size, jacobian) = position_inputs(inputs, ctx);
        let persistence = inputs.value(3, ctx);
        let estimate = fractal(
            p,
            size,
            self.settings.octaves,
            0.5 * self.settings.amplitude,
            persistence,
            FractalMode::Noise,
        );
        (estimate, jacobian)
    }
}

impl Module for Noise {
    fn signature(&self) -> ModuleSignature {
        ModuleSignature::new(
            "noise",
            "Noise",
            Category::Noise,
            position_ports(Port::scalar("Noise", 0.5)),
            vec![Port::output("Noise", PortKind::Scalar)],
        )
    }

    fn parameters(&self) -> Vec<Parameter> {
        self.settings.parameters()
    }

    fn set_parameter(&mut self, name: &str, value: ParameterValue) -> Result<(), ParameterError> {
        if self.settings.set(name, &value)? {
            Ok(())
        } else {
            Err(ParameterError::unknown(name))
        }
    }

    fn average_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        0.5 + self.estimate(inputs, ctx).0.value
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        self.estimate(inputs, ctx).0.error
    }

    fn value_gradient(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Vec3 {
        let (estimate, jacobian) = self.estimate(inputs, ctx);
        chain(estimate.gradient, jacobian)
    }
}

/// Sum of absolute noise octaves
#[derive(Debug, Clone)]
pub struct Turbulence {
    /// Octaves and amplitude
    pub settings: FractalSettings,
}

impl Default for Turbulence {
    fn default() -> Self {
        Self {
            settings: FractalSettings {
                octaves: 1,
                amplitude: 1.0,
            },
        }
    }
}

impl Turbulence {
    fn estimate(&self, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> (Estimate, [Vec3; 3]) {
        let (p, size, jacobian) = position_inputs(inputs, ctx);
        let persistence = inputs.value(3, ctx);
        let estimate = fractal(
            p,
            size,
            self.settings.octaves,
            self.settings.amplitude,
            persistence,
            FractalMode::Turbulence,
        );
        (estimate, jacobian)
    }
}

impl Module for Turbulence {
    fn signature(&self) -> ModuleSignature {
        ModuleSignature::new(
            "turbulence",
            "Turbulence",
            Category::Noise,
            position_ports(Port::scalar("Noise", 0.5)),
            vec![Port::output("Turbulence", PortKind::Scalar)],
        )
    }

    fn parameters(&self) -> Vec<Parameter> {
        self.settings.parameters()
    }

    fn set_parameter(&mut self, name: &str, value: ParameterValue) -> Result<(), ParameterError> {
        if self.settings.set(name, &value)? {
            Ok(())
        } else {
            Err(ParameterError::unknown(name))
        }
    }

    fn average_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        self.estimate(inputs, ctx).0.value
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        self.estimate(inputs, ctx).0.error
    }

    fn value_gradient(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Vec3 {
        let (estimate, jacobian) = self.estimate(inputs, ctx);
        chain(estimate.gradient, jacobian)
    }
}

/// Concentric rings around the Z axis, perturbed by turbulence
#[derive(Debug, Clone)]
pub struct Wood {
    /// Octaves and amplitude of the perturbation
    pub settings: FractalSettings,
    /// Distance between rings
    pub spacing: f64,
    /// Keep only the fractional part, so each ring ramps from 0 to 1
    pub fraction_only: bool,
}

impl Default for Wood {
    fn default() -> Self {
        Self {
            settings: FractalSettings {
                octaves: 2,
                amplitude: 1.0,
            },
            spacing: 0.25,
            fraction_only: true,
        }
    }
}

impl Wood {
    fn estimate(&self, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Estimate {
        let (p, size, jacobian) = position_inputs(inputs, ctx);
        let persistence = inputs.value(3, ctx);
        let turbulence = fractal(
            p,
            size,
            self.settings.octaves,
            0.5 * self.settings.amplitude,
            persistence,
            FractalMode::Turbulence,
        );

        let scale = 1.0 / self.spacing;
        let r = p.x.hypot(p.y);
        if r == 0.0 {
            return Estimate {
                value: turbulence.value,
                error: SINGULAR_ERROR,
                gradient: Vec3::ZERO,
            };
        }
        let local = Vec3::new(p.x / r * scale, p.y / r * scale, 0.0) + turbulence.gradient;
        let error = (size.x * local.x).abs() + (size.y * local.y).abs() + (size.z * local.z).abs();
        let gradient = chain(local, jacobian);
        let rings = r * scale + turbulence.value;

        if !self.fraction_only || error == 0.0 {
            let value = if self.fraction_only { rings - rings.floor() } else { rings };
            return Estimate { value, error, gradient };
        }
        if error >= 0.5 {
            // the footprint spans a whole ring
            return Estimate {
                value: 0.5,
                error: 0.5,
                gradient,
            };
        }
        let (min, max) = (rings - error, rings + error);
        let (min, max) = (min - min.floor(), max - max.floor());
        if max > min {
            Estimate {
                value: 0.5 * (max + min),
                error,
                gradient,
            }
        } else {
            // the interval wraps through a ring boundary
            Estimate {
                value: (0.5 * max * max + 0.5 * (1.0 + min) * (1.0 - min)) / (1.0 - min + max),
                error: 0.5,
                gradient: gradient * ((max - min) / (2.0 * error)),
            }
        }
    }
}

impl Module for Wood {
    fn signature(&self) -> ModuleSignature {
        ModuleSignature::new(
            "wood",
            "Wood",
            Category::Noise,
            position_ports(Port::scalar("Noise", 0.5)),
            vec![Port::output("Value", PortKind::Scalar)],
        )
    }

    fn parameters(&self) -> Vec<Parameter> {
        let mut parameters = self.settings.parameters();
        parameters.push(Parameter::positive("spacing", self.spacing));
        parameters.push(Parameter::toggle("fraction_only", self.fraction_only));
        parameters
    }

    fn set_parameter(&mut self, name: &str, value: ParameterValue) -> Result<(), ParameterError> {
        if self.settings.set(name, &value)? {
            return Ok(());
        }
        match name {
            "spacing" => self.spacing = value.positive(name)?,
            "fraction_only" => self.fraction_only = value.toggle(name)?,
            _ => return Err(ParameterError::unknown(name)),
        }
        Ok(())
    }

    fn average_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        self.estimate(inputs, ctx).value
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        self.estimate(inputs, ctx).error
    }

    fn value_gradient(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Vec3 {
        self.estimate(inputs, ctx).gradient
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_support::single;
    use crate::evaluation::SamplePoint;

    #[test]
    fn test_noise_vanishes_on_lattice() {
        for p in [Vec3::ZERO, Vec3::new(3.0, -2.0, 7.0)] {
            assert_eq!(gradient_noise(p).0, 0.0);
        }
    }

    #[test]
    fn test_noise_is_deterministic_and_bounded() {
        for i in 0..200 {
            let p = Vec3::new(i as f64 * 0.173, i as f64 * -0.311, i as f64 * 0.057);
            let (a, _) = gradient_noise(p);
            let (b, _) = gradient_noise(p);
            assert_eq!(a.to_bits(), b.to_bits());
            assert!(a.abs() <= 1.5, "noise {a} out of range at {p:?}");
        }
    }

    #[test]
    fn test_noise_gradient_matches_finite_difference() {
        let h = 1e-6;
        for p in [Vec3::new(0.3, 0.7, 0.1), Vec3::new(-4.2, 1.9, 2.6)] {
            let (_, g) = gradient_noise(p);
            for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
                let numeric = (gradient_noise(p + axis * h).0 - gradient_noise(p - axis * h).0) / (2.0 * h);
                assert!((numeric - g.dot(axis)).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_octaves_drop_above_cutoff() {
        let p = Vec3::new(0.4, 0.2, 0.9);
        let sharp = fractal(p, Vec3::ZERO, 4, 1.0, 0.5, FractalMode::Noise);
        let one = fractal(p, Vec3::ZERO, 1, 1.0, 0.5, FractalMode::Noise);
        // a footprint of 0.5 leaves a cutoff of 1: every octave is dropped
        let blurred = fractal(p, Vec3::splat(0.5), 4, 1.0, 0.5, FractalMode::Noise);
        assert_eq!(blurred.value, 0.0);
        assert_eq!(blurred.error, 0.0);
        // a cutoff of 2.5 keeps octaves 1 and 2, fading the second
        let partial = fractal(p, Vec3::splat(0.2), 4, 1.0, 0.5, FractalMode::Noise);
        assert_ne!(partial.value, sharp.value);
        assert!(partial.error > 0.0);
        assert_ne!(one.value, sharp.value);
    }

    #[test]
    fn test_turbulence_is_non_negative() {
        for i in 0..50 {
            let p = Vec3::new(i as f64 * 0.37, 0.5, i as f64 * 0.11);
            assert!(fractal(p, Vec3::ZERO, 4, 1.0, 0.5, FractalMode::Turbulence).value >= 0.0);
        }
    }

    #[test]
    fn test_noise_module_is_centered() {
        let (graph, id) = single(Noise::default());
        // a huge footprint averages all octaves away
        let point = SamplePoint::new(Vec3::new(0.3, 0.4, 0.5)).with_size(Vec3::splat(10.0));
        assert_eq!(graph.evaluate_scalar(id, 0, &point, 0.0).unwrap(), 0.5);
        assert_eq!(graph.estimate_error(id, 0, &point, 0.0).unwrap(), 0.0);
    }

    #[test]
    fn test_wood_rings() {
        let mut wood = Wood::default();
        wood.settings.amplitude = 0.0;
        let (graph, id) = single(wood);
        // r = 0.3, spacing 0.25: 1.2 rings
        let point = SamplePoint::new(Vec3::new(0.3, 0.0, 0.0));
        let value = graph.evaluate_scalar(id, 0, &point, 0.0).unwrap();
        assert!((value - 0.2).abs() < 1e-9);
        let gradient = graph.evaluate_gradient(id, 0, &point, 0.0).unwrap();
        assert!((gradient - Vec3::new(4.0, 0.0, 0.0)).length() < 1e-9);

        // footprint larger than a ring
        let blurred = point.clone().with_size(Vec3::splat(0.5));
        assert_eq!(graph.evaluate_scalar(id, 0, &blurred, 0.0).unwrap(), 0.5);
        assert_eq!(graph.estimate_error(id, 0, &blurred, 0.0).unwrap(), 0.5);
    }

    #[test]
    fn test_fractal_parameters() {
        let mut noise = Noise::default();
        noise.set_parameter("octaves", ParameterValue::Integer(6)).unwrap();
        assert_eq!(noise.settings.octaves, 6);
        assert!(noise.set_parameter("octaves", ParameterValue::Integer(0)).is_err());
        assert!(noise.set_parameter("spacing", ParameterValue::Number(1.0)).is_err());

        let mut wood = Wood::default();
        wood.set_parameter("spacing", ParameterValue::Number(0.5)).unwrap();
        wood.set_parameter("fraction_only", ParameterValue::Toggle(false)).unwrap();
        assert_eq!(wood.spacing, 0.5);
        assert!(!wood.fraction_only);
    }
}
