// SPDX-License-Identifier: MIT OR Apache-2.0
//! Constants, sample coordinates and the outputs consumed by the renderer.

use crate::color::RgbColor;
use crate::evaluation::{Coordinate, EvaluationContext, Inputs};
use crate::math::Vec3;
use crate::module::{Category, Module, ModuleSignature, Parameter, ParameterError, ParameterValue};
use crate::port::{Port, PortDefault, PortKind};

/// A constant number
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Number {
    /// Output value
    pub value: f64,
}

impl Number {
    /// Create a constant
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl Module for Number {
    fn signature(&self) -> ModuleSignature {
        ModuleSignature::new(
            "number",
            "Number",
            Category::Values,
            vec![],
            vec![Port::output("Value", PortKind::Scalar)],
        )
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![Parameter::number("value", self.value)]
    }

    fn set_parameter(&mut self, name: &str, value: ParameterValue) -> Result<(), ParameterError> {
        match name {
            "value" => self.value = value.number(name)?,
            _ => return Err(ParameterError::unknown(name)),
        }
        Ok(())
    }

    fn average_value(&self, _output: usize, _inputs: &Inputs<'_>, _ctx: EvaluationContext<'_>) -> f64 {
        self.value
    }
}

/// A constant color
#[derive(Debug, Clone, PartialEq)]
pub struct ColorConstant {
    /// Output color
    pub color: RgbColor,
}

impl ColorConstant {
    /// Create a constant
    pub fn new(color: RgbColor) -> Self {
        Self { color }
    }
}

impl Default for ColorConstant {
    fn default() -> Self {
        Self::new(RgbColor::WHITE)
    }
}

impl Module for ColorConstant {
    fn signature(&self) -> ModuleSignature {
        ModuleSignature::new(
            "color",
            "Color",
            Category::Values,
            vec![],
            vec![Port::output("Color", PortKind::Color)],
        )
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![Parameter::color("color", self.color)]
    }

    fn set_parameter(&mut self, name: &str, value: ParameterValue) -> Result<(), ParameterError> {
        match name {
            "color" => self.color = value.color(name)?,
            _ => return Err(ParameterError::unknown(name)),
        }
        Ok(())
    }

    fn average_value(&self, _output: usize, _inputs: &Inputs<'_>, _ctx: EvaluationContext<'_>) -> f64 {
        self.color.brightness()
    }

    fn color_value(&self, _output: usize, _inputs: &Inputs<'_>, _ctx: EvaluationContext<'_>) -> RgbColor {
        self.color
    }
}

/// One of the per-vertex texture parameters carried by the sample point
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextureParameter {
    /// Index into [`SamplePoint::parameters`](crate::evaluation::SamplePoint::parameters)
    pub index: usize,
    /// Value used when the sample carries no such parameter
    pub default: f64,
}

impl TextureParameter {
    /// Maximum parameter index
    pub const MAX_INDEX: i64 = 63;

    /// Read parameter `index`
    pub fn new(index: usize, default: f64) -> Self {
        Self { index, default }
    }
}

impl Module for TextureParameter {
    fn signature(&self) -> ModuleSignature {
        ModuleSignature::new(
            "parameter",
            "Parameter",
            Category::Values,
            vec![],
            vec![Port::output("Value", PortKind::Scalar)],
        )
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![
            Parameter::integer("index", self.index as i64, 0, Self::MAX_INDEX),
            Parameter::number("default", self.default),
        ]
    }

    fn set_parameter(&mut self, name: &str, value: ParameterValue) -> Result<(), ParameterError> {
        match name {
            "index" => self.index = value.integer(name, 0, Self::MAX_INDEX)? as usize,
            "default" => self.default = value.number(name)?,
            _ => return Err(ParameterError::unknown(name)),
        }
        Ok(())
    }

    fn average_value(&self, _output: usize, _inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        ctx.point
            .parameters
            .get(self.index)
            .copied()
            .unwrap_or(self.default)
    }
}

/// A component of the sample point: X, Y, Z or time
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateModule {
    /// Selected component
    pub axis: Coordinate,
}

impl CoordinateModule {
    const AXES: &'static [&'static str] = &["X", "Y", "Z", "Time"];

    /// Read one component of the sample point
    pub fn new(axis: Coordinate) -> Self {
        Self { axis }
    }
}

impl Default for CoordinateModule {
    fn default() -> Self {
        Self::new(Coordinate::X)
    }
}

impl Module for CoordinateModule {
    fn signature(&self) -> ModuleSignature {
        ModuleSignature::new(
            "coordinate",
            self.axis.label(),
            Category::Coordinates,
            vec![],
            vec![Port::output(self.axis.label(), PortKind::Scalar)],
        )
    }

    fn parameters(&self) -> Vec<Parameter> {
        let index = Coordinate::ALL.iter().position(|a| *a == self.axis).unwrap_or(0);
        vec![Parameter::choice("axis", Self::AXES, index)]
    }

    fn set_parameter(&mut self, name: &str, value: ParameterValue) -> Result<(), ParameterError> {
        match name {
            "axis" => self.axis = Coordinate::ALL[value.choice(name, Coordinate::ALL.len())?],
            _ => return Err(ParameterError::unknown(name)),
        }
        Ok(())
    }

    fn average_value(&self, _output: usize, _inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        ctx.coordinate(self.axis)
    }

    fn value_error(&self, _output: usize, _inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        ctx.coordinate_error(self.axis)
    }

    fn value_gradient(&self, _output: usize, _inputs: &Inputs<'_>, _ctx: EvaluationContext<'_>) -> Vec3 {
        self.axis.gradient()
    }
}

/// A named final output of a procedure.
///
/// Passes its single input through unchanged; the renderer reads the
/// `Result` output.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    /// Channel name, e.g. `Diffuse`
    pub name: String,
    kind: PortKind,
    default: PortDefault,
}

impl Output {
    const KINDS: &'static [&'static str] = &["Number", "Color"];

    /// A scalar output
    pub fn scalar(name: impl Into<String>, default: f64) -> Self {
        Self {
            name: name.into(),
            kind: PortKind::Scalar,
            default: PortDefault::Scalar(default),
        }
    }

    /// A color output
    pub fn color(name: impl Into<String>, default: RgbColor) -> Self {
        Self {
            name: name.into(),
            kind: PortKind::Color,
            default: PortDefault::Color(default),
        }
    }

    /// Kind of value this output carries
    pub fn kind(&self) -> PortKind {
        self.kind
    }

    /// Value used while nothing is bound
    pub fn default_value(&self) -> PortDefault {
        self.default
    }

    /// The outputs of a standard texture procedure
    pub fn texture_channels() -> Vec<Output> {
        vec![
            Self::color("Diffuse", RgbColor::WHITE),
            Self::color("Specular", RgbColor::WHITE),
            Self::color("Transparent", RgbColor::WHITE),
            Self::color("Emissive", RgbColor::BLACK),
            Self::scalar("Transparency", 0.0),
            Self::scalar("Specularity", 0.0),
            Self::scalar("Shininess", 0.0),
            Self::scalar("Roughness", 0.0),
            Self::scalar("Cloudiness", 0.0),
            Self::scalar("BumpHeight", 0.0),
            Self::scalar("Displacement", 0.0),
        ]
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::scalar("Output", 0.0)
    }
}

impl Module for Output {
    fn signature(&self) -> ModuleSignature {
        ModuleSignature::new(
            "output",
            self.name.clone(),
            Category::Output,
            vec![Port::input("Value", self.kind).with_default(self.default)],
            vec![Port::output("Result", self.kind)],
        )
    }

    fn parameters(&self) -> Vec<Parameter> {
        match self.default {
            PortDefault::Color(c) => vec![
                Parameter::choice("kind", Self::KINDS, 1),
                Parameter::color("default", c),
            ],
            PortDefault::Scalar(v) => vec![
                Parameter::choice("kind", Self::KINDS, 0),
                Parameter::number("default", v),
            ],
            PortDefault::Boolean(_) | PortDefault::Coordinate(_) => {
                vec![Parameter::choice("kind", Self::KINDS, 0)]
            }
        }
    }

    fn set_parameter(&mut self, name: &str, value: ParameterValue) -> Result<(), ParameterError> {
        match name {
            "kind" => match (value.choice(name, Self::KINDS.len())?, self.default) {
                (0, PortDefault::Color(c)) => {
                    self.kind = PortKind::Scalar;
                    self.default = PortDefault::Scalar(c.brightness());
                }
                (1, PortDefault::Scalar(v)) => {
                    self.kind = PortKind::Color;
                    self.default = PortDefault::Color(RgbColor::gray(v));
                }
                _ => {}
            },
            "default" => {
                self.default = match self.kind {
                    PortKind::Color => PortDefault::Color(value.color(name)?),
                    PortKind::Scalar | PortKind::Boolean => PortDefault::Scalar(value.number(name)?),
                }
            }
            _ => return Err(ParameterError::unknown(name)),
        }
        Ok(())
    }

    fn average_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        inputs.value(0, ctx)
    }

    fn color_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> RgbColor {
        inputs.color(0, ctx)
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        inputs.error(0, ctx)
    }

    fn value_gradient(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Vec3 {
        inputs.gradient(0, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_support::single;
    use crate::evaluation::SamplePoint;

    #[test]
    fn test_texture_channels() {
        let channels = Output::texture_channels();
        assert_eq!(channels.len(), 11);
        assert_eq!(channels[0].name, "Diffuse");
        assert_eq!(channels[3].default_value(), PortDefault::Color(RgbColor::BLACK));
        assert!(channels[4..].iter().all(|c| c.kind() == PortKind::Scalar));
    }

    #[test]
    fn test_unbound_outputs_yield_defaults() {
        let point = SamplePoint::default();
        let (graph, id) = single(Output::color("Diffuse", RgbColor::WHITE));
        assert_eq!(graph.evaluate_color(id, 0, &point, 0.0).unwrap(), RgbColor::WHITE);
        let (graph, id) = single(Output::scalar("Roughness", 0.25));
        assert_eq!(graph.evaluate_scalar(id, 0, &point, 0.0).unwrap(), 0.25);
    }

    #[test]
    fn test_texture_parameter_falls_back() {
        let (graph, id) = single(TextureParameter::new(1, 0.75));
        let with = SamplePoint::default().with_parameters(vec![0.1, 0.2]);
        let without = SamplePoint::default().with_parameters(vec![0.1]);
        assert_eq!(graph.evaluate_scalar(id, 0, &with, 0.0).unwrap(), 0.2);
        assert_eq!(graph.evaluate_scalar(id, 0, &without, 0.0).unwrap(), 0.75);
    }

    #[test]
    fn test_coordinate_time_has_no_error() {
        let point = SamplePoint::new(Vec3::new(1.0, 2.0, 3.0))
            .with_size(Vec3::splat(1.0))
            .with_time(4.0);
        let (graph, id) = single(CoordinateModule::new(Coordinate::Time));
        assert_eq!(graph.evaluate_scalar(id, 0, &point, 0.5).unwrap(), 4.0);
        assert_eq!(graph.estimate_error(id, 0, &point, 0.5).unwrap(), 0.0);
        let (graph, id) = single(CoordinateModule::new(Coordinate::Z));
        assert_eq!(graph.estimate_error(id, 0, &point, 0.5).unwrap(), 1.0);
        assert_eq!(graph.evaluate_gradient(id, 0, &point, 0.0).unwrap(), Vec3::Z);
    }

    #[test]
    fn test_set_parameters() {
        let mut number = Number::default();
        number.set_parameter("value", ParameterValue::Number(3.5)).unwrap();
        assert_eq!(number.value, 3.5);
        assert!(number.set_parameter("color", ParameterValue::Number(1.0)).is_err());

        let mut axis = CoordinateModule::default();
        axis.set_parameter("axis", ParameterValue::Choice(3)).unwrap();
        assert_eq!(axis.axis, Coordinate::Time);
        assert!(axis.set_parameter("axis", ParameterValue::Choice(4)).is_err());

        let mut output = Output::scalar("Bump", 0.5);
        output.set_parameter("kind", ParameterValue::Choice(1)).unwrap();
        assert_eq!(output.kind(), PortKind::Color);
        assert_eq!(output.default_value(), PortDefault::Color(RgbColor::gray(0.5)));
    }
}
