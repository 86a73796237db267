// SPDX-License-Identifier: MIT OR Apache-2.0
//! Equality tests.
//!
//! Comparisons are discrete decisions, so their error estimate is the
//! comparison tolerance rather than a function of blur.

use crate::color::RgbColor;
use crate::evaluation::{EvaluationContext, Inputs};
use crate::math::Vec3;
use crate::module::{Category, Module, ModuleSignature, Parameter, ParameterError, ParameterValue};
use crate::port::{Port, PortKind};

/// Tolerance used by the equality modules
pub const EQUALITY_TOLERANCE: f64 = 1.0e-12;

/// `false` when `a` and `b` differ by more than the tolerance. NaN never matches.
fn matches(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

fn colors_match(a: RgbColor, b: RgbColor, tolerance: f64) -> bool {
    a.channels()
        .into_iter()
        .zip(b.channels())
        .all(|(x, y)| matches(x, y, tolerance))
}

/// Selects between two values depending on whether its comparison pairs
/// are equal.
///
/// Pairs are checked in port order: the color pair, then the four scalar
/// pairs. A pair takes part only when its first input is bound; the second
/// input falls back to its default. The first mismatch selects the false
/// branch without looking at later pairs. When no pair takes part the
/// result is false.
#[derive(Debug, Clone, Default)]
pub struct Equality;

impl Equality {
    /// Input carrying the false branch
    pub const FALSE: usize = 0;
    /// Input carrying the true branch
    pub const TRUE: usize = 1;
    /// First color of the color pair
    pub const COLOR_1: usize = 2;
    /// Second color of the color pair
    pub const COLOR_2: usize = 7;

    /// First input of scalar pair `pair` (0..4)
    pub const fn scalar_1(pair: usize) -> usize {
        3 + pair
    }

    /// Second input of scalar pair `pair` (0..4)
    pub const fn scalar_2(pair: usize) -> usize {
        8 + pair
    }

    /// Run the comparison
    pub fn is_equal(inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> bool {
        let mut compared = false;

        if inputs.is_bound(Self::COLOR_1) {
            let a = inputs.color(Self::COLOR_1, ctx);
            let b = inputs.color(Self::COLOR_2, ctx);
            if !colors_match(a, b, EQUALITY_TOLERANCE) {
                return false;
            }
            compared = true;
        }

        for pair in 0..4 {
            if !inputs.is_bound(Self::scalar_1(pair)) {
                continue;
            }
            let a = inputs.value(Self::scalar_1(pair), ctx);
            let b = inputs.value(Self::scalar_2(pair), ctx);
            if !matches(a, b, EQUALITY_TOLERANCE) {
                return false;
            }
            compared = true;
        }

        compared
    }

    fn branch(inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> usize {
        if Self::is_equal(inputs, ctx) {
            Self::TRUE
        } else {
            Self::FALSE
        }
    }
}

impl Module for Equality {
    fn signature(&self) -> ModuleSignature {
        let mut inputs = vec![
            Port::scalar("False", 0.0),
            Port::scalar("True", 1.0),
            Port::color("Color 1", RgbColor::WHITE),
        ];
        inputs.extend((1..=4).map(|i| Port::scalar(format!("Scalar 1:{i}"), 1.0)));
        inputs.push(Port::color("Color 2", RgbColor::BLACK));
        inputs.extend((1..=4).map(|i| Port::scalar(format!("Scalar 2:{i}"), 0.0)));

        ModuleSignature::new(
            "equality",
            "Equality",
            Category::Comparison,
            inputs,
            vec![Port::output("True/False", PortKind::Boolean)],
        )
    }

    fn average_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        inputs.value(Self::branch(inputs, ctx), ctx)
    }

    fn value_error(&self, _output: usize, _inputs: &Inputs<'_>, _ctx: EvaluationContext<'_>) -> f64 {
        EQUALITY_TOLERANCE
    }

    fn value_gradient(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Vec3 {
        inputs.gradient(Self::branch(inputs, ctx), ctx)
    }
}

/// 1.0 when two bound numbers are equal within a tolerance
#[derive(Debug, Clone)]
pub struct NumberEquality {
    /// Largest difference still counted as equal
    pub tolerance: f64,
}

impl Default for NumberEquality {
    fn default() -> Self {
        Self {
            tolerance: EQUALITY_TOLERANCE,
        }
    }
}

impl Module for NumberEquality {
    fn signature(&self) -> ModuleSignature {
        ModuleSignature::new(
            "number_equality",
            "Number Equality",
            Category::Comparison,
            vec![Port::scalar("Value 1", 0.0), Port::scalar("Value 2", 0.0)],
            vec![Port::output("Equal", PortKind::Boolean)],
        )
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![Parameter::positive("tolerance", self.tolerance)]
    }

    fn set_parameter(&mut self, name: &str, value: ParameterValue) -> Result<(), ParameterError> {
        match name {
            "tolerance" => self.tolerance = value.positive(name)?,
            _ => return Err(ParameterError::unknown(name)),
        }
        Ok(())
    }

    fn average_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        if !(inputs.is_bound(0) && inputs.is_bound(1)) {
            return 0.0;
        }
        let (a, b) = (inputs.value(0, ctx), inputs.value(1, ctx));
        if (a - b).abs() < self.tolerance {
            1.0
        } else {
            0.0
        }
    }

    fn value_error(&self, _output: usize, _inputs: &Inputs<'_>, _ctx: EvaluationContext<'_>) -> f64 {
        self.tolerance
    }
}

/// 1.0 when two colors are equal channel by channel
#[derive(Debug, Clone, Default)]
pub struct ColorEquality;

impl Module for ColorEquality {
    fn signature(&self) -> ModuleSignature {
        ModuleSignature::new(
            "color_equality",
            "Color Equality",
            Category::Comparison,
            vec![
                Port::color("Color 1", RgbColor::WHITE),
                Port::color("Color 2", RgbColor::BLACK),
            ],
            vec![Port::output("Equal", PortKind::Boolean)],
        )
    }

    fn average_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        let equal = colors_match(inputs.color(0, ctx), inputs.color(1, ctx), EQUALITY_TOLERANCE);
        f64::from(u8::from(equal))
    }

    fn value_error(&self, _output: usize, _inputs: &Inputs<'_>, _ctx: EvaluationContext<'_>) -> f64 {
        EQUALITY_TOLERANCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_support::{numbers, single, wired};
    use crate::catalog::{ColorConstant, Number};
    use crate::evaluation::SamplePoint;

    fn color(c: RgbColor) -> Box<dyn Module> {
        Box::new(ColorConstant::new(c))
    }

    fn number(v: f64) -> Box<dyn Module> {
        Box::new(Number::new(v))
    }

    fn evaluate(sources: Vec<(usize, Box<dyn Module>)>) -> f64 {
        let (graph, id) = wired(Box::new(Equality), sources);
        graph
            .evaluate_scalar(id, 0, &SamplePoint::default(), 0.0)
            .unwrap()
    }

    #[test]
    fn test_identical_colors_select_true() {
        let c = RgbColor::new(0.2, 0.4, 0.6);
        assert_eq!(evaluate(vec![(Equality::COLOR_1, color(c)), (Equality::COLOR_2, color(c))]), 1.0);
    }

    #[test]
    fn test_different_colors_select_false() {
        let a = RgbColor::new(0.2, 0.4, 0.6);
        let b = RgbColor::new(0.2, 0.4, 0.60001);
        assert_eq!(evaluate(vec![(Equality::COLOR_1, color(a)), (Equality::COLOR_2, color(b))]), 0.0);
    }

    #[test]
    fn test_nothing_to_compare_is_false() {
        let (graph, id) = single(Equality);
        let point = SamplePoint::default();
        assert_eq!(graph.evaluate_scalar(id, 0, &point, 0.0).unwrap(), 0.0);
        // bound branches do not count as comparisons
        assert_eq!(
            evaluate(vec![(Equality::TRUE, number(5.0)), (Equality::FALSE, number(-5.0))]),
            -5.0
        );
    }

    #[test]
    fn test_color_mismatch_short_circuits() {
        let a = RgbColor::new(0.2, 0.4, 0.6);
        let b = RgbColor::new(0.2, 0.4, 0.60001);
        let result = evaluate(vec![
            (Equality::COLOR_1, color(a)),
            (Equality::COLOR_2, color(b)),
            (Equality::scalar_1(0), number(3.0)),
            (Equality::scalar_2(0), number(3.0)),
        ]);
        assert_eq!(result, 0.0);
    }

    #[test]
    fn test_scalar_pairs_and_defaults() {
        // Color 2 defaults to black
        assert_eq!(evaluate(vec![(Equality::COLOR_1, color(RgbColor::BLACK))]), 1.0);
        // second of the pair defaults to 0.0
        assert_eq!(evaluate(vec![(Equality::scalar_1(2), number(0.0))]), 1.0);
        assert_eq!(evaluate(vec![(Equality::scalar_1(2), number(1e-9))]), 0.0);
        // a later mismatch still fails
        assert_eq!(
            evaluate(vec![
                (Equality::scalar_1(0), number(1.0)),
                (Equality::scalar_2(0), number(1.0)),
                (Equality::scalar_1(3), number(2.0)),
            ]),
            0.0
        );
        // an unbound first input skips the pair
        assert_eq!(
            evaluate(vec![
                (Equality::scalar_2(1), number(7.0)),
                (Equality::scalar_1(0), number(1.0)),
                (Equality::scalar_2(0), number(1.0)),
            ]),
            1.0
        );
    }

    #[test]
    fn test_branches_are_pulled() {
        let result = evaluate(vec![
            (Equality::scalar_1(0), number(4.0)),
            (Equality::scalar_2(0), number(4.0)),
            (Equality::TRUE, number(0.25)),
        ]);
        assert_eq!(result, 0.25);
    }

    #[test]
    fn test_nan_is_a_mismatch() {
        assert_eq!(
            evaluate(vec![
                (Equality::scalar_1(0), number(f64::NAN)),
                (Equality::scalar_2(0), number(f64::NAN)),
            ]),
            0.0
        );
    }

    #[test]
    fn test_error_is_tolerance() {
        let (graph, id) = single(Equality);
        let point = SamplePoint::default();
        for blur in [0.0, 0.5, 10.0] {
            assert_eq!(graph.estimate_error(id, 0, &point, blur).unwrap(), EQUALITY_TOLERANCE);
        }
    }

    #[test]
    fn test_port_layout() {
        let signature = Equality.signature();
        let names: Vec<_> = signature.inputs.iter().map(|p| p.description()).collect();
        assert_eq!(names[0], "False (0)");
        assert_eq!(names[1], "True (1)");
        assert_eq!(names[2], "Color 1 (white)");
        assert_eq!(names[3], "Scalar 1:1 (1)");
        assert_eq!(names[7], "Color 2 (black)");
        assert_eq!(names[11], "Scalar 2:4 (0)");
        assert_eq!(signature.outputs[0].kind, PortKind::Boolean);
    }

    #[test]
    fn test_number_and_color_equality() {
        let point = SamplePoint::default();
        let (graph, id) = wired(Box::new(NumberEquality::default()), numbers(&[(0, 0.5), (1, 0.5)]));
        assert_eq!(graph.evaluate_scalar(id, 0, &point, 0.0).unwrap(), 1.0);
        let (graph, id) = wired(Box::new(NumberEquality::default()), numbers(&[(0, 0.0)]));
        assert_eq!(graph.evaluate_scalar(id, 0, &point, 0.0).unwrap(), 0.0);

        let (graph, id) = single(ColorEquality);
        assert_eq!(graph.evaluate_scalar(id, 0, &point, 0.0).unwrap(), 0.0);
        let (graph, id) = wired(Box::new(ColorEquality), vec![(0, color(RgbColor::BLACK))]);
        assert_eq!(graph.evaluate_scalar(id, 0, &point, 0.0).unwrap(), 1.0);
    }
}
