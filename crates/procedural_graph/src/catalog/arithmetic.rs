// SPDX-License-Identifier: MIT OR Apache-2.0
//! Arithmetic on scalars.
//!
//! Blur propagates algebraically: every input is pulled at the caller's blur
//! and the operator is applied to the averaged values. Errors combine by
//! first-order bounds.

use crate::evaluation::{EvaluationContext, Inputs};
use crate::math::Vec3;
use crate::module::{Category, Module, ModuleSignature};
use crate::port::{Port, PortKind};

/// Error reported where an operator has a pole inside the input interval
pub const POLE_ERROR: f64 = 1.0e6;

/// First-order error of `a * b`
pub(crate) fn product_error(a: f64, ea: f64, b: f64, eb: f64) -> f64 {
    (a * eb).abs() + (b * ea).abs()
}

/// `b`, unless its error interval reaches zero
pub(crate) fn safe_denominator(b: f64, eb: f64) -> Option<f64> {
    if b == 0.0 || b.abs() <= eb {
        None
    } else {
        Some(b)
    }
}

/// First-order error of `a / b` for a safe denominator
pub(crate) fn ratio_error(a: f64, ea: f64, b: f64, eb: f64) -> f64 {
    (ea / b).abs() + (a * eb / (b * b)).abs()
}

fn binary(type_id: &'static str, name: &'static str, a: (&str, f64), b: (&str, f64)) -> ModuleSignature {
    ModuleSignature::new(
        type_id,
        name,
        Category::Operators,
        vec![Port::scalar(a.0, a.1), Port::scalar(b.0, b.1)],
        vec![Port::output(name, PortKind::Scalar)],
    )
}

/// a + b
#[derive(Debug, Clone, Default)]
pub struct Sum;

impl Module for Sum {
    fn signature(&self) -> ModuleSignature {
        binary("sum", "Sum", ("Value 1", 0.0), ("Value 2", 0.0))
    }

    fn average_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        inputs.value(0, ctx) + inputs.value(1, ctx)
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        inputs.error(0, ctx) + inputs.error(1, ctx)
    }

    fn value_gradient(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Vec3 {
        inputs.gradient(0, ctx) + inputs.gradient(1, ctx)
    }
}

/// a - b
#[derive(Debug, Clone, Default)]
pub struct Difference;

impl Module for Difference {
    fn signature(&self) -> ModuleSignature {
        binary("difference", "Difference", ("Value 1", 0.0), ("Value 2", 0.0))
    }

    fn average_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        inputs.value(0, ctx) - inputs.value(1, ctx)
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        inputs.error(0, ctx) + inputs.error(1, ctx)
    }

    fn value_gradient(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Vec3 {
        inputs.gradient(0, ctx) - inputs.gradient(1, ctx)
    }
}

/// a * b. An unbound factor is zero, so the other side is not evaluated.
#[derive(Debug, Clone, Default)]
pub struct Product;

impl Product {
    fn both_bound(inputs: &Inputs<'_>) -> bool {
        inputs.is_bound(0) && inputs.is_bound(1)
    }
}

impl Module for Product {
    fn signature(&self) -> ModuleSignature {
        binary("product", "Product", ("Value 1", 0.0), ("Value 2", 0.0))
    }

    fn average_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        if !Self::both_bound(inputs) {
            return 0.0;
        }
        inputs.value(0, ctx) * inputs.value(1, ctx)
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        if !Self::both_bound(inputs) {
            return 0.0;
        }
        let (a, b) = (inputs.value(0, ctx), inputs.value(1, ctx));
        product_error(a, inputs.error(0, ctx), b, inputs.error(1, ctx))
    }

    fn value_gradient(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Vec3 {
        if !Self::both_bound(inputs) {
            return Vec3::ZERO;
        }
        let (a, b) = (inputs.value(0, ctx), inputs.value(1, ctx));
        inputs.gradient(1, ctx) * a + inputs.gradient(0, ctx) * b
    }
}

/// a / b. Where the denominator interval reaches zero the value is 0 and
/// the error [`POLE_ERROR`].
#[derive(Debug, Clone, Default)]
pub struct Ratio;

impl Ratio {
    fn denominator(inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Option<f64> {
        safe_denominator(inputs.value(1, ctx), inputs.error(1, ctx))
    }
}

impl Module for Ratio {
    fn signature(&self) -> ModuleSignature {
        binary("ratio", "Ratio", ("Value 1", 0.0), ("Value 2", 1.0))
    }

    fn average_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        match Self::denominator(inputs, ctx) {
            Some(b) => inputs.value(0, ctx) / b,
            None => 0.0,
        }
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        match Self::denominator(inputs, ctx) {
            Some(b) => {
                ratio_error(inputs.value(0, ctx), inputs.error(0, ctx), b, inputs.error(1, ctx))
            }
            None => POLE_ERROR,
        }
    }

    fn value_gradient(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Vec3 {
        match Self::denominator(inputs, ctx) {
            Some(b) => {
                let a = inputs.value(0, ctx);
                (inputs.gradient(0, ctx) * b - inputs.gradient(1, ctx) * a) * (1.0 / (b * b))
            }
            None => Vec3::ZERO,
        }
    }
}

/// base ^ exponent.
///
/// Integer exponents follow ordinary arithmetic. Negative bases with a
/// fractional exponent keep their sign: `-|x|^e`.
#[derive(Debug, Clone, Default)]
pub struct Power;

impl Power {
    /// The signed power function
    pub fn apply(x: f64, e: f64) -> f64 {
        if x < 0.0 && e.fract() != 0.0 {
            -(-x).powf(e)
        } else {
            x.powf(e)
        }
    }

    /// Partial derivatives with respect to base and exponent
    pub(crate) fn partials(x: f64, e: f64) -> (f64, f64) {
        let value = Self::apply(x, e);
        let d_base = if e.fract() == 0.0 {
            e * x.powf(e - 1.0)
        } else {
            e * x.abs().powf(e - 1.0)
        };
        let d_exp = if x == 0.0 { 0.0 } else { value * x.abs().ln() };
        (d_base, d_exp)
    }

    /// Base and exponent, or `None` when a negative exponent meets a base
    /// interval that reaches zero
    fn operands(inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Option<(f64, f64)> {
        let x = inputs.value(0, ctx);
        let e = inputs.value(1, ctx);
        if Self::has_pole(x, inputs.error(0, ctx), e) {
            None
        } else {
            Some((x, e))
        }
    }

    /// A negative exponent whose base interval reaches zero
    pub(crate) fn has_pole(x: f64, ex: f64, e: f64) -> bool {
        e < 0.0 && (x == 0.0 || x.abs() <= ex)
    }

    /// Error from the partial derivatives, [`POLE_ERROR`] when not finite
    pub(crate) fn error(x: f64, ex: f64, e: f64, ee: f64) -> f64 {
        let (d_base, d_exp) = Self::partials(x, e);
        let error = (d_base * ex).abs() + (d_exp * ee).abs();
        if error.is_finite() {
            error
        } else {
            POLE_ERROR
        }
    }
}

impl Module for Power {
    fn signature(&self) -> ModuleSignature {
        binary("power", "Power", ("Base", 0.0), ("Exponent", 1.0))
    }

    fn average_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        Self::operands(inputs, ctx).map_or(0.0, |(x, e)| Self::apply(x, e))
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        match Self::operands(inputs, ctx) {
            Some((x, e)) => Self::error(x, inputs.error(0, ctx), e, inputs.error(1, ctx)),
            None => POLE_ERROR,
        }
    }

    fn value_gradient(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Vec3 {
        match Self::operands(inputs, ctx) {
            Some((x, e)) => {
                let (d_base, d_exp) = Self::partials(x, e);
                let gradient = inputs.gradient(0, ctx) * d_base + inputs.gradient(1, ctx) * d_exp;
                if gradient.length().is_finite() {
                    gradient
                } else {
                    Vec3::ZERO
                }
            }
            None => Vec3::ZERO,
        }
    }
}

/// Which input of a [`Min`]/[`Max`] is selected
fn select(inputs: &Inputs<'_>, ctx: EvaluationContext<'_>, prefer_smaller: bool) -> usize {
    let (a, b) = (inputs.value(0, ctx), inputs.value(1, ctx));
    let second = if prefer_smaller { b < a } else { b > a };
    usize::from(second)
}

/// The smaller input. Error and gradient follow the selected input.
#[derive(Debug, Clone, Default)]
pub struct Min;

impl Module for Min {
    fn signature(&self) -> ModuleSignature {
        binary("min", "Min", ("Value 1", 0.0), ("Value 2", 0.0))
    }

    fn average_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        inputs.value(0, ctx).min(inputs.value(1, ctx))
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        inputs.error(select(inputs, ctx, true), ctx)
    }

    fn value_gradient(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Vec3 {
        inputs.gradient(select(inputs, ctx, true), ctx)
    }
}

/// The larger input. Error and gradient follow the selected input.
#[derive(Debug, Clone, Default)]
pub struct Max;

impl Module for Max {
    fn signature(&self) -> ModuleSignature {
        binary("max", "Max", ("Value 1", 0.0), ("Value 2", 0.0))
    }

    fn average_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        inputs.value(0, ctx).max(inputs.value(1, ctx))
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        inputs.error(select(inputs, ctx, false), ctx)
    }

    fn value_gradient(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Vec3 {
        inputs.gradient(select(inputs, ctx, false), ctx)
    }
}
