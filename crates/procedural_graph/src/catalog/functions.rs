// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unary functions, interpolation and blur control.
//!
//! Nonlinear functions average over the input's error interval
//! `[x - e, x + e]` using their antiderivative, so a blurred input yields the
//! mean of the function rather than the function of the mean.

use crate::color::RgbColor;
use crate::evaluation::{EvaluationContext, Inputs};
use crate::math::Vec3;
use crate::module::{Category, Module, ModuleSignature};
use crate::port::{Port, PortKind};

fn unary(type_id: &'static str, name: &'static str, output: &'static str, default: f64) -> ModuleSignature {
    ModuleSignature::new(
        type_id,
        name,
        Category::Functions,
        vec![Port::scalar("Value", default)],
        vec![Port::output(output, PortKind::Scalar)],
    )
}

/// Mean of |x| over `[x - e, x + e]`
pub(crate) fn mean_abs(x: f64, e: f64) -> f64 {
    if x.abs() < e {
        // interval straddles zero
        (x * x + e * e) / (2.0 * e)
    } else {
        x.abs()
    }
}

/// Slope of [`mean_abs`] with respect to `x`
pub(crate) fn mean_abs_slope(x: f64, e: f64) -> f64 {
    if x.abs() < e {
        x / e
    } else {
        x.signum()
    }
}

/// Mean of e^x over `[x - e, x + e]`
pub(crate) fn mean_exp(x: f64, e: f64) -> f64 {
    if e == 0.0 {
        x.exp()
    } else {
        ((x + e).exp() - (x - e).exp()) / (2.0 * e)
    }
}

/// Mean of sin(x) over `[x - e, x + e]`
pub(crate) fn mean_sin(x: f64, e: f64) -> f64 {
    if e == 0.0 {
        x.sin()
    } else {
        ((x - e).cos() - (x + e).cos()) / (2.0 * e)
    }
}

/// Mean of cos(x) over `[x - e, x + e]`
pub(crate) fn mean_cos(x: f64, e: f64) -> f64 {
    if e == 0.0 {
        x.cos()
    } else {
        ((x + e).sin() - (x - e).sin()) / (2.0 * e)
    }
}

/// Largest error reported by the periodic functions
const PERIODIC_ERROR_CAP: f64 = 0.5;

/// Error of a periodic function with slope `derivative` at the input
pub(crate) fn periodic_error(derivative: f64, e: f64) -> f64 {
    (derivative * e).abs().min(PERIODIC_ERROR_CAP)
}

/// |x|
#[derive(Debug, Clone, Default)]
pub struct Abs;

impl Module for Abs {
    fn signature(&self) -> ModuleSignature {
        unary("abs", "Abs", "Abs", 0.0)
    }

    fn average_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        mean_abs(inputs.value(0, ctx), inputs.error(0, ctx))
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        inputs.error(0, ctx)
    }

    fn value_gradient(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Vec3 {
        let slope = mean_abs_slope(inputs.value(0, ctx), inputs.error(0, ctx));
        inputs.gradient(0, ctx) * slope
    }
}

/// e^x
#[derive(Debug, Clone, Default)]
pub struct Exp;

impl Module for Exp {
    fn signature(&self) -> ModuleSignature {
        unary("exp", "Exp", "Exp", 0.0)
    }

    fn average_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        mean_exp(inputs.value(0, ctx), inputs.error(0, ctx))
    }

    fn value_error(&self, output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        inputs.error(0, ctx) * self.average_value(output, inputs, ctx)
    }

    fn value_gradient(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Vec3 {
        inputs.gradient(0, ctx) * inputs.value(0, ctx).exp()
    }
}

/// sin(x)
#[derive(Debug, Clone, Default)]
pub struct Sine;

impl Module for Sine {
    fn signature(&self) -> ModuleSignature {
        unary("sine", "Sin", "Sine", 0.0)
    }

    fn average_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        mean_sin(inputs.value(0, ctx), inputs.error(0, ctx))
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        periodic_error(inputs.value(0, ctx).cos(), inputs.error(0, ctx))
    }

    fn value_gradient(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Vec3 {
        inputs.gradient(0, ctx) * inputs.value(0, ctx).cos()
    }
}

/// cos(x)
#[derive(Debug, Clone, Default)]
pub struct Cosine;

impl Module for Cosine {
    fn signature(&self) -> ModuleSignature {
        unary("cosine", "Cos", "Cosine", 0.0)
    }

    fn average_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        mean_cos(inputs.value(0, ctx), inputs.error(0, ctx))
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        periodic_error(inputs.value(0, ctx).sin(), inputs.error(0, ctx))
    }

    fn value_gradient(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Vec3 {
        inputs.gradient(0, ctx) * -inputs.value(0, ctx).sin()
    }
}

/// Mean of `clamp(f, 0, 1)` over `[f - e, f + e]`
pub(crate) fn mean_fraction(fraction: f64, error: f64) -> f64 {
    let (min, max) = (fraction - error, fraction + error);
    if max <= 0.0 {
        0.0
    } else if min >= 1.0 {
        1.0
    } else if min < 0.0 || max > 1.0 {
        let above = (max - 1.0).max(0.0);
        let (lo, hi) = (min.max(0.0), max.min(1.0));
        (above + 0.5 * (hi + lo) * (hi - lo)) / (2.0 * error)
    } else {
        fraction
    }
}

/// Linear interpolation between two values
#[derive(Debug, Clone, Default)]
pub struct Interpolate;

impl Interpolate {
    fn fraction(inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        mean_fraction(inputs.value(2, ctx), inputs.error(2, ctx))
    }
}

impl Module for Interpolate {
    fn signature(&self) -> ModuleSignature {
        ModuleSignature::new(
            "interpolate",
            "Interpolate",
            Category::Functions,
            vec![
                Port::scalar("Value 1", 0.0),
                Port::scalar("Value 2", 1.0),
                Port::scalar("Fraction", 0.0),
            ],
            vec![Port::output("Interpolate", PortKind::Scalar)],
        )
    }

    fn average_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        let f = Self::fraction(inputs, ctx);
        // skip the side with zero weight
        let a = if f == 1.0 { 0.0 } else { inputs.value(0, ctx) };
        let b = if f == 0.0 { 0.0 } else { inputs.value(1, ctx) };
        (1.0 - f) * a + f * b
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        let f = Self::fraction(inputs, ctx);
        (1.0 - f) * inputs.error(0, ctx) + f * inputs.error(1, ctx)
    }

    fn value_gradient(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Vec3 {
        let f = Self::fraction(inputs, ctx);
        let mut gradient = Vec3::ZERO;
        if f != 1.0 {
            gradient += inputs.gradient(0, ctx) * (1.0 - f);
        }
        if f != 0.0 {
            gradient += inputs.gradient(1, ctx) * f;
        }
        gradient
    }
}

/// Pulls its input with additional blur
#[derive(Debug, Clone, Default)]
pub struct Blur;

impl Blur {
    fn widened<'a>(inputs: &Inputs<'_>, ctx: EvaluationContext<'a>) -> EvaluationContext<'a> {
        let extra = inputs.value(0, ctx).max(0.0);
        ctx.with_blur(ctx.blur + extra)
    }
}

impl Module for Blur {
    fn signature(&self) -> ModuleSignature {
        ModuleSignature::new(
            "blur",
            "Blur",
            Category::Functions,
            vec![Port::scalar("Blur", 0.05), Port::scalar("Input", 0.0)],
            vec![Port::output("Output", PortKind::Scalar)],
        )
    }

    fn average_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        inputs.value(1, Self::widened(inputs, ctx))
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        inputs.error(1, Self::widened(inputs, ctx))
    }

    fn value_gradient(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Vec3 {
        inputs.gradient(1, Self::widened(inputs, ctx))
    }
}

/// Passes a scalar and a color through, tracing what it sees
#[derive(Debug, Clone)]
pub struct DebugTap {
    /// Label attached to trace events
    pub label: String,
}

impl Default for DebugTap {
    fn default() -> Self {
        Self {
            label: "debug".to_string(),
        }
    }
}

impl Module for DebugTap {
    fn signature(&self) -> ModuleSignature {
        ModuleSignature::new(
            "debug",
            "Debug",
            Category::Functions,
            vec![Port::scalar("Input", 0.0), Port::color("Color Input", RgbColor::BLACK)],
            vec![
                Port::output("Output", PortKind::Scalar),
                Port::output("Color Output", PortKind::Color),
            ],
        )
    }

    fn average_value(&self, output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        if output == 1 {
            return self.color_value(output, inputs, ctx).brightness();
        }
        let value = inputs.value(0, ctx);
        tracing::trace!(
            label = %self.label,
            x = ctx.point.position.x,
            y = ctx.point.position.y,
            z = ctx.point.position.z,
            t = ctx.point.time,
            blur = ctx.blur,
            value,
            "debug value"
        );
        value
    }

    fn color_value(&self, output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> RgbColor {
        if output == 0 {
            return RgbColor::gray(self.average_value(output, inputs, ctx));
        }
        let color = inputs.color(1, ctx);
        tracing::trace!(
            label = %self.label,
            blur = ctx.blur,
            red = color.red,
            green = color.green,
            blue = color.blue,
            "debug color"
        );
        color
    }

    fn value_error(&self, output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        if output == 0 {
            inputs.error(0, ctx)
        } else {
            inputs.error(1, ctx)
        }
    }

    fn value_gradient(&self, output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Vec3 {
        if output == 0 {
            inputs.gradient(0, ctx)
        } else {
            Vec3::ZERO
        }
    }
}
