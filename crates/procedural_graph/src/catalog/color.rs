// SPDX-License-Identifier: MIT OR Apache-2.0
//! Color composition.
//!
//! The error of a color output bounds the change of its largest channel.

use super::functions::mean_fraction;
use crate::color::RgbColor;
use crate::evaluation::{EvaluationContext, Inputs};
use crate::module::{Category, Module, ModuleSignature};
use crate::port::{Port, PortKind};

fn color_binary(type_id: &'static str, name: &'static str, a: RgbColor, b: RgbColor) -> ModuleSignature {
    ModuleSignature::new(
        type_id,
        name,
        Category::Color,
        vec![Port::color("Color 1", a), Port::color("Color 2", b)],
        vec![Port::output(name, PortKind::Color)],
    )
}

/// Channel-wise sum
#[derive(Debug, Clone, Default)]
pub struct ColorSum;

impl Module for ColorSum {
    fn signature(&self) -> ModuleSignature {
        color_binary("color_sum", "Sum", RgbColor::BLACK, RgbColor::BLACK)
    }

    fn color_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> RgbColor {
        inputs.color(0, ctx) + inputs.color(1, ctx)
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        inputs.error(0, ctx) + inputs.error(1, ctx)
    }
}

/// Channel-wise difference
#[derive(Debug, Clone, Default)]
pub struct ColorDifference;

impl Module for ColorDifference {
    fn signature(&self) -> ModuleSignature {
        color_binary("color_difference", "Difference", RgbColor::BLACK, RgbColor::BLACK)
    }

    fn color_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> RgbColor {
        inputs.color(0, ctx) - inputs.color(1, ctx)
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        inputs.error(0, ctx) + inputs.error(1, ctx)
    }
}

/// Channel-wise product
#[derive(Debug, Clone, Default)]
pub struct ColorProduct;

impl Module for ColorProduct {
    fn signature(&self) -> ModuleSignature {
        color_binary("color_product", "Product", RgbColor::WHITE, RgbColor::WHITE)
    }

    fn color_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> RgbColor {
        inputs.color(0, ctx) * inputs.color(1, ctx)
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        let a = inputs.color(0, ctx).max_abs_channel();
        let b = inputs.color(1, ctx).max_abs_channel();
        a * inputs.error(1, ctx) + b * inputs.error(0, ctx)
    }
}

/// A color multiplied by a number
#[derive(Debug, Clone, Default)]
pub struct ColorScale;

impl Module for ColorScale {
    fn signature(&self) -> ModuleSignature {
        ModuleSignature::new(
            "color_scale",
            "Scale",
            Category::Color,
            vec![Port::color("Color", RgbColor::WHITE), Port::scalar("Scale", 1.0)],
            vec![Port::output("Scale", PortKind::Color)],
        )
    }

    fn color_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> RgbColor {
        inputs.color(0, ctx).scale(inputs.value(1, ctx))
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        let color = inputs.color(0, ctx).max_abs_channel();
        let scale = inputs.value(1, ctx).abs();
        color * inputs.error(1, ctx) + scale * inputs.error(0, ctx)
    }
}

/// Weighted average of two colors
#[derive(Debug, Clone, Default)]
pub struct Blend;

impl Blend {
    fn fraction(inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        mean_fraction(inputs.value(2, ctx), inputs.error(2, ctx))
    }
}

impl Module for Blend {
    fn signature(&self) -> ModuleSignature {
        ModuleSignature::new(
            "blend",
            "Blend",
            Category::Color,
            vec![
                Port::color("Color 1", RgbColor::BLACK),
                Port::color("Color 2", RgbColor::WHITE),
                Port::scalar("Fraction", 0.5),
            ],
            vec![Port::output("Blend", PortKind::Color)],
        )
    }

    fn color_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> RgbColor {
        let f = Self::fraction(inputs, ctx);
        if f == 0.0 {
            inputs.color(0, ctx)
        } else if f == 1.0 {
            inputs.color(1, ctx)
        } else {
            inputs.color(0, ctx).lerp(inputs.color(1, ctx), f)
        }
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        let f = Self::fraction(inputs, ctx);
        let spread = (inputs.color(1, ctx) - inputs.color(0, ctx)).max_abs_channel();
        (1.0 - f) * inputs.error(0, ctx)
            + f * inputs.error(1, ctx)
            + spread * inputs.error(2, ctx).min(1.0)
    }
}

/// Whichever input is chosen by a brightness comparison
fn pick(inputs: &Inputs<'_>, ctx: EvaluationContext<'_>, darker: bool) -> (usize, RgbColor) {
    let a = inputs.color(0, ctx);
    let b = inputs.color(1, ctx);
    let second = if darker {
        b.brightness() < a.brightness()
    } else {
        b.brightness() > a.brightness()
    };
    if second {
        (1, b)
    } else {
        (0, a)
    }
}

/// The darker of two colors
#[derive(Debug, Clone, Default)]
pub struct Darker;

impl Module for Darker {
    fn signature(&self) -> ModuleSignature {
        color_binary("darker", "Darker", RgbColor::WHITE, RgbColor::WHITE)
    }

    fn color_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> RgbColor {
        pick(inputs, ctx, true).1
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        inputs.error(pick(inputs, ctx, true).0, ctx)
    }
}

/// The lighter of two colors
#[derive(Debug, Clone, Default)]
pub struct Lighter;

impl Module for Lighter {
    fn signature(&self) -> ModuleSignature {
        color_binary("lighter", "Lighter", RgbColor::WHITE, RgbColor::WHITE)
    }

    fn color_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> RgbColor {
        pick(inputs, ctx, false).1
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        inputs.error(pick(inputs, ctx, false).0, ctx)
    }
}

/// Largest hue spread averaged by [`Hsv`], in turns
const MAX_HUE_SPREAD: f64 = 0.25;

/// Builds a color from hue (in turns), saturation and value
#[derive(Debug, Clone, Default)]
pub struct Hsv;

impl Hsv {
    fn components(inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> (f64, f64, f64) {
        let hue = inputs.value(0, ctx);
        let saturation = inputs.value(1, ctx).clamp(0.0, 1.0);
        let value = inputs.value(2, ctx);
        (hue, saturation, value)
    }
}

impl Module for Hsv {
    fn signature(&self) -> ModuleSignature {
        ModuleSignature::new(
            "hsv",
            "HSV",
            Category::Color,
            vec![
                Port::scalar("Hue", 1.0),
                Port::scalar("Saturation", 1.0),
                Port::scalar("Value", 1.0),
            ],
            vec![Port::output("Color", PortKind::Color)],
        )
    }

    fn color_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> RgbColor {
        let (hue, saturation, value) = Self::components(inputs, ctx);
        let spread = (0.5 * inputs.error(0, ctx)).min(MAX_HUE_SPREAD);
        if spread == 0.0 {
            return RgbColor::from_hsv(hue.rem_euclid(1.0) * 360.0, saturation, value);
        }
        let low = RgbColor::from_hsv((hue - spread).rem_euclid(1.0) * 360.0, saturation, value);
        let high = RgbColor::from_hsv((hue + spread).rem_euclid(1.0) * 360.0, saturation, value);
        low.lerp(high, 0.5)
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        let (_, saturation, value) = Self::components(inputs, ctx);
        // a full turn of hue sweeps each channel through its range six times
        let hue = 6.0 * saturation * value.abs() * inputs.error(0, ctx).min(MAX_HUE_SPREAD);
        hue + value.abs() * inputs.error(1, ctx) + inputs.error(2, ctx)
    }
}

/// Builds a color from three channels
#[derive(Debug, Clone, Default)]
pub struct Rgb;

impl Module for Rgb {
    fn signature(&self) -> ModuleSignature {
        ModuleSignature::new(
            "rgb",
            "RGB",
            Category::Color,
            vec![
                Port::scalar("Red", 0.0),
                Port::scalar("Green", 0.0),
                Port::scalar("Blue", 0.0),
            ],
            vec![Port::output("Color", PortKind::Color)],
        )
    }

    fn color_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> RgbColor {
        RgbColor::new(inputs.value(0, ctx), inputs.value(1, ctx), inputs.value(2, ctx))
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        (0..3).map(|i| inputs.error(i, ctx)).fold(0.0, f64::max)
    }
}

/// Splits three channels into hue (in turns), saturation and value
#[derive(Debug, Clone, Default)]
pub struct RgbToHsv;

impl RgbToHsv {
    /// Component `which` (0 hue, 1 saturation, 2 value) of an RGB triple
    pub fn convert(color: RgbColor, which: usize) -> f64 {
        let (hue, saturation, value) = color.to_hsv();
        match which {
            0 => hue / 360.0,
            1 => saturation,
            _ => value,
        }
    }
}

impl Module for RgbToHsv {
    fn signature(&self) -> ModuleSignature {
        ModuleSignature::new(
            "rgb_to_hsv",
            "RGB to HSV",
            Category::Color,
            vec![
                Port::scalar("Red", 0.0),
                Port::scalar("Green", 0.0),
                Port::scalar("Blue", 0.0),
            ],
            vec![
                Port::output("Hue", PortKind::Scalar),
                Port::output("Saturation", PortKind::Scalar),
                Port::output("Value", PortKind::Scalar),
            ],
        )
    }

    fn average_value(&self, output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        let color = RgbColor::new(inputs.value(0, ctx), inputs.value(1, ctx), inputs.value(2, ctx));
        Self::convert(color, output)
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        (0..3).map(|i| inputs.error(i, ctx)).fold(0.0, f64::max)
    }
}
