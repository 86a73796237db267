// SPDX-License-Identifier: MIT OR Apache-2.0
//! RGB color values produced by color ports.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// A three-channel color. Channels are not clamped.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RgbColor {
    /// Red channel
    pub red: f64,
    /// Green channel
    pub green: f64,
    /// Blue channel
    pub blue: f64,
}

impl RgbColor {
    /// Black (all channels zero)
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);
    /// White (all channels one)
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);

    /// Create a new color
    pub const fn new(red: f64, green: f64, blue: f64) -> Self {
        Self { red, green, blue }
    }

    /// A gray with every channel equal to `value`
    pub const fn gray(value: f64) -> Self {
        Self::new(value, value, value)
    }

    /// Channels as an array
    pub fn channels(self) -> [f64; 3] {
        [self.red, self.green, self.blue]
    }

    /// Mean of the three channels
    pub fn brightness(self) -> f64 {
        (self.red + self.green + self.blue) / 3.0
    }

    /// Largest absolute channel value
    pub fn max_abs_channel(self) -> f64 {
        self.red.abs().max(self.green.abs()).max(self.blue.abs())
    }

    /// Multiply every channel by a scalar
    pub fn scale(self, factor: f64) -> Self {
        Self::new(self.red * factor, self.green * factor, self.blue * factor)
    }

    /// Linear blend, `fraction` = 0 gives `self`, 1 gives `other`
    pub fn lerp(self, other: Self, fraction: f64) -> Self {
        self.scale(1.0 - fraction) + other.scale(fraction)
    }

    /// Build a color from hue (degrees), saturation and value
    pub fn from_hsv(hue: f64, saturation: f64, value: f64) -> Self {
        if saturation <= 0.0 {
            return Self::gray(value);
        }
        let hue = hue.rem_euclid(360.0) / 60.0;
        let sector = hue.floor();
        let f = hue - sector;
        let p = value * (1.0 - saturation);
        let q = value * (1.0 - saturation * f);
        let t = value * (1.0 - saturation * (1.0 - f));
        match sector as u32 {
            0 => Self::new(value, t, p),
            1 => Self::new(q, value, p),
            2 => Self::new(p, value, t),
            3 => Self::new(p, q, value),
            4 => Self::new(t, p, value),
            _ => Self::new(value, p, q),
        }
    }

    /// Convert to (hue in degrees, saturation, value)
    pub fn to_hsv(self) -> (f64, f64, f64) {
        let max = self.red.max(self.green).max(self.blue);
        let min = self.red.min(self.green).min(self.blue);
        let delta = max - min;
        let mut hue = if delta == 0.0 {
            0.0
        } else if self.red == max {
            60.0 * (self.green - self.blue) / delta
        } else if self.green == max {
            60.0 * (self.blue - self.red) / delta + 120.0
        } else {
            60.0 * (self.red - self.green) / delta + 240.0
        };
        if hue < 0.0 {
            hue += 360.0;
        }
        let saturation = if max == 0.0 { 0.0 } else { delta / max };
        (hue, saturation, max)
    }
}

impl Add for RgbColor {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.red + rhs.red, self.green + rhs.green, self.blue + rhs.blue)
    }
}

impl Sub for RgbColor {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.red - rhs.red, self.green - rhs.green, self.blue - rhs.blue)
    }
}

/// Channel-wise product
impl Mul for RgbColor {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::new(self.red * rhs.red, self.green * rhs.green, self.blue * rhs.blue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: RgbColor, b: RgbColor) {
        assert!((a - b).max_abs_channel() < 1e-12, "{a:?} != {b:?}");
    }

    #[test]
    fn test_hsv_primaries() {
        assert_close(RgbColor::from_hsv(0.0, 1.0, 1.0), RgbColor::new(1.0, 0.0, 0.0));
        assert_close(RgbColor::from_hsv(120.0, 1.0, 1.0), RgbColor::new(0.0, 1.0, 0.0));
        assert_close(RgbColor::from_hsv(240.0, 1.0, 1.0), RgbColor::new(0.0, 0.0, 1.0));
        assert_close(RgbColor::from_hsv(360.0, 1.0, 0.5), RgbColor::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn test_hsv_round_trip_of_mixed_color() {
        let color = RgbColor::new(0.2, 0.4, 0.6);
        let (h, s, v) = color.to_hsv();
        assert!((h - 210.0).abs() < 1e-9);
        assert_close(RgbColor::from_hsv(h, s, v), color);
    }

    #[test]
    fn test_gray_has_no_hue() {
        assert_eq!(RgbColor::gray(0.3).to_hsv(), (0.0, 0.0, 0.3));
        assert_eq!(RgbColor::BLACK.to_hsv(), (0.0, 0.0, 0.0));
    }
}
