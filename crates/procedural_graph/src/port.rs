// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for module inputs/outputs.

use crate::color::RgbColor;
use crate::evaluation::Coordinate;
use serde::{Deserialize, Serialize};

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// Kind of value that flows through a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortKind {
    /// Real number
    Scalar,
    /// Three-channel color
    Color,
    /// Truth value surfaced as 1.0 / 0.0
    Boolean,
}

impl PortKind {
    /// Display name of this kind
    pub fn label(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Color => "color",
            Self::Boolean => "boolean",
        }
    }

    /// Check if an output of this kind may feed an input of kind `input`.
    ///
    /// Scalars and booleans are interchangeable and widen to gray colors.
    /// Colors have no implicit narrowing.
    pub fn can_feed(self, input: PortKind) -> bool {
        match (self, input) {
            (Self::Color, Self::Color) => true,
            (Self::Color, _) => false,
            (Self::Scalar | Self::Boolean, _) => true,
        }
    }
}

/// Value an input yields when nothing is bound to it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PortDefault {
    /// Constant number
    Scalar(f64),
    /// Constant truth value
    Boolean(bool),
    /// Constant color
    Color(RgbColor),
    /// A component of the sample point being evaluated
    Coordinate(Coordinate),
}

impl PortDefault {
    /// The natural default for a port kind: zero, false or black
    pub fn zero(kind: PortKind) -> Self {
        match kind {
            PortKind::Scalar => Self::Scalar(0.0),
            PortKind::Boolean => Self::Boolean(false),
            PortKind::Color => Self::Color(RgbColor::BLACK),
        }
    }

    /// Check if this default is a value of `kind`
    pub fn fits(&self, kind: PortKind) -> bool {
        match self {
            Self::Color(_) => kind == PortKind::Color,
            Self::Scalar(_) | Self::Boolean(_) | Self::Coordinate(_) => kind != PortKind::Color,
        }
    }

    /// Short label for presentation, e.g. `(0.5)` or `(X)`
    pub fn label(&self) -> String {
        match self {
            Self::Scalar(v) => format!("({v})"),
            Self::Boolean(b) => format!("({b})"),
            Self::Color(c) if *c == RgbColor::BLACK => "(black)".to_string(),
            Self::Color(c) if *c == RgbColor::WHITE => "(white)".to_string(),
            Self::Color(c) => format!("({}, {}, {})", c.red, c.green, c.blue),
            Self::Coordinate(axis) => format!("({})", axis.label()),
        }
    }
}

/// A typed, indexed connection slot on a module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    /// Position in the module's input or output list
    pub index: usize,
    /// Port name
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Value kind
    pub kind: PortKind,
    /// Value used while the input is unbound (outputs keep the zero default)
    pub default: PortDefault,
}

impl Port {
    /// Create a new input port with the zero default for its kind
    pub fn input(name: impl Into<String>, kind: PortKind) -> Self {
        Self {
            index: 0,
            name: name.into(),
            direction: PortDirection::Input,
            kind,
            default: PortDefault::zero(kind),
        }
    }

    /// Create a new output port
    pub fn output(name: impl Into<String>, kind: PortKind) -> Self {
        Self {
            index: 0,
            name: name.into(),
            direction: PortDirection::Output,
            kind,
            default: PortDefault::zero(kind),
        }
    }

    /// Scalar input with a constant default
    pub fn scalar(name: impl Into<String>, default: f64) -> Self {
        Self::input(name, PortKind::Scalar).with_default(PortDefault::Scalar(default))
    }

    /// Color input with a constant default
    pub fn color(name: impl Into<String>, default: RgbColor) -> Self {
        Self::input(name, PortKind::Color).with_default(PortDefault::Color(default))
    }

    /// Scalar input that defaults to a sample point component
    pub fn coordinate(name: impl Into<String>, axis: Coordinate) -> Self {
        Self::input(name, PortKind::Scalar).with_default(PortDefault::Coordinate(axis))
    }

    /// Set the default value
    pub fn with_default(mut self, default: PortDefault) -> Self {
        debug_assert!(
            default.fits(self.kind),
            "default {default:?} does not fit a {} port",
            self.kind.label()
        );
        self.default = default;
        self
    }

    pub(crate) fn at(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Description shown next to the port, e.g. `Fraction (0.5)`
    pub fn description(&self) -> String {
        match self.direction {
            PortDirection::Input => format!("{} {}", self.name, self.default.label()),
            PortDirection::Output => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_compatibility() {
        assert!(PortKind::Scalar.can_feed(PortKind::Scalar));
        assert!(PortKind::Scalar.can_feed(PortKind::Boolean));
        assert!(PortKind::Boolean.can_feed(PortKind::Scalar));
        assert!(PortKind::Scalar.can_feed(PortKind::Color));
        assert!(PortKind::Color.can_feed(PortKind::Color));
        assert!(!PortKind::Color.can_feed(PortKind::Scalar));
        assert!(!PortKind::Color.can_feed(PortKind::Boolean));
    }

    #[test]
    fn test_default_values() {
        let port = Port::scalar("Fraction", 0.5);
        assert_eq!(port.direction, PortDirection::Input);
        assert_eq!(port.default, PortDefault::Scalar(0.5));
        assert_eq!(port.description(), "Fraction (0.5)");

        let port = Port::input("Color 2", PortKind::Color);
        assert_eq!(port.default, PortDefault::Color(RgbColor::BLACK));
        assert_eq!(port.description(), "Color 2 (black)");

        let port = Port::coordinate("X", Coordinate::X);
        assert_eq!(port.description(), "X (X)");
    }

    #[test]
    fn test_default_fits_kind() {
        assert!(PortDefault::Boolean(true).fits(PortKind::Scalar));
        assert!(PortDefault::Coordinate(Coordinate::Time).fits(PortKind::Scalar));
        assert!(!PortDefault::Color(RgbColor::WHITE).fits(PortKind::Boolean));
        assert!(!PortDefault::Scalar(1.0).fits(PortKind::Color));
    }
}
