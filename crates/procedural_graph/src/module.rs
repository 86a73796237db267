// SPDX-License-Identifier: MIT OR Apache-2.0
//! Module definitions: the evaluation contract every catalog entry implements,
//! the metadata it exposes to editors, and the registry of available types.

use crate::color::RgbColor;
use crate::evaluation::{EvaluationContext, Inputs};
use crate::math::Vec3;
use crate::port::{Port, PortDirection};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a module instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId(pub Uuid);

impl ModuleId {
    /// Create a new random module ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ModuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Module category, used to group the catalog for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Constants and per-sample parameters
    Values,
    /// Sample position and time
    Coordinates,
    /// Arithmetic on scalars
    Operators,
    /// Unary and interpolation functions
    Functions,
    /// Comparison and equality tests
    Comparison,
    /// Color composition
    Color,
    /// Procedural noise patterns
    Noise,
    /// Geometry derived from the sample position
    Geometry,
    /// Final outputs consumed by the renderer
    Output,
}

impl Category {
    /// Display name of this category
    pub fn label(self) -> &'static str {
        match self {
            Self::Values => "Values",
            Self::Coordinates => "Coordinates",
            Self::Operators => "Operators",
            Self::Functions => "Functions",
            Self::Comparison => "Comparison",
            Self::Color => "Color Functions",
            Self::Noise => "Patterns",
            Self::Geometry => "Geometry",
            Self::Output => "Output",
        }
    }
}

/// Ports and naming of a module type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleSignature {
    /// Unique type identifier (registry key)
    pub type_id: &'static str,
    /// Display name
    pub name: String,
    /// Category
    pub category: Category,
    /// Input ports, in index order
    pub inputs: Vec<Port>,
    /// Output ports, in index order
    pub outputs: Vec<Port>,
}

impl ModuleSignature {
    /// Create a signature; port indices follow declaration order
    pub fn new(
        type_id: &'static str,
        name: impl Into<String>,
        category: Category,
        inputs: Vec<Port>,
        outputs: Vec<Port>,
    ) -> Self {
        debug_assert!(inputs.iter().all(|p| p.direction == PortDirection::Input));
        debug_assert!(outputs.iter().all(|p| p.direction == PortDirection::Output));
        Self {
            type_id,
            name: name.into(),
            category,
            inputs: inputs.into_iter().enumerate().map(|(i, p)| p.at(i)).collect(),
            outputs: outputs.into_iter().enumerate().map(|(i, p)| p.at(i)).collect(),
        }
    }

    /// Get an input port by index
    pub fn input(&self, index: usize) -> Option<&Port> {
        self.inputs.get(index)
    }

    /// Get an output port by index
    pub fn output(&self, index: usize) -> Option<&Port> {
        self.outputs.get(index)
    }

    /// Get all ports
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.inputs.iter().chain(self.outputs.iter())
    }
}

/// Kind of a configurable module parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ParameterKind {
    /// Real number with optional bounds
    Number {
        /// Smallest accepted value
        min: Option<f64>,
        /// Largest accepted value
        max: Option<f64>,
    },
    /// Integer within bounds
    Integer {
        /// Smallest accepted value
        min: i64,
        /// Largest accepted value
        max: i64,
    },
    /// On/off switch
    Toggle,
    /// One of a fixed list of options
    Choice(&'static [&'static str]),
    /// Color
    Color,
    /// Free text, such as an expression
    Text,
}

/// Value of a module parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    /// Real number
    Number(f64),
    /// Integer
    Integer(i64),
    /// On/off switch
    Toggle(bool),
    /// Index into a choice list
    Choice(usize),
    /// Color
    Color(RgbColor),
    /// Free text
    Text(String),
}

impl ParameterValue {
    /// Read a real number (integers are accepted)
    pub fn number(&self, name: &str) -> Result<f64, ParameterError> {
        match *self {
            Self::Number(v) if v.is_finite() => Ok(v),
            Self::Number(v) => Err(ParameterError::out_of_range(name, v)),
            Self::Integer(v) => Ok(v as f64),
            _ => Err(ParameterError::wrong_type(name, "number")),
        }
    }

    /// Read a strictly positive real number
    pub fn positive(&self, name: &str) -> Result<f64, ParameterError> {
        let v = self.number(name)?;
        if v > 0.0 {
            Ok(v)
        } else {
            Err(ParameterError::out_of_range(name, v))
        }
    }

    /// Read an integer within `[min, max]`
    pub fn integer(&self, name: &str, min: i64, max: i64) -> Result<i64, ParameterError> {
        let v = match *self {
            Self::Integer(v) => v,
            Self::Number(v) if v.fract() == 0.0 => v as i64,
            _ => return Err(ParameterError::wrong_type(name, "integer")),
        };
        if (min..=max).contains(&v) {
            Ok(v)
        } else {
            Err(ParameterError::out_of_range(name, v))
        }
    }

    /// Read an on/off switch
    pub fn toggle(&self, name: &str) -> Result<bool, ParameterError> {
        match *self {
            Self::Toggle(v) => Ok(v),
            _ => Err(ParameterError::wrong_type(name, "toggle")),
        }
    }

    /// Read a choice index below `count`
    pub fn choice(&self, name: &str, count: usize) -> Result<usize, ParameterError> {
        match *self {
            Self::Choice(v) if v < count => Ok(v),
            Self::Choice(v) => Err(ParameterError::out_of_range(name, v)),
            _ => Err(ParameterError::wrong_type(name, "choice")),
        }
    }

    /// Read a color
    pub fn color(&self, name: &str) -> Result<RgbColor, ParameterError> {
        match *self {
            Self::Color(v) => Ok(v),
            _ => Err(ParameterError::wrong_type(name, "color")),
        }
    }

    /// Read free text
    pub fn text(&self, name: &str) -> Result<&str, ParameterError> {
        match self {
            Self::Text(v) => Ok(v),
            _ => Err(ParameterError::wrong_type(name, "text")),
        }
    }
}

/// A module parameter with its current value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    /// Parameter name
    pub name: &'static str,
    /// Accepted values
    pub kind: ParameterKind,
    /// Current value
    pub value: ParameterValue,
}

impl Parameter {
    /// Unbounded number parameter
    pub fn number(name: &'static str, value: f64) -> Self {
        Self {
            name,
            kind: ParameterKind::Number { min: None, max: None },
            value: ParameterValue::Number(value),
        }
    }

    /// Number parameter that must be positive
    pub fn positive(name: &'static str, value: f64) -> Self {
        Self {
            name,
            kind: ParameterKind::Number { min: Some(0.0), max: None },
            value: ParameterValue::Number(value),
        }
    }

    /// Integer parameter
    pub fn integer(name: &'static str, value: i64, min: i64, max: i64) -> Self {
        Self {
            name,
            kind: ParameterKind::Integer { min, max },
            value: ParameterValue::Integer(value),
        }
    }

    /// On/off parameter
    pub fn toggle(name: &'static str, value: bool) -> Self {
        Self {
            name,
            kind: ParameterKind::Toggle,
            value: ParameterValue::Toggle(value),
        }
    }

    /// Choice parameter
    pub fn choice(name: &'static str, options: &'static [&'static str], value: usize) -> Self {
        Self {
            name,
            kind: ParameterKind::Choice(options),
            value: ParameterValue::Choice(value),
        }
    }

    /// Color parameter
    pub fn color(name: &'static str, value: RgbColor) -> Self {
        Self {
            name,
            kind: ParameterKind::Color,
            value: ParameterValue::Color(value),
        }
    }

    /// Text parameter
    pub fn text(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            kind: ParameterKind::Text,
            value: ParameterValue::Text(value.into()),
        }
    }
}

/// Error when configuring a module parameter
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterError {
    /// The module has no parameter with this name
    #[error("Unknown parameter: {0}")]
    Unknown(String),

    /// The value has the wrong type
    #[error("Parameter {name} expects a {expected} value")]
    WrongType {
        /// Parameter name
        name: String,
        /// Expected value type
        expected: &'static str,
    },

    /// The value is outside the accepted range
    #[error("Value {value} is out of range for parameter {name}")]
    OutOfRange {
        /// Parameter name
        name: String,
        /// Rejected value
        value: String,
    },

    /// The value could not be interpreted
    #[error("Invalid value for parameter {name}: {reason}")]
    Invalid {
        /// Parameter name
        name: String,
        /// What was wrong with it
        reason: String,
    },
}

impl ParameterError {
    /// Unknown parameter name
    pub fn unknown(name: &str) -> Self {
        Self::Unknown(name.to_string())
    }

    fn wrong_type(name: &str, expected: &'static str) -> Self {
        Self::WrongType {
            name: name.to_string(),
            expected,
        }
    }

    fn out_of_range(name: &str, value: impl fmt::Display) -> Self {
        Self::OutOfRange {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    /// A value that could not be interpreted
    pub fn invalid(name: &str, reason: impl fmt::Display) -> Self {
        Self::Invalid {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A computation unit in a procedural graph.
///
/// Every operation receives the module's resolved inputs and a per-call
/// [`EvaluationContext`]. Implementations hold configuration only; a single
/// instance is evaluated concurrently from many threads, so nothing computed
/// during evaluation may be stored on `self`.
///
/// Operations are total: they return a number for every output index and
/// blur, never an error.
pub trait Module: ModuleClone + Send + Sync + fmt::Debug {
    /// Ports and naming of this module
    fn signature(&self) -> ModuleSignature;

    /// Configurable parameters with their current values
    fn parameters(&self) -> Vec<Parameter> {
        Vec::new()
    }

    /// Change a parameter by name
    fn set_parameter(&mut self, name: &str, _value: ParameterValue) -> Result<(), ParameterError> {
        Err(ParameterError::unknown(name))
    }

    /// Area-averaged value of a scalar output. Blur 0 means a point value.
    fn average_value(&self, _output: usize, _inputs: &Inputs<'_>, _ctx: EvaluationContext<'_>) -> f64 {
        0.0
    }

    /// Area-averaged value of a color output. Scalar outputs widen to gray.
    fn color_value(&self, output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> RgbColor {
        RgbColor::gray(self.average_value(output, inputs, ctx))
    }

    /// Non-negative bound on how much the output may vary across the
    /// sample footprint and blur radius.
    fn value_error(&self, _output: usize, _inputs: &Inputs<'_>, _ctx: EvaluationContext<'_>) -> f64 {
        0.0
    }

    /// Spatial gradient of a scalar output
    fn value_gradient(&self, _output: usize, _inputs: &Inputs<'_>, _ctx: EvaluationContext<'_>) -> Vec3 {
        Vec3::ZERO
    }
}

/// Cloning support for boxed modules
pub trait ModuleClone {
    /// Clone into a new box
    fn clone_box(&self) -> Box<dyn Module>;
}

impl<T> ModuleClone for T
where
    T: Module + Clone + 'static,
{
    fn clone_box(&self) -> Box<dyn Module> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Module> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A registered module type
#[derive(Debug, Clone)]
pub struct ModuleEntry {
    /// Ports and naming of a default instance
    pub signature: ModuleSignature,
    /// Parameters of a default instance
    pub parameters: Vec<Parameter>,
    factory: fn() -> Box<dyn Module>,
}

impl ModuleEntry {
    /// Create a default instance of this type
    pub fn create(&self) -> Box<dyn Module> {
        (self.factory)()
    }
}

fn create_default<M: Module + Default + 'static>() -> Box<dyn Module> {
    Box::new(M::default())
}

/// Registry of available module types
pub struct ModuleRegistry {
    /// Registered module types by ID
    types: IndexMap<&'static str, ModuleEntry>,
}

impl ModuleRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            types: IndexMap::new(),
        }
    }

    /// Register a module type by its default instance
    pub fn register<M: Module + Default + 'static>(&mut self) {
        let template = M::default();
        let signature = template.signature();
        tracing::trace!(type_id = signature.type_id, "registering module type");
        self.types.insert(
            signature.type_id,
            ModuleEntry {
                parameters: template.parameters(),
                signature,
                factory: create_default::<M>,
            },
        );
    }

    /// Get a module type by ID
    pub fn get(&self, type_id: &str) -> Option<&ModuleEntry> {
        self.types.get(type_id)
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &ModuleEntry> {
        self.types.values()
    }

    /// Get types by category
    pub fn types_in_category(&self, category: Category) -> impl Iterator<Item = &ModuleEntry> {
        self.types.values().filter(move |t| t.signature.category == category)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Create a module from a type ID
    pub fn create(&self, type_id: &str) -> Option<Box<dyn Module>> {
        self.get(type_id).map(ModuleEntry::create)
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_value_conversions() {
        assert_eq!(ParameterValue::Integer(3).number("octaves"), Ok(3.0));
        assert_eq!(ParameterValue::Number(4.0).integer("octaves", 1, 8), Ok(4));
        assert!(matches!(
            ParameterValue::Number(0.0).positive("spacing"),
            Err(ParameterError::OutOfRange { .. })
        ));
        assert!(matches!(
            ParameterValue::Integer(9).integer("octaves", 1, 8),
            Err(ParameterError::OutOfRange { .. })
        ));
        assert!(matches!(
            ParameterValue::Toggle(true).color("color"),
            Err(ParameterError::WrongType { expected: "color", .. })
        ));
        assert!(ParameterValue::Number(f64::NAN).number("value").is_err());
        assert_eq!(ParameterValue::Text("x + 1".to_string()).text("expression"), Ok("x + 1"));
        assert!(matches!(
            ParameterValue::Number(1.0).text("expression"),
            Err(ParameterError::WrongType { expected: "text", .. })
        ));
    }

    #[test]
    fn test_module_id_display_is_compact() {
        let id = ModuleId::new();
        assert_eq!(id.to_string().len(), 32);
    }
}
