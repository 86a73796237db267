// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scalar expressions over the sample coordinates and three inputs.
//!
//! The expression is parsed once, when it is set, into an immutable tree.
//! Evaluation walks the tree and computes value, error and gradient of every
//! node together, using the same blur and error rules as the standalone
//! operator and function modules.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expression := term (("+" | "-") term)*
//! term       := power (("*" | "/" | "%") power)*
//! power      := unary ("^" unary)*
//! unary      := "-" unary | primary
//! primary    := number | variable | function "(" arguments ")" | "(" expression ")"
//! ```
//!
//! `^` associates to the left and unary minus binds tighter than `^`, so
//! `-2^2` is 4. Names are case-insensitive.

use std::f64::consts::{E, PI};
use std::fmt;

use super::arithmetic::{product_error, ratio_error, safe_denominator, Power, POLE_ERROR};
use super::functions::{mean_abs, mean_abs_slope, mean_cos, mean_exp, mean_sin, periodic_error};
use super::noise::Estimate;
use crate::evaluation::{Coordinate, EvaluationContext, Inputs};
use crate::math::Vec3;
use crate::module::{Category, Module, ModuleSignature, Parameter, ParameterError, ParameterValue};
use crate::port::{Port, PortKind};

/// Deepest nesting of parentheses and unary minus accepted by the parser
pub const MAX_NESTING: usize = 64;

/// Number of scalar inputs, named `input1`.. in expressions
const INPUT_COUNT: usize = 3;

/// Error in an expression's text
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
    /// A character that starts no token
    #[error("Unexpected character '{character}' at offset {offset}")]
    UnexpectedCharacter {
        /// The character
        character: char,
        /// Byte offset in the source
        offset: usize,
    },

    /// Digits that do not form a number
    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    /// A token in the wrong place
    #[error("Found {found} where {expected} was expected")]
    UnexpectedToken {
        /// Description of the token found
        found: String,
        /// What the parser needed
        expected: &'static str,
    },

    /// A name that is not a variable
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    /// A name that is not a function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// A function called with the wrong number of arguments
    #[error("{function} expects {expected} arguments, but was called with {found}")]
    ArgumentCount {
        /// Function name
        function: String,
        /// Arguments it takes
        expected: usize,
        /// Arguments given
        found: usize,
    },

    /// Nesting deeper than [`MAX_NESTING`]
    #[error("Expression is nested too deeply")]
    TooDeep,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Name(String),
    Symbol(char),
    End,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Name(name) => write!(f, "'{name}'"),
            Self::Symbol(c) => write!(f, "'{c}'"),
            Self::End => write!(f, "end of expression"),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();
    while let Some(&(offset, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut text = String::new();
            while let Some(&(_, d)) = chars.peek() {
                if !(d.is_ascii_digit() || d == '.') {
                    break;
                }
                text.push(d);
                chars.next();
            }
            let value = text
                .parse()
                .map_err(|_| ExpressionError::InvalidNumber(text.clone()))?;
            tokens.push(Token::Number(value));
        } else if c.is_alphabetic() || c == '_' {
            let mut name = String::new();
            while let Some(&(_, d)) = chars.peek() {
                if !(d.is_alphanumeric() || d == '_') {
                    break;
                }
                name.push(d.to_ascii_lowercase());
                chars.next();
            }
            tokens.push(Token::Name(name));
        } else if "+-*/%^(),".contains(c) {
            tokens.push(Token::Symbol(c));
            chars.next();
        } else {
            return Err(ExpressionError::UnexpectedCharacter { character: c, offset });
        }
    }
    Ok(tokens)
}

/// One-argument functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Negate,
    Abs,
    Exp,
    Sin,
    Cos,
    Sqrt,
    Log,
}

/// Two-argument operators and functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    Min,
    Max,
    Angle,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Number(f64),
    Coordinate(Coordinate),
    Input(usize),
    Unary(Function, Box<Node>),
    Binary(Operator, Box<Node>, Box<Node>),
}

impl Node {
    fn binary(operator: Operator, left: Node, right: Node) -> Self {
        Self::Binary(operator, Box::new(left), Box::new(right))
    }

    fn variable(name: &str) -> Result<Self, ExpressionError> {
        Ok(match name {
            "x" => Self::Coordinate(Coordinate::X),
            "y" => Self::Coordinate(Coordinate::Y),
            "z" => Self::Coordinate(Coordinate::Z),
            "t" => Self::Coordinate(Coordinate::Time),
            "e" => Self::Number(E),
            "pi" => Self::Number(PI),
            _ => {
                let index = name
                    .strip_prefix("input")
                    .and_then(|n| n.parse::<usize>().ok())
                    .filter(|n| (1..=INPUT_COUNT).contains(n))
                    .ok_or_else(|| ExpressionError::UnknownVariable(name.to_string()))?;
                Self::Input(index - 1)
            }
        })
    }

    fn call(name: String, mut arguments: Vec<Node>) -> Result<Self, ExpressionError> {
        let unary = match name.as_str() {
            "abs" => Some(Function::Abs),
            "exp" => Some(Function::Exp),
            "sin" => Some(Function::Sin),
            "cos" => Some(Function::Cos),
            "sqrt" => Some(Function::Sqrt),
            "log" => Some(Function::Log),
            _ => None,
        };
        let binary = match name.as_str() {
            "pow" => Some(Operator::Power),
            "min" => Some(Operator::Min),
            "max" => Some(Operator::Max),
            "angle" => Some(Operator::Angle),
            _ => None,
        };
        let expected = match (unary, binary) {
            (Some(_), _) => 1,
            (_, Some(_)) => 2,
            (None, None) => return Err(ExpressionError::UnknownFunction(name)),
        };
        if arguments.len() != expected {
            return Err(ExpressionError::ArgumentCount {
                function: name,
                expected,
                found: arguments.len(),
            });
        }
        let first = arguments.remove(0);
        Ok(match (unary, binary, arguments.pop()) {
            (Some(function), _, _) => Self::Unary(function, Box::new(first)),
            (_, Some(operator), Some(second)) => Self::binary(operator, first, second),
            _ => return Err(ExpressionError::UnknownFunction(name)),
        })
    }
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&Token::End)
    }

    fn next(&mut self) -> Token {
        let token = self.peek().clone();
        self.position += 1;
        token
    }

    fn expect(&mut self, symbol: char, expected: &'static str) -> Result<(), ExpressionError> {
        match self.next() {
            Token::Symbol(c) if c == symbol => Ok(()),
            found => Err(ExpressionError::UnexpectedToken {
                found: found.to_string(),
                expected,
            }),
        }
    }

    fn parse(mut self) -> Result<Node, ExpressionError> {
        let root = self.expression()?;
        match self.next() {
            Token::End => Ok(root),
            found => Err(ExpressionError::UnexpectedToken {
                found: found.to_string(),
                expected: "an operator",
            }),
        }
    }

    fn expression(&mut self) -> Result<Node, ExpressionError> {
        let mut left = self.term()?;
        loop {
            let operator = match self.peek() {
                Token::Symbol('+') => Operator::Add,
                Token::Symbol('-') => Operator::Subtract,
                _ => return Ok(left),
            };
            self.next();
            left = Node::binary(operator, left, self.term()?);
        }
    }

    fn term(&mut self) -> Result<Node, ExpressionError> {
        let mut left = self.power()?;
        loop {
            let operator = match self.peek() {
                Token::Symbol('*') => Operator::Multiply,
                Token::Symbol('/') => Operator::Divide,
                Token::Symbol('%') => Operator::Modulo,
                _ => return Ok(left),
            };
            self.next();
            left = Node::binary(operator, left, self.power()?);
        }
    }

    fn power(&mut self) -> Result<Node, ExpressionError> {
        let mut left = self.unary()?;
        while self.peek() == &Token::Symbol('^') {
            self.next();
            left = Node::binary(Operator::Power, left, self.unary()?);
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Node, ExpressionError> {
        if self.depth >= MAX_NESTING {
            return Err(ExpressionError::TooDeep);
        }
        self.depth += 1;
        let node = if self.peek() == &Token::Symbol('-') {
            self.next();
            self.unary().map(|operand| Node::Unary(Function::Negate, Box::new(operand)))
        } else {
            self.primary()
        };
        self.depth -= 1;
        node
    }

    fn primary(&mut self) -> Result<Node, ExpressionError> {
        match self.next() {
            Token::Number(v) => Ok(Node::Number(v)),
            Token::Symbol('(') => {
                let node = self.expression()?;
                self.expect(')', "')'")?;
                Ok(node)
            }
            Token::Name(name) if self.peek() == &Token::Symbol('(') => {
                self.next();
                let arguments = self.arguments()?;
                Node::call(name, arguments)
            }
            Token::Name(name) => Node::variable(&name),
            found => Err(ExpressionError::UnexpectedToken {
                found: found.to_string(),
                expected: "a number, variable or '('",
            }),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Node>, ExpressionError> {
        let mut arguments = Vec::new();
        if self.peek() == &Token::Symbol(')') {
            self.next();
            return Ok(arguments);
        }
        loop {
            arguments.push(self.expression()?);
            match self.next() {
                Token::Symbol(',') => {}
                Token::Symbol(')') => return Ok(arguments),
                found => {
                    return Err(ExpressionError::UnexpectedToken {
                        found: found.to_string(),
                        expected: "',' or ')'",
                    })
                }
            }
        }
    }
}

fn pole() -> Estimate {
    Estimate {
        value: 0.0,
        error: POLE_ERROR,
        gradient: Vec3::ZERO,
    }
}

fn finite_or_zero(gradient: Vec3) -> Vec3 {
    if gradient.length().is_finite() {
        gradient
    } else {
        Vec3::ZERO
    }
}

/// Mean of sqrt(max(x, 0)) over `[x - e, x + e]`
fn mean_sqrt(x: f64, e: f64) -> f64 {
    if e == 0.0 {
        return x.max(0.0).sqrt();
    }
    let (lo, hi) = ((x - e).max(0.0), (x + e).max(0.0));
    (hi.powf(1.5) - lo.powf(1.5)) / (3.0 * e)
}

/// Mean of ln(x) over `[x - e, x + e]`, for `x - e > 0`
fn mean_log(x: f64, e: f64) -> f64 {
    if e == 0.0 {
        return x.ln();
    }
    let antiderivative = |u: f64| u * u.ln() - u;
    (antiderivative(x + e) - antiderivative(x - e)) / (2.0 * e)
}

/// Integral of frac(u) from 0
fn fraction_integral(u: f64) -> f64 {
    let fraction = u - u.floor();
    0.5 * (u.floor() + fraction * fraction)
}

fn unary(function: Function, a: Estimate) -> Estimate {
    let Estimate { value: x, error: e, gradient: g } = a;
    match function {
        Function::Negate => Estimate {
            value: -x,
            error: e,
            gradient: -g,
        },
        Function::Abs => Estimate {
            value: mean_abs(x, e),
            error: e,
            gradient: g * mean_abs_slope(x, e),
        },
        Function::Exp => {
            let value = mean_exp(x, e);
            Estimate {
                value,
                error: e * value,
                gradient: g * x.exp(),
            }
        }
        Function::Sin => Estimate {
            value: mean_sin(x, e),
            error: periodic_error(x.cos(), e),
            gradient: g * x.cos(),
        },
        Function::Cos => Estimate {
            value: mean_cos(x, e),
            error: periodic_error(x.sin(), e),
            gradient: g * -x.sin(),
        },
        Function::Sqrt => {
            // the slope is steepest at the bottom of the interval
            let error = if x - e > 0.0 {
                e / (2.0 * (x - e).sqrt())
            } else {
                (x + e).max(0.0).sqrt()
            };
            let gradient = if x > 0.0 { g * (0.5 / x.sqrt()) } else { Vec3::ZERO };
            Estimate {
                value: mean_sqrt(x, e),
                error,
                gradient,
            }
        }
        Function::Log => {
            if x - e <= 0.0 {
                return pole();
            }
            Estimate {
                value: mean_log(x, e),
                error: e / (x - e),
                gradient: g * (1.0 / x),
            }
        }
    }
}

fn binary(operator: Operator, a: Estimate, b: Estimate) -> Estimate {
    match operator {
        Operator::Add => Estimate {
            value: a.value + b.value,
            error: a.error + b.error,
            gradient: a.gradient + b.gradient,
        },
        Operator::Subtract => Estimate {
            value: a.value - b.value,
            error: a.error + b.error,
            gradient: a.gradient - b.gradient,
        },
        Operator::Multiply => Estimate {
            value: a.value * b.value,
            error: product_error(a.value, a.error, b.value, b.error),
            gradient: a.gradient * b.value + b.gradient * a.value,
        },
        Operator::Divide => match safe_denominator(b.value, b.error) {
            Some(d) => Estimate {
                value: a.value / d,
                error: ratio_error(a.value, a.error, d, b.error),
                gradient: (a.gradient * d - b.gradient * a.value) * (1.0 / (d * d)),
            },
            None => pole(),
        },
        Operator::Modulo => match safe_denominator(b.value, b.error) {
            Some(d) => {
                let q = a.value / d;
                let spread = a.error / d.abs();
                let (lo, hi) = (q - spread, q + spread);
                if lo.floor() == hi.floor() {
                    let whole = q.floor();
                    Estimate {
                        value: d * (q - whole),
                        error: a.error + whole.abs() * b.error,
                        gradient: a.gradient - b.gradient * whole,
                    }
                } else {
                    // the interval wraps: average the sawtooth
                    Estimate {
                        value: d * (fraction_integral(hi) - fraction_integral(lo)) / (hi - lo),
                        error: d.abs(),
                        gradient: Vec3::ZERO,
                    }
                }
            }
            None => pole(),
        },
        Operator::Power => {
            if Power::has_pole(a.value, a.error, b.value) {
                return pole();
            }
            let (d_base, d_exp) = Power::partials(a.value, b.value);
            Estimate {
                value: Power::apply(a.value, b.value),
                error: Power::error(a.value, a.error, b.value, b.error),
                gradient: finite_or_zero(a.gradient * d_base + b.gradient * d_exp),
            }
        }
        Operator::Min => {
            if b.value < a.value {
                b
            } else {
                a
            }
        }
        Operator::Max => {
            if b.value > a.value {
                b
            } else {
                a
            }
        }
        Operator::Angle => {
            let (x, y) = (a.value, b.value);
            let r2 = x * x + y * y;
            let value = y.atan2(x);
            if r2 == 0.0 || r2.sqrt() <= a.error + b.error {
                // the footprint surrounds the origin
                return Estimate {
                    value,
                    error: PI,
                    gradient: Vec3::ZERO,
                };
            }
            Estimate {
                value,
                error: (y.abs() * a.error + x.abs() * b.error) / r2,
                gradient: (b.gradient * x - a.gradient * y) * (1.0 / r2),
            }
        }
    }
}

fn evaluate(node: &Node, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Estimate {
    match node {
        Node::Number(value) => Estimate {
            value: *value,
            error: 0.0,
            gradient: Vec3::ZERO,
        },
        Node::Coordinate(axis) => Estimate {
            value: ctx.coordinate(*axis),
            error: ctx.coordinate_error(*axis),
            gradient: axis.gradient(),
        },
        Node::Input(index) => Estimate {
            value: inputs.value(*index, ctx),
            error: inputs.error(*index, ctx),
            gradient: inputs.gradient(*index, ctx),
        },
        Node::Unary(function, operand) => unary(*function, evaluate(operand, inputs, ctx)),
        Node::Binary(operator, left, right) => binary(
            *operator,
            evaluate(left, inputs, ctx),
            evaluate(right, inputs, ctx),
        ),
    }
}

/// A scalar expression over `x`, `y`, `z`, `t` and `input1`..`input3`.
///
/// Functions: `abs`, `exp`, `sin`, `cos`, `sqrt`, `log`, `pow`, `min`,
/// `max`, `angle(x, y)`. Constants: `e`, `pi`.
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    /// Name of the expression parameter
    pub const PARAMETER: &'static str = "expression";

    /// Parse an expression
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let parser = Parser {
            tokens: tokenize(source)?,
            position: 0,
            depth: 0,
        };
        Ok(Self {
            source: source.to_string(),
            root: parser.parse()?,
        })
    }

    /// The expression text
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Default for Expression {
    fn default() -> Self {
        Self {
            source: "x".to_string(),
            root: Node::Coordinate(Coordinate::X),
        }
    }
}

impl Module for Expression {
    fn signature(&self) -> ModuleSignature {
        ModuleSignature::new(
            "expression",
            "Expression",
            Category::Functions,
            vec![
                Port::scalar("Value 1", 0.0),
                Port::scalar("Value 2", 0.0),
                Port::scalar("Value 3", 0.0),
            ],
            vec![Port::output("Result", PortKind::Scalar)],
        )
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![Parameter::text(Self::PARAMETER, self.source.clone())]
    }

    fn set_parameter(&mut self, name: &str, value: ParameterValue) -> Result<(), ParameterError> {
        if name != Self::PARAMETER {
            return Err(ParameterError::unknown(name));
        }
        *self = Self::parse(value.text(name)?).map_err(|e| ParameterError::invalid(name, e))?;
        Ok(())
    }

    fn average_value(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        evaluate(&self.root, inputs, ctx).value
    }

    fn value_error(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> f64 {
        evaluate(&self.root, inputs, ctx).error
    }

    fn value_gradient(&self, _output: usize, inputs: &Inputs<'_>, ctx: EvaluationContext<'_>) -> Vec3 {
        evaluate(&self.root, inputs, ctx).gradient
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_support::{assert_close, numbers, single, wired, x_source};
    use crate::catalog::Sine;
    use crate::evaluation::SamplePoint;

    fn value_at(source: &str, point: &SamplePoint) -> f64 {
        let (graph, id) = single(Expression::parse(source).unwrap());
        graph.evaluate_scalar(id, 0, point, 0.0).unwrap()
    }

    fn constant(source: &str) -> f64 {
        value_at(source, &SamplePoint::default())
    }

    #[test]
    fn test_precedence() {
        assert_eq!(constant("1 + 2 * 3 ^ 2"), 19.0);
        assert_eq!(constant("(1 + 2) * 3"), 9.0);
        assert_eq!(constant("8 - 2 - 1"), 5.0);
        assert_eq!(constant("2 ^ 3 ^ 2"), 64.0);
        assert_eq!(constant("-2 ^ 2"), 4.0);
        assert_eq!(constant("10 % 4"), 2.0);
        assert_close(constant("-7 % 3"), 2.0);
        assert_eq!(constant("1 / 4"), 0.25);
    }

    #[test]
    fn test_variables_and_constants() {
        let point = SamplePoint::new(Vec3::new(2.0, 3.0, 5.0)).with_time(0.5);
        assert_eq!(value_at("x * y + z - t", &point), 10.5);
        assert_eq!(value_at("X + Y", &point), 5.0);
        assert_close(constant("pi"), PI);
        assert_close(constant("log(e)"), 1.0);
    }

    #[test]
    fn test_functions() {
        assert_eq!(constant("pow(2, 3)"), 8.0);
        assert_eq!(constant("sqrt(16)"), 4.0);
        assert_eq!(constant("max(1, 0.5) + min(1, 0.5)"), 1.5);
        assert_eq!(constant("abs(-3)"), 3.0);
        assert_close(constant("angle(1, 1)"), PI / 4.0);
        assert_close(constant("SIN(pi / 2)"), 1.0);
        assert_close(constant("exp(1) - e"), 0.0);
    }

    #[test]
    fn test_inputs() {
        let module = Expression::parse("input1 * 2 + input2 - input3").unwrap();
        let (graph, id) = wired(Box::new(module), numbers(&[(0, 3.0), (1, 1.0)]));
        let point = SamplePoint::default();
        assert_eq!(graph.evaluate_scalar(id, 0, &point, 0.0).unwrap(), 7.0);
        assert_eq!(graph.estimate_error(id, 0, &point, 0.0).unwrap(), 0.0);
    }

    #[test]
    fn test_gradient() {
        let (graph, id) = single(Expression::parse("x * x + 3 * y").unwrap());
        let point = SamplePoint::new(Vec3::new(2.0, 1.0, 0.0));
        assert_eq!(
            graph.evaluate_gradient(id, 0, &point, 0.0).unwrap(),
            Vec3::new(4.0, 3.0, 0.0)
        );
    }

    #[test]
    fn test_blur_matches_function_modules() {
        let (expression, expression_id) = single(Expression::parse("sin(x)").unwrap());
        let (sine, sine_id) = wired(Box::new(Sine), vec![(0, x_source())]);
        let point = SamplePoint::new(Vec3::new(1.0, 0.0, 0.0)).with_size(Vec3::splat(0.2));
        for blur in [0.0, 0.5] {
            assert_close(
                expression.evaluate_scalar(expression_id, 0, &point, blur).unwrap(),
                sine.evaluate_scalar(sine_id, 0, &point, blur).unwrap(),
            );
            assert_close(
                expression.estimate_error(expression_id, 0, &point, blur).unwrap(),
                sine.estimate_error(sine_id, 0, &point, blur).unwrap(),
            );
        }
    }

    #[test]
    fn test_error_grows_with_footprint() {
        let (graph, id) = single(Expression::parse("2 * x + y").unwrap());
        let point = SamplePoint::new(Vec3::new(1.0, 1.0, 0.0)).with_size(Vec3::splat(0.2));
        // x and y each carry 0.1
        assert_close(graph.estimate_error(id, 0, &point, 0.0).unwrap(), 0.3);
    }

    #[test]
    fn test_poles() {
        let origin = SamplePoint::default();
        for source in ["log(x)", "1 / x", "x ^ -1", "5 % x"] {
            let (graph, id) = single(Expression::parse(source).unwrap());
            assert_eq!(graph.evaluate_scalar(id, 0, &origin, 0.0).unwrap(), 0.0, "{source}");
            assert_eq!(graph.estimate_error(id, 0, &origin, 0.0).unwrap(), POLE_ERROR, "{source}");
        }
    }

    #[test]
    fn test_wrapping_modulo_averages() {
        // x / 1 spans [0.5, 1.5]: half the interval rises 0.5..1, half 0..0.5
        let (graph, id) = single(Expression::parse("x % 1").unwrap());
        let point = SamplePoint::new(Vec3::new(1.0, 0.0, 0.0)).with_size(Vec3::splat(1.0));
        assert_close(graph.evaluate_scalar(id, 0, &point, 0.0).unwrap(), 0.5);
        assert_eq!(graph.estimate_error(id, 0, &point, 0.0).unwrap(), 1.0);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Expression::parse("x +"),
            Err(ExpressionError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            Expression::parse(""),
            Err(ExpressionError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            Expression::parse("(x"),
            Err(ExpressionError::UnexpectedToken { expected: "')'", .. })
        ));
        assert!(matches!(
            Expression::parse("x y"),
            Err(ExpressionError::UnexpectedToken { expected: "an operator", .. })
        ));
        assert_eq!(
            Expression::parse("x $ 2").unwrap_err(),
            ExpressionError::UnexpectedCharacter { character: '$', offset: 2 }
        );
        assert_eq!(
            Expression::parse("1..2").unwrap_err(),
            ExpressionError::InvalidNumber("1..2".to_string())
        );
        assert_eq!(
            Expression::parse("w + 1").unwrap_err(),
            ExpressionError::UnknownVariable("w".to_string())
        );
        assert_eq!(
            Expression::parse("input4").unwrap_err(),
            ExpressionError::UnknownVariable("input4".to_string())
        );
        assert_eq!(
            Expression::parse("tan(x)").unwrap_err(),
            ExpressionError::UnknownFunction("tan".to_string())
        );
        assert_eq!(
            Expression::parse("sin(x, y)").unwrap_err(),
            ExpressionError::ArgumentCount {
                function: "sin".to_string(),
                expected: 1,
                found: 2,
            }
        );
        assert!(matches!(
            Expression::parse("max()"),
            Err(ExpressionError::ArgumentCount { found: 0, .. })
        ));
    }

    #[test]
    fn test_nesting_limit() {
        let shallow = format!("{}x{}", "(".repeat(10), ")".repeat(10));
        assert!(Expression::parse(&shallow).is_ok());
        let deep = format!("{}x{}", "(".repeat(MAX_NESTING + 1), ")".repeat(MAX_NESTING + 1));
        assert_eq!(Expression::parse(&deep).unwrap_err(), ExpressionError::TooDeep);
        assert_eq!(
            Expression::parse(&"-".repeat(MAX_NESTING + 1)).unwrap_err(),
            ExpressionError::TooDeep
        );
    }

    #[test]
    fn test_expression_parameter() {
        let mut module = Expression::default();
        assert_eq!(
            module.parameters(),
            vec![Parameter::text(Expression::PARAMETER, "x")]
        );
        module
            .set_parameter("expression", ParameterValue::Text("y * 2".to_string()))
            .unwrap();
        assert_eq!(module.source(), "y * 2");

        let rejected = module.set_parameter("expression", ParameterValue::Text("y *".to_string()));
        assert!(matches!(rejected, Err(ParameterError::Invalid { .. })));
        assert_eq!(module.source(), "y * 2");
        assert!(matches!(
            module.set_parameter("expression", ParameterValue::Number(1.0)),
            Err(ParameterError::WrongType { .. })
        ));
        assert!(matches!(
            module.set_parameter("formula", ParameterValue::Text("x".to_string())),
            Err(ParameterError::Unknown(_))
        ));
    }
}
