// SPDX-License-Identifier: MIT OR Apache-2.0
//! The standard module catalog.
//!
//! Every module documents its blur rule (how it estimates the mean over the
//! sample footprint) and its error rule next to its implementation.

mod arithmetic;
mod cells;
mod color;
mod comparison;
mod expression;
mod functions;
mod geometry;
mod noise;
mod values;

pub use arithmetic::{Difference, Max, Min, Power, Product, Ratio, Sum, POLE_ERROR};
pub use cells::{Cells, Metric};
pub use color::{
    Blend, ColorDifference, ColorProduct, ColorScale, ColorSum, Darker, Hsv, Lighter, Rgb,
    RgbToHsv,
};
pub use comparison::{ColorEquality, Equality, NumberEquality, EQUALITY_TOLERANCE};
pub use expression::{Expression, ExpressionError, MAX_NESTING};
pub use functions::{Abs, Blur, Cosine, DebugTap, Exp, Interpolate, Sine};
pub use geometry::{Barycentric, Transform};
pub use noise::{gradient_noise, FractalSettings, Noise, Turbulence, Wood, MAX_OCTAVES};
pub use values::{ColorConstant, CoordinateModule, Number, Output, TextureParameter};

use crate::module::ModuleRegistry;

/// Create a registry holding every module in the catalog
pub fn standard_registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();

    // ========================================================================
    // Values
    // ========================================================================

    registry.register::<Number>();
    registry.register::<ColorConstant>();
    registry.register::<TextureParameter>();
    registry.register::<CoordinateModule>();
    registry.register::<Output>();

    // ========================================================================
    // Operators
    // ========================================================================

    registry.register::<Sum>();
    registry.register::<Difference>();
    registry.register::<Product>();
    registry.register::<Ratio>();
    registry.register::<Power>();
    registry.register::<Min>();
    registry.register::<Max>();

    // ========================================================================
    // Functions
    // ========================================================================

    registry.register::<Abs>();
    registry.register::<Exp>();
    registry.register::<Sine>();
    registry.register::<Cosine>();
    registry.register::<Interpolate>();
    registry.register::<Blur>();
    registry.register::<DebugTap>();
    registry.register::<Expression>();

    // ========================================================================
    // Comparison
    // ========================================================================

    registry.register::<Equality>();
    registry.register::<NumberEquality>();
    registry.register::<ColorEquality>();

    // ========================================================================
    // Color
    // ========================================================================

    registry.register::<ColorSum>();
    registry.register::<ColorDifference>();
    registry.register::<ColorProduct>();
    registry.register::<ColorScale>();
    registry.register::<Blend>();
    registry.register::<Darker>();
    registry.register::<Lighter>();
    registry.register::<Hsv>();
    registry.register::<Rgb>();
    registry.register::<RgbToHsv>();

    // ========================================================================
    // Noise
    // ========================================================================

    registry.register::<Noise>();
    registry.register::<Turbulence>();
    registry.register::<Wood>();
    registry.register::<Cells>();

    // ========================================================================
    // Geometry
    // ========================================================================

    registry.register::<Transform>();
    registry.register::<Barycentric>();

    registry
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::evaluation::ValidatedGraph;
    use crate::graph::Graph;
    use crate::module::{Module, ModuleId};

    use super::{CoordinateModule, Number};
    use crate::evaluation::Coordinate;

    /// A validated graph holding one module with unbound inputs
    pub(crate) fn single<M: Module + 'static>(module: M) -> (ValidatedGraph, ModuleId) {
        wired(Box::new(module), Vec::new())
    }

    /// A validated graph with output 0 of each source bound to the given input
    pub(crate) fn wired(
        module: Box<dyn Module>,
        sources: Vec<(usize, Box<dyn Module>)>,
    ) -> (ValidatedGraph, ModuleId) {
        let mut graph = Graph::new("test");
        let id = graph.add_boxed_module(module);
        for (input, source) in sources {
            let source = graph.add_boxed_module(source);
            graph.bind_input(id, input, source, 0).unwrap();
        }
        (ValidatedGraph::new(graph).unwrap(), id)
    }

    /// Constant sources for [`wired`]
    pub(crate) fn numbers(values: &[(usize, f64)]) -> Vec<(usize, Box<dyn Module>)> {
        values
            .iter()
            .map(|&(input, value)| (input, Box::new(Number::new(value)) as Box<dyn Module>))
            .collect()
    }

    /// The X coordinate as a source
    pub(crate) fn x_source() -> Box<dyn Module> {
        Box::new(CoordinateModule::new(Coordinate::X))
    }

    pub(crate) fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Category;
    use std::collections::HashSet;

    #[test]
    fn test_standard_registry_contents() {
        let registry = standard_registry();
        assert_eq!(registry.len(), 39);
        assert!(registry.get("equality").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.types_in_category(Category::Noise).count(), 4);
        assert_eq!(registry.types_in_category(Category::Geometry).count(), 2);
        assert_eq!(registry.types_in_category(Category::Functions).count(), 8);
    }

    #[test]
    fn test_registry_signatures_are_consistent() {
        let registry = standard_registry();
        let mut type_ids = HashSet::new();
        for entry in registry.types() {
            let module = entry.create();
            let signature = module.signature();
            assert_eq!(signature, entry.signature);
            assert!(type_ids.insert(signature.type_id), "duplicate type {}", signature.type_id);
            assert!(!signature.outputs.is_empty(), "{} has no outputs", signature.type_id);
            for (index, port) in signature.inputs.iter().enumerate() {
                assert_eq!(port.index, index);
                assert!(port.default.fits(port.kind), "{}", port.description());
            }
        }
    }

    #[test]
    fn test_registry_parameters_round_trip() {
        let registry = standard_registry();
        for entry in registry.types() {
            let mut module = registry.create(entry.signature.type_id).unwrap();
            for parameter in module.parameters() {
                module.set_parameter(parameter.name, parameter.value).unwrap();
            }
            assert_eq!(module.parameters(), entry.parameters);
        }
    }
}
