// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing modules and their input bindings.

use crate::connection::{Binding, Link};
use crate::module::{Module, ModuleId, ModuleSignature, ParameterError, ParameterValue};
use crate::port::PortKind;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A module instance together with its input bindings
#[derive(Debug, Clone)]
pub struct ModuleNode {
    module: Box<dyn Module>,
    signature: ModuleSignature,
    bindings: Vec<Option<Binding>>,
}

impl ModuleNode {
    fn new(module: Box<dyn Module>) -> Self {
        let signature = module.signature();
        let bindings = vec![None; signature.inputs.len()];
        Self {
            module,
            signature,
            bindings,
        }
    }

    /// The module
    pub fn module(&self) -> &dyn Module {
        self.module.as_ref()
    }

    /// The module's ports
    pub fn signature(&self) -> &ModuleSignature {
        &self.signature
    }

    /// The binding of an input, if any
    pub fn binding(&self, input: usize) -> Option<Binding> {
        self.bindings.get(input).copied().flatten()
    }

    /// All input bindings, indexed by input port
    pub fn bindings(&self) -> &[Option<Binding>] {
        &self.bindings
    }
}

/// A procedural module graph.
///
/// Edges are stored on the consuming side: each input port holds at most one
/// [`Binding`] to an upstream output. The graph may be edited freely; it is
/// checked for cycles when frozen into a
/// [`ValidatedGraph`](crate::evaluation::ValidatedGraph).
#[derive(Debug, Clone)]
pub struct Graph {
    /// Graph name
    pub name: String,
    /// Modules in insertion order
    modules: IndexMap<ModuleId, ModuleNode>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modules: IndexMap::new(),
        }
    }

    /// Add a module to the graph
    pub fn add_module<M: Module + 'static>(&mut self, module: M) -> ModuleId {
        self.add_boxed_module(Box::new(module))
    }

    /// Add a boxed module (e.g. one created by a registry)
    pub fn add_boxed_module(&mut self, module: Box<dyn Module>) -> ModuleId {
        let id = ModuleId::new();
        let node = ModuleNode::new(module);
        tracing::debug!(graph = %self.name, module = %id, type_id = node.signature.type_id, "added module");
        self.modules.insert(id, node);
        id
    }

    /// Remove a module and every binding that references it
    pub fn remove_module(&mut self, module: ModuleId) -> Option<Box<dyn Module>> {
        let node = self.modules.shift_remove(&module)?;
        let mut dropped = 0;
        for other in self.modules.values_mut() {
            for binding in other.bindings.iter_mut() {
                if binding.is_some_and(|b| b.module == module) {
                    *binding = None;
                    dropped += 1;
                }
            }
        }
        tracing::debug!(graph = %self.name, module = %module, dropped, "removed module");
        Some(node.module)
    }

    /// Get a module by ID
    pub fn module(&self, module: ModuleId) -> Option<&dyn Module> {
        self.modules.get(&module).map(ModuleNode::module)
    }

    /// Get a module and its bindings by ID
    pub fn node(&self, module: ModuleId) -> Option<&ModuleNode> {
        self.modules.get(&module)
    }

    /// Get the ports of a module
    pub fn signature(&self, module: ModuleId) -> Option<&ModuleSignature> {
        self.modules.get(&module).map(ModuleNode::signature)
    }

    /// Check if a module is in the graph
    pub fn contains(&self, module: ModuleId) -> bool {
        self.modules.contains_key(&module)
    }

    /// Get all module IDs in insertion order
    pub fn module_ids(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.modules.keys().copied()
    }

    /// Get the number of modules
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Change a module parameter.
    ///
    /// The module's ports are refreshed afterwards; bindings that no longer
    /// fit the new ports are dropped.
    pub fn set_parameter(
        &mut self,
        module: ModuleId,
        name: &str,
        value: ParameterValue,
    ) -> Result<(), GraphError> {
        let node = self
            .modules
            .get_mut(&module)
            .ok_or(GraphError::ModuleNotFound(module))?;
        node.module.set_parameter(name, value)?;
        let signature = node.module.signature();
        if signature == node.signature {
            return Ok(());
        }
        node.bindings.resize(signature.inputs.len(), None);
        node.signature = signature;
        tracing::debug!(graph = %self.name, module = %module, parameter = name, "module ports changed");
        self.drop_stale_bindings();
        Ok(())
    }

    fn drop_stale_bindings(&mut self) {
        let kinds: HashMap<ModuleId, Vec<PortKind>> = self
            .modules
            .iter()
            .map(|(id, node)| (*id, node.signature.outputs.iter().map(|p| p.kind).collect()))
            .collect();
        for (id, node) in self.modules.iter_mut() {
            for (input, binding) in node.bindings.iter_mut().enumerate() {
                let Some(b) = *binding else { continue };
                let target = node.signature.inputs[input].kind;
                let fits = kinds
                    .get(&b.module)
                    .and_then(|outputs| outputs.get(b.output))
                    .is_some_and(|source| source.can_feed(target));
                if !fits {
                    tracing::debug!(graph = %self.name, module = %id, input, "dropped stale binding");
                    *binding = None;
                }
            }
        }
    }

    /// Bind an input port to an upstream output port
    pub fn bind_input(
        &mut self,
        module: ModuleId,
        input: usize,
        source: ModuleId,
        output: usize,
    ) -> Result<(), GraphError> {
        let source_node = self
            .modules
            .get(&source)
            .ok_or(GraphError::ModuleNotFound(source))?;
        let source_kind = source_node
            .signature
            .output(output)
            .ok_or(GraphError::OutputOutOfRange {
                module: source,
                output,
                count: source_node.signature.outputs.len(),
            })?
            .kind;

        let target_node = self
            .modules
            .get_mut(&module)
            .ok_or(GraphError::ModuleNotFound(module))?;
        let input_kind = target_node
            .signature
            .input(input)
            .ok_or(GraphError::InputOutOfRange {
                module,
                input,
                count: target_node.signature.inputs.len(),
            })?
            .kind;

        if !source_kind.can_feed(input_kind) {
            return Err(GraphError::PortKindMismatch {
                output: source_kind,
                input: input_kind,
            });
        }

        let slot = &mut target_node.bindings[input];
        if let Some(existing) = *slot {
            return Err(GraphError::DuplicateBinding {
                module,
                input,
                existing,
            });
        }
        *slot = Some(Binding {
            module: source,
            output,
        });

        tracing::debug!(
            graph = %self.name,
            from = %source,
            output,
            to = %module,
            input,
            "bound input"
        );
        Ok(())
    }

    /// Remove the binding of an input, returning it
    pub fn unbind_input(
        &mut self,
        module: ModuleId,
        input: usize,
    ) -> Result<Option<Binding>, GraphError> {
        let node = self
            .modules
            .get_mut(&module)
            .ok_or(GraphError::ModuleNotFound(module))?;
        let count = node.bindings.len();
        let slot = node
            .bindings
            .get_mut(input)
            .ok_or(GraphError::InputOutOfRange {
                module,
                input,
                count,
            })?;
        let previous = slot.take();
        if previous.is_some() {
            tracing::debug!(graph = %self.name, module = %module, input, "unbound input");
        }
        Ok(previous)
    }

    /// Get the binding of an input
    pub fn binding(&self, module: ModuleId, input: usize) -> Option<Binding> {
        self.modules.get(&module)?.binding(input)
    }

    /// All links, derived from the input bindings
    pub fn links(&self) -> impl Iterator<Item = Link> + '_ {
        self.modules.iter().flat_map(|(id, node)| {
            node.bindings.iter().enumerate().filter_map(move |(input, binding)| {
                binding.map(|b| Link::new(b.module, b.output, *id, input))
            })
        })
    }

    /// Get links involving a module
    pub fn links_for_module(&self, module: ModuleId) -> impl Iterator<Item = Link> + '_ {
        self.links().filter(move |link| link.involves_module(module))
    }

    /// Modules this module reads from directly
    pub fn dependencies(&self, module: ModuleId) -> impl Iterator<Item = ModuleId> + '_ {
        self.modules
            .get(&module)
            .into_iter()
            .flat_map(|node| node.bindings.iter().flatten().map(|b| b.module))
    }

    /// Check that no module transitively depends on itself.
    ///
    /// Returns the dependency order (sources before consumers) and the length
    /// of the longest dependency chain.
    pub fn validate(&self) -> Result<Topology, GraphError> {
        let mut visit = Visit::default();
        for module in self.modules.keys() {
            if let Err(err) = self.visit(*module, &mut visit) {
                tracing::warn!(graph = %self.name, %err, "graph validation failed");
                return Err(err);
            }
        }

        let depth = visit.depth.values().copied().max().unwrap_or(0);
        tracing::debug!(
            graph = %self.name,
            modules = visit.order.len(),
            depth,
            "graph validated"
        );
        Ok(Topology {
            order: visit.order,
            depth,
        })
    }

    fn visit(&self, module: ModuleId, visit: &mut Visit) -> Result<usize, GraphError> {
        if let Some(depth) = visit.depth.get(&module) {
            return Ok(*depth);
        }
        if visit.in_progress.contains(&module) {
            let start = visit.path.iter().position(|m| *m == module).unwrap_or(0);
            let mut chain = visit.path[start..].to_vec();
            chain.push(module);
            return Err(GraphError::CycleDetected { chain });
        }

        visit.in_progress.insert(module);
        visit.path.push(module);

        let mut depth = 0;
        for upstream in self.dependencies(module) {
            if self.contains(upstream) {
                depth = depth.max(self.visit(upstream, visit)?);
            }
        }

        visit.path.pop();
        visit.in_progress.remove(&module);
        visit.depth.insert(module, depth + 1);
        visit.order.push(module);
        Ok(depth + 1)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

#[derive(Default)]
struct Visit {
    in_progress: HashSet<ModuleId>,
    path: Vec<ModuleId>,
    depth: HashMap<ModuleId, usize>,
    order: Vec<ModuleId>,
}

/// Result of a successful validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    /// Every module, upstream modules before the modules reading them
    pub order: Vec<ModuleId>,
    /// Number of modules on the longest dependency chain
    pub depth: usize,
}

struct Chain<'a>(&'a [ModuleId]);

impl fmt::Display for Chain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, module) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{module}")?;
        }
        Ok(())
    }
}

/// Error when building or validating a graph
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// Module not found
    #[error("Module not found: {0}")]
    ModuleNotFound(ModuleId),

    /// Input index out of range
    #[error("Module {module} has {count} inputs, input {input} requested")]
    InputOutOfRange {
        /// Module
        module: ModuleId,
        /// Requested input
        input: usize,
        /// Number of inputs
        count: usize,
    },

    /// Output index out of range
    #[error("Module {module} has {count} outputs, output {output} requested")]
    OutputOutOfRange {
        /// Module
        module: ModuleId,
        /// Requested output
        output: usize,
        /// Number of outputs
        count: usize,
    },

    /// The output kind cannot feed the input kind
    #[error("Cannot bind a {} output to a {} input", .output.label(), .input.label())]
    PortKindMismatch {
        /// Kind of the source output
        output: PortKind,
        /// Kind of the target input
        input: PortKind,
    },

    /// The input is already bound
    #[error("Input {input} of module {module} is already bound")]
    DuplicateBinding {
        /// Module
        module: ModuleId,
        /// Input port
        input: usize,
        /// The binding that stays in place
        existing: Binding,
    },

    /// A module transitively depends on its own output
    #[error("Cycle detected: {}", Chain(.chain))]
    CycleDetected {
        /// Modules on the cycle; the first module is repeated at the end
        chain: Vec<ModuleId>,
    },

    /// Rejected parameter change
    #[error(transparent)]
    Parameter(#[from] ParameterError),
}
