// SPDX-License-Identifier: MIT OR Apache-2.0
//! Links (edges) between module ports.

use crate::module::ModuleId;
use serde::{Deserialize, Serialize};

/// The upstream end of an input binding: a module and one of its outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Binding {
    /// Source module
    pub module: ModuleId,
    /// Output port index on the source module
    pub output: usize,
}

/// A directed link from an output port to an input port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    /// Source module
    pub from_module: ModuleId,
    /// Source output port index
    pub from_port: usize,
    /// Target module
    pub to_module: ModuleId,
    /// Target input port index
    pub to_port: usize,
}

impl Link {
    /// Create a new link
    pub fn new(from_module: ModuleId, from_port: usize, to_module: ModuleId, to_port: usize) -> Self {
        Self {
            from_module,
            from_port,
            to_module,
            to_port,
        }
    }

    /// The upstream end of this link
    pub fn source(&self) -> Binding {
        Binding {
            module: self.from_module,
            output: self.from_port,
        }
    }

    /// Check if this link involves a specific module
    pub fn involves_module(&self, module: ModuleId) -> bool {
        self.from_module == module || self.to_module == module
    }
}
