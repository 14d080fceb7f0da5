//! Type map: node -> inferred type, plus derived facts.

use p4c_ir::NodeId;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::ty::{Bindings, Ty};

#[derive(Debug, Default)]
pub struct TypeMap {
    types: FxHashMap<NodeId, Ty>,
    left_values: FxHashSet<NodeId>,
    /// Per call expression: how the callee's type parameters were bound.
    bindings: FxHashMap<NodeId, Bindings>,
}

impl TypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_type(&mut self, node: NodeId, ty: Ty) {
        self.types.insert(node, ty);
    }

    /// Type of an expression, a declaration or a parameter. For a method
    /// expression this is the generic signature; see [`TypeMap::bindings`].
    pub fn get_type(&self, node: NodeId) -> Option<&Ty> {
        self.types.get(&node)
    }

    pub fn set_left_value(&mut self, node: NodeId) {
        self.left_values.insert(node);
    }

    /// Whether the expression denotes a writable location.
    pub fn is_left_value(&self, node: NodeId) -> bool {
        self.left_values.contains(&node)
    }

    pub fn set_bindings(&mut self, call: NodeId, bindings: Bindings) {
        self.bindings.insert(call, bindings);
    }

    pub fn bindings(&self, call: NodeId) -> Option<&Bindings> {
        self.bindings.get(&call)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
