//! Reference map: node -> declaration it resolves to.

use std::rc::Rc;

use p4c_common::SourceInfo;
use p4c_ir::{Declaration, NodeId, Parameter};
use rustc_hash::{FxHashMap, FxHashSet};

/// What a name can resolve to.
#[derive(Clone, Debug)]
pub enum DeclRef {
    Declaration(Rc<Declaration>),
    Parameter(Rc<Parameter>),
}

impl DeclRef {
    pub fn name(&self) -> &str {
        match self {
            DeclRef::Declaration(d) => &d.name,
            DeclRef::Parameter(p) => &p.name,
        }
    }

    pub fn id(&self) -> NodeId {
        match self {
            DeclRef::Declaration(d) => d.id,
            DeclRef::Parameter(p) => p.id,
        }
    }

    pub fn span(&self) -> Option<SourceInfo> {
        match self {
            DeclRef::Declaration(d) => d.span,
            DeclRef::Parameter(p) => p.span,
        }
    }

    pub fn as_declaration(&self) -> Option<&Rc<Declaration>> {
        match self {
            DeclRef::Declaration(d) => Some(d),
            DeclRef::Parameter(_) => None,
        }
    }

    pub fn as_parameter(&self) -> Option<&Rc<Parameter>> {
        match self {
            DeclRef::Parameter(p) => Some(p),
            DeclRef::Declaration(_) => None,
        }
    }
}

/// Keys are path expressions, plus instance declarations and constructor
/// calls (which resolve to the type they instantiate).
#[derive(Debug, Default)]
pub struct RefMap {
    refs: FxHashMap<NodeId, DeclRef>,
    used: FxHashSet<NodeId>,
}

impl RefMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_declaration(&mut self, node: NodeId, decl: DeclRef) {
        self.used.insert(decl.id());
        self.refs.insert(node, decl);
    }

    pub fn get_declaration(&self, node: NodeId) -> Option<&DeclRef> {
        self.refs.get(&node)
    }

    /// Record a use that has no node of its own (a type name).
    pub fn mark_used(&mut self, decl: NodeId) {
        self.used.insert(decl);
    }

    /// Whether anything in the program refers to the declaration.
    pub fn is_used(&self, decl: NodeId) -> bool {
        self.used.contains(&decl)
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}
