//! Reference and type side tables for the P4 middle-end.
//!
//! The middle-end does not own type inference; it consumes two query
//! capabilities keyed by node identity, "what does this name refer to" and
//! "what is the type of this node", and re-derives both from the current
//! tree whenever a pass has changed its shape.
//!
//! # Architecture
//!
//! - [`ty`]: semantic types and method signatures with substitution
//! - [`refs`]: the reference map
//! - [`types`]: the type map, left-value facts and per-call bindings
//! - [`env`]: lexical scopes
//! - [`error`]: semantic errors with stable codes
//! - [`infer`]: the single-walk resolver and type checker

pub mod env;
pub mod error;
pub mod infer;
pub mod refs;
pub mod ty;
pub mod types;

use p4c_common::Diagnostic;
use p4c_ir::Program;

pub use error::TypeError;
pub use refs::{DeclRef, RefMap};
pub use ty::{Bindings, MethodTy, ParamTy, Ty};
pub use types::TypeMap;

/// Fresh side tables for one tree, plus the errors found deriving them.
#[derive(Debug)]
pub struct Typeck {
    pub refs: RefMap,
    pub types: TypeMap,
    pub errors: Vec<TypeError>,
}

impl Typeck {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = Diagnostic> + '_ {
        self.errors.iter().map(TypeError::to_diagnostic)
    }
}

/// Resolve every name and type every expression of `program`.
pub fn check(program: &Program) -> Typeck {
    infer::infer(program)
}

/// Only the reference map of `program`.
pub fn resolve_references(program: &Program) -> RefMap {
    infer::infer(program).refs
}
