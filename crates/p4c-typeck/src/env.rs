//! Lexical scopes.
//!
//! A stack of frames mapping names to declarations. Entering a control,
//! action or block pushes a frame; lookups search from the innermost frame
//! outward.

use rustc_hash::FxHashMap;

use crate::refs::DeclRef;

pub struct Scopes {
    frames: Vec<FxHashMap<String, DeclRef>>,
    /// Type parameters in scope, innermost last.
    type_params: Vec<Vec<String>>,
}

impl Scopes {
    /// One empty toplevel frame.
    pub fn new() -> Self {
        Scopes {
            frames: vec![FxHashMap::default()],
            type_params: Vec::new(),
        }
    }

    pub fn push(&mut self) {
        self.frames.push(FxHashMap::default());
    }

    pub fn pop(&mut self) {
        debug_assert!(self.frames.len() > 1, "cannot pop the toplevel frame");
        self.frames.pop();
    }

    /// Declare `name` in the innermost frame. Returns the declaration it
    /// clashes with if the frame already has one.
    pub fn define(&mut self, name: &str, decl: DeclRef) -> Option<DeclRef> {
        let frame = self.frames.last_mut()?;
        if let Some(previous) = frame.get(name) {
            return Some(previous.clone());
        }
        frame.insert(name.to_string(), decl);
        None
    }

    pub fn lookup(&self, name: &str) -> Option<&DeclRef> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn push_type_params(&mut self, names: &[String]) {
        self.type_params.push(names.to_vec());
    }

    pub fn pop_type_params(&mut self) {
        self.type_params.pop();
    }

    pub fn is_type_param(&self, name: &str) -> bool {
        self.type_params
            .iter()
            .any(|frame| frame.iter().any(|p| p == name))
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p4c_ir::{Declaration, Type};

    #[test]
    fn inner_frames_shadow_outer() {
        let outer = Declaration::variable("x", Type::bits(8), None);
        let inner = Declaration::variable("x", Type::bits(16), None);

        let mut scopes = Scopes::new();
        assert!(scopes
            .define("x", DeclRef::Declaration(outer.clone()))
            .is_none());
        scopes.push();
        assert!(scopes
            .define("x", DeclRef::Declaration(inner.clone()))
            .is_none());
        assert_eq!(scopes.lookup("x").map(|d| d.id()), Some(inner.id));
        scopes.pop();
        assert_eq!(scopes.lookup("x").map(|d| d.id()), Some(outer.id));
    }

    #[test]
    fn duplicate_in_one_frame() {
        let a = Declaration::variable("x", Type::bits(8), None);
        let b = Declaration::variable("x", Type::bits(8), None);
        let mut scopes = Scopes::new();
        scopes.define("x", DeclRef::Declaration(a.clone()));
        let clash = scopes.define("x", DeclRef::Declaration(b));
        assert_eq!(clash.map(|d| d.id()), Some(a.id));
    }
}
