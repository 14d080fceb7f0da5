//! Fresh-name generation.

use std::rc::Rc;

use rustc_hash::FxHashSet;

use crate::decl::{Declaration, DeclarationKind, Program};
use crate::visit::{walk_declaration, walk_program, Visitor};

/// Hands out names that collide with nothing declared in the program and
/// with nothing handed out before.
#[derive(Debug, Default)]
pub struct NameGenerator {
    used: FxHashSet<String>,
}

impl NameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve every declaration and parameter name of `program`.
    pub fn from_program(program: &Program) -> Self {
        let mut collector = NameCollector::default();
        walk_program(&mut collector, program);
        NameGenerator {
            used: collector.names,
        }
    }

    pub fn reserve(&mut self, name: impl Into<String>) {
        self.used.insert(name.into());
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    /// `base` if it is free, otherwise `base_0`, `base_1`, ...
    pub fn new_name(&mut self, base: &str) -> String {
        if self.used.insert(base.to_string()) {
            return base.to_string();
        }
        let mut n = 0usize;
        loop {
            let candidate = format!("{base}_{n}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[derive(Default)]
struct NameCollector {
    names: FxHashSet<String>,
}

impl Visitor for NameCollector {
    fn visit_declaration(&mut self, decl: &Rc<Declaration>) {
        self.names.insert(decl.name.clone());
        let params = match &decl.kind {
            DeclarationKind::Action(action) => &action.params[..],
            DeclarationKind::Control(control) => {
                for p in &control.ctor_params {
                    self.names.insert(p.name.clone());
                }
                &control.apply_params[..]
            }
            DeclarationKind::Package { params, .. } => &params[..],
            DeclarationKind::ExternFunction(method) => &method.params[..],
            _ => &[],
        };
        for p in params {
            self.names.insert(p.name.clone());
        }
        walk_declaration(self, decl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{Direction, Parameter};
    use crate::stmt::{Block, Statement};
    use crate::ty::Type;

    #[test]
    fn avoids_declared_names() {
        let body = Block::new(vec![Statement::declare(Declaration::variable(
            "tmp",
            Type::bits(8),
            None,
        ))]);
        let action = Declaration::action(
            "a",
            vec![Parameter::new(Direction::In, Type::bits(8), "tmp_0")],
            body,
        );
        let program = Program::new(vec![action]);

        let mut names = NameGenerator::from_program(&program);
        assert!(names.is_used("a"));
        assert_eq!(names.new_name("tmp"), "tmp_1");
        assert_eq!(names.new_name("tmp"), "tmp_2");
        assert_eq!(names.new_name("key"), "key");
        assert_eq!(names.new_name("key"), "key_0");
    }
}
