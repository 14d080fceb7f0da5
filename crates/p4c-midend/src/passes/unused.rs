//! Dead declaration removal.
//!
//! Removing one declaration can leave another unreferenced, so resolution
//! and removal repeat until nothing changes. Kept regardless of use:
//! declarations from library sources, toplevel instances (`main`), type
//! and extern declarations, and variables whose initialiser makes a call.

use std::rc::Rc;

use p4c_common::SourceMap;
use p4c_ir::transform::{transform_program, Flow, Transform};
use p4c_ir::{Declaration, DeclarationKind, Program};
use p4c_typeck::RefMap;

use crate::error::MidendError;
use crate::pass::{Pass, PassContext};

#[derive(Debug, Default)]
pub struct RemoveAllUnusedDeclarations;

impl Pass for RemoveAllUnusedDeclarations {
    fn name(&self) -> &str {
        "RemoveAllUnusedDeclarations"
    }

    fn run(
        &mut self,
        program: Rc<Program>,
        ctx: &mut PassContext,
    ) -> Result<Rc<Program>, MidendError> {
        let mut program = program;
        let mut rounds = 0usize;
        loop {
            let refs = p4c_typeck::resolve_references(&program);
            let mut remover = RemoveUnused {
                refs: &refs,
                sources: &ctx.sources,
                depth: 0,
                removed: 0,
            };
            let next = transform_program(&mut remover, &program);
            rounds += 1;
            tracing::trace!(round = rounds, removed = remover.removed, "removed unused declarations");
            if Rc::ptr_eq(&next, &program) {
                return Ok(program);
            }
            program = next;
        }
    }
}

struct RemoveUnused<'a> {
    refs: &'a RefMap,
    sources: &'a SourceMap,
    depth: usize,
    removed: usize,
}

impl RemoveUnused<'_> {
    fn keep(&self, decl: &Declaration) -> bool {
        if self.refs.is_used(decl.id) || self.sources.is_library(decl.span.as_ref()) {
            return true;
        }
        match &decl.kind {
            DeclarationKind::Header { .. }
            | DeclarationKind::Struct { .. }
            | DeclarationKind::Extern(_)
            | DeclarationKind::ExternFunction(_)
            | DeclarationKind::Package { .. } => true,
            DeclarationKind::Instance { .. } => self.depth == 0,
            DeclarationKind::Variable { init, .. } => init.as_ref().is_some_and(|e| e.has_call()),
            DeclarationKind::Action(_)
            | DeclarationKind::Table(_)
            | DeclarationKind::Control(_)
            | DeclarationKind::Constant { .. } => false,
        }
    }
}

impl Transform for RemoveUnused<'_> {
    fn preorder_declaration(&mut self, decl: Rc<Declaration>) -> Flow<Rc<Declaration>> {
        self.depth += 1;
        Flow::Continue(decl)
    }

    fn postorder_declaration(&mut self, decl: Rc<Declaration>) -> Vec<Rc<Declaration>> {
        self.depth -= 1;
        if self.keep(&decl) {
            return vec![decl];
        }
        tracing::trace!(name = %decl.name, "removing unused declaration");
        self.removed += 1;
        Vec::new()
    }
}
