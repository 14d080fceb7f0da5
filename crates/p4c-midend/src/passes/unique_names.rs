//! Gives every local declaration a name used nowhere else in the program.
//!
//! The first declaration of a name keeps it; later ones (and locals that
//! shadow a toplevel name) get a fresh one. Uses follow through the
//! reference map. Parameters are left alone.

use std::rc::Rc;

use p4c_ir::transform::transform_program;
use p4c_ir::visit::{walk_declaration, walk_program, Visitor};
use p4c_ir::{Declaration, NameGenerator, NodeId, Program};
use rustc_hash::FxHashSet;

use crate::error::MidendError;
use crate::pass::{Pass, PassContext, SideTables};
use crate::rename::Renamer;

#[derive(Debug, Default)]
pub struct UniqueNames;

impl Pass for UniqueNames {
    fn name(&self) -> &str {
        "UniqueNames"
    }

    fn requires(&self) -> SideTables {
        SideTables::REFS | SideTables::TYPES
    }

    fn run(
        &mut self,
        program: Rc<Program>,
        ctx: &mut PassContext,
    ) -> Result<Rc<Program>, MidendError> {
        let mut finder = Collisions {
            seen: program.declarations.iter().map(|d| d.name.clone()).collect(),
            names: NameGenerator::from_program(&program),
            depth: 0,
            renames: Vec::new(),
        };
        walk_program(&mut finder, &program);
        if finder.renames.is_empty() {
            return Ok(program);
        }

        tracing::debug!(count = finder.renames.len(), "renaming colliding locals");
        let mut renamer = Renamer::new(&ctx.refs, &ctx.types);
        for (id, name) in finder.renames {
            renamer.rename(id, name);
        }
        Ok(transform_program(&mut renamer, &program))
    }
}

struct Collisions {
    seen: FxHashSet<String>,
    names: NameGenerator,
    depth: usize,
    renames: Vec<(NodeId, String)>,
}

impl Visitor for Collisions {
    fn visit_declaration(&mut self, decl: &Rc<Declaration>) {
        if self.depth > 0 && !self.seen.insert(decl.name.clone()) {
            let fresh = self.names.new_name(&decl.name);
            self.seen.insert(fresh.clone());
            tracing::trace!(from = %decl.name, to = %fresh, "renaming local");
            self.renames.push((decl.id, fresh));
        }
        self.depth += 1;
        walk_declaration(self, decl);
        self.depth -= 1;
    }
}
