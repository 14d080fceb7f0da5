//! Action inlining.
//!
//! A call statement `a(args);` of a user-defined action becomes a block
//! declaring one fresh local per parameter of `a`, initialised from its
//! argument unless the parameter is `out`, followed by a renamed copy of
//! `a`'s body and the copy-back assignments of `out`/`inout` parameters.
//! Table action lists are left alone: those invocations happen at match
//! time and stay calls. An `exit` in `a` is preceded by the copy-back
//! assignments; an action still containing `return` is not inlined.

use std::rc::Rc;

use p4c_common::{Diagnostics, SourceMap};
use p4c_ir::transform::{transform_block, transform_declaration, Flow, Transform};
use p4c_ir::visit::{walk_declaration, walk_program, walk_statement, Visitor};
use p4c_ir::{
    Block, Declaration, DeclarationKind, Expression, ExpressionKind, NameGenerator, NodeId,
    Program, Statement, StatementKind,
};
use p4c_typeck::{RefMap, Typeck, TypeMap};
use rustc_hash::FxHashMap;

use super::{
    block_declarations, copy_out_before_exit, find_declaration, recheck, replace_declaration,
    InlineEdge, InlineWorkList, SharedWorkList,
};
use crate::error::{ClassificationError, MidendError};
use crate::method_instance::MethodInstance;
use crate::pass::{Pass, PassContext, SideTables};
use crate::rename::Renamer;

/// The discovery and driver passes of action inlining.
pub fn inline_actions() -> (DiscoverActionsInlining, InlineActionsDriver) {
    let work = SharedWorkList::default();
    (
        DiscoverActionsInlining { work: work.clone() },
        InlineActionsDriver { work },
    )
}

pub struct DiscoverActionsInlining {
    work: SharedWorkList,
}

impl Pass for DiscoverActionsInlining {
    fn name(&self) -> &str {
        "DiscoverActionsInlining"
    }

    fn requires(&self) -> SideTables {
        SideTables::REFS | SideTables::TYPES
    }

    fn invalidates(&self) -> SideTables {
        SideTables::empty()
    }

    fn run(
        &mut self,
        program: Rc<Program>,
        ctx: &mut PassContext,
    ) -> Result<Rc<Program>, MidendError> {
        let mut finder = ActionCallFinder {
            refs: &ctx.refs,
            types: &ctx.types,
            sources: &ctx.sources,
            callers: Vec::new(),
            names: FxHashMap::default(),
            edges: Vec::new(),
            error: None,
        };
        walk_program(&mut finder, &program);
        if let Some(err) = finder.error {
            return Err(err.into());
        }
        let list = InlineWorkList::new(finder.edges, &finder.names)?;
        tracing::debug!(edges = list.len(), "discovered action calls to inline");
        *self.work.borrow_mut() = list;
        Ok(program)
    }
}

struct ActionCallFinder<'a> {
    refs: &'a RefMap,
    types: &'a TypeMap,
    sources: &'a SourceMap,
    /// Enclosing actions and controls, innermost last.
    callers: Vec<NodeId>,
    /// Qualified names (`control.action`) for cycle reports.
    names: FxHashMap<NodeId, String>,
    edges: Vec<InlineEdge>,
    error: Option<ClassificationError>,
}

impl Visitor for ActionCallFinder<'_> {
    fn visit_declaration(&mut self, decl: &Rc<Declaration>) {
        if !matches!(
            decl.kind,
            DeclarationKind::Action(_) | DeclarationKind::Control(_)
        ) {
            return walk_declaration(self, decl);
        }
        let qualified = match self.callers.last().and_then(|p| self.names.get(p)) {
            Some(parent) => format!("{parent}.{}", decl.name),
            None => decl.name.clone(),
        };
        self.names.insert(decl.id, qualified);
        self.callers.push(decl.id);
        walk_declaration(self, decl);
        self.callers.pop();
    }

    fn visit_statement(&mut self, stmt: &Rc<Statement>) {
        if let (StatementKind::MethodCall(call), Some(&caller)) = (&stmt.kind, self.callers.last())
        {
            match MethodInstance::resolve(call, self.refs, self.types) {
                Ok(MethodInstance::ActionCall { action, .. })
                    if !self.sources.is_library(action.span.as_ref()) =>
                {
                    self.edges.push(InlineEdge {
                        caller,
                        callee: action.id,
                        site: stmt.id,
                    });
                }
                Ok(_) => {}
                Err(err) => {
                    self.error.get_or_insert(err);
                }
            }
        }
        walk_statement(self, stmt)
    }
}

pub struct InlineActionsDriver {
    work: SharedWorkList,
}

impl Pass for InlineActionsDriver {
    fn name(&self) -> &str {
        "InlineActionsDriver"
    }

    fn run(
        &mut self,
        program: Rc<Program>,
        ctx: &mut PassContext,
    ) -> Result<Rc<Program>, MidendError> {
        let work = std::mem::take(&mut *self.work.borrow_mut());
        let mut program = program;
        for &caller in work.callers() {
            if ctx.diagnostics.has_errors() {
                break;
            }
            let sites: FxHashMap<NodeId, NodeId> =
                work.edges_from(caller).map(|e| (e.site, e.callee)).collect();
            program = inline_into(&program, caller, &sites, &mut ctx.diagnostics);
        }
        tracing::debug!(callers = work.callers().len(), "inlined actions");
        Ok(program)
    }
}

fn inline_into(
    program: &Rc<Program>,
    caller: NodeId,
    sites: &FxHashMap<NodeId, NodeId>,
    diagnostics: &mut Diagnostics,
) -> Rc<Program> {
    let Some(decl) = find_declaration(program, caller) else {
        return program.clone();
    };
    let typeck = recheck(program, diagnostics);
    if !typeck.errors.is_empty() {
        return program.clone();
    }
    let mut splicer = CallSplicer {
        program,
        caller,
        sites,
        typeck: &typeck,
        names: NameGenerator::from_program(program),
    };
    match transform_declaration(&mut splicer, &decl).into_iter().next() {
        Some(replacement) if !Rc::ptr_eq(&replacement, &decl) => {
            replace_declaration(program, replacement)
        }
        _ => program.clone(),
    }
}

struct CallSplicer<'a> {
    program: &'a Program,
    caller: NodeId,
    /// Call statement id -> action called.
    sites: &'a FxHashMap<NodeId, NodeId>,
    typeck: &'a Typeck,
    names: NameGenerator,
}

impl CallSplicer<'_> {
    fn splice(&mut self, stmt: &Rc<Statement>, callee: &Declaration) -> Option<Rc<Statement>> {
        let action = callee.as_action()?;
        let StatementKind::MethodCall(call) = &stmt.kind else {
            return None;
        };
        let ExpressionKind::MethodCall { args, .. } = &call.kind else {
            return None;
        };
        if args.len() != action.params.len() {
            tracing::warn!(action = %callee.name, "call does not bind every parameter, not inlined");
            return None;
        }
        if action.body.contains_return() {
            tracing::warn!(action = %callee.name, "body still contains `return`, not inlined");
            return None;
        }

        let mut renamer = Renamer::new(&self.typeck.refs, &self.typeck.types);
        let mut locals = Vec::with_capacity(action.params.len());
        for param in &action.params {
            let name = self.names.new_name(&param.name);
            renamer.rename(param.id, name.clone());
            locals.push(name);
        }
        for decl in block_declarations(&action.body) {
            renamer.rename(decl.id, self.names.new_name(&decl.name));
        }
        let body = transform_block(&mut renamer, &action.body).deep_clone();
        let copy_out: Vec<Rc<Statement>> = action
            .params
            .iter()
            .zip(&locals)
            .zip(args)
            .filter(|((param, _), _)| param.direction.copies_out())
            .map(|((_, local), arg)| {
                Statement::assign(arg.deep_clone(), Expression::path(local.clone()))
            })
            .collect();

        let mut out = Vec::new();
        for ((param, local), arg) in action.params.iter().zip(&locals).zip(args) {
            let init = param.direction.copies_in().then(|| arg.clone());
            out.push(Statement::declare(Declaration::with_span(
                local.clone(),
                DeclarationKind::Variable {
                    ty: param.ty.clone(),
                    init,
                },
                param.span,
            )));
        }
        let body = copy_out_before_exit(&body, &copy_out);
        out.extend(body.statements.iter().cloned());
        out.extend(copy_out);
        tracing::trace!(action = %callee.name, "inlining action call");
        Some(Statement::with_span(
            StatementKind::Block(Block::new(out)),
            stmt.span,
        ))
    }
}

impl Transform for CallSplicer<'_> {
    fn preorder_declaration(&mut self, decl: Rc<Declaration>) -> Flow<Rc<Declaration>> {
        // Nested actions are callers of their own.
        if decl.id != self.caller && matches!(decl.kind, DeclarationKind::Action(_)) {
            Flow::Prune(decl)
        } else {
            Flow::Continue(decl)
        }
    }

    fn postorder_statement(&mut self, stmt: Rc<Statement>) -> Vec<Rc<Statement>> {
        let Some(callee) = self
            .sites
            .get(&stmt.id)
            .and_then(|id| find_declaration(self.program, *id))
        else {
            return vec![stmt];
        };
        match self.splice(&stmt, &callee) {
            Some(block) => vec![block],
            None => vec![stmt],
        }
    }
}
