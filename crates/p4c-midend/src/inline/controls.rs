//! Control inlining.
//!
//! A control instance `c` of control `C` declared among the locals of a
//! caller is replaced by
//!
//! - one fresh local per apply parameter of `C`,
//! - a renamed copy of every local of `C`,
//!
//! and every `c.apply(args)` in the caller's body becomes a block that
//! copies the arguments into the parameter locals, runs a renamed copy of
//! `C`'s body and copies `out`/`inout` parameters back. Constructor
//! parameters of `C` are replaced by the instance's constructor arguments.
//! An `exit` in `C` stays an `exit`, preceded by the copy-back
//! assignments. A `return` would only end `C`'s body, so a callee still
//! containing one is left as an instance; returns are removed earlier.

use std::rc::Rc;

use p4c_common::{Diagnostics, SourceMap};
use p4c_ir::transform::{transform_block, transform_declarations, Transform};
use p4c_ir::{
    Block, Control, Declaration, DeclarationKind, Expression, ExpressionKind, NameGenerator,
    NodeId, Parameter, Program, Statement, StatementKind,
};
use p4c_typeck::{DeclRef, RefMap, Typeck, TypeMap};
use rustc_hash::FxHashMap;

use super::{
    block_declarations, copy_out_before_exit, find_declaration, recheck, replace_declaration,
    InlineEdge, InlineWorkList, SharedWorkList,
};
use crate::error::MidendError;
use crate::method_instance::MethodInstance;
use crate::pass::{Pass, PassContext, SideTables};
use crate::rename::Renamer;

/// How a control inliner names copies and schedules its work.
pub trait ControlsInliner {
    /// Base for the fresh name of `name`, declared in the callee, when it
    /// is inlined through the instance `instance`.
    fn local_name(&self, instance: &str, name: &str) -> String;

    /// Inline one level of leaf callees per round and rediscover between
    /// rounds, instead of one round over all callers.
    fn multi_round(&self) -> bool;
}

/// Legacy dialect: a single round in callee-first order, names prefixed
/// with the instance name.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleControlsInliner;

impl ControlsInliner for SimpleControlsInliner {
    fn local_name(&self, instance: &str, name: &str) -> String {
        format!("{instance}_{name}")
    }

    fn multi_round(&self) -> bool {
        false
    }
}

/// Current dialect: rounds of leaf callees, names kept where they are free.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeneralInliner;

impl ControlsInliner for GeneralInliner {
    fn local_name(&self, _instance: &str, name: &str) -> String {
        name.to_string()
    }

    fn multi_round(&self) -> bool {
        true
    }
}

/// The discovery and driver passes of one control inlining round.
pub fn inline_controls<I: ControlsInliner>(inliner: I) -> (DiscoverInlining, InlineDriver<I>) {
    let work = SharedWorkList::default();
    (
        DiscoverInlining { work: work.clone() },
        InlineDriver { inliner, work },
    )
}

pub struct DiscoverInlining {
    work: SharedWorkList,
}

impl Pass for DiscoverInlining {
    fn name(&self) -> &str {
        "DiscoverInlining"
    }

    fn requires(&self) -> SideTables {
        SideTables::REFS
    }

    fn invalidates(&self) -> SideTables {
        SideTables::empty()
    }

    fn run(
        &mut self,
        program: Rc<Program>,
        ctx: &mut PassContext,
    ) -> Result<Rc<Program>, MidendError> {
        let list = discover(&program, &ctx.refs, &ctx.sources)?;
        tracing::debug!(edges = list.len(), "discovered control instances to inline");
        *self.work.borrow_mut() = list;
        Ok(program)
    }
}

/// Every control-typed instance among a control's locals, unless the
/// control comes from a library source.
fn discover(
    program: &Program,
    refs: &RefMap,
    sources: &SourceMap,
) -> Result<InlineWorkList, MidendError> {
    let mut edges = Vec::new();
    let mut names = FxHashMap::default();
    for caller in &program.declarations {
        let Some(control) = caller.as_control() else {
            continue;
        };
        names.insert(caller.id, caller.name.clone());
        for local in &control.locals {
            if !matches!(local.kind, DeclarationKind::Instance { .. }) {
                continue;
            }
            let Some(callee) = refs
                .get_declaration(local.id)
                .and_then(DeclRef::as_declaration)
            else {
                continue;
            };
            if callee.as_control().is_none() || sources.is_library(callee.span.as_ref()) {
                continue;
            }
            names.insert(callee.id, callee.name.clone());
            edges.push(InlineEdge {
                caller: caller.id,
                callee: callee.id,
                site: local.id,
            });
        }
    }
    InlineWorkList::new(edges, &names)
}

pub struct InlineDriver<I: ControlsInliner> {
    inliner: I,
    work: SharedWorkList,
}

impl<I: ControlsInliner> Pass for InlineDriver<I> {
    fn name(&self) -> &str {
        "InlineDriver"
    }

    fn run(
        &mut self,
        program: Rc<Program>,
        ctx: &mut PassContext,
    ) -> Result<Rc<Program>, MidendError> {
        let mut work = std::mem::take(&mut *self.work.borrow_mut());
        let mut program = program;
        let mut round = 0usize;
        while !work.is_empty() {
            round += 1;
            let before = program.clone();
            for &caller in work.callers() {
                if ctx.diagnostics.has_errors() {
                    break;
                }
                let edges: Vec<InlineEdge> = work
                    .edges_from(caller)
                    .filter(|e| !self.inliner.multi_round() || !work.is_caller(e.callee))
                    .copied()
                    .collect();
                if edges.is_empty() {
                    continue;
                }
                program = inline_into(&program, caller, &edges, &self.inliner, &mut ctx.diagnostics);
            }
            tracing::debug!(round, "inlined controls");

            if !self.inliner.multi_round()
                || ctx.diagnostics.has_errors()
                || Rc::ptr_eq(&before, &program)
            {
                break;
            }
            let typeck = recheck(&program, &mut ctx.diagnostics);
            if ctx.diagnostics.has_errors() {
                break;
            }
            work = discover(&program, &typeck.refs, &ctx.sources)?;
        }
        Ok(program)
    }
}

/// A callee instance ready to be spliced into its caller.
struct Prepared {
    /// Apply parameters and the caller locals holding them.
    params: Vec<(Rc<Parameter>, String)>,
    /// Declarations replacing the instance among the caller's locals.
    locals: Vec<Rc<Declaration>>,
    /// Renamed callee body; copied again at every call site.
    body: Rc<Block>,
}

fn inline_into(
    program: &Rc<Program>,
    caller_id: NodeId,
    edges: &[InlineEdge],
    inliner: &dyn ControlsInliner,
    diagnostics: &mut Diagnostics,
) -> Rc<Program> {
    let Some(caller) = find_declaration(program, caller_id) else {
        return program.clone();
    };
    let Some(control) = caller.as_control() else {
        return program.clone();
    };
    let typeck = recheck(program, diagnostics);
    if !typeck.errors.is_empty() {
        return program.clone();
    }
    let mut names = NameGenerator::from_program(program);

    let mut locals = Vec::with_capacity(control.locals.len());
    let mut prepared: FxHashMap<NodeId, Prepared> = FxHashMap::default();
    for local in &control.locals {
        let callee = edges
            .iter()
            .find(|e| e.site == local.id)
            .and_then(|e| find_declaration(program, e.callee));
        let Some(callee) = callee else {
            locals.push(local.clone());
            continue;
        };
        match prepare(local, &callee, &typeck, inliner, &mut names) {
            Some(p) => {
                tracing::trace!(instance = %local.name, callee = %callee.name, "inlining control");
                locals.extend(p.locals.iter().cloned());
                prepared.insert(local.id, p);
            }
            None => locals.push(local.clone()),
        }
    }
    if prepared.is_empty() {
        return program.clone();
    }

    let mut splicer = ApplySplicer {
        refs: &typeck.refs,
        types: &typeck.types,
        prepared: &prepared,
    };
    let body = transform_block(&mut splicer, &control.body);
    let replacement = caller.rebuild(DeclarationKind::Control(Control {
        locals,
        body,
        ..control.clone()
    }));
    replace_declaration(program, replacement)
}

fn prepare(
    instance: &Declaration,
    callee: &Declaration,
    typeck: &Typeck,
    inliner: &dyn ControlsInliner,
    names: &mut NameGenerator,
) -> Option<Prepared> {
    let control = callee.as_control()?;
    if control.body.contains_return() {
        tracing::warn!(control = %callee.name, "body still contains `return`, not inlined");
        return None;
    }

    let mut renamer = Renamer::new(&typeck.refs, &typeck.types);
    let mut fresh = |name: &str| names.new_name(&inliner.local_name(&instance.name, name));

    let mut params = Vec::with_capacity(control.apply_params.len());
    for param in &control.apply_params {
        let name = fresh(&param.name);
        renamer.rename(param.id, name.clone());
        params.push((param.clone(), name));
    }
    if let DeclarationKind::Instance { args, .. } = &instance.kind {
        for (param, arg) in control.ctor_params.iter().zip(args) {
            renamer.replace(param.id, arg.clone());
        }
    }
    for local in &control.locals {
        renamer.rename(local.id, fresh(&local.name));
    }
    for decl in block_declarations(&control.body) {
        renamer.rename(decl.id, fresh(&decl.name));
    }

    let (renamed_locals, _) = transform_declarations(&mut renamer, &control.locals);
    let body = transform_block(&mut renamer, &control.body);

    let mut locals: Vec<Rc<Declaration>> = params
        .iter()
        .map(|(param, name)| Declaration::variable(name.clone(), param.ty.clone(), None))
        .collect();
    locals.extend(renamed_locals.iter().map(|d| d.deep_clone()));

    Some(Prepared {
        params,
        locals,
        body,
    })
}

/// Replaces `instance.apply(args);` by copy-in, body, copy-out.
struct ApplySplicer<'a> {
    refs: &'a RefMap,
    types: &'a TypeMap,
    prepared: &'a FxHashMap<NodeId, Prepared>,
}

impl Transform for ApplySplicer<'_> {
    fn postorder_statement(&mut self, stmt: Rc<Statement>) -> Vec<Rc<Statement>> {
        let StatementKind::MethodCall(call) = &stmt.kind else {
            return vec![stmt];
        };
        let Ok(MethodInstance::Apply {
            object: DeclRef::Declaration(instance),
            ..
        }) = MethodInstance::resolve(call, self.refs, self.types)
        else {
            return vec![stmt];
        };
        let Some(prepared) = self.prepared.get(&instance.id) else {
            return vec![stmt];
        };
        let ExpressionKind::MethodCall { args, .. } = &call.kind else {
            return vec![stmt];
        };

        let copy_out: Vec<Rc<Statement>> = prepared
            .params
            .iter()
            .zip(args)
            .filter(|((param, _), _)| param.direction.copies_out())
            .map(|((_, local), arg)| {
                Statement::assign(arg.deep_clone(), Expression::path(local.clone()))
            })
            .collect();

        let mut out = Vec::new();
        for ((param, local), arg) in prepared.params.iter().zip(args) {
            if param.direction.copies_in() {
                out.push(Statement::assign(Expression::path(local.clone()), arg.clone()));
            }
        }
        let body = copy_out_before_exit(&prepared.body.deep_clone(), &copy_out);
        out.extend(body.statements.iter().cloned());
        out.extend(copy_out);
        vec![Statement::with_span(
            StatementKind::Block(Block::new(out)),
            stmt.span,
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Dialect, MidEndOptions};
    use p4c_ir::print::print_declaration;
    use p4c_ir::{Direction, Type};

    fn ctx() -> PassContext {
        PassContext::new(
            SourceMap::new(),
            MidEndOptions {
                dialect: Dialect::Legacy,
                ..MidEndOptions::default()
            },
        )
    }

    /// `callee(inout bit<8> v) { bit<8> t; apply { t = v; v = t + 1; } }`
    fn callee() -> Rc<Declaration> {
        Declaration::control(
            "callee",
            vec![Parameter::new(Direction::InOut, Type::bits(8), "v")],
            vec![Declaration::variable("t", Type::bits(8), None)],
            Block::new(vec![
                Statement::assign(Expression::path("t"), Expression::path("v")),
                Statement::assign(
                    Expression::path("v"),
                    Expression::binary(
                        p4c_ir::BinaryOp::Add,
                        Expression::path("t"),
                        Expression::sized(1, 8),
                    ),
                ),
            ]),
        )
    }

    fn caller() -> Rc<Declaration> {
        Declaration::control(
            "caller",
            vec![Parameter::new(Direction::InOut, Type::bits(8), "x")],
            vec![Declaration::instance("c", Type::named("callee"), vec![])],
            Block::new(vec![Statement::call(Expression::call(
                Expression::member(Expression::path("c"), "apply"),
                vec![Expression::path("x")],
            ))]),
        )
    }

    #[test]
    fn splices_the_callee() {
        let program = Program::new(vec![callee(), caller()]);
        let mut ctx = ctx();
        ctx.refresh(&program);

        let (mut discover, mut driver) = inline_controls(SimpleControlsInliner);
        let program = discover.run(program, &mut ctx).unwrap();
        let out = driver.run(program, &mut ctx).unwrap();
        assert!(!ctx.diagnostics.has_errors());

        insta::assert_snapshot!(print_declaration(&out.declarations[1]), @r"
        control caller(inout bit<8> x) {
            bit<8> c_v;
            bit<8> c_t;
            apply {
                {
                    c_v = x;
                    c_t = c_v;
                    c_v = c_t + 8w1;
                    x = c_v;
                }
            }
        }
        ");
        let tc = p4c_typeck::check(&out);
        assert!(tc.errors.is_empty(), "{:?}", tc.errors);
    }

    #[test]
    fn general_inliner_handles_nesting() {
        let middle = Declaration::control(
            "middle",
            vec![Parameter::new(Direction::InOut, Type::bits(8), "v")],
            vec![Declaration::instance("inner", Type::named("callee"), vec![])],
            Block::new(vec![Statement::call(Expression::call(
                Expression::member(Expression::path("inner"), "apply"),
                vec![Expression::path("v")],
            ))]),
        );
        let top = Declaration::control(
            "top",
            vec![Parameter::new(Direction::InOut, Type::bits(8), "x")],
            vec![Declaration::instance("m", Type::named("middle"), vec![])],
            Block::new(vec![Statement::call(Expression::call(
                Expression::member(Expression::path("m"), "apply"),
                vec![Expression::path("x")],
            ))]),
        );
        let program = Program::new(vec![callee(), middle, top]);
        let mut ctx = ctx();
        ctx.refresh(&program);

        let (mut discover, mut driver) = inline_controls(GeneralInliner);
        let program = discover.run(program, &mut ctx).unwrap();
        let out = driver.run(program, &mut ctx).unwrap();

        let top = out.find("top").unwrap().as_control().unwrap().clone();
        assert!(top
            .locals
            .iter()
            .all(|d| !matches!(d.kind, DeclarationKind::Instance { .. })));
        let tc = p4c_typeck::check(&out);
        assert!(tc.errors.is_empty(), "{:?}", tc.errors);

        // Every local name in `top` is distinct.
        let mut names: Vec<&str> = top.locals.iter().map(|d| d.name.as_str()).collect();
        let count = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), count);
    }

    #[test]
    fn recursion_is_rejected() {
        let a = Declaration::control(
            "a",
            vec![],
            vec![Declaration::instance("b_inst", Type::named("b"), vec![])],
            Block::empty(),
        );
        let b = Declaration::control(
            "b",
            vec![],
            vec![Declaration::instance("a_inst", Type::named("a"), vec![])],
            Block::empty(),
        );
        let program = Program::new(vec![a, b]);
        let mut ctx = ctx();
        ctx.refresh(&program);

        let (mut discover, _) = inline_controls(SimpleControlsInliner);
        let err = discover.run(program, &mut ctx).unwrap_err();
        assert!(matches!(err, MidendError::RecursiveInlining { .. }));
    }

    #[test]
    fn exit_is_copied_into_the_caller() {
        let exits = Declaration::control(
            "callee",
            vec![Parameter::new(Direction::InOut, Type::bits(8), "v")],
            vec![],
            Block::new(vec![
                Statement::assign(Expression::path("v"), Expression::sized(0, 8)),
                Statement::exit(),
            ]),
        );
        let program = Program::new(vec![exits, caller()]);
        let mut ctx = ctx();
        ctx.refresh(&program);

        let (mut discover, mut driver) = inline_controls(SimpleControlsInliner);
        let program = discover.run(program, &mut ctx).unwrap();
        let out = driver.run(program, &mut ctx).unwrap();
        assert!(!ctx.diagnostics.has_errors());

        insta::assert_snapshot!(print_declaration(&out.declarations[1]), @r"
        control caller(inout bit<8> x) {
            bit<8> c_v;
            apply {
                {
                    c_v = x;
                    c_v = 8w0;
                    x = c_v;
                    exit;
                    x = c_v;
                }
            }
        }
        ");
    }

    #[test]
    fn callee_with_return_stays_an_instance() {
        let returns = Declaration::control(
            "callee",
            vec![Parameter::new(Direction::InOut, Type::bits(8), "v")],
            vec![],
            Block::new(vec![Statement::ret(None)]),
        );
        let program = Program::new(vec![returns, caller()]);
        let mut ctx = ctx();
        ctx.refresh(&program);

        let (mut discover, mut driver) = inline_controls(SimpleControlsInliner);
        let program = discover.run(program, &mut ctx).unwrap();
        let out = driver.run(program.clone(), &mut ctx).unwrap();
        assert!(Rc::ptr_eq(&out, &program));
        assert!(!ctx.diagnostics.has_errors());
    }
}
