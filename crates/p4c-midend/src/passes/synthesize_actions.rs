//! Moving control-body work into actions and tables.
//!
//! A target executes a control's `apply` body as a sequence of table
//! applications. Two passes bring a body into that shape:
//!
//! * [`SynthesizeActions`] wraps every run of consecutive statements that
//!   do work (assignments, extern calls, header operations) into a new
//!   parameterless action at the end of the control's locals and calls it
//!   in their place. Table and control applications, branches and `exit`
//!   stay in the body, as do direct action calls.
//! * [`MoveActionsToTables`] replaces each direct action call in a body by
//!   the application of a new table whose only action, and default action,
//!   is that call.
//!
//! Controls declared in library sources are left alone.

use std::rc::Rc;

use p4c_common::SourceMap;
use p4c_ir::transform::{transform_block, Transform};
use p4c_ir::visit::{walk_block, walk_expression, walk_statement, Visitor};
use p4c_ir::{
    Action, Block, Control, Declaration, DeclarationKind, Direction, Expression, ExpressionKind,
    NameGenerator, Program, Statement, StatementKind,
};
use p4c_typeck::{RefMap, TypeMap};

use crate::error::{ClassificationError, MidendError};
use crate::method_instance::MethodInstance;
use crate::pass::{Pass, PassContext, SideTables};

/// Run `rewrite` on every user control; `None` keeps the control as is.
fn rewrite_controls(
    program: &Rc<Program>,
    sources: &SourceMap,
    mut rewrite: impl FnMut(&Rc<Declaration>, &Control) -> Result<Option<Control>, MidendError>,
) -> Result<Rc<Program>, MidendError> {
    let mut changed = false;
    let mut declarations = Vec::with_capacity(program.declarations.len());
    for decl in &program.declarations {
        let rewritten = match &decl.kind {
            DeclarationKind::Control(control) if !sources.is_library(decl.span.as_ref()) => {
                rewrite(decl, control)?
            }
            _ => None,
        };
        match rewritten {
            Some(control) => {
                changed = true;
                declarations.push(decl.rebuild(DeclarationKind::Control(control)));
            }
            None => declarations.push(decl.clone()),
        }
    }
    Ok(if changed {
        Program::new(declarations)
    } else {
        program.clone()
    })
}

/// `name();` positioned at `stmt`.
fn call_statement(name: &str, stmt: &Statement) -> Rc<Statement> {
    let span = stmt.span;
    let call = Expression::with_span(
        ExpressionKind::MethodCall {
            method: Expression::with_span(ExpressionKind::Path(name.to_string()), span),
            type_args: Vec::new(),
            args: Vec::new(),
        },
        span,
    );
    Statement::with_span(StatementKind::MethodCall(call), span)
}

// ── SynthesizeActions ──────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SynthesizeActions;

impl Pass for SynthesizeActions {
    fn name(&self) -> &str {
        "SynthesizeActions"
    }

    fn requires(&self) -> SideTables {
        SideTables::REFS | SideTables::TYPES
    }

    fn run(
        &mut self,
        program: Rc<Program>,
        ctx: &mut PassContext,
    ) -> Result<Rc<Program>, MidendError> {
        let mut names = NameGenerator::from_program(&program);
        let (refs, types) = (&ctx.refs, &ctx.types);
        rewrite_controls(&program, &ctx.sources, |decl, control| {
            if declares_variables(&control.body) {
                // Moved statements could lose sight of a block-local variable.
                tracing::debug!(control = %decl.name, "body declares variables, left as is");
                return Ok(None);
            }
            let mut synthesizer = Synthesizer {
                refs,
                types,
                names: &mut names,
                actions: Vec::new(),
                error: None,
            };
            let body = transform_block(&mut synthesizer, &control.body);
            if let Some(err) = synthesizer.error {
                return Err(err.into());
            }
            if synthesizer.actions.is_empty() {
                return Ok(None);
            }
            let mut locals = control.locals.clone();
            locals.extend(synthesizer.actions);
            Ok(Some(Control {
                locals,
                body,
                ..control.clone()
            }))
        })
    }
}

fn declares_variables(block: &Rc<Block>) -> bool {
    struct Finder(bool);

    impl Visitor for Finder {
        fn visit_statement(&mut self, stmt: &Rc<Statement>) {
            if matches!(stmt.kind, StatementKind::Declaration(_)) {
                self.0 = true;
            } else {
                walk_statement(self, stmt);
            }
        }
    }

    let mut finder = Finder(false);
    walk_block(&mut finder, block);
    finder.0
}

struct Synthesizer<'a> {
    refs: &'a RefMap,
    types: &'a TypeMap,
    names: &'a mut NameGenerator,
    actions: Vec<Rc<Declaration>>,
    error: Option<ClassificationError>,
}

impl Synthesizer<'_> {
    fn must_move(&mut self, stmt: &Rc<Statement>) -> bool {
        match &stmt.kind {
            StatementKind::Assignment { .. } => !self.applies_table(stmt),
            StatementKind::MethodCall(call) => {
                match MethodInstance::resolve(call, self.refs, self.types) {
                    Ok(MethodInstance::Apply { .. } | MethodInstance::ActionCall { .. }) => false,
                    Ok(_) => true,
                    Err(err) => {
                        self.error = self.error.take().or(Some(err));
                        false
                    }
                }
            }
            _ => false,
        }
    }

    /// Whether `stmt` applies a table somewhere inside, as in
    /// `hit = t.apply().hit;`.
    fn applies_table(&self, stmt: &Rc<Statement>) -> bool {
        struct Finder<'a> {
            refs: &'a RefMap,
            types: &'a TypeMap,
            found: bool,
        }

        impl Visitor for Finder<'_> {
            fn visit_expression(&mut self, expr: &Rc<Expression>) {
                if expr.is_method_call() {
                    if let Ok(MethodInstance::Apply { applied, .. }) =
                        MethodInstance::resolve(expr, self.refs, self.types)
                    {
                        if matches!(applied.kind, DeclarationKind::Table(_)) {
                            self.found = true;
                            return;
                        }
                    }
                }
                walk_expression(self, expr);
            }
        }

        let mut finder = Finder {
            refs: self.refs,
            types: self.types,
            found: false,
        };
        walk_statement(&mut finder, stmt);
        finder.found
    }

    fn synthesize(&mut self, group: Vec<Rc<Statement>>) -> Rc<Statement> {
        let name = self.names.new_name("act");
        let first = group[0].clone();
        tracing::trace!(action = %name, statements = group.len(), "synthesized action");
        self.actions.push(Declaration::with_span(
            name.clone(),
            DeclarationKind::Action(Action {
                params: Vec::new(),
                body: Block::new(group),
            }),
            first.span,
        ));
        call_statement(&name, &first)
    }

    /// A lone statement in a branch slot.
    fn wrap_branch(&mut self, stmt: &Rc<Statement>) -> Rc<Statement> {
        if self.must_move(stmt) {
            self.synthesize(vec![stmt.clone()])
        } else {
            stmt.clone()
        }
    }
}

impl Transform for Synthesizer<'_> {
    fn postorder_statement(&mut self, stmt: Rc<Statement>) -> Vec<Rc<Statement>> {
        let StatementKind::If {
            condition,
            if_true,
            if_false,
        } = &stmt.kind
        else {
            return vec![stmt];
        };
        let new_true = self.wrap_branch(if_true);
        let new_false = if_false.as_ref().map(|s| self.wrap_branch(s));
        let unchanged = Rc::ptr_eq(&new_true, if_true)
            && match (&new_false, if_false) {
                (Some(new), Some(old)) => Rc::ptr_eq(new, old),
                _ => true,
            };
        if unchanged {
            return vec![stmt];
        }
        vec![stmt.rebuild(StatementKind::If {
            condition: condition.clone(),
            if_true: new_true,
            if_false: new_false,
        })]
    }

    fn postorder_block(&mut self, block: Rc<Block>) -> Rc<Block> {
        let mut statements = Vec::with_capacity(block.statements.len());
        let mut group = Vec::new();
        let mut changed = false;
        for stmt in &block.statements {
            if self.must_move(stmt) {
                group.push(stmt.clone());
                continue;
            }
            if !group.is_empty() {
                statements.push(self.synthesize(std::mem::take(&mut group)));
                changed = true;
            }
            statements.push(stmt.clone());
        }
        if !group.is_empty() {
            statements.push(self.synthesize(group));
            changed = true;
        }
        if changed {
            block.rebuild(statements)
        } else {
            block
        }
    }
}

// ── MoveActionsToTables ────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MoveActionsToTables;

impl Pass for MoveActionsToTables {
    fn name(&self) -> &str {
        "MoveActionsToTables"
    }

    fn requires(&self) -> SideTables {
        SideTables::REFS | SideTables::TYPES
    }

    fn run(
        &mut self,
        program: Rc<Program>,
        ctx: &mut PassContext,
    ) -> Result<Rc<Program>, MidendError> {
        let mut names = NameGenerator::from_program(&program);
        let (refs, types) = (&ctx.refs, &ctx.types);
        rewrite_controls(&program, &ctx.sources, |_, control| {
            let mut mover = TableMaker {
                refs,
                types,
                names: &mut names,
                tables: Vec::new(),
                error: None,
            };
            let body = transform_block(&mut mover, &control.body);
            if let Some(err) = mover.error {
                return Err(err.into());
            }
            if mover.tables.is_empty() {
                return Ok(None);
            }
            let mut locals = control.locals.clone();
            locals.extend(mover.tables);
            Ok(Some(Control {
                locals,
                body,
                ..control.clone()
            }))
        })
    }
}

struct TableMaker<'a> {
    refs: &'a RefMap,
    types: &'a TypeMap,
    names: &'a mut NameGenerator,
    tables: Vec<Rc<Declaration>>,
    error: Option<ClassificationError>,
}

impl Transform for TableMaker<'_> {
    fn postorder_statement(&mut self, stmt: Rc<Statement>) -> Vec<Rc<Statement>> {
        let StatementKind::MethodCall(call) = &stmt.kind else {
            return vec![stmt];
        };
        let action = match MethodInstance::resolve(call, self.refs, self.types) {
            Ok(MethodInstance::ActionCall { action, .. }) => action,
            Ok(_) => return vec![stmt],
            Err(err) => {
                self.error = self.error.take().or(Some(err));
                return vec![stmt];
            }
        };
        let (Some(params), ExpressionKind::MethodCall { method, args, .. }) =
            (action.as_action().map(|a| &a.params), &call.kind)
        else {
            return vec![stmt];
        };

        // Arguments for directional parameters are fixed by the call;
        // directionless ones only appear in the default action.
        let bound = params
            .iter()
            .take_while(|p| p.direction != Direction::None)
            .count()
            .min(args.len());
        let entry = if bound == 0 {
            method.deep_clone()
        } else {
            Expression::call(
                method.deep_clone(),
                args[..bound].iter().map(|a| a.deep_clone()).collect(),
            )
        };
        let name = self.names.new_name(&format!("tbl_{}", action.name));
        tracing::trace!(table = %name, action = %action.name, "moved action call into a table");
        self.tables.push(Declaration::with_span(
            name.clone(),
            DeclarationKind::Table(p4c_ir::Table {
                key: Vec::new(),
                actions: vec![entry],
                default_action: Some(call.clone()),
            }),
            stmt.span,
        ));

        let apply = Expression::with_span(
            ExpressionKind::Member {
                expr: Expression::with_span(ExpressionKind::Path(name), stmt.span),
                member: "apply".to_string(),
            },
            stmt.span,
        );
        let applied = Expression::with_span(
            ExpressionKind::MethodCall {
                method: apply,
                type_args: Vec::new(),
                args: Vec::new(),
            },
            stmt.span,
        );
        vec![stmt.rebuild(StatementKind::MethodCall(applied))]
    }
}
