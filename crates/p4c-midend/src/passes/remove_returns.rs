//! Removal of `return` from action and control bodies.
//!
//! A body that returns gets a `bool` flag, cleared on entry and set where
//! each `return` stood. Statements after a `return` in the same block are
//! unreachable and dropped; statements after one that only may return are
//! wrapped in `if (!flag) { ... }`. Actions declare the flag at the top of
//! their body, controls among their locals.
//!
//! The inliners run after this: a callee without `return` can be spliced
//! into its caller as is.

use std::rc::Rc;

use p4c_ir::{
    Action, Block, Control, Declaration, DeclarationKind, Expression, NameGenerator, Program,
    Statement, StatementKind, SwitchCase, Type, UnaryOp,
};

use crate::error::MidendError;
use crate::pass::{Pass, PassContext};

#[derive(Debug, Default)]
pub struct RemoveReturns;

impl Pass for RemoveReturns {
    fn name(&self) -> &str {
        "RemoveReturns"
    }

    fn run(
        &mut self,
        program: Rc<Program>,
        _ctx: &mut PassContext,
    ) -> Result<Rc<Program>, MidendError> {
        let mut names = NameGenerator::from_program(&program);
        let mut changed = false;
        let declarations: Vec<Rc<Declaration>> = program
            .declarations
            .iter()
            .map(|decl| {
                let new = remove_in(decl, &mut names);
                changed |= !Rc::ptr_eq(&new, decl);
                new
            })
            .collect();
        Ok(if changed {
            Program::new(declarations)
        } else {
            program
        })
    }
}

fn remove_in(decl: &Rc<Declaration>, names: &mut NameGenerator) -> Rc<Declaration> {
    match &decl.kind {
        DeclarationKind::Action(action) => remove_in_action(decl, action, names),
        DeclarationKind::Control(control) => remove_in_control(decl, control, names),
        _ => decl.clone(),
    }
}

fn remove_in_action(
    decl: &Rc<Declaration>,
    action: &Action,
    names: &mut NameGenerator,
) -> Rc<Declaration> {
    if !action.body.contains_return() {
        return decl.clone();
    }
    let flag = names.new_name("hasReturned");
    tracing::debug!(action = %decl.name, %flag, "removing returns");
    let body = guard_block(&action.body, &flag);
    let mut statements = vec![Statement::declare(Declaration::variable(
        flag.as_str(),
        Type::bool(),
        Some(Expression::boolean(false)),
    ))];
    statements.extend(body.statements.iter().cloned());
    decl.rebuild(DeclarationKind::Action(Action {
        params: action.params.clone(),
        body: body.rebuild(statements),
    }))
}

fn remove_in_control(
    decl: &Rc<Declaration>,
    control: &Control,
    names: &mut NameGenerator,
) -> Rc<Declaration> {
    let mut changed = false;
    let mut locals: Vec<Rc<Declaration>> = control
        .locals
        .iter()
        .map(|local| {
            let new = match &local.kind {
                DeclarationKind::Action(action) => remove_in_action(local, action, names),
                _ => local.clone(),
            };
            changed |= !Rc::ptr_eq(&new, local);
            new
        })
        .collect();

    let mut body = control.body.clone();
    if control.body.contains_return() {
        let flag = names.new_name("hasReturned");
        tracing::debug!(control = %decl.name, %flag, "removing returns");
        locals.push(Declaration::variable(flag.as_str(), Type::bool(), None));
        let guarded = guard_block(&control.body, &flag);
        let mut statements = vec![Statement::assign(
            Expression::path(flag.as_str()),
            Expression::boolean(false),
        )];
        statements.extend(guarded.statements.iter().cloned());
        body = guarded.rebuild(statements);
        changed = true;
    }
    if !changed {
        return decl.clone();
    }
    decl.rebuild(DeclarationKind::Control(Control {
        locals,
        body,
        ..control.clone()
    }))
}

fn guard_block(block: &Rc<Block>, flag: &str) -> Rc<Block> {
    if !block.contains_return() {
        return block.clone();
    }
    block.rebuild(guard_statements(&block.statements, flag))
}

fn guard_statements(statements: &[Rc<Statement>], flag: &str) -> Vec<Rc<Statement>> {
    let mut out = Vec::with_capacity(statements.len());
    for (i, stmt) in statements.iter().enumerate() {
        if !stmt.contains_return() {
            out.push(stmt.clone());
            continue;
        }
        out.push(guard_statement(stmt, flag));
        let rest = &statements[i + 1..];
        if rest.is_empty() || matches!(stmt.kind, StatementKind::Return(_)) {
            if !rest.is_empty() {
                tracing::trace!(dropped = rest.len(), "statements after return are unreachable");
            }
            return out;
        }
        out.push(Statement::if_else(
            Expression::unary(UnaryOp::Not, Expression::path(flag)),
            Statement::block(guard_statements(rest, flag)),
            None,
        ));
        return out;
    }
    out
}

fn guard_statement(stmt: &Rc<Statement>, flag: &str) -> Rc<Statement> {
    if !stmt.contains_return() {
        return stmt.clone();
    }
    match &stmt.kind {
        StatementKind::Return(_) => stmt.rebuild(StatementKind::Assignment {
            left: Expression::path(flag),
            right: Expression::boolean(true),
        }),
        StatementKind::Block(block) => stmt.rebuild(StatementKind::Block(guard_block(block, flag))),
        StatementKind::If {
            condition,
            if_true,
            if_false,
        } => stmt.rebuild(StatementKind::If {
            condition: condition.clone(),
            if_true: guard_statement(if_true, flag),
            if_false: if_false.as_ref().map(|s| guard_statement(s, flag)),
        }),
        StatementKind::Switch { expression, cases } => stmt.rebuild(StatementKind::Switch {
            expression: expression.clone(),
            cases: cases
                .iter()
                .map(|case| SwitchCase {
                    label: case.label.clone(),
                    body: case.body.as_ref().map(|b| guard_block(b, flag)),
                })
                .collect(),
        }),
        _ => stmt.clone(),
    }
}
