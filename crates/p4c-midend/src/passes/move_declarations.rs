//! Hoists block-local variables out of bodies.
//!
//! Variables declared inside a control's `apply` body move to the end of
//! the control's locals; variables declared inside an action body move to
//! the start of that body. An initialiser stays where it was, as an
//! assignment. A variable whose name is already visible at the target
//! (a toplevel declaration, a parameter, a local, another moved variable)
//! stays in place.

use std::rc::Rc;

use p4c_ir::transform::{transform_block, Transform};
use p4c_ir::{
    Action, Block, Control, Declaration, DeclarationKind, Expression, ExpressionKind, Program,
    Statement, StatementKind,
};
use rustc_hash::FxHashSet;

use crate::error::MidendError;
use crate::pass::{Pass, PassContext};

#[derive(Debug, Default)]
pub struct MoveDeclarations;

impl Pass for MoveDeclarations {
    fn name(&self) -> &str {
        "MoveDeclarations"
    }

    fn run(
        &mut self,
        program: Rc<Program>,
        _ctx: &mut PassContext,
    ) -> Result<Rc<Program>, MidendError> {
        let toplevel: FxHashSet<String> =
            program.declarations.iter().map(|d| d.name.clone()).collect();
        let mut changed = false;
        let declarations: Vec<Rc<Declaration>> = program
            .declarations
            .iter()
            .map(|decl| {
                let new = move_in(decl, &toplevel);
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

fn move_in(decl: &Rc<Declaration>, toplevel: &FxHashSet<String>) -> Rc<Declaration> {
    match &decl.kind {
        DeclarationKind::Action(action) => {
            let mut taken = toplevel.clone();
            move_in_action(decl, action, &mut taken)
        }
        DeclarationKind::Control(control) => move_in_control(decl, control, toplevel.clone()),
        _ => decl.clone(),
    }
}

fn move_in_action(
    decl: &Rc<Declaration>,
    action: &Action,
    taken: &mut FxHashSet<String>,
) -> Rc<Declaration> {
    taken.extend(action.params.iter().map(|p| p.name.clone()));
    let (body, moved) = hoist(&action.body, taken);
    if moved.is_empty() {
        return decl.clone();
    }
    let mut statements: Vec<Rc<Statement>> = moved.into_iter().map(Statement::declare).collect();
    statements.extend(body.statements.iter().cloned());
    decl.rebuild(DeclarationKind::Action(Action {
        params: action.params.clone(),
        body: body.rebuild(statements),
    }))
}

fn move_in_control(
    decl: &Rc<Declaration>,
    control: &Control,
    mut taken: FxHashSet<String>,
) -> Rc<Declaration> {
    taken.extend(
        control
            .apply_params
            .iter()
            .chain(&control.ctor_params)
            .map(|p| p.name.clone()),
    );
    taken.extend(control.locals.iter().map(|d| d.name.clone()));

    let mut changed = false;
    let mut locals = Vec::with_capacity(control.locals.len());
    for local in &control.locals {
        let new = match &local.kind {
            DeclarationKind::Action(action) => move_in_action(local, action, &mut taken.clone()),
            _ => local.clone(),
        };
        changed |= !Rc::ptr_eq(&new, local);
        locals.push(new);
    }
    let (body, moved) = hoist(&control.body, &mut taken);
    if !changed && moved.is_empty() {
        return decl.clone();
    }
    locals.extend(moved);
    decl.rebuild(DeclarationKind::Control(Control {
        locals,
        body,
        ..control.clone()
    }))
}

/// `block` without its movable variable declarations, and those
/// declarations stripped of their initialisers.
fn hoist(block: &Rc<Block>, taken: &mut FxHashSet<String>) -> (Rc<Block>, Vec<Rc<Declaration>>) {
    let mut hoister = Hoister {
        taken,
        moved: Vec::new(),
    };
    let block = transform_block(&mut hoister, block);
    (block, hoister.moved)
}

struct Hoister<'a> {
    taken: &'a mut FxHashSet<String>,
    moved: Vec<Rc<Declaration>>,
}

impl Transform for Hoister<'_> {
    fn postorder_statement(&mut self, stmt: Rc<Statement>) -> Vec<Rc<Statement>> {
        let StatementKind::Declaration(decl) = &stmt.kind else {
            return vec![stmt];
        };
        let DeclarationKind::Variable { ty, init } = &decl.kind else {
            return vec![stmt];
        };
        if !self.taken.insert(decl.name.clone()) {
            tracing::trace!(name = %decl.name, "name already visible, declaration left in place");
            return vec![stmt];
        }
        self.moved.push(decl.rebuild(DeclarationKind::Variable {
            ty: ty.clone(),
            init: None,
        }));
        match init {
            Some(init) => {
                let target =
                    Expression::with_span(ExpressionKind::Path(decl.name.clone()), decl.span);
                vec![Statement::with_span(
                    StatementKind::Assignment {
                        left: target,
                        right: init.clone(),
                    },
                    stmt.span,
                )]
            }
            None => Vec::new(),
        }
    }
}
