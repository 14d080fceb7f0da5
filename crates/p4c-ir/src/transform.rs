//! Rebuilding traversal.
//!
//! A [`Transform`] declares hooks for the node categories it cares about;
//! everything else is traversed as the identity. For one node the pre-order
//! hook runs before its children are transformed and the post-order hook
//! runs after, so a post-order hook always sees already-rewritten children.
//!
//! Nothing is mutated. A node whose children did not change is returned by
//! pointer, so `Rc::ptr_eq(&before, &after)` tells whether anything below
//! was rewritten. Rebuilt nodes keep their id.

use std::rc::Rc;

use crate::decl::{Action, Control, Declaration, DeclarationKind, KeyElement, Program, Table};
use crate::expr::{Expression, ExpressionKind};
use crate::stmt::{Block, Statement, StatementKind, SwitchCase};

/// Result of a pre-order hook.
pub enum Flow<T> {
    /// Transform the children, then run the post-order hook.
    Continue(T),
    /// Keep the node as it is: skip the children and the post-order hook.
    Prune(T),
}

/// Post-order hooks for declarations and statements return a list: empty
/// deletes the node, several entries are spliced into the enclosing list.
pub trait Transform: Sized {
    fn preorder_declaration(&mut self, decl: Rc<Declaration>) -> Flow<Rc<Declaration>> {
        Flow::Continue(decl)
    }

    fn postorder_declaration(&mut self, decl: Rc<Declaration>) -> Vec<Rc<Declaration>> {
        vec![decl]
    }

    fn preorder_statement(&mut self, stmt: Rc<Statement>) -> Flow<Rc<Statement>> {
        Flow::Continue(stmt)
    }

    fn postorder_statement(&mut self, stmt: Rc<Statement>) -> Vec<Rc<Statement>> {
        vec![stmt]
    }

    fn postorder_block(&mut self, block: Rc<Block>) -> Rc<Block> {
        block
    }

    fn postorder_key_element(&mut self, key: KeyElement) -> KeyElement {
        key
    }

    fn preorder_expression(&mut self, expr: Rc<Expression>) -> Flow<Rc<Expression>> {
        Flow::Continue(expr)
    }

    fn postorder_expression(&mut self, expr: Rc<Expression>) -> Rc<Expression> {
        expr
    }
}

fn same_single<N>(result: &[Rc<N>], original: &Rc<N>) -> bool {
    result.len() == 1 && Rc::ptr_eq(&result[0], original)
}

/// Collapse a statement list into a single-statement slot (an `if` branch).
fn into_single(stmts: Vec<Rc<Statement>>) -> Rc<Statement> {
    match <[Rc<Statement>; 1]>::try_from(stmts) {
        Ok([single]) => single,
        Err(stmts) if stmts.is_empty() => Statement::empty(),
        Err(stmts) => Statement::block(stmts),
    }
}

pub fn transform_program<T: Transform>(t: &mut T, program: &Rc<Program>) -> Rc<Program> {
    let (declarations, changed) = transform_declarations(t, &program.declarations);
    if changed {
        Program::new(declarations)
    } else {
        program.clone()
    }
}

// ── Declarations ───────────────────────────────────────────────────────

pub fn transform_declarations<T: Transform>(
    t: &mut T,
    decls: &[Rc<Declaration>],
) -> (Vec<Rc<Declaration>>, bool) {
    let mut out = Vec::with_capacity(decls.len());
    let mut changed = false;
    for decl in decls {
        let result = transform_declaration(t, decl);
        changed |= !same_single(&result, decl);
        out.extend(result);
    }
    (out, changed)
}

pub fn transform_declaration<T: Transform>(
    t: &mut T,
    decl: &Rc<Declaration>,
) -> Vec<Rc<Declaration>> {
    let decl = match t.preorder_declaration(decl.clone()) {
        Flow::Continue(decl) => decl,
        Flow::Prune(decl) => return vec![decl],
    };
    let decl = transform_declaration_children(t, &decl);
    t.postorder_declaration(decl)
}

fn transform_declaration_children<T: Transform>(
    t: &mut T,
    decl: &Rc<Declaration>,
) -> Rc<Declaration> {
    let kind = match &decl.kind {
        DeclarationKind::Header { .. }
        | DeclarationKind::Struct { .. }
        | DeclarationKind::Extern(_)
        | DeclarationKind::ExternFunction(_)
        | DeclarationKind::Package { .. } => return decl.clone(),
        DeclarationKind::Action(action) => {
            let body = transform_block(t, &action.body);
            if Rc::ptr_eq(&body, &action.body) {
                return decl.clone();
            }
            DeclarationKind::Action(Action {
                params: action.params.clone(),
                body,
            })
        }
        DeclarationKind::Table(table) => {
            let mut changed = false;
            let mut key = Vec::with_capacity(table.key.len());
            for element in &table.key {
                let new = transform_key_element(t, element);
                changed |= new.id != element.id
                    || !Rc::ptr_eq(&new.expression, &element.expression)
                    || new.match_kind != element.match_kind;
                key.push(new);
            }
            let (actions, actions_changed) = transform_expressions(t, &table.actions);
            let default_action = table
                .default_action
                .as_ref()
                .map(|e| transform_expression(t, e));
            changed |= actions_changed || !same_optional(&default_action, &table.default_action);
            if !changed {
                return decl.clone();
            }
            DeclarationKind::Table(Table {
                key,
                actions,
                default_action,
            })
        }
        DeclarationKind::Control(control) => {
            let (locals, locals_changed) = transform_declarations(t, &control.locals);
            let body = transform_block(t, &control.body);
            if !locals_changed && Rc::ptr_eq(&body, &control.body) {
                return decl.clone();
            }
            DeclarationKind::Control(Control {
                locals,
                body,
                ..control.clone()
            })
        }
        DeclarationKind::Instance { ty, args } => {
            let (args, changed) = transform_expressions(t, args);
            if !changed {
                return decl.clone();
            }
            DeclarationKind::Instance {
                ty: ty.clone(),
                args,
            }
        }
        DeclarationKind::Variable { ty, init } => {
            let new_init = init.as_ref().map(|e| transform_expression(t, e));
            if same_optional(&new_init, init) {
                return decl.clone();
            }
            DeclarationKind::Variable {
                ty: ty.clone(),
                init: new_init,
            }
        }
        DeclarationKind::Constant { ty, value } => {
            let new_value = transform_expression(t, value);
            if Rc::ptr_eq(&new_value, value) {
                return decl.clone();
            }
            DeclarationKind::Constant {
                ty: ty.clone(),
                value: new_value,
            }
        }
    };
    decl.rebuild(kind)
}

fn transform_key_element<T: Transform>(t: &mut T, key: &KeyElement) -> KeyElement {
    let expression = transform_expression(t, &key.expression);
    let key = if Rc::ptr_eq(&expression, &key.expression) {
        key.clone()
    } else {
        KeyElement {
            id: key.id,
            expression,
            match_kind: key.match_kind.clone(),
        }
    };
    t.postorder_key_element(key)
}

// ── Statements ─────────────────────────────────────────────────────────

pub fn transform_block<T: Transform>(t: &mut T, block: &Rc<Block>) -> Rc<Block> {
    let (statements, changed) = transform_statements(t, &block.statements);
    let block = if changed {
        block.rebuild(statements)
    } else {
        block.clone()
    };
    t.postorder_block(block)
}

pub fn transform_statements<T: Transform>(
    t: &mut T,
    stmts: &[Rc<Statement>],
) -> (Vec<Rc<Statement>>, bool) {
    let mut out = Vec::with_capacity(stmts.len());
    let mut changed = false;
    for stmt in stmts {
        let result = transform_statement(t, stmt);
        changed |= !same_single(&result, stmt);
        out.extend(result);
    }
    (out, changed)
}

pub fn transform_statement<T: Transform>(t: &mut T, stmt: &Rc<Statement>) -> Vec<Rc<Statement>> {
    let stmt = match t.preorder_statement(stmt.clone()) {
        Flow::Continue(stmt) => stmt,
        Flow::Prune(stmt) => return vec![stmt],
    };

    // A local declaration may expand into several declarations.
    if let StatementKind::Declaration(decl) = &stmt.kind {
        let decls = transform_declaration(t, decl);
        if same_single(&decls, decl) {
            return t.postorder_statement(stmt);
        }
        let mut out = Vec::with_capacity(decls.len());
        for (i, decl) in decls.into_iter().enumerate() {
            let new = if i == 0 {
                stmt.rebuild(StatementKind::Declaration(decl))
            } else {
                Statement::declare(decl)
            };
            out.extend(t.postorder_statement(new));
        }
        return out;
    }

    let stmt = transform_statement_children(t, &stmt);
    t.postorder_statement(stmt)
}

fn transform_statement_children<T: Transform>(t: &mut T, stmt: &Rc<Statement>) -> Rc<Statement> {
    let kind = match &stmt.kind {
        StatementKind::Block(block) => {
            let new = transform_block(t, block);
            if Rc::ptr_eq(&new, block) {
                return stmt.clone();
            }
            StatementKind::Block(new)
        }
        StatementKind::Assignment { left, right } => {
            let new_left = transform_expression(t, left);
            let new_right = transform_expression(t, right);
            if Rc::ptr_eq(&new_left, left) && Rc::ptr_eq(&new_right, right) {
                return stmt.clone();
            }
            StatementKind::Assignment {
                left: new_left,
                right: new_right,
            }
        }
        StatementKind::MethodCall(call) => {
            let new = transform_expression(t, call);
            if Rc::ptr_eq(&new, call) {
                return stmt.clone();
            }
            StatementKind::MethodCall(new)
        }
        StatementKind::If {
            condition,
            if_true,
            if_false,
        } => {
            let new_condition = transform_expression(t, condition);
            let true_result = transform_statement(t, if_true);
            let true_changed = !same_single(&true_result, if_true);
            let new_true = into_single(true_result);
            let mut false_changed = false;
            let new_false = if_false.as_ref().map(|s| {
                let result = transform_statement(t, s);
                false_changed = !same_single(&result, s);
                into_single(result)
            });
            if Rc::ptr_eq(&new_condition, condition) && !true_changed && !false_changed {
                return stmt.clone();
            }
            StatementKind::If {
                condition: new_condition,
                if_true: new_true,
                if_false: new_false,
            }
        }
        StatementKind::Switch { expression, cases } => {
            let new_expression = transform_expression(t, expression);
            let mut changed = !Rc::ptr_eq(&new_expression, expression);
            let mut new_cases = Vec::with_capacity(cases.len());
            for case in cases {
                let body = case.body.as_ref().map(|b| transform_block(t, b));
                changed |= !same_optional(&body, &case.body);
                new_cases.push(SwitchCase {
                    label: case.label.clone(),
                    body,
                });
            }
            if !changed {
                return stmt.clone();
            }
            StatementKind::Switch {
                expression: new_expression,
                cases: new_cases,
            }
        }
        StatementKind::Return(Some(value)) => {
            let new = transform_expression(t, value);
            if Rc::ptr_eq(&new, value) {
                return stmt.clone();
            }
            StatementKind::Return(Some(new))
        }
        // Declarations are expanded by `transform_statement`.
        StatementKind::Declaration(_)
        | StatementKind::Return(None)
        | StatementKind::Exit
        | StatementKind::Empty => return stmt.clone(),
    };
    stmt.rebuild(kind)
}

// ── Expressions ────────────────────────────────────────────────────────

pub fn transform_expression<T: Transform>(t: &mut T, expr: &Rc<Expression>) -> Rc<Expression> {
    let expr = match t.preorder_expression(expr.clone()) {
        Flow::Continue(expr) => expr,
        Flow::Prune(expr) => return expr,
    };
    let expr = transform_expression_children(t, &expr);
    t.postorder_expression(expr)
}

fn transform_expressions<T: Transform>(
    t: &mut T,
    exprs: &[Rc<Expression>],
) -> (Vec<Rc<Expression>>, bool) {
    let mut changed = false;
    let out = exprs
        .iter()
        .map(|e| {
            let new = transform_expression(t, e);
            changed |= !Rc::ptr_eq(&new, e);
            new
        })
        .collect();
    (out, changed)
}

fn transform_expression_children<T: Transform>(
    t: &mut T,
    expr: &Rc<Expression>,
) -> Rc<Expression> {
    let kind = match &expr.kind {
        ExpressionKind::Constant { .. } | ExpressionKind::Bool(_) | ExpressionKind::Path(_) => {
            return expr.clone()
        }
        ExpressionKind::Member { expr: inner, member } => {
            let new = transform_expression(t, inner);
            if Rc::ptr_eq(&new, inner) {
                return expr.clone();
            }
            ExpressionKind::Member {
                expr: new,
                member: member.clone(),
            }
        }
        ExpressionKind::ArrayIndex { base, index } => {
            let new_base = transform_expression(t, base);
            let new_index = transform_expression(t, index);
            if Rc::ptr_eq(&new_base, base) && Rc::ptr_eq(&new_index, index) {
                return expr.clone();
            }
            ExpressionKind::ArrayIndex {
                base: new_base,
                index: new_index,
            }
        }
        ExpressionKind::MethodCall {
            method,
            type_args,
            args,
        } => {
            let new_method = transform_expression(t, method);
            let (new_args, args_changed) = transform_expressions(t, args);
            if Rc::ptr_eq(&new_method, method) && !args_changed {
                return expr.clone();
            }
            ExpressionKind::MethodCall {
                method: new_method,
                type_args: type_args.clone(),
                args: new_args,
            }
        }
        ExpressionKind::ConstructorCall { ty, args } => {
            let (new_args, changed) = transform_expressions(t, args);
            if !changed {
                return expr.clone();
            }
            ExpressionKind::ConstructorCall {
                ty: ty.clone(),
                args: new_args,
            }
        }
        ExpressionKind::Unary { op, operand } => {
            let new = transform_expression(t, operand);
            if Rc::ptr_eq(&new, operand) {
                return expr.clone();
            }
            ExpressionKind::Unary {
                op: *op,
                operand: new,
            }
        }
        ExpressionKind::Binary { op, left, right } => {
            let new_left = transform_expression(t, left);
            let new_right = transform_expression(t, right);
            if Rc::ptr_eq(&new_left, left) && Rc::ptr_eq(&new_right, right) {
                return expr.clone();
            }
            ExpressionKind::Binary {
                op: *op,
                left: new_left,
                right: new_right,
            }
        }
    };
    expr.rebuild(kind)
}

fn same_optional<N>(a: &Option<Rc<N>>, b: &Option<Rc<N>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::Type;

    struct Identity;
    impl Transform for Identity {}

    fn sample_program() -> Rc<Program> {
        let body = Block::new(vec![
            Statement::assign(Expression::path("x"), Expression::path("y")),
            Statement::if_else(
                Expression::path("flag"),
                Statement::assign(Expression::path("x"), Expression::constant(1)),
                None,
            ),
        ]);
        Program::new(vec![Declaration::control(
            "c",
            vec![],
            vec![Declaration::variable("x", Type::bits(8), None)],
            body,
        )])
    }

    #[test]
    fn identity_shares_everything() {
        let program = sample_program();
        let out = transform_program(&mut Identity, &program);
        assert!(Rc::ptr_eq(&program, &out));
    }

    struct Rename;
    impl Transform for Rename {
        fn postorder_expression(&mut self, expr: Rc<Expression>) -> Rc<Expression> {
            match expr.as_path() {
                Some("y") => expr.rebuild(ExpressionKind::Path("z".into())),
                _ => expr,
            }
        }
    }

    #[test]
    fn rewrite_rebuilds_only_the_spine() {
        let program = sample_program();
        let out = transform_program(&mut Rename, &program);
        assert!(!Rc::ptr_eq(&program, &out));

        let before = program.declarations[0].as_control().unwrap();
        let after = out.declarations[0].as_control().unwrap();
        assert_eq!(program.declarations[0].id, out.declarations[0].id);
        // Untouched siblings are shared.
        assert!(Rc::ptr_eq(&before.locals[0], &after.locals[0]));
        assert!(Rc::ptr_eq(&before.body.statements[1], &after.body.statements[1]));
        let StatementKind::Assignment { right, .. } = &after.body.statements[0].kind else {
            panic!("expected assignment");
        };
        assert_eq!(right.as_path(), Some("z"));
    }

    #[derive(Default)]
    struct Order {
        events: Vec<String>,
    }

    impl Transform for Order {
        fn preorder_statement(&mut self, stmt: Rc<Statement>) -> Flow<Rc<Statement>> {
            self.events.push(format!("pre {}", kind_name(&stmt)));
            Flow::Continue(stmt)
        }

        fn postorder_statement(&mut self, stmt: Rc<Statement>) -> Vec<Rc<Statement>> {
            self.events.push(format!("post {}", kind_name(&stmt)));
            vec![stmt]
        }
    }

    fn kind_name(stmt: &Statement) -> &'static str {
        match stmt.kind {
            StatementKind::Assignment { .. } => "assign",
            StatementKind::If { .. } => "if",
            _ => "other",
        }
    }

    #[test]
    fn preorder_before_postorder_before_next_sibling() {
        let program = sample_program();
        let mut order = Order::default();
        transform_program(&mut order, &program);
        assert_eq!(
            order.events,
            vec![
                "pre assign",
                "post assign",
                "pre if",
                "pre assign",
                "post assign",
                "post if",
            ]
        );
    }

    struct Prefix;
    impl Transform for Prefix {
        fn postorder_statement(&mut self, stmt: Rc<Statement>) -> Vec<Rc<Statement>> {
            if matches!(stmt.kind, StatementKind::Assignment { .. }) {
                vec![Statement::empty(), stmt]
            } else {
                vec![stmt]
            }
        }
    }

    #[test]
    fn splices_lists_and_wraps_single_slots() {
        let program = sample_program();
        let out = transform_program(&mut Prefix, &program);
        let body = &out.declarations[0].as_control().unwrap().body;
        // assignment gained a sibling; the if branch became a block
        assert_eq!(body.statements.len(), 3);
        let StatementKind::If { if_true, .. } = &body.statements[2].kind else {
            panic!("expected if");
        };
        let StatementKind::Block(block) = &if_true.kind else {
            panic!("expected block in if branch");
        };
        assert_eq!(block.statements.len(), 2);
    }

    struct PruneIf;
    impl Transform for PruneIf {
        fn preorder_statement(&mut self, stmt: Rc<Statement>) -> Flow<Rc<Statement>> {
            if matches!(stmt.kind, StatementKind::If { .. }) {
                Flow::Prune(stmt)
            } else {
                Flow::Continue(stmt)
            }
        }

        fn postorder_expression(&mut self, expr: Rc<Expression>) -> Rc<Expression> {
            match expr.as_path() {
                Some("x") => expr.rebuild(ExpressionKind::Path("w".into())),
                _ => expr,
            }
        }
    }

    #[test]
    fn prune_skips_children() {
        let program = sample_program();
        let out = transform_program(&mut PruneIf, &program);
        let before = &program.declarations[0].as_control().unwrap().body;
        let after = &out.declarations[0].as_control().unwrap().body;
        assert!(!Rc::ptr_eq(&before.statements[0], &after.statements[0]));
        assert!(Rc::ptr_eq(&before.statements[1], &after.statements[1]));
    }
}
