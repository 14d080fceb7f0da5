//! Read-only traversal.
//!
//! Override the `visit_*` methods for the node kinds of interest and call
//! the matching `walk_*` function to keep descending. Kinds that are not
//! overridden are walked transparently.

use std::rc::Rc;

use crate::decl::{Declaration, DeclarationKind, KeyElement, Program};
use crate::expr::{Expression, ExpressionKind};
use crate::stmt::{Block, Statement, StatementKind};

pub trait Visitor: Sized {
    fn visit_declaration(&mut self, decl: &Rc<Declaration>) {
        walk_declaration(self, decl)
    }

    fn visit_block(&mut self, block: &Rc<Block>) {
        walk_block(self, block)
    }

    fn visit_statement(&mut self, stmt: &Rc<Statement>) {
        walk_statement(self, stmt)
    }

    fn visit_key_element(&mut self, key: &KeyElement) {
        walk_key_element(self, key)
    }

    fn visit_expression(&mut self, expr: &Rc<Expression>) {
        walk_expression(self, expr)
    }
}

pub fn walk_program(visitor: &mut impl Visitor, program: &Program) {
    for decl in &program.declarations {
        visitor.visit_declaration(decl);
    }
}

pub fn walk_declaration(visitor: &mut impl Visitor, decl: &Rc<Declaration>) {
    match &decl.kind {
        DeclarationKind::Header { .. }
        | DeclarationKind::Struct { .. }
        | DeclarationKind::Extern(_)
        | DeclarationKind::ExternFunction(_)
        | DeclarationKind::Package { .. } => {}
        DeclarationKind::Action(action) => visitor.visit_block(&action.body),
        DeclarationKind::Table(table) => {
            for key in &table.key {
                visitor.visit_key_element(key);
            }
            for action in &table.actions {
                visitor.visit_expression(action);
            }
            if let Some(default_action) = &table.default_action {
                visitor.visit_expression(default_action);
            }
        }
        DeclarationKind::Control(control) => {
            for local in &control.locals {
                visitor.visit_declaration(local);
            }
            visitor.visit_block(&control.body);
        }
        DeclarationKind::Instance { args, .. } => {
            for arg in args {
                visitor.visit_expression(arg);
            }
        }
        DeclarationKind::Variable { init, .. } => {
            if let Some(init) = init {
                visitor.visit_expression(init);
            }
        }
        DeclarationKind::Constant { value, .. } => visitor.visit_expression(value),
    }
}

pub fn walk_block(visitor: &mut impl Visitor, block: &Rc<Block>) {
    for stmt in &block.statements {
        visitor.visit_statement(stmt);
    }
}

pub fn walk_statement(visitor: &mut impl Visitor, stmt: &Rc<Statement>) {
    match &stmt.kind {
        StatementKind::Block(block) => visitor.visit_block(block),
        StatementKind::Assignment { left, right } => {
            visitor.visit_expression(left);
            visitor.visit_expression(right);
        }
        StatementKind::MethodCall(call) => visitor.visit_expression(call),
        StatementKind::If {
            condition,
            if_true,
            if_false,
        } => {
            visitor.visit_expression(condition);
            visitor.visit_statement(if_true);
            if let Some(if_false) = if_false {
                visitor.visit_statement(if_false);
            }
        }
        StatementKind::Switch { expression, cases } => {
            visitor.visit_expression(expression);
            for case in cases {
                if let Some(body) = &case.body {
                    visitor.visit_block(body);
                }
            }
        }
        StatementKind::Declaration(decl) => visitor.visit_declaration(decl),
        StatementKind::Return(value) => {
            if let Some(value) = value {
                visitor.visit_expression(value);
            }
        }
        StatementKind::Exit | StatementKind::Empty => {}
    }
}

pub fn walk_key_element(visitor: &mut impl Visitor, key: &KeyElement) {
    visitor.visit_expression(&key.expression);
}

pub fn walk_expression(visitor: &mut impl Visitor, expr: &Rc<Expression>) {
    match &expr.kind {
        ExpressionKind::Constant { .. } | ExpressionKind::Bool(_) | ExpressionKind::Path(_) => {}
        ExpressionKind::Member { expr, .. } => visitor.visit_expression(expr),
        ExpressionKind::ArrayIndex { base, index } => {
            visitor.visit_expression(base);
            visitor.visit_expression(index);
        }
        ExpressionKind::MethodCall { method, args, .. } => {
            visitor.visit_expression(method);
            for arg in args {
                visitor.visit_expression(arg);
            }
        }
        ExpressionKind::ConstructorCall { args, .. } => {
            for arg in args {
                visitor.visit_expression(arg);
            }
        }
        ExpressionKind::Unary { operand, .. } => visitor.visit_expression(operand),
        ExpressionKind::Binary { left, right, .. } => {
            visitor.visit_expression(left);
            visitor.visit_expression(right);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::Type;

    #[derive(Default)]
    struct PathCollector {
        paths: Vec<String>,
    }

    impl Visitor for PathCollector {
        fn visit_expression(&mut self, expr: &Rc<Expression>) {
            if let Some(name) = expr.as_path() {
                self.paths.push(name.to_string());
            }
            walk_expression(self, expr)
        }
    }

    #[test]
    fn collects_paths_in_source_order() {
        let body = Block::new(vec![
            Statement::assign(Expression::path("x"), Expression::path("y")),
            Statement::call(Expression::call(
                Expression::member(Expression::path("t"), "apply"),
                vec![],
            )),
        ]);
        let control = Declaration::control(
            "c",
            vec![],
            vec![Declaration::variable("x", Type::bits(8), Some(Expression::path("z")))],
            body,
        );
        let program = Program::new(vec![control]);

        let mut collector = PathCollector::default();
        walk_program(&mut collector, &program);
        assert_eq!(collector.paths, vec!["z", "x", "y", "t"]);
    }
}
