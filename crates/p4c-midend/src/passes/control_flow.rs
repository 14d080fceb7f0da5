//! Control-flow cleanup.
//!
//! Nested blocks without declarations are flattened into their parent,
//! empty statements dropped, `if` with a literal condition replaced by the
//! branch taken, and `if` with two empty branches removed when its
//! condition cannot have effects.

use std::rc::Rc;

use p4c_ir::transform::{transform_program, Transform};
use p4c_ir::{Block, ExpressionKind, Program, Statement, StatementKind};

use crate::error::MidendError;
use crate::pass::{Pass, PassContext};

#[derive(Debug, Default)]
pub struct SimplifyControlFlow;

impl Pass for SimplifyControlFlow {
    fn name(&self) -> &str {
        "SimplifyControlFlow"
    }

    fn run(
        &mut self,
        program: Rc<Program>,
        _ctx: &mut PassContext,
    ) -> Result<Rc<Program>, MidendError> {
        Ok(transform_program(&mut Simplifier, &program))
    }
}

struct Simplifier;

impl Transform for Simplifier {
    fn postorder_block(&mut self, block: Rc<Block>) -> Rc<Block> {
        let flattens = |s: &Rc<Statement>| match &s.kind {
            StatementKind::Empty => true,
            StatementKind::Block(inner) => !inner.has_declarations(),
            _ => false,
        };
        if !block.statements.iter().any(flattens) {
            return block;
        }
        let mut statements = Vec::with_capacity(block.statements.len());
        for stmt in &block.statements {
            match &stmt.kind {
                StatementKind::Empty => {}
                StatementKind::Block(inner) if !inner.has_declarations() => {
                    statements.extend(inner.statements.iter().cloned());
                }
                _ => statements.push(stmt.clone()),
            }
        }
        block.rebuild(statements)
    }

    fn postorder_statement(&mut self, stmt: Rc<Statement>) -> Vec<Rc<Statement>> {
        let StatementKind::If {
            condition,
            if_true,
            if_false,
        } = &stmt.kind
        else {
            return vec![stmt];
        };
        match condition.kind {
            ExpressionKind::Bool(true) => return vec![if_true.clone()],
            ExpressionKind::Bool(false) => return if_false.iter().cloned().collect(),
            _ => {}
        }
        let empty_false = if_false.as_ref().map_or(true, |s| s.is_empty());
        if if_true.is_empty() && empty_false && !condition.has_call() {
            return Vec::new();
        }
        vec![stmt]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::MidEndOptions;
    use p4c_common::SourceMap;
    use p4c_ir::print::print_declaration;
    use p4c_ir::{BinaryOp, Declaration, Direction, Expression, Parameter, Type};

    #[test]
    fn flattens_and_folds() {
        let x = || Expression::path("x");
        let body = Block::new(vec![
            Statement::block(vec![
                Statement::assign(x(), Expression::sized(1, 8)),
                Statement::empty(),
            ]),
            Statement::if_else(
                Expression::boolean(false),
                Statement::assign(x(), Expression::sized(2, 8)),
                Some(Statement::assign(x(), Expression::sized(3, 8))),
            ),
            Statement::if_else(
                Expression::binary(BinaryOp::Eq, x(), Expression::sized(0, 8)),
                Statement::block(vec![]),
                None,
            ),
            Statement::block(vec![Statement::declare(Declaration::variable(
                "t",
                Type::bits(8),
                None,
            ))]),
        ]);
        let control = Declaration::control(
            "c",
            vec![Parameter::new(Direction::InOut, Type::bits(8), "x")],
            vec![],
            body,
        );
        let mut ctx = PassContext::new(SourceMap::new(), MidEndOptions::default());
        let out = SimplifyControlFlow
            .run(Program::new(vec![control]), &mut ctx)
            .unwrap();

        insta::assert_snapshot!(print_declaration(&out.declarations[0]), @r"
        control c(inout bit<8> x) {
            apply {
                x = 8w1;
                x = 8w3;
                {
                    bit<8> t;
                }
            }
        }
        ");
    }

    #[test]
    fn clean_tree_is_shared() {
        let control = Declaration::control(
            "c",
            vec![],
            vec![],
            Block::new(vec![Statement::exit()]),
        );
        let program = Program::new(vec![control]);
        let mut ctx = PassContext::new(SourceMap::new(), MidEndOptions::default());
        let out = SimplifyControlFlow.run(program.clone(), &mut ctx).unwrap();
        assert!(Rc::ptr_eq(&out, &program));
    }
}
