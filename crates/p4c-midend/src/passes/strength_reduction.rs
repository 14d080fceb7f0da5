//! Replacement of operators by cheaper equivalents.
//!
//! An operation with an identity operand (`x + 0`, `x | 0`, `x * 1`,
//! `true && x`, ...) reduces to the other operand, `x * 2^k` becomes
//! `x << k`, and `!!x` becomes `x`. An operand is only discarded (`x & 0`,
//! `x * 0`, `x || true`) when evaluating it cannot run a call. Operations
//! on two literals are left to constant folding.

use std::rc::Rc;

use p4c_ir::transform::{transform_program, Transform};
use p4c_ir::{BinaryOp, Expression, ExpressionKind, Program, Type, UnaryOp};

use crate::error::MidendError;
use crate::pass::{Pass, PassContext};

#[derive(Debug, Default)]
pub struct StrengthReduction;

impl Pass for StrengthReduction {
    fn name(&self) -> &str {
        "StrengthReduction"
    }

    fn run(
        &mut self,
        program: Rc<Program>,
        _ctx: &mut PassContext,
    ) -> Result<Rc<Program>, MidendError> {
        Ok(transform_program(&mut Reducer, &program))
    }
}

struct Reducer;

impl Transform for Reducer {
    fn postorder_expression(&mut self, expr: Rc<Expression>) -> Rc<Expression> {
        let reduced = match &expr.kind {
            ExpressionKind::Unary {
                op: UnaryOp::Not,
                operand,
            } => match &operand.kind {
                ExpressionKind::Unary {
                    op: UnaryOp::Not,
                    operand: inner,
                } => Some(inner.clone()),
                _ => None,
            },
            ExpressionKind::Binary { op, left, right } => reduce_binary(&expr, *op, left, right),
            _ => None,
        };
        match reduced {
            Some(new) => {
                tracing::trace!(from = %expr, to = %new, "reduced");
                new
            }
            None => expr,
        }
    }
}

fn integer(expr: &Expression) -> Option<i128> {
    match expr.kind {
        ExpressionKind::Constant { value, .. } => Some(value),
        _ => None,
    }
}

/// A sized zero can stand in for the whole operation; an unsized one would
/// change its type.
fn is_sized_zero(expr: &Expression) -> bool {
    matches!(
        &expr.kind,
        ExpressionKind::Constant { value: 0, ty } if matches!(**ty, Type::Bits { .. })
    )
}

fn boolean(expr: &Expression) -> Option<bool> {
    match expr.kind {
        ExpressionKind::Bool(value) => Some(value),
        _ => None,
    }
}

fn power_of_two(value: i128) -> Option<u32> {
    (value > 1 && (value & (value - 1)) == 0).then_some(value.trailing_zeros())
}

fn reduce_binary(
    expr: &Rc<Expression>,
    op: BinaryOp,
    left: &Rc<Expression>,
    right: &Rc<Expression>,
) -> Option<Rc<Expression>> {
    let (l, r) = (integer(left), integer(right));
    let (lb, rb) = (boolean(left), boolean(right));
    if (l.is_some() && r.is_some()) || (lb.is_some() && rb.is_some()) {
        return None;
    }
    let keep = |e: &Rc<Expression>| Some(e.clone());

    match op {
        BinaryOp::Add | BinaryOp::BitOr | BinaryOp::BitXor => match (l, r) {
            (_, Some(0)) => keep(left),
            (Some(0), _) => keep(right),
            _ => None,
        },
        BinaryOp::Sub | BinaryOp::Shl | BinaryOp::Shr if r == Some(0) => keep(left),
        BinaryOp::BitAnd => {
            if is_sized_zero(right) && !left.has_call() {
                keep(right)
            } else if is_sized_zero(left) && !right.has_call() {
                keep(left)
            } else {
                None
            }
        }
        BinaryOp::Mul => {
            if r == Some(1) {
                return keep(left);
            }
            if l == Some(1) {
                return keep(right);
            }
            if is_sized_zero(right) && !left.has_call() {
                return keep(right);
            }
            if is_sized_zero(left) && !right.has_call() {
                return keep(left);
            }
            let (operand, shift) = match (l.and_then(power_of_two), r.and_then(power_of_two)) {
                (_, Some(k)) => (left, k),
                (Some(k), _) => (right, k),
                _ => return None,
            };
            Some(expr.rebuild(ExpressionKind::Binary {
                op: BinaryOp::Shl,
                left: operand.clone(),
                right: Expression::constant(i128::from(shift)),
            }))
        }
        // The right operand of `&&` and `||` is only evaluated when the
        // left one does not decide the result.
        BinaryOp::And => match (lb, rb) {
            (Some(true), _) => keep(right),
            (Some(false), _) => keep(left),
            (_, Some(true)) => keep(left),
            (_, Some(false)) if !left.has_call() => keep(right),
            _ => None,
        },
        BinaryOp::Or => match (lb, rb) {
            (Some(false), _) => keep(right),
            (Some(true), _) => keep(left),
            (_, Some(false)) => keep(left),
            (_, Some(true)) if !left.has_call() => keep(right),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::MidEndOptions;
    use p4c_common::SourceMap;
    use p4c_ir::print::print_declaration;
    use p4c_ir::{Block, Declaration, Direction, Parameter, Statement};

    fn x() -> Rc<Expression> {
        Expression::path("x")
    }

    fn f() -> Rc<Expression> {
        Expression::call(Expression::path("f"), vec![])
    }

    fn control(body: Vec<Rc<Statement>>) -> Rc<Program> {
        Program::new(vec![Declaration::control(
            "c",
            vec![
                Parameter::new(Direction::InOut, Type::bits(8), "x"),
                Parameter::new(Direction::InOut, Type::bool(), "b"),
            ],
            vec![],
            Block::new(body),
        )])
    }

    fn run(program: Rc<Program>) -> Rc<Program> {
        let mut ctx = PassContext::new(SourceMap::new(), MidEndOptions::default());
        StrengthReduction.run(program, &mut ctx).unwrap()
    }

    #[test]
    fn identities_and_multiplications() {
        let bin = Expression::binary;
        let out = run(control(vec![
            Statement::assign(x(), bin(BinaryOp::Add, x(), Expression::sized(0, 8))),
            Statement::assign(x(), bin(BinaryOp::Mul, Expression::sized(1, 8), x())),
            Statement::assign(x(), bin(BinaryOp::Mul, x(), Expression::sized(8, 8))),
            Statement::assign(x(), bin(BinaryOp::BitAnd, x(), Expression::sized(0, 8))),
            Statement::assign(
                x(),
                bin(
                    BinaryOp::Shl,
                    bin(BinaryOp::BitOr, Expression::constant(0), x()),
                    Expression::constant(0),
                ),
            ),
            Statement::assign(
                Expression::path("b"),
                bin(BinaryOp::And, Expression::boolean(true), Expression::path("b")),
            ),
            Statement::assign(
                Expression::path("b"),
                Expression::unary(
                    UnaryOp::Not,
                    Expression::unary(UnaryOp::Not, Expression::path("b")),
                ),
            ),
        ]));

        insta::assert_snapshot!(print_declaration(&out.declarations[0]), @r"
        control c(inout bit<8> x, inout bool b) {
            apply {
                x = x;
                x = x;
                x = x << 3;
                x = 8w0;
                x = x;
                b = b;
                b = b;
            }
        }
        ");
    }

    #[test]
    fn calls_are_not_discarded() {
        let bin = Expression::binary;
        let out = run(control(vec![
            Statement::assign(x(), bin(BinaryOp::BitAnd, f(), Expression::sized(0, 8))),
            Statement::assign(x(), bin(BinaryOp::Mul, f(), Expression::sized(0, 8))),
            Statement::assign(
                Expression::path("b"),
                bin(BinaryOp::Or, f(), Expression::boolean(true)),
            ),
            Statement::assign(
                Expression::path("b"),
                bin(BinaryOp::And, Expression::boolean(false), f()),
            ),
        ]));

        insta::assert_snapshot!(print_declaration(&out.declarations[0]), @r"
        control c(inout bit<8> x, inout bool b) {
            apply {
                x = f() & 8w0;
                x = f() * 8w0;
                b = f() || true;
                b = false;
            }
        }
        ");
    }

    #[test]
    fn literal_operations_are_left_alone() {
        let program = control(vec![Statement::assign(
            x(),
            Expression::binary(BinaryOp::Mul, Expression::sized(4, 8), Expression::sized(2, 8)),
        )]);
        let out = run(program.clone());
        assert!(Rc::ptr_eq(&out, &program));
    }
}
