//! Folding of operators over literals.
//!
//! Sized results wrap to their width (two's complement for `int<N>`).
//! Operands of different widths, and unsized results that overflow `i128`,
//! are left unfolded. Folded nodes keep their id.
//!
//! An `if` whose condition folds to a literal is replaced by the branch
//! taken, so later passes never see the dead one.

use std::rc::Rc;

use p4c_ir::transform::{transform_program, Transform};
use p4c_ir::{
    BinaryOp, Expression, ExpressionKind, Program, Statement, StatementKind, Type, UnaryOp,
};

use crate::error::MidendError;
use crate::pass::{Pass, PassContext};

#[derive(Debug, Default)]
pub struct ConstantFolding;

impl Pass for ConstantFolding {
    fn name(&self) -> &str {
        "ConstantFolding"
    }

    fn run(
        &mut self,
        program: Rc<Program>,
        _ctx: &mut PassContext,
    ) -> Result<Rc<Program>, MidendError> {
        Ok(transform_program(&mut Folder, &program))
    }
}

struct Folder;

impl Transform for Folder {
    fn postorder_expression(&mut self, expr: Rc<Expression>) -> Rc<Expression> {
        let folded = match &expr.kind {
            ExpressionKind::Unary { op, operand } => fold_unary(*op, operand),
            ExpressionKind::Binary { op, left, right } => fold_binary(*op, left, right),
            _ => None,
        };
        match folded {
            Some(kind) => {
                tracing::trace!(from = %expr, "folded constant expression");
                expr.rebuild(kind)
            }
            None => expr,
        }
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
        match boolean(condition) {
            Some(true) => vec![if_true.clone()],
            Some(false) => if_false.iter().cloned().collect(),
            None => vec![stmt],
        }
    }
}

/// Integer literal operand: value and width/signedness if sized.
fn literal(expr: &Expression) -> Option<(i128, &Rc<Type>)> {
    match &expr.kind {
        ExpressionKind::Constant { value, ty } => Some((*value, ty)),
        _ => None,
    }
}

fn boolean(expr: &Expression) -> Option<bool> {
    match expr.kind {
        ExpressionKind::Bool(value) => Some(value),
        _ => None,
    }
}

/// `value` wrapped into the range of `ty`; unsized values pass through.
fn wrap(value: i128, ty: &Type) -> i128 {
    let Type::Bits { width, signed } = *ty else {
        return value;
    };
    if width == 0 || width >= 128 {
        return value;
    }
    let modulus = 1i128 << width;
    let unsigned = value.rem_euclid(modulus);
    if signed && unsigned >= modulus >> 1 {
        unsigned - modulus
    } else {
        unsigned
    }
}

fn constant(value: i128, ty: &Rc<Type>) -> ExpressionKind {
    ExpressionKind::Constant {
        value: wrap(value, ty),
        ty: ty.clone(),
    }
}

fn fold_unary(op: UnaryOp, operand: &Expression) -> Option<ExpressionKind> {
    if let (UnaryOp::Not, Some(value)) = (op, boolean(operand)) {
        return Some(ExpressionKind::Bool(!value));
    }
    let (value, ty) = literal(operand)?;
    match op {
        UnaryOp::Neg => Some(constant(value.checked_neg()?, ty)),
        // Complement needs a width.
        UnaryOp::Complement if matches!(**ty, Type::Bits { .. }) => Some(constant(!value, ty)),
        _ => None,
    }
}

fn fold_binary(op: BinaryOp, left: &Expression, right: &Expression) -> Option<ExpressionKind> {
    if let (Some(l), Some(r)) = (boolean(left), boolean(right)) {
        let value = match op {
            BinaryOp::And => l && r,
            BinaryOp::Or => l || r,
            BinaryOp::Eq => l == r,
            BinaryOp::Ne => l != r,
            _ => return None,
        };
        return Some(ExpressionKind::Bool(value));
    }

    let (l, lty) = literal(left)?;
    let (r, rty) = literal(right)?;
    // An unsized operand takes the type of the sized one.
    let ty = match (&**lty, &**rty) {
        (Type::InfInt, _) => rty,
        (_, Type::InfInt) => lty,
        (a, b) if a == b => lty,
        _ => return None,
    };

    let value = match op {
        BinaryOp::Add => l.checked_add(r)?,
        BinaryOp::Sub => l.checked_sub(r)?,
        BinaryOp::Mul => l.checked_mul(r)?,
        BinaryOp::BitAnd => l & r,
        BinaryOp::BitOr => l | r,
        BinaryOp::BitXor => l ^ r,
        BinaryOp::Shl => {
            let shift = u32::try_from(r).ok()?;
            let shifted = l.checked_shl(shift)?;
            // Bits shifted past i128 are lost silently by checked_shl.
            if !matches!(**ty, Type::Bits { .. }) && shifted >> shift != l {
                return None;
            }
            shifted
        }
        BinaryOp::Shr => l >> u32::try_from(r).ok()?.min(127),
        BinaryOp::Eq => return Some(ExpressionKind::Bool(l == r)),
        BinaryOp::Ne => return Some(ExpressionKind::Bool(l != r)),
        BinaryOp::Lt => return Some(ExpressionKind::Bool(l < r)),
        BinaryOp::Le => return Some(ExpressionKind::Bool(l <= r)),
        BinaryOp::Gt => return Some(ExpressionKind::Bool(l > r)),
        BinaryOp::Ge => return Some(ExpressionKind::Bool(l >= r)),
        BinaryOp::And | BinaryOp::Or => return None,
    };
    Some(constant(value, ty))
}
