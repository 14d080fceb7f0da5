//! Expressions.

use std::fmt;
use std::rc::Rc;

use p4c_common::SourceInfo;

use crate::id::NodeId;
use crate::ty::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
    Complement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    /// Comparison and logical operators produce `bool`.
    pub fn is_boolean(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
                | BinaryOp::And
                | BinaryOp::Or
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
            UnaryOp::Complement => "~",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug)]
pub struct Expression {
    pub id: NodeId,
    pub span: Option<SourceInfo>,
    pub kind: ExpressionKind,
}

#[derive(Debug, Clone)]
pub enum ExpressionKind {
    /// Integer literal. `ty` is `InfInt` for unsized literals.
    Constant { value: i128, ty: Rc<Type> },
    Bool(bool),
    Path(String),
    Member {
        expr: Rc<Expression>,
        member: String,
    },
    ArrayIndex {
        base: Rc<Expression>,
        index: Rc<Expression>,
    },
    MethodCall {
        method: Rc<Expression>,
        type_args: Vec<Rc<Type>>,
        args: Vec<Rc<Expression>>,
    },
    ConstructorCall {
        ty: Rc<Type>,
        args: Vec<Rc<Expression>>,
    },
    Unary {
        op: UnaryOp,
        operand: Rc<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Rc<Expression>,
        right: Rc<Expression>,
    },
}

impl Expression {
    pub fn new(kind: ExpressionKind) -> Rc<Self> {
        Self::with_span(kind, None)
    }

    pub fn with_span(kind: ExpressionKind, span: Option<SourceInfo>) -> Rc<Self> {
        Rc::new(Expression {
            id: NodeId::fresh(),
            span,
            kind,
        })
    }

    /// Same node (id and position) with a different shape.
    pub fn rebuild(&self, kind: ExpressionKind) -> Rc<Self> {
        Rc::new(Expression {
            id: self.id,
            span: self.span,
            kind,
        })
    }

    pub fn constant(value: i128) -> Rc<Self> {
        Self::new(ExpressionKind::Constant {
            value,
            ty: Rc::new(Type::InfInt),
        })
    }

    /// A sized literal such as `8w5`.
    pub fn sized(value: i128, width: u32) -> Rc<Self> {
        Self::new(ExpressionKind::Constant {
            value,
            ty: Type::bits(width),
        })
    }

    pub fn boolean(value: bool) -> Rc<Self> {
        Self::new(ExpressionKind::Bool(value))
    }

    pub fn path(name: impl Into<String>) -> Rc<Self> {
        Self::new(ExpressionKind::Path(name.into()))
    }

    pub fn member(expr: Rc<Expression>, member: impl Into<String>) -> Rc<Self> {
        Self::new(ExpressionKind::Member {
            expr,
            member: member.into(),
        })
    }

    pub fn index(base: Rc<Expression>, index: Rc<Expression>) -> Rc<Self> {
        Self::new(ExpressionKind::ArrayIndex { base, index })
    }

    pub fn call(method: Rc<Expression>, args: Vec<Rc<Expression>>) -> Rc<Self> {
        Self::call_generic(method, Vec::new(), args)
    }

    pub fn call_generic(
        method: Rc<Expression>,
        type_args: Vec<Rc<Type>>,
        args: Vec<Rc<Expression>>,
    ) -> Rc<Self> {
        Self::new(ExpressionKind::MethodCall {
            method,
            type_args,
            args,
        })
    }

    pub fn constructor(ty: Rc<Type>, args: Vec<Rc<Expression>>) -> Rc<Self> {
        Self::new(ExpressionKind::ConstructorCall { ty, args })
    }

    pub fn unary(op: UnaryOp, operand: Rc<Expression>) -> Rc<Self> {
        Self::new(ExpressionKind::Unary { op, operand })
    }

    pub fn binary(op: BinaryOp, left: Rc<Expression>, right: Rc<Expression>) -> Rc<Self> {
        Self::new(ExpressionKind::Binary { op, left, right })
    }

    pub fn as_path(&self) -> Option<&str> {
        match &self.kind {
            ExpressionKind::Path(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_method_call(&self) -> bool {
        matches!(self.kind, ExpressionKind::MethodCall { .. })
    }

    /// Whether evaluating this expression may run a call (and so may have
    /// side effects).
    pub fn has_call(&self) -> bool {
        match &self.kind {
            ExpressionKind::MethodCall { .. } | ExpressionKind::ConstructorCall { .. } => true,
            ExpressionKind::Constant { .. }
            | ExpressionKind::Bool(_)
            | ExpressionKind::Path(_) => false,
            ExpressionKind::Member { expr, .. } => expr.has_call(),
            ExpressionKind::ArrayIndex { base, index } => base.has_call() || index.has_call(),
            ExpressionKind::Unary { operand, .. } => operand.has_call(),
            ExpressionKind::Binary { left, right, .. } => left.has_call() || right.has_call(),
        }
    }

    /// Copy of this subtree in which every node has a fresh id.
    pub fn deep_clone(&self) -> Rc<Self> {
        let clone_all = |exprs: &[Rc<Expression>]| -> Vec<Rc<Expression>> {
            exprs.iter().map(|e| e.deep_clone()).collect()
        };
        let kind = match &self.kind {
            ExpressionKind::Constant { .. }
            | ExpressionKind::Bool(_)
            | ExpressionKind::Path(_) => self.kind.clone(),
            ExpressionKind::Member { expr, member } => ExpressionKind::Member {
                expr: expr.deep_clone(),
                member: member.clone(),
            },
            ExpressionKind::ArrayIndex { base, index } => ExpressionKind::ArrayIndex {
                base: base.deep_clone(),
                index: index.deep_clone(),
            },
            ExpressionKind::MethodCall {
                method,
                type_args,
                args,
            } => ExpressionKind::MethodCall {
                method: method.deep_clone(),
                type_args: type_args.clone(),
                args: clone_all(args),
            },
            ExpressionKind::ConstructorCall { ty, args } => ExpressionKind::ConstructorCall {
                ty: ty.clone(),
                args: clone_all(args),
            },
            ExpressionKind::Unary { op, operand } => ExpressionKind::Unary {
                op: *op,
                operand: operand.deep_clone(),
            },
            ExpressionKind::Binary { op, left, right } => ExpressionKind::Binary {
                op: *op,
                left: left.deep_clone(),
                right: right.deep_clone(),
            },
        };
        Expression::with_span(kind, self.span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebuild_keeps_identity() {
        let e = Expression::path("x");
        let r = e.rebuild(ExpressionKind::Path("y".into()));
        assert_eq!(e.id, r.id);
        assert_eq!(r.as_path(), Some("y"));
    }

    #[test]
    fn deep_clone_gets_fresh_ids() {
        let e = Expression::member(Expression::path("hdr"), "ipv4");
        let c = e.deep_clone();
        assert_ne!(e.id, c.id);
        let (ExpressionKind::Member { expr: a, .. }, ExpressionKind::Member { expr: b, .. }) =
            (&e.kind, &c.kind)
        else {
            panic!("expected member expressions");
        };
        assert_ne!(a.id, b.id);
        assert_eq!(b.as_path(), Some("hdr"));
    }

    #[test]
    fn has_call() {
        let plain = Expression::binary(
            BinaryOp::Add,
            Expression::path("a"),
            Expression::constant(1),
        );
        assert!(!plain.has_call());

        let call = Expression::call(Expression::path("f"), vec![]);
        let nested = Expression::binary(BinaryOp::Add, Expression::path("a"), call);
        assert!(nested.has_call());
    }
}
