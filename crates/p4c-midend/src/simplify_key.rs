//! Table key simplification.
//!
//! Key fields a backend cannot match on directly are replaced by fresh
//! temporaries. For a table `t` with key `hash(a, b): exact` the pass
//! declares `tmp` among the control locals right before `t`, rewrites the
//! key to `tmp: exact`, and inserts `tmp = hash(a, b);` before every
//! statement that applies `t` (a call statement, or the condition of an
//! `if` or the selector of a `switch`).

use std::rc::Rc;

use p4c_ir::transform::{transform_program, Flow, Transform};
use p4c_ir::visit::{walk_expression, Visitor};
use p4c_ir::{
    Declaration, DeclarationKind, Expression, ExpressionKind, KeyElement, NameGenerator, NodeId,
    Program, Statement, StatementKind,
};
use p4c_typeck::{RefMap, Ty, TypeMap};

use crate::error::MidendError;
use crate::hoist::Insertions;
use crate::method_instance::{BuiltIn, MethodInstance};
use crate::pass::{Pass, PassContext, SideTables};

/// Decides which key expressions get a temporary.
pub trait KeyIsComplex {
    fn is_too_complex(&self, key: &Rc<Expression>, refs: &RefMap, types: &TypeMap) -> bool;
}

/// Everything except a writable location or an `isValid()` call.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonLeftValue;

impl KeyIsComplex for NonLeftValue {
    fn is_too_complex(&self, key: &Rc<Expression>, refs: &RefMap, types: &TypeMap) -> bool {
        if types.is_left_value(key.id) {
            return false;
        }
        !matches!(
            MethodInstance::resolve(key, refs, types),
            Ok(MethodInstance::BuiltIn {
                builtin: BuiltIn::IsValid,
                ..
            })
        )
    }
}

pub struct SimplifyKey<P: KeyIsComplex> {
    policy: P,
}

impl<P: KeyIsComplex> SimplifyKey<P> {
    pub fn new(policy: P) -> Self {
        SimplifyKey { policy }
    }
}

impl<P: KeyIsComplex> Pass for SimplifyKey<P> {
    fn name(&self) -> &str {
        "SimplifyKey"
    }

    fn requires(&self) -> SideTables {
        SideTables::REFS | SideTables::TYPES
    }

    fn run(
        &mut self,
        program: Rc<Program>,
        ctx: &mut PassContext,
    ) -> Result<Rc<Program>, MidendError> {
        let mut rewriter = KeyRewriter {
            policy: &self.policy,
            refs: &ctx.refs,
            types: &ctx.types,
            names: NameGenerator::from_program(&program),
            prefix: &ctx.options.key_temp_prefix,
            insertions: Insertions::new(),
            table: None,
        };
        Ok(transform_program(&mut rewriter, &program))
    }
}

struct KeyRewriter<'a, P> {
    policy: &'a P,
    refs: &'a RefMap,
    types: &'a TypeMap,
    names: NameGenerator,
    prefix: &'a str,
    insertions: Insertions,
    /// The table whose key is being visited.
    table: Option<NodeId>,
}

impl<P: KeyIsComplex> Transform for KeyRewriter<'_, P> {
    fn preorder_declaration(&mut self, decl: Rc<Declaration>) -> Flow<Rc<Declaration>> {
        if matches!(decl.kind, DeclarationKind::Table(_)) {
            self.table = Some(decl.id);
        }
        Flow::Continue(decl)
    }

    fn postorder_key_element(&mut self, key: KeyElement) -> KeyElement {
        let Some(table) = self.table else {
            return key;
        };
        if !self.policy.is_too_complex(&key.expression, self.refs, self.types) {
            return key;
        }
        let ty = match self.types.get_type(key.expression.id) {
            Some(Ty::InfInt) | None => None,
            Some(ty) => ty.to_type(),
        };
        let Some(ty) = ty else {
            tracing::warn!(key = %key.expression, "key has no declarable type, left in place");
            return key;
        };

        let span = key.expression.span;
        let name = self.names.new_name(self.prefix);
        tracing::trace!(%name, key = %key.expression, "hoisting table key");
        let decl = Declaration::with_span(
            name.clone(),
            DeclarationKind::Variable { ty, init: None },
            span,
        );
        let assign = Statement::with_span(
            StatementKind::Assignment {
                left: Expression::with_span(ExpressionKind::Path(name.clone()), span),
                right: key.expression.clone(),
            },
            span,
        );
        self.insertions.record(table, decl, assign);

        KeyElement {
            id: key.id,
            expression: Expression::with_span(ExpressionKind::Path(name), span),
            match_kind: key.match_kind,
        }
    }

    fn postorder_declaration(&mut self, decl: Rc<Declaration>) -> Vec<Rc<Declaration>> {
        if !matches!(decl.kind, DeclarationKind::Table(_)) {
            return vec![decl];
        }
        self.table = None;
        let mut out = self.insertions.flush_declarations(decl.id);
        out.push(decl);
        out
    }

    fn postorder_statement(&mut self, stmt: Rc<Statement>) -> Vec<Rc<Statement>> {
        if self.insertions.is_empty() {
            return vec![stmt];
        }
        let Some(guard) = stmt.guard_expression() else {
            return vec![stmt];
        };
        let mut applications = TableApplications {
            types: self.types,
            tables: Vec::new(),
        };
        applications.visit_expression(guard);
        let tables: Vec<NodeId> = applications
            .tables
            .into_iter()
            .filter(|t| self.insertions.has_statements(*t))
            .collect();
        if tables.is_empty() {
            return vec![stmt];
        }
        self.insertions.before(stmt, tables)
    }
}

/// Tables applied anywhere inside an expression.
struct TableApplications<'a> {
    types: &'a TypeMap,
    tables: Vec<NodeId>,
}

impl Visitor for TableApplications<'_> {
    fn visit_expression(&mut self, expr: &Rc<Expression>) {
        if let ExpressionKind::MethodCall { method, .. } = &expr.kind {
            if let ExpressionKind::Member { expr: receiver, member } = &method.kind {
                if member == "apply" {
                    if let Some(Ty::Table(table)) = self.types.get_type(receiver.id) {
                        if !self.tables.contains(&table.id) {
                            self.tables.push(table.id);
                        }
                    }
                }
            }
        }
        walk_expression(self, expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p4c_ir::{Block, Direction, Field, Parameter, Type};
    use p4c_typeck::check;

    fn hdr(field: &str) -> Rc<Expression> {
        Expression::member(Expression::member(Expression::path("hdr"), "h"), field)
    }

    #[test]
    fn policy() {
        let valid = Expression::call(
            Expression::member(Expression::member(Expression::path("hdr"), "h"), "isValid"),
            vec![],
        );
        let sum = Expression::binary(p4c_ir::BinaryOp::Add, hdr("f"), Expression::sized(1, 8));
        let table = Declaration::table(
            "t",
            vec![
                KeyElement::new(hdr("f"), "exact"),
                KeyElement::new(valid.clone(), "exact"),
                KeyElement::new(sum.clone(), "exact"),
            ],
            vec![],
            None,
        );
        let program = Program::new(vec![
            Declaration::header("h_t", vec![Field::new(Type::bits(8), "f")]),
            Declaration::structure("headers_t", vec![Field::new(Type::named("h_t"), "h")]),
            Declaration::control(
                "c",
                vec![Parameter::new(
                    Direction::InOut,
                    Type::named("headers_t"),
                    "hdr",
                )],
                vec![table.clone()],
                Block::empty(),
            ),
        ]);
        let tc = check(&program);
        assert!(tc.errors.is_empty(), "{:?}", tc.errors);

        let keys = &table.as_table().unwrap().key;
        let complex: Vec<bool> = keys
            .iter()
            .map(|k| NonLeftValue.is_too_complex(&k.expression, &tc.refs, &tc.types))
            .collect();
        assert_eq!(complex, vec![false, false, true]);
    }
}
