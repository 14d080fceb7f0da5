//! Renaming and substitution through the reference map.
//!
//! Uses are found by what they resolve to, not by spelling, so shadowing
//! can never redirect a rename. The side tables must describe the tree the
//! [`Renamer`] is applied to.

use std::rc::Rc;

use p4c_ir::transform::Transform;
use p4c_ir::{
    Declaration, Expression, ExpressionKind, NodeId, Statement, StatementKind, SwitchCase,
    SwitchLabel,
};
use p4c_typeck::{RefMap, Ty, TypeMap};
use rustc_hash::FxHashMap;

pub struct Renamer<'a> {
    refs: &'a RefMap,
    types: &'a TypeMap,
    /// Declaration id -> new name.
    names: FxHashMap<NodeId, String>,
    /// Declaration or parameter id -> expression replacing every use.
    replacements: FxHashMap<NodeId, Rc<Expression>>,
}

impl<'a> Renamer<'a> {
    pub fn new(refs: &'a RefMap, types: &'a TypeMap) -> Self {
        Renamer {
            refs,
            types,
            names: FxHashMap::default(),
            replacements: FxHashMap::default(),
        }
    }

    /// Give the declaration or parameter `id` a new name.
    pub fn rename(&mut self, id: NodeId, name: impl Into<String>) {
        self.names.insert(id, name.into());
    }

    /// Replace every use of `id` by a copy of `expr`.
    pub fn replace(&mut self, id: NodeId, expr: Rc<Expression>) {
        self.replacements.insert(id, expr);
    }

    pub fn new_name(&self, id: NodeId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.replacements.is_empty()
    }

    /// Switch labels name actions; relabel the ones renamed.
    fn relabel(&self, expression: &Expression, cases: &[SwitchCase]) -> Option<Vec<SwitchCase>> {
        let Some(Ty::ActionEnum(table)) = self.types.get_type(expression.id) else {
            return None;
        };
        let table = table.as_table()?;
        let mut labels: FxHashMap<&str, &str> = FxHashMap::default();
        for entry in &table.actions {
            let path = match &entry.kind {
                ExpressionKind::MethodCall { method, .. } => method,
                _ => entry,
            };
            let (Some(old), Some(target)) = (path.as_path(), self.refs.get_declaration(path.id))
            else {
                continue;
            };
            if let Some(new) = self.names.get(&target.id()) {
                labels.insert(old, new);
            }
        }
        if labels.is_empty() {
            return None;
        }
        Some(
            cases
                .iter()
                .map(|case| match &case.label {
                    SwitchLabel::Name(name) => SwitchCase {
                        label: SwitchLabel::Name(
                            labels.get(name.as_str()).map_or(name.clone(), |n| n.to_string()),
                        ),
                        body: case.body.clone(),
                    },
                    SwitchLabel::Default => case.clone(),
                })
                .collect(),
        )
    }
}

impl Transform for Renamer<'_> {
    fn postorder_declaration(&mut self, decl: Rc<Declaration>) -> Vec<Rc<Declaration>> {
        match self.names.get(&decl.id) {
            Some(name) => vec![decl.renamed(name.clone())],
            None => vec![decl],
        }
    }

    fn postorder_statement(&mut self, stmt: Rc<Statement>) -> Vec<Rc<Statement>> {
        if let StatementKind::Switch { expression, cases } = &stmt.kind {
            if let Some(cases) = self.relabel(expression, cases) {
                let kind = StatementKind::Switch {
                    expression: expression.clone(),
                    cases,
                };
                return vec![stmt.rebuild(kind)];
            }
        }
        vec![stmt]
    }

    fn postorder_expression(&mut self, expr: Rc<Expression>) -> Rc<Expression> {
        if !matches!(expr.kind, ExpressionKind::Path(_)) {
            return expr;
        }
        let Some(target) = self.refs.get_declaration(expr.id) else {
            return expr;
        };
        if let Some(replacement) = self.replacements.get(&target.id()) {
            return replacement.deep_clone();
        }
        match self.names.get(&target.id()) {
            Some(name) => expr.rebuild(ExpressionKind::Path(name.clone())),
            None => expr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p4c_ir::print::print_declaration;
    use p4c_ir::transform::transform_declaration;
    use p4c_ir::{Block, Direction, Parameter, Program, Type};

    #[test]
    fn renames_by_resolution_not_spelling() {
        // The inner `x` shadows the local; only the local is renamed.
        let local = Declaration::variable("x", Type::bits(8), None);
        let inner = Declaration::variable("x", Type::bits(8), None);
        let body = Block::new(vec![
            Statement::assign(Expression::path("x"), Expression::path("v")),
            Statement::block(vec![
                Statement::declare(inner),
                Statement::assign(Expression::path("x"), Expression::sized(1, 8)),
            ]),
        ]);
        let v = Parameter::new(Direction::In, Type::bits(8), "v");
        let control = Declaration::control("c", vec![v.clone()], vec![local.clone()], body);
        let program = Program::new(vec![control.clone()]);
        let tc = p4c_typeck::check(&program);
        assert!(tc.errors.is_empty(), "{:?}", tc.errors);

        let mut renamer = Renamer::new(&tc.refs, &tc.types);
        renamer.rename(local.id, "x_0");
        renamer.replace(v.id, Expression::sized(7, 8));
        let out = transform_declaration(&mut renamer, &control);

        insta::assert_snapshot!(print_declaration(&out[0]), @r"
        control c(in bit<8> v) {
            bit<8> x_0;
            apply {
                x_0 = 8w7;
                {
                    bit<8> x;
                    x = 8w1;
                }
            }
        }
        ");
    }
}
