//! Accumulate-then-flush helper for rewrite-and-hoist passes.
//!
//! A pass that replaces a subexpression by a fresh temporary records the
//! temporary's declaration and initialising assignment against an owner
//! node (the table whose key it rewrote). When the pass leaves the owner it
//! flushes the declarations once; the assignments are then placed before
//! every statement that uses the owner.

use std::rc::Rc;

use p4c_ir::{Declaration, NodeId, Statement};
use rustc_hash::FxHashMap;

/// What one owner needs inserted, in the order it was recorded.
#[derive(Debug, Default, Clone)]
pub struct TableInsertions {
    pub declarations: Vec<Rc<Declaration>>,
    pub statements: Vec<Rc<Statement>>,
}

#[derive(Debug, Default)]
pub struct Insertions {
    pending: FxHashMap<NodeId, TableInsertions>,
    /// How many times each owner's statements have been placed.
    placed: FxHashMap<NodeId, usize>,
}

impl Insertions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        owner: NodeId,
        declaration: Rc<Declaration>,
        statement: Rc<Statement>,
    ) {
        let entry = self.pending.entry(owner).or_default();
        entry.declarations.push(declaration);
        entry.statements.push(statement);
    }

    /// The declarations recorded for `owner`. A second call returns nothing.
    pub fn flush_declarations(&mut self, owner: NodeId) -> Vec<Rc<Declaration>> {
        self.pending
            .get_mut(&owner)
            .map(|entry| std::mem::take(&mut entry.declarations))
            .unwrap_or_default()
    }

    pub fn has_statements(&self, owner: NodeId) -> bool {
        self.pending
            .get(&owner)
            .is_some_and(|entry| !entry.statements.is_empty())
    }

    /// `stmt` preceded by the assignments of every owner it uses.
    ///
    /// The first use of an owner gets the recorded statements themselves;
    /// later uses get fresh copies so no node appears twice in the tree.
    pub fn before(
        &mut self,
        stmt: Rc<Statement>,
        owners: impl IntoIterator<Item = NodeId>,
    ) -> Vec<Rc<Statement>> {
        let mut out = Vec::new();
        for owner in owners {
            let Some(entry) = self.pending.get(&owner) else {
                continue;
            };
            let uses = self.placed.entry(owner).or_insert(0);
            if *uses == 0 {
                out.extend(entry.statements.iter().cloned());
            } else {
                out.extend(entry.statements.iter().map(|s| s.deep_clone()));
            }
            *uses += 1;
        }
        out.push(stmt);
        out
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p4c_ir::{Expression, Type};

    #[test]
    fn flushes_declarations_once_and_places_statements() {
        let owner = NodeId::fresh();
        let mut insertions = Insertions::new();
        for name in ["a", "b"] {
            insertions.record(
                owner,
                Declaration::variable(name, Type::bits(8), None),
                Statement::assign(Expression::path(name), Expression::constant(1)),
            );
        }

        let decls = insertions.flush_declarations(owner);
        assert_eq!(
            decls.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert!(insertions.flush_declarations(owner).is_empty());
        assert!(insertions.has_statements(owner));

        let use_site = Statement::exit();
        let first = insertions.before(use_site.clone(), [owner]);
        assert_eq!(first.len(), 3);
        assert!(Rc::ptr_eq(&first[2], &use_site));

        let second = insertions.before(Statement::exit(), [owner]);
        assert_ne!(first[0].id, second[0].id);
    }
}
