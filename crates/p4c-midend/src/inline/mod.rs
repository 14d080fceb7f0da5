//! Inlining of controls and actions.
//!
//! Each kind is a pair of passes sharing one [`InlineWorkList`]: discovery
//! resolves every call site, records a (caller, callee, site) edge for each
//! call of a user-defined control or action and orders the callers so every
//! callee is processed before anything that calls it; the driver consumes
//! the list and splices renamed copies of the callees into their callers.
//! A cycle among the edges is a fatal [`MidendError::RecursiveInlining`].
//!
//! The work list lives only between the two passes of one round: the
//! driver takes it, leaving the shared slot empty.

pub mod actions;
pub mod controls;

use std::cell::RefCell;
use std::rc::Rc;

use p4c_common::graph::{topological_sort, DependencyGraph, GraphNodeId};
use p4c_common::Diagnostics;
use p4c_ir::transform::{transform_block, transform_program, Flow, Transform};
use p4c_ir::visit::{walk_declaration, walk_program, walk_statement, Visitor};
use p4c_ir::{Block, Declaration, NodeId, Program, Statement, StatementKind};
use p4c_typeck::{TypeError, Typeck};
use rustc_hash::FxHashMap;

use crate::error::MidendError;

pub use actions::{inline_actions, DiscoverActionsInlining, InlineActionsDriver};
pub use controls::{
    inline_controls, ControlsInliner, DiscoverInlining, GeneralInliner, InlineDriver,
    SimpleControlsInliner,
};

/// `caller` calls `callee` at `site`: the instance declaration for a
/// control, the call statement for an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InlineEdge {
    pub caller: NodeId,
    pub callee: NodeId,
    pub site: NodeId,
}

#[derive(Debug, Default)]
pub struct InlineWorkList {
    edges: Vec<InlineEdge>,
    /// Callers, every callee before its callers.
    callers: Vec<NodeId>,
}

pub type SharedWorkList = Rc<RefCell<InlineWorkList>>;

impl InlineWorkList {
    /// Order the callers of `edges`. `names` gives the name reported for
    /// each declaration if the edges form a cycle.
    pub fn new(
        edges: Vec<InlineEdge>,
        names: &FxHashMap<NodeId, String>,
    ) -> Result<Self, MidendError> {
        let callers = order_callers(&edges, names)?;
        Ok(InlineWorkList { edges, callers })
    }

    pub fn edges(&self) -> &[InlineEdge] {
        &self.edges
    }

    pub fn callers(&self) -> &[NodeId] {
        &self.callers
    }

    pub fn edges_from(&self, caller: NodeId) -> impl Iterator<Item = &InlineEdge> + '_ {
        self.edges.iter().filter(move |e| e.caller == caller)
    }

    pub fn is_caller(&self, decl: NodeId) -> bool {
        self.edges.iter().any(|e| e.caller == decl)
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }
}

fn order_callers(
    edges: &[InlineEdge],
    names: &FxHashMap<NodeId, String>,
) -> Result<Vec<NodeId>, MidendError> {
    let mut graph = DependencyGraph::new();
    let mut decls: FxHashMap<GraphNodeId, NodeId> = FxHashMap::default();
    let mut node = |graph: &mut DependencyGraph, id: NodeId| {
        let name = names.get(&id).cloned().unwrap_or_else(|| id.to_string());
        let g = graph.add_node(&name);
        decls.insert(g, id);
        g
    };
    for edge in edges {
        let caller = node(&mut graph, edge.caller);
        let callee = node(&mut graph, edge.callee);
        graph.add_dependency(caller, callee);
    }
    let order = topological_sort(&graph).map_err(|err| MidendError::RecursiveInlining {
        cycle: err.cycle_path,
    })?;
    Ok(order
        .into_iter()
        .filter_map(|g| decls.get(&g).copied())
        .filter(|id| edges.iter().any(|e| e.caller == *id))
        .collect())
}

// ── Tree helpers ───────────────────────────────────────────────────────

/// The declaration with id `id`, at toplevel or among a control's locals.
pub(crate) fn find_declaration(program: &Program, id: NodeId) -> Option<Rc<Declaration>> {
    struct Finder {
        id: NodeId,
        found: Option<Rc<Declaration>>,
    }

    impl Visitor for Finder {
        fn visit_declaration(&mut self, decl: &Rc<Declaration>) {
            if self.found.is_some() {
                return;
            }
            if decl.id == self.id {
                self.found = Some(decl.clone());
                return;
            }
            walk_declaration(self, decl)
        }
    }

    let mut finder = Finder { id, found: None };
    walk_program(&mut finder, program);
    finder.found
}

/// `program` with the declaration of the same id as `replacement` swapped
/// for it.
pub(crate) fn replace_declaration(
    program: &Rc<Program>,
    replacement: Rc<Declaration>,
) -> Rc<Program> {
    struct Replacer {
        replacement: Rc<Declaration>,
    }

    impl Transform for Replacer {
        fn preorder_declaration(&mut self, decl: Rc<Declaration>) -> Flow<Rc<Declaration>> {
            if decl.id == self.replacement.id {
                Flow::Prune(self.replacement.clone())
            } else {
                Flow::Continue(decl)
            }
        }
    }

    transform_program(&mut Replacer { replacement }, program)
}

/// Every declaration statement in `block`, at any depth.
pub(crate) fn block_declarations(block: &Rc<Block>) -> Vec<Rc<Declaration>> {
    #[derive(Default)]
    struct Collector {
        found: Vec<Rc<Declaration>>,
    }

    impl Visitor for Collector {
        fn visit_statement(&mut self, stmt: &Rc<Statement>) {
            if let StatementKind::Declaration(decl) = &stmt.kind {
                self.found.push(decl.clone());
            }
            walk_statement(self, stmt)
        }
    }

    let mut collector = Collector::default();
    collector.visit_block(block);
    collector.found
}

/// `body` with a fresh copy of `copy_out` placed before every `exit`, so
/// `out`/`inout` arguments are written back when the callee leaves early.
pub(crate) fn copy_out_before_exit(body: &Rc<Block>, copy_out: &[Rc<Statement>]) -> Rc<Block> {
    struct ExitCopyOut<'a> {
        copy_out: &'a [Rc<Statement>],
    }

    impl Transform for ExitCopyOut<'_> {
        fn postorder_statement(&mut self, stmt: Rc<Statement>) -> Vec<Rc<Statement>> {
            if !matches!(stmt.kind, StatementKind::Exit) {
                return vec![stmt];
            }
            let mut out: Vec<_> = self.copy_out.iter().map(|s| s.deep_clone()).collect();
            out.push(stmt);
            out
        }
    }

    if copy_out.is_empty() {
        return body.clone();
    }
    transform_block(&mut ExitCopyOut { copy_out }, body)
}

/// Re-derive the side tables for the tree being rewritten. The tree
/// entering a driver type-checks, so anything reported here was introduced
/// by inlining; it goes to `diagnostics` and the pipeline stops at the
/// next boundary.
pub(crate) fn recheck(program: &Program, diagnostics: &mut Diagnostics) -> Typeck {
    let typeck = p4c_typeck::check(program);
    diagnostics.extend(typeck.errors.iter().map(TypeError::to_diagnostic));
    typeck
}

#[cfg(test)]
mod tests {
    use super::*;
    use p4c_ir::{Expression, Type};

    fn names(pairs: &[(NodeId, &str)]) -> FxHashMap<NodeId, String> {
        pairs.iter().map(|(id, n)| (*id, n.to_string())).collect()
    }

    #[test]
    fn callees_come_first() {
        let (a, b, c) = (NodeId::fresh(), NodeId::fresh(), NodeId::fresh());
        let edges = vec![
            InlineEdge { caller: a, callee: b, site: NodeId::fresh() },
            InlineEdge { caller: b, callee: c, site: NodeId::fresh() },
        ];
        let list = InlineWorkList::new(edges, &names(&[(a, "a"), (b, "b"), (c, "c")])).unwrap();
        assert_eq!(list.callers(), &[b, a]);
        assert_eq!(list.edges_from(a).count(), 1);
        assert!(!list.is_caller(c));
    }

    #[test]
    fn cycles_are_fatal() {
        let (a, b) = (NodeId::fresh(), NodeId::fresh());
        let edges = vec![
            InlineEdge { caller: a, callee: b, site: NodeId::fresh() },
            InlineEdge { caller: b, callee: a, site: NodeId::fresh() },
        ];
        let err = InlineWorkList::new(edges, &names(&[(a, "a"), (b, "b")])).unwrap_err();
        let MidendError::RecursiveInlining { cycle } = err else {
            panic!("expected a cycle");
        };
        assert_eq!(cycle.first(), cycle.last());
        assert!(cycle.contains(&"a".to_string()) && cycle.contains(&"b".to_string()));
    }

    #[test]
    fn find_and_replace_nested() {
        let x = Declaration::variable("x", Type::bits(8), None);
        let control = Declaration::control("c", vec![], vec![x.clone()], Block::empty());
        let program = Program::new(vec![control]);

        assert_eq!(find_declaration(&program, x.id).map(|d| d.id), Some(x.id));
        let out = replace_declaration(&program, x.renamed("y"));
        let found = find_declaration(&out, x.id).unwrap();
        assert_eq!(found.name, "y");
    }

    #[test]
    fn nested_block_declarations() {
        let inner = Declaration::variable("t", Type::bits(8), None);
        let block = Block::new(vec![Statement::if_else(
            Expression::boolean(true),
            Statement::block(vec![Statement::declare(inner.clone())]),
            None,
        )]);
        let found = block_declarations(&block);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, inner.id);
    }

    #[test]
    fn recheck_reports_errors_in_the_rewritten_tree() {
        let control = Declaration::control(
            "c",
            vec![],
            vec![],
            Block::new(vec![Statement::assign(
                Expression::path("gone"),
                Expression::sized(1, 8),
            )]),
        );
        let mut diagnostics = Diagnostics::new();
        let typeck = recheck(&Program::new(vec![control]), &mut diagnostics);
        assert_eq!(typeck.errors.len(), 1);
        let codes: Vec<&str> = diagnostics.errors().map(|d| d.code).collect();
        assert_eq!(codes, vec!["E0001"]);
    }
}
