//! Named dependency graphs with cycle detection.
//!
//! The inlining passes record "caller depends on callee" edges here and ask
//! for a callees-first order. A cycle means a callee (transitively) invokes
//! itself, which can never be fully inlined.

use std::fmt;

use rustc_hash::FxHashMap;

/// Index of a node inside a [`DependencyGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphNodeId(pub u32);

#[derive(Debug)]
pub struct GraphNode {
    pub id: GraphNodeId,
    pub name: String,
    /// Nodes this node depends on, in insertion order.
    pub dependencies: Vec<GraphNodeId>,
}

/// Error returned when the graph contains a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError {
    /// The node names forming the cycle, e.g. `["a", "b", "a"]`.
    pub cycle_path: Vec<String>,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cycle_path.join(" -> "))
    }
}

impl std::error::Error for CycleError {}

/// A directed graph of named nodes.
///
/// Nodes are stored in insertion order; names are unique.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    pub nodes: Vec<GraphNode>,
    name_to_id: FxHashMap<String, GraphNodeId>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, or return the existing one with the same name.
    pub fn add_node(&mut self, name: &str) -> GraphNodeId {
        if let Some(id) = self.name_to_id.get(name) {
            return *id;
        }
        let id = GraphNodeId(self.nodes.len() as u32);
        self.name_to_id.insert(name.to_string(), id);
        self.nodes.push(GraphNode {
            id,
            name: name.to_string(),
            dependencies: Vec::new(),
        });
        id
    }

    pub fn resolve(&self, name: &str) -> Option<GraphNodeId> {
        self.name_to_id.get(name).copied()
    }

    /// Record that `from` depends on `to`. Duplicates are ignored; a
    /// self-dependency is kept because it is a cycle of length one.
    pub fn add_dependency(&mut self, from: GraphNodeId, to: GraphNodeId) {
        let deps = &mut self.nodes[from.0 as usize].dependencies;
        if !deps.contains(&to) {
            deps.push(to);
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn get(&self, id: GraphNodeId) -> &GraphNode {
        &self.nodes[id.0 as usize]
    }

    pub fn name(&self, id: GraphNodeId) -> &str {
        &self.get(id).name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

/// Dependencies-first order of every node.
///
/// A depth-first search emits a node once all its dependencies are out.
/// Roots, and the dependencies of each node, are explored in name order so
/// the result does not depend on insertion order. Reaching a node that is
/// still on the search path closes a cycle; the error names the path from
/// that node back to itself.
pub fn topological_sort(graph: &DependencyGraph) -> Result<Vec<GraphNodeId>, CycleError> {
    let mut search = Search {
        graph,
        marks: vec![Mark::Unvisited; graph.nodes.len()],
        path: Vec::new(),
        order: Vec::with_capacity(graph.nodes.len()),
    };
    for id in by_name(graph, graph.nodes.iter().map(|node| node.id)) {
        search.visit(id)?;
    }
    Ok(search.order)
}

fn by_name(graph: &DependencyGraph, ids: impl Iterator<Item = GraphNodeId>) -> Vec<GraphNodeId> {
    let mut ids: Vec<GraphNodeId> = ids.collect();
    ids.sort_by(|a, b| graph.name(*a).cmp(graph.name(*b)));
    ids
}

struct Search<'a> {
    graph: &'a DependencyGraph,
    marks: Vec<Mark>,
    /// Nodes entered but not yet finished, outermost first.
    path: Vec<GraphNodeId>,
    order: Vec<GraphNodeId>,
}

impl Search<'_> {
    fn visit(&mut self, id: GraphNodeId) -> Result<(), CycleError> {
        let slot = id.0 as usize;
        match self.marks[slot] {
            Mark::Done => return Ok(()),
            Mark::OnPath => return Err(self.cycle_back_to(id)),
            Mark::Unvisited => {}
        }
        self.marks[slot] = Mark::OnPath;
        self.path.push(id);
        let graph = self.graph;
        for dep in by_name(graph, graph.get(id).dependencies.iter().copied()) {
            self.visit(dep)?;
        }
        self.path.pop();
        self.marks[slot] = Mark::Done;
        self.order.push(id);
        Ok(())
    }

    fn cycle_back_to(&self, id: GraphNodeId) -> CycleError {
        let from = self.path.iter().rposition(|&p| p == id).unwrap_or(0);
        let mut cycle_path: Vec<String> = self.path[from..]
            .iter()
            .map(|&p| self.graph.name(p).to_string())
            .collect();
        cycle_path.push(self.graph.name(id).to_string());
        CycleError { cycle_path }
    }
}
