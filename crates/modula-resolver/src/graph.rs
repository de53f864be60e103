//! Resolved module graph construction and traversal.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use modula_core::dependency::DependencyConstraint;
use modula_core::identifier::Identifier;
use modula_core::module::Module;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

/// A node in the resolved graph: the caller's root requirements or a selected module.
#[derive(Debug, Clone)]
pub enum GraphNode {
    Root,
    Module(Arc<Module>),
}

impl GraphNode {
    pub fn module(&self) -> Option<&Arc<Module>> {
        match self {
            GraphNode::Root => None,
            GraphNode::Module(m) => Some(m),
        }
    }
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphNode::Root => f.write_str("<root>"),
            GraphNode::Module(m) => write!(f, "{m}"),
        }
    }
}

/// Edge label: the constraint the requester placed on the target.
#[derive(Debug, Clone)]
pub struct DepEdge {
    pub constraint: DependencyConstraint,
}

/// The selected modules and the edges that led to them, backed by petgraph.
#[derive(Debug, Clone)]
pub struct ModuleGraph {
    graph: DiGraph<GraphNode, DepEdge>,
    /// Lookup from module id to node index.
    index: HashMap<Identifier, NodeIndex>,
    pub root: NodeIndex,
}

impl ModuleGraph {
    pub fn new() -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(GraphNode::Root);
        Self {
            graph,
            index: HashMap::new(),
            root,
        }
    }

    /// Add or retrieve a module node. If the id already exists, returns the existing index.
    pub fn add_module(&mut self, module: Arc<Module>) -> NodeIndex {
        if let Some(&idx) = self.index.get(module.id()) {
            return idx;
        }
        let id = module.id().clone();
        let idx = self.graph.add_node(GraphNode::Module(module));
        self.index.insert(id, idx);
        idx
    }

    /// Add a dependency edge from `from` to `to`.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, edge: DepEdge) {
        if !self.graph.edges(from).any(|e| e.target() == to) {
            self.graph.add_edge(from, to, edge);
        }
    }

    /// Look up a module node by id.
    pub fn find(&self, id: &Identifier) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> &GraphNode {
        &self.graph[idx]
    }

    /// All selected modules, in insertion order.
    pub fn modules(&self) -> Vec<&Arc<Module>> {
        self.graph
            .node_indices()
            .filter_map(|idx| self.graph[idx].module())
            .collect()
    }

    /// Direct dependencies of a node.
    pub fn dependencies_of(&self, idx: NodeIndex) -> Vec<(NodeIndex, &DepEdge)> {
        let mut deps: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.target(), e.weight()))
            .collect();
        // petgraph yields outgoing edges newest first
        deps.reverse();
        deps
    }

    /// Reverse dependencies (who depends on this node).
    pub fn dependents_of(&self, idx: NodeIndex) -> Vec<(NodeIndex, &DepEdge)> {
        let mut deps: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| (e.source(), e.weight()))
            .collect();
        deps.reverse();
        deps
    }

    /// Modules ordered so that every module comes after its dependencies.
    ///
    /// Modules on a cycle have no such order; each cycle is emitted as one
    /// contiguous group sorted by id.
    pub fn load_order(&self) -> Vec<&Arc<Module>> {
        let mut order = Vec::new();
        for mut component in tarjan_scc(&self.graph) {
            component.retain(|&idx| idx != self.root);
            let mut modules: Vec<&Arc<Module>> = component
                .iter()
                .filter_map(|&idx| self.graph[idx].module())
                .collect();
            modules.sort_by(|a, b| a.id().cmp(b.id()));
            order.extend(modules);
        }
        order
    }

    /// Print the dependency tree to a string.
    pub fn print_tree(&self, max_depth: Option<usize>) -> String {
        let mut output = format!("{}\n", self.graph[self.root]);
        let mut visited = HashSet::new();
        visited.insert(self.root);

        let deps = self.dependencies_of(self.root);
        let count = deps.len();
        for (i, (idx, _)) in deps.iter().enumerate() {
            let is_last = i == count - 1;
            self.print_subtree(&mut output, *idx, "", is_last, 1, max_depth, &mut visited);
        }
        output
    }

    #[allow(clippy::too_many_arguments)]
    fn print_subtree(
        &self,
        output: &mut String,
        idx: NodeIndex,
        prefix: &str,
        is_last: bool,
        depth: usize,
        max_depth: Option<usize>,
        visited: &mut HashSet<NodeIndex>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        let node = &self.graph[idx];

        if visited.contains(&idx) {
            output.push_str(&format!("{prefix}{connector}{node} (cycle)\n"));
            return;
        }
        output.push_str(&format!("{prefix}{connector}{node}\n"));

        if let Some(max) = max_depth {
            if depth >= max {
                return;
            }
        }

        visited.insert(idx);
        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let deps = self.dependencies_of(idx);
        let count = deps.len();
        for (i, (child, _)) in deps.iter().enumerate() {
            let is_last = i == count - 1;
            self.print_subtree(
                output,
                *child,
                &child_prefix,
                is_last,
                depth + 1,
                max_depth,
                visited,
            );
        }
        visited.remove(&idx);
    }

    /// Find the path from the root to a selected module.
    pub fn find_path(&self, id: &Identifier) -> Option<Vec<&GraphNode>> {
        let target = self.find(id)?;
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        if self.dfs_path(self.root, target, &mut path, &mut visited) {
            Some(path.iter().map(|&idx| &self.graph[idx]).collect())
        } else {
            None
        }
    }

    fn dfs_path(
        &self,
        current: NodeIndex,
        target: NodeIndex,
        path: &mut Vec<NodeIndex>,
        visited: &mut HashSet<NodeIndex>,
    ) -> bool {
        path.push(current);
        if current == target {
            return true;
        }
        if !visited.insert(current) {
            path.pop();
            return false;
        }
        for (child, _) in self.dependencies_of(current) {
            if self.dfs_path(child, target, path, visited) {
                return true;
            }
        }
        path.pop();
        false
    }

    /// Build an inverted dependency tree (reverse edges) for a single module.
    pub fn print_inverted_tree(&self, id: &Identifier) -> String {
        let mut output = String::new();
        let Some(idx) = self.find(id) else {
            return output;
        };

        output.push_str(&format!("{}\n", self.graph[idx]));
        let mut visited = HashSet::new();
        visited.insert(idx);

        let dependents = self.dependents_of(idx);
        let count = dependents.len();
        for (i, (dep_idx, _)) in dependents.iter().enumerate() {
            let is_last = i == count - 1;
            self.print_inverted_subtree(&mut output, *dep_idx, "", is_last, &mut visited);
        }
        output
    }

    fn print_inverted_subtree(
        &self,
        output: &mut String,
        idx: NodeIndex,
        prefix: &str,
        is_last: bool,
        visited: &mut HashSet<NodeIndex>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        output.push_str(&format!("{prefix}{connector}{}\n", self.graph[idx]));

        if !visited.insert(idx) {
            return;
        }

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let dependents = self.dependents_of(idx);
        let count = dependents.len();
        for (i, (dep_idx, _)) in dependents.iter().enumerate() {
            let is_last = i == count - 1;
            self.print_inverted_subtree(output, *dep_idx, &child_prefix, is_last, visited);
        }
        visited.remove(&idx);
    }

    /// Number of selected modules (excluding root).
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl Default for ModuleGraph {
    fn default() -> Self {
        Self::new()
    }
}
