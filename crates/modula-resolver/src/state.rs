//! Search state and backtrack checkpoints.
//!
//! Module ids are interned to dense indices; all per-id bookkeeping lives in
//! vectors indexed by them so a checkpoint is a plain clone of the state.
//!
//! Checkpoints are numbered by their depth on the checkpoint stack. Each
//! committed node remembers the depth that committed it, which lets a conflict
//! name the decisions it depends on.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;

use modula_core::dependency::DependencyConstraint;
use modula_core::identifier::Identifier;
use modula_core::version::{Version, VersionRange};

use crate::failure::Requester;
use crate::memo::Context;

pub(crate) type NodeId = usize;

/// Depth of a checkpoint on the checkpoint stack.
pub(crate) type Level = usize;

/// Checkpoint levels a conflict depends on.
pub(crate) type Causes = BTreeSet<Level>;

/// Maps identifiers to dense node indices in first-seen order.
#[derive(Debug, Default)]
pub(crate) struct Interner {
    ids: Vec<Identifier>,
    index: HashMap<Identifier, NodeId>,
}

impl Interner {
    pub fn intern(&mut self, id: &Identifier) -> NodeId {
        if let Some(&node) = self.index.get(id) {
            return node;
        }
        let node = self.ids.len();
        self.ids.push(id.clone());
        self.index.insert(id.clone(), node);
        node
    }

    pub fn id(&self, node: NodeId) -> &Identifier {
        &self.ids[node]
    }

    pub fn lookup(&self, id: &Identifier) -> Option<NodeId> {
        self.index.get(id).copied()
    }
}

/// A pending or processed requirement edge.
#[derive(Debug, Clone)]
pub(crate) struct Edge {
    pub requester: Requester,
    pub constraint: DependencyConstraint,
}

/// Bookkeeping for one module id along the current search path.
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeState {
    pub committed: Option<Version>,
    /// Checkpoint that made the commitment.
    pub level: Option<Level>,
    /// Intersection of every edge accepted for this id so far.
    pub range: VersionRange,
    /// Accepted edges, in processing order.
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SearchState {
    nodes: Vec<NodeState>,
    pub queue: VecDeque<Edge>,
}

impl SearchState {
    pub fn node(&self, node: NodeId) -> Option<&NodeState> {
        self.nodes.get(node)
    }

    pub fn node_mut(&mut self, node: NodeId) -> &mut NodeState {
        if node >= self.nodes.len() {
            self.nodes.resize_with(node + 1, NodeState::default);
        }
        &mut self.nodes[node]
    }

    /// Every committed node with its version, in node order.
    pub fn committed(&self) -> impl Iterator<Item = (NodeId, &NodeState, &Version)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(node, state)| state.committed.as_ref().map(|v| (node, state, v)))
    }

    pub fn committed_version(&self, node: NodeId) -> Option<&Version> {
        self.node(node).and_then(|n| n.committed.as_ref())
    }

    pub fn level_of(&self, node: NodeId) -> Option<Level> {
        self.node(node).and_then(|n| n.level)
    }

    /// Whether `node` is committed to exactly `version`.
    pub fn holds(&self, node: NodeId, version: &Version) -> bool {
        self.committed_version(node) == Some(version)
    }

    /// Levels of the checkpoints behind a memo context.
    pub fn levels_of(&self, context: &Context) -> Causes {
        context.iter().filter_map(|&(node, _)| self.level_of(node)).collect()
    }
}

/// One way to answer the edge that opened a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Alternative {
    Commit(Version),
    /// Leave an optional dependency out.
    Skip,
}

impl fmt::Display for Alternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alternative::Commit(v) => write!(f, "{v}"),
            Alternative::Skip => f.write_str("<skip>"),
        }
    }
}

/// A decision point the search can return to.
#[derive(Debug)]
pub(crate) struct Checkpoint {
    pub node: NodeId,
    pub edge: Edge,
    pub effective: VersionRange,
    pub chosen: Alternative,
    pub remaining: VecDeque<Alternative>,
    /// Causes gathered from alternatives that already failed here, plus the
    /// decision behind the edge that opened the checkpoint.
    pub causes: Causes,
    /// State before the choice was applied.
    pub saved: SearchState,
}
