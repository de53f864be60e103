//! Memo of choices already proven to fail within one resolution.

use std::collections::HashMap;

use modula_core::version::Version;

use crate::state::NodeId;

/// Commitments a failure depends on, ordered by node.
pub(crate) type Context = Vec<(NodeId, Version)>;

/// `(node, version)` choices proven to fail, each with the commitments that
/// caused the failure.
///
/// A context lists only the commitments the conflict traced back to, so a
/// choice recorded with an empty context fails everywhere. A recorded choice
/// is skipped whenever its context is contained in the current commitments.
#[derive(Debug, Default)]
pub(crate) struct FailedChoices {
    failed: HashMap<(NodeId, Version), Vec<Context>>,
    hits: usize,
}

impl FailedChoices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed choice. Returns `false` if the same context was
    /// already known.
    pub fn record(&mut self, node: NodeId, version: &Version, mut context: Context) -> bool {
        context.sort();
        let contexts = self.failed.entry((node, version.clone())).or_default();
        if contexts.contains(&context) {
            return false;
        }
        contexts.push(context);
        true
    }

    /// The first recorded context for this choice that holds under the
    /// current commitments. Counts matches as memo hits.
    pub fn check<F>(&mut self, node: NodeId, version: &Version, committed: F) -> Option<Context>
    where
        F: Fn(NodeId, &Version) -> bool,
    {
        let found = self
            .failed
            .get(&(node, version.clone()))?
            .iter()
            .find(|context| context.iter().all(|(n, v)| committed(*n, v)))?
            .clone();
        self.hits += 1;
        Some(found)
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn len(&self) -> usize {
        self.failed.values().map(Vec::len).sum()
    }
}
