//! Core dependency resolution algorithm: depth-first search over candidate
//! versions, newest first by default, with optional-dependency skipping and
//! conflict-directed backjumping over a memo of failed choices.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use modula_core::config::{DescriptorConflicts, ResolverConfig, SelectionPolicy};
use modula_core::dependency::{merge_by_target, DependencyConstraint};
use modula_core::identifier::Identifier;
use modula_core::module::Module;
use modula_core::registry::{ModuleRegistry, RegistrySnapshot};
use modula_core::version::{Version, VersionRange};
use modula_util::errors::ModulaError;

use crate::candidates::CandidateIndex;
use crate::failure::{FailureKind, Requester, ResolutionFailure};
use crate::graph::{DepEdge, ModuleGraph};
use crate::memo::{Context, FailedChoices};
use crate::state::{Alternative, Causes, Checkpoint, Edge, Interner, Level, NodeId, SearchState};

/// The output of one resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Success(Selection),
    Failure(ResolutionFailure),
}

impl Resolution {
    pub fn is_success(&self) -> bool {
        matches!(self, Resolution::Success(_))
    }

    pub fn selection(&self) -> Option<&Selection> {
        match self {
            Resolution::Success(selection) => Some(selection),
            Resolution::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ResolutionFailure> {
        match self {
            Resolution::Success(_) => None,
            Resolution::Failure(failure) => Some(failure),
        }
    }

    /// Turn a failure into a [`ModulaError`] for callers that propagate with `?`.
    pub fn into_result(self) -> Result<Selection, ModulaError> {
        match self {
            Resolution::Success(selection) => Ok(selection),
            Resolution::Failure(failure) => Err(failure.into()),
        }
    }
}

/// Exactly one module version per selected id.
#[derive(Debug, Clone)]
pub struct Selection {
    modules: BTreeMap<Identifier, Arc<Module>>,
    graph: ModuleGraph,
}

impl Selection {
    pub fn get(&self, id: &Identifier) -> Option<&Arc<Module>> {
        self.modules.get(id)
    }

    pub fn version_of(&self, id: &Identifier) -> Option<&Version> {
        self.modules.get(id).map(|m| m.version())
    }

    pub fn contains(&self, id: &Identifier) -> bool {
        self.modules.contains_key(id)
    }

    /// Selected modules ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &Arc<Module>)> {
        self.modules.iter()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// The requirement edges that led to each selected module.
    pub fn graph(&self) -> &ModuleGraph {
        &self.graph
    }

    /// Selected modules with every module after its dependencies.
    pub fn load_order(&self) -> Vec<&Arc<Module>> {
        self.graph.load_order()
    }
}

impl PartialEq for Selection {
    fn eq(&self, other: &Self) -> bool {
        self.modules == other.modules
    }
}

/// Resolve `roots` against the current contents of `registry` with the
/// default configuration.
pub fn resolve(roots: &[DependencyConstraint], registry: &ModuleRegistry) -> Resolution {
    Resolver::default().resolve(roots, &registry.snapshot())
}

/// Selects one version of every required module from a registry snapshot.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Compute a consistent selection for `roots`, or the reason none exists.
    ///
    /// Pure: reads only the snapshot and never mutates shared state, so
    /// independent calls may run concurrently.
    pub fn resolve(&self, roots: &[DependencyConstraint], snapshot: &RegistrySnapshot) -> Resolution {
        self.resolve_with_stats(roots, snapshot).0
    }

    /// [`Resolver::resolve`], also reporting how much searching it took.
    pub(crate) fn resolve_with_stats(
        &self,
        roots: &[DependencyConstraint],
        snapshot: &RegistrySnapshot,
    ) -> (Resolution, SearchStats) {
        let policy = self.config.optional_merge();
        let roots = match merge_by_target(roots, policy) {
            Ok(roots) => roots,
            Err(conflict) => {
                tracing::debug!("Root requirements conflict: {conflict}");
                let mut failure =
                    ResolutionFailure::new(FailureKind::ConstraintConflict, conflict.target);
                for constraint in conflict.constraints {
                    failure.add(Requester::Root, constraint);
                }
                return (Resolution::Failure(failure), SearchStats::default());
            }
        };

        let candidates = CandidateIndex::build(snapshot, policy);
        if self.config.descriptor_conflicts() == DescriptorConflicts::Fail {
            if let Some(rejected) = candidates.reachable_rejection(&roots) {
                tracing::debug!("{} cannot be selected: {}", rejected.module, rejected.conflict);
                let mut failure = ResolutionFailure::new(
                    FailureKind::ConstraintConflict,
                    rejected.conflict.target.clone(),
                );
                for constraint in &rejected.conflict.constraints {
                    failure.add(Requester::Module(rejected.module.id().clone()), constraint.clone());
                }
                return (Resolution::Failure(failure), SearchStats::default());
            }
        }

        let mut search = Search::new(&candidates, self.config.selection());
        for constraint in roots {
            search.state.queue.push_back(Edge {
                requester: Requester::Root,
                constraint,
            });
        }
        let resolution = search.run();
        (resolution, search.stats())
    }
}

/// Work done by one search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SearchStats {
    pub commits: usize,
    pub backtracks: usize,
    pub memo_hits: usize,
}

/// Outcome of processing one edge.
enum Step {
    Continue,
    /// A conflict with the checkpoint levels it depends on.
    Conflict(ResolutionFailure, Causes),
}

/// Depth-first search with conflict-directed backjumping.
///
/// Every conflict names the checkpoints whose commitments produced it. The
/// search jumps straight back to the deepest of them, records the failed
/// choice under the commitments of the others, and skips that choice whenever
/// those commitments hold again.
struct Search<'a> {
    candidates: &'a CandidateIndex,
    selection: SelectionPolicy,
    interner: Interner,
    state: SearchState,
    checkpoints: Vec<Checkpoint>,
    failed: FailedChoices,
    commits: usize,
    backtracks: usize,
}

impl<'a> Search<'a> {
    fn new(candidates: &'a CandidateIndex, selection: SelectionPolicy) -> Self {
        Self {
            candidates,
            selection,
            interner: Interner::default(),
            state: SearchState::default(),
            checkpoints: Vec::new(),
            failed: FailedChoices::new(),
            commits: 0,
            backtracks: 0,
        }
    }

    fn stats(&self) -> SearchStats {
        SearchStats {
            commits: self.commits,
            backtracks: self.backtracks,
            memo_hits: self.failed.hits(),
        }
    }

    fn run(&mut self) -> Resolution {
        while let Some(edge) = self.state.queue.pop_front() {
            let Step::Conflict(failure, causes) = self.process(edge) else {
                continue;
            };
            tracing::debug!("Conflict on {}: {}", failure.target, failure.kind);
            if !self.backtrack(causes) {
                tracing::info!(
                    "Resolution failed after {} commit(s), {} backtrack(s), {} failed choice(s) recorded",
                    self.commits,
                    self.backtracks,
                    self.failed.len()
                );
                return Resolution::Failure(failure);
            }
        }

        tracing::info!(
            "Resolution succeeded: {} commit(s), {} backtrack(s), {} memo hit(s)",
            self.commits,
            self.backtracks,
            self.failed.hits()
        );
        Resolution::Success(self.selection())
    }

    /// Check one requirement edge against the current state.
    fn process(&mut self, edge: Edge) -> Step {
        let node = self.interner.intern(edge.constraint.target());
        tracing::trace!("{} requires {}", edge.requester, edge.constraint);

        let (committed, accumulated) = match self.state.node(node) {
            Some(n) => (n.committed.clone(), n.range.clone()),
            None => (None, VersionRange::unbounded()),
        };
        let effective = accumulated.intersect(edge.constraint.range());

        if let Some(version) = committed {
            if effective.satisfied_by(&version) {
                let n = self.state.node_mut(node);
                n.range = effective;
                n.edges.push(edge);
                return Step::Continue;
            }
            if edge.constraint.is_optional() {
                tracing::debug!(
                    "Dropping optional {} from {}: {} {version} already selected",
                    edge.constraint,
                    edge.requester,
                    self.interner.id(node)
                );
                return Step::Continue;
            }
            // The committed version always satisfies the accumulated range, so
            // only the commitment and this edge's requester are to blame.
            let causes: Causes = self
                .state
                .level_of(node)
                .into_iter()
                .chain(self.requester_level(&edge.requester))
                .collect();
            let failure = self.conflict(node, edge, FailureKind::VersionConflict);
            return Step::Conflict(failure, causes);
        }

        let id = self.interner.id(node).clone();
        let mut causes: Causes = self.requester_level(&edge.requester).into_iter().collect();
        let mut alternatives: VecDeque<Alternative> = VecDeque::new();
        for candidate in self.candidates.candidates(&id) {
            let version = candidate.version();
            if !effective.satisfied_by(version) {
                continue;
            }
            match self.failed.check(node, version, |n, v| self.state.holds(n, v)) {
                Some(context) => {
                    tracing::trace!("Not retrying {id} {version}: known to fail");
                    causes.extend(self.state.levels_of(&context));
                }
                None => alternatives.push_back(Alternative::Commit(version.clone())),
            }
        }
        if self.selection == SelectionPolicy::LowestFirst {
            alternatives.make_contiguous().reverse();
        }

        if alternatives.is_empty() {
            if edge.constraint.is_optional() {
                tracing::debug!(
                    "Dropping optional {} from {}: no satisfying version",
                    edge.constraint,
                    edge.requester
                );
                return Step::Continue;
            }
            let kind = self.classify_missing(&id, &edge.constraint);
            return Step::Conflict(self.conflict(node, edge, kind), causes);
        }
        if edge.constraint.is_optional() {
            alternatives.push_back(Alternative::Skip);
        }

        let Some(chosen) = alternatives.pop_front() else {
            return Step::Continue;
        };
        let saved = self.state.clone();
        self.apply(node, &edge, &effective, &chosen);
        self.checkpoints.push(Checkpoint {
            node,
            edge,
            effective,
            chosen,
            remaining: alternatives,
            causes,
            saved,
        });
        Step::Continue
    }

    /// Apply one alternative for `node` on top of the current state. The
    /// checkpoint for it goes at the top of the stack.
    fn apply(&mut self, node: NodeId, edge: &Edge, effective: &VersionRange, alternative: &Alternative) {
        let id = self.interner.id(node).clone();
        let Alternative::Commit(version) = alternative else {
            tracing::debug!("Skipping optional {id} requested by {}", edge.requester);
            return;
        };

        self.commits += 1;
        tracing::debug!("Selecting {id} {version}");
        let level = self.checkpoints.len();
        let n = self.state.node_mut(node);
        n.committed = Some(version.clone());
        n.level = Some(level);
        n.range = effective.clone();
        n.edges.push(edge.clone());

        if let Some(candidate) = self.candidates.get(&id, version) {
            for constraint in &candidate.dependencies {
                self.state.queue.push_back(Edge {
                    requester: Requester::Module(id.clone()),
                    constraint: constraint.clone(),
                });
            }
        }
    }

    /// Jump back to the deepest checkpoint in `causes` and move it to its next
    /// alternative. Checkpoints above it had no part in the conflict and are
    /// dropped along with their untried alternatives. When a checkpoint runs
    /// out, its own causes carry the search further back. Returns `false`
    /// once no cause is left.
    fn backtrack(&mut self, mut causes: Causes) -> bool {
        while let Some(level) = causes.pop_last() {
            let skipped = self.checkpoints.len().saturating_sub(level + 1);
            if skipped > 0 {
                tracing::debug!("Backjumping over {skipped} unrelated checkpoint(s)");
            }
            self.checkpoints.truncate(level + 1);
            let Some(mut checkpoint) = self.checkpoints.pop() else {
                return false;
            };

            if let Alternative::Commit(ref version) = checkpoint.chosen {
                let context = self.context(&causes);
                self.failed.record(checkpoint.node, version, context);
            }
            checkpoint.causes.extend(causes);

            while let Some(alternative) = checkpoint.remaining.pop_front() {
                if let Alternative::Commit(ref version) = alternative {
                    let saved = &checkpoint.saved;
                    let known = self
                        .failed
                        .check(checkpoint.node, version, |n, v| saved.holds(n, v));
                    if let Some(context) = known {
                        checkpoint.causes.extend(saved.levels_of(&context));
                        continue;
                    }
                }

                self.backtracks += 1;
                tracing::debug!(
                    "Backtracking: retrying {} with {alternative}",
                    self.interner.id(checkpoint.node)
                );
                self.state = checkpoint.saved.clone();
                self.apply(
                    checkpoint.node,
                    &checkpoint.edge,
                    &checkpoint.effective,
                    &alternative,
                );
                checkpoint.chosen = alternative;
                self.checkpoints.push(checkpoint);
                return true;
            }

            tracing::debug!(
                "No alternative left for {}",
                self.interner.id(checkpoint.node)
            );
            causes = checkpoint.causes;
        }
        false
    }

    /// Level of the checkpoint that committed an edge's requester. Root edges
    /// depend on no decision.
    fn requester_level(&self, requester: &Requester) -> Option<Level> {
        match requester {
            Requester::Root => None,
            Requester::Module(id) => self
                .interner
                .lookup(id)
                .and_then(|node| self.state.level_of(node)),
        }
    }

    /// The commitments made at the given checkpoint levels.
    fn context(&self, causes: &Causes) -> Context {
        causes
            .iter()
            .filter_map(|&level| {
                let checkpoint = self.checkpoints.get(level)?;
                match &checkpoint.chosen {
                    Alternative::Commit(version) => Some((checkpoint.node, version.clone())),
                    Alternative::Skip => None,
                }
            })
            .collect()
    }

    /// Tell a target with no usable version apart from one whose versions
    /// exist but clash with the rest of the search.
    fn classify_missing(&self, id: &Identifier, constraint: &DependencyConstraint) -> FailureKind {
        if self
            .candidates
            .candidates(id)
            .iter()
            .any(|c| constraint.satisfied_by(c.version()))
        {
            FailureKind::VersionConflict
        } else if self
            .candidates
            .rejected(id)
            .iter()
            .any(|r| constraint.satisfied_by(r.module.version()))
        {
            FailureKind::ConstraintConflict
        } else {
            FailureKind::MissingModule
        }
    }

    /// Build the failure for `node`: every edge accepted on it so far plus the
    /// edge that could not be met.
    fn conflict(&self, node: NodeId, edge: Edge, kind: FailureKind) -> ResolutionFailure {
        let id = self.interner.id(node).clone();
        let mut failure = ResolutionFailure::new(kind, id.clone());
        if let Some(n) = self.state.node(node) {
            for accepted in &n.edges {
                failure.add(accepted.requester.clone(), accepted.constraint.clone());
            }
        }
        if kind == FailureKind::ConstraintConflict {
            for rejected in self.candidates.rejected(&id) {
                if edge.constraint.satisfied_by(rejected.module.version()) {
                    for constraint in &rejected.conflict.constraints {
                        failure.add(Requester::Module(id.clone()), constraint.clone());
                    }
                }
            }
        }
        failure.add(edge.requester, edge.constraint);
        failure
    }

    fn selection(&self) -> Selection {
        let mut modules = BTreeMap::new();
        let mut graph = ModuleGraph::new();

        let mut selected = Vec::new();
        for (node, _, version) in self.state.committed() {
            let id = self.interner.id(node);
            if let Some(candidate) = self.candidates.get(id, version) {
                let idx = graph.add_module(Arc::clone(&candidate.module));
                modules.insert(id.clone(), Arc::clone(&candidate.module));
                selected.push((node, idx));
            }
        }

        for &(node, idx) in &selected {
            let Some(n) = self.state.node(node) else {
                continue;
            };
            for edge in &n.edges {
                let from = match edge.requester {
                    Requester::Root => Some(graph.root),
                    Requester::Module(ref requester) => graph.find(requester),
                };
                if let Some(from) = from {
                    graph.add_edge(
                        from,
                        idx,
                        DepEdge {
                            constraint: edge.constraint.clone(),
                        },
                    );
                }
            }
        }

        Selection { modules, graph }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modula_core::descriptor::ModuleDescriptor;

    fn registry(modules: &[&str]) -> ModuleRegistry {
        let mut registry = ModuleRegistry::new();
        for json in modules {
            registry
                .add(Module::detached(ModuleDescriptor::from_json(json).unwrap()))
                .unwrap();
        }
        registry
    }

    fn req(s: &str) -> DependencyConstraint {
        s.parse().unwrap()
    }

    #[test]
    fn empty_roots_select_nothing() {
        let resolution = resolve(&[], &ModuleRegistry::new());
        assert!(resolution.selection().is_some_and(Selection::is_empty));
    }

    #[test]
    fn single_module_highest_version() {
        let reg = registry(&[
            r#"{"id": "Core", "version": "1.0.0"}"#,
            r#"{"id": "Core", "version": "1.1.0"}"#,
            r#"{"id": "Core", "version": "1.2.0-beta"}"#,
        ]);
        let resolution = resolve(&[req("Core")], &reg);
        let selection = resolution.selection().unwrap();
        assert_eq!(selection.version_of(&Identifier::of("core")).unwrap().to_string(), "1.2.0-beta");

        let resolution = resolve(&[req("Core@..1.2.0-beta")], &reg);
        assert_eq!(
            resolution.selection().unwrap().version_of(&Identifier::of("Core")).unwrap().to_string(),
            "1.1.0"
        );
    }

    #[test]
    fn lowest_first_policy() {
        let reg = registry(&[
            r#"{"id": "Core", "version": "1.0.0"}"#,
            r#"{"id": "Core", "version": "2.0.0"}"#,
        ]);
        let resolver =
            Resolver::new(ResolverConfig::default().with_selection(SelectionPolicy::LowestFirst));
        let resolution = resolver.resolve(&[req("Core")], &reg.snapshot());
        assert_eq!(
            resolution.selection().unwrap().version_of(&Identifier::of("Core")),
            Some(&Version::new(1, 0, 0))
        );
    }

    #[test]
    fn conflicting_roots_fail_before_search() {
        let reg = registry(&[r#"{"id": "Core", "version": "1.0.0"}"#]);
        let resolution = resolve(&[req("Core@1.0.0..2.0.0"), req("core@2.0.0..3.0.0")], &reg);
        let failure = resolution.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::ConstraintConflict);
        assert_eq!(failure.len(), 2);
        assert!(failure.unsatisfied.iter().all(|e| e.requester == Requester::Root));
    }

    /// Independent roots `X0..X{n-1}` with two versions each, plus `Bad`
    /// whose only version needs a module nobody provides.
    fn independent_roots_with_one_dead_end(n: usize) -> (ModuleRegistry, Vec<DependencyConstraint>) {
        let mut modules = Vec::new();
        for i in 0..n {
            modules.push(format!(r#"{{"id": "X{i}", "version": "1.0.0"}}"#));
            modules.push(format!(r#"{{"id": "X{i}", "version": "2.0.0"}}"#));
        }
        modules.push(
            r#"{"id": "Bad", "version": "1.0.0", "dependencies": [{"id": "Missing"}]}"#.to_string(),
        );
        let json: Vec<&str> = modules.iter().map(String::as_str).collect();

        let mut roots: Vec<DependencyConstraint> = (0..n).map(|i| req(&format!("X{i}"))).collect();
        roots.push(req("Bad"));
        (registry(&json), roots)
    }

    #[test]
    fn dead_end_does_not_retry_unrelated_siblings() {
        for n in [4, 12, 20] {
            let (reg, roots) = independent_roots_with_one_dead_end(n);
            let (resolution, stats) = Resolver::default().resolve_with_stats(&roots, &reg.snapshot());

            let failure = resolution.failure().unwrap();
            assert_eq!(failure.kind, FailureKind::MissingModule);
            assert_eq!(failure.target, Identifier::of("Missing"));
            assert_eq!(failure.unsatisfied[0].requester, Requester::Module(Identifier::of("Bad")));
            // One commit per root, no sibling retried.
            assert_eq!(stats.commits, n + 1, "n = {n}");
            assert_eq!(stats.backtracks, 0, "n = {n}");
        }
    }

    #[test]
    fn dead_end_behind_siblings_is_skipped_on_retry() {
        // App 2.0.0 reaches Q and W. Q 2.0.0 needs Missing and W needs a
        // Z 2.0.0 nobody has, so App falls back to 1.0.0, which only needs Q.
        // Q 2.0.0 failed with no context and must not be tried again.
        let reg = registry(&[
            r#"{"id": "App", "version": "2.0.0", "dependencies": [{"id": "Q"}, {"id": "W"}]}"#,
            r#"{"id": "App", "version": "1.0.0", "dependencies": [{"id": "Q"}]}"#,
            r#"{"id": "Q", "version": "2.0.0", "dependencies": [{"id": "Missing"}]}"#,
            r#"{"id": "Q", "version": "1.0.0"}"#,
            r#"{"id": "W", "version": "1.0.0", "dependencies": [{"id": "Z", "minVersion": "2.0.0"}]}"#,
            r#"{"id": "Z", "version": "1.0.0"}"#,
        ]);
        let (resolution, stats) = Resolver::default().resolve_with_stats(&[req("App")], &reg.snapshot());

        let selection = resolution.selection().unwrap();
        assert_eq!(selection.version_of(&Identifier::of("App")), Some(&Version::new(1, 0, 0)));
        assert_eq!(selection.version_of(&Identifier::of("Q")), Some(&Version::new(1, 0, 0)));
        assert!(!selection.contains(&Identifier::of("W")));
        assert_eq!(stats.memo_hits, 1);
        // App 2, Q 2, W, Q 1, W again, App 1, Q 1.
        assert_eq!(stats.commits, 7);
    }

    #[test]
    fn failing_fast_on_reachable_broken_descriptor() {
        let reg = registry(&[
            r#"{"id": "Lib", "version": "2.0.0", "dependencies": [
                {"id": "Core", "minVersion": "3.0.0"}, {"id": "Core", "maxVersion": "2.0.0"}]}"#,
            r#"{"id": "Lib", "version": "1.0.0"}"#,
            r#"{"id": "Core", "version": "1.0.0"}"#,
        ]);

        let pruning = resolve(&[req("Lib")], &reg);
        assert_eq!(
            pruning.selection().unwrap().version_of(&Identifier::of("Lib")),
            Some(&Version::new(1, 0, 0))
        );

        let strict = Resolver::new(
            ResolverConfig::default().with_descriptor_conflicts(DescriptorConflicts::Fail),
        );
        let (resolution, stats) = strict.resolve_with_stats(&[req("Lib")], &reg.snapshot());
        let failure = resolution.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::ConstraintConflict);
        assert_eq!(failure.target, Identifier::of("Core"));
        assert_eq!(failure.len(), 2);
        assert!(failure
            .unsatisfied
            .iter()
            .all(|e| e.requester == Requester::Module(Identifier::of("Lib"))));
        assert_eq!(stats, SearchStats::default());

        // Unreachable broken descriptors do not matter.
        assert!(strict.resolve(&[req("Core")], &reg.snapshot()).is_success());
    }

    #[test]
    fn into_result_maps_failure_to_error() {
        let resolution = resolve(&[req("Nope")], &ModuleRegistry::new());
        let err = resolution.into_result().unwrap_err();
        assert!(matches!(err, ModulaError::MissingModule { .. }));
    }
}
