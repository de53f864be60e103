//! Per-resolution index of selectable module versions.
//!
//! Built once from a registry snapshot before the search starts. Each
//! descriptor's dependencies are merged per target here, so a module whose own
//! constraints contradict each other is set aside up front instead of being
//! discovered mid-search. Whether such a module only drops out of the search
//! or fails the resolution outright is up to the resolver's configuration.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use modula_core::config::OptionalMerge;
use modula_core::dependency::{ConstraintConflict, DependencyConstraint};
use modula_core::identifier::Identifier;
use modula_core::module::Module;
use modula_core::registry::RegistrySnapshot;
use modula_core::version::Version;

/// A selectable module version with its dependencies merged per target.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub module: Arc<Module>,
    pub dependencies: Vec<DependencyConstraint>,
}

impl Candidate {
    pub fn version(&self) -> &Version {
        self.module.version()
    }
}

/// A module version that can never be selected because its own constraints conflict.
#[derive(Debug, Clone)]
pub struct Rejected {
    pub module: Arc<Module>,
    pub conflict: ConstraintConflict,
}

#[derive(Debug, Default)]
pub struct CandidateIndex {
    candidates: HashMap<Identifier, Vec<Candidate>>,
    rejected: HashMap<Identifier, Vec<Rejected>>,
}

impl CandidateIndex {
    pub fn build(snapshot: &RegistrySnapshot, policy: OptionalMerge) -> Self {
        let mut index = Self::default();
        for id in snapshot.ids() {
            for module in snapshot.modules_of(id) {
                match module.descriptor().merged_dependencies(policy) {
                    Ok(dependencies) => index
                        .candidates
                        .entry(id.clone())
                        .or_default()
                        .push(Candidate {
                            module,
                            dependencies,
                        }),
                    Err(conflict) => {
                        tracing::warn!("Ignoring {module}: {conflict}");
                        index.rejected.entry(id.clone()).or_default().push(Rejected {
                            module,
                            conflict,
                        });
                    }
                }
            }
        }
        index
    }

    /// Selectable versions of `id`, newest first.
    pub fn candidates(&self, id: &Identifier) -> &[Candidate] {
        self.candidates.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn get(&self, id: &Identifier, version: &Version) -> Option<&Candidate> {
        self.candidates(id).iter().find(|c| c.version() == version)
    }

    /// Versions of `id` set aside for self-conflicting descriptors, newest first.
    pub fn rejected(&self, id: &Identifier) -> &[Rejected] {
        self.rejected.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// The first self-conflicting version met walking breadth-first from
    /// `roots` through the dependencies of every selectable version.
    pub fn reachable_rejection<'s>(&'s self, roots: &'s [DependencyConstraint]) -> Option<&'s Rejected> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<&Identifier> = roots.iter().map(|c| c.target()).collect();
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(rejected) = self.rejected(id).first() {
                return Some(rejected);
            }
            for candidate in self.candidates(id) {
                queue.extend(candidate.dependencies.iter().map(|d| d.target()));
            }
        }
        None
    }
}
