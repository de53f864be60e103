//! Resolution failure reporting.

use std::fmt;

use modula_core::dependency::DependencyConstraint;
use modula_core::identifier::Identifier;
use modula_util::errors::ModulaError;

/// Who asked for a dependency: the caller's root requirements or a module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Requester {
    Root,
    Module(Identifier),
}

impl fmt::Display for Requester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requester::Root => f.write_str("<root>"),
            Requester::Module(id) => write!(f, "{id}"),
        }
    }
}

/// One `(requester, constraint)` pair that could not be met.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsatisfiedEdge {
    pub requester: Requester,
    pub constraint: DependencyConstraint,
}

impl fmt::Display for UnsatisfiedEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} requires {}", self.requester, self.constraint)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Constraints declared together on one target share no version.
    ConstraintConflict,
    /// No registered version of the target satisfies a required range.
    MissingModule,
    /// Versions exist but every combination was exhausted.
    VersionConflict,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::ConstraintConflict => "constraint conflict",
            FailureKind::MissingModule => "missing module",
            FailureKind::VersionConflict => "version conflict",
        })
    }
}

/// Why a resolution failed.
///
/// Describes the last conflict the search hit before it ran out of
/// alternatives: its target and the edges on that target at that moment.
/// Conflicts met and backtracked out of earlier are not included, so this is
/// not a summary of the whole exhausted search. Root and descriptor conflicts
/// found before searching are reported the same way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionFailure {
    pub kind: FailureKind,
    pub target: Identifier,
    pub unsatisfied: Vec<UnsatisfiedEdge>,
}

impl ResolutionFailure {
    pub fn new(kind: FailureKind, target: Identifier) -> Self {
        Self {
            kind,
            target,
            unsatisfied: Vec::new(),
        }
    }

    /// Record an edge, ignoring exact duplicates.
    pub fn add(&mut self, requester: Requester, constraint: DependencyConstraint) {
        let edge = UnsatisfiedEdge {
            requester,
            constraint,
        };
        if !self.unsatisfied.contains(&edge) {
            self.unsatisfied.push(edge);
        }
    }

    pub fn len(&self) -> usize {
        self.unsatisfied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unsatisfied.is_empty()
    }

    fn details(&self) -> String {
        self.unsatisfied
            .iter()
            .map(|e| format!("  {e}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Resolution failed: {} on {}", self.kind, self.target)?;
        for e in &self.unsatisfied {
            writeln!(f, "  {e}")?;
        }
        Ok(())
    }
}

impl From<ResolutionFailure> for ModulaError {
    fn from(failure: ResolutionFailure) -> Self {
        let target = failure.target.to_string();
        let details = failure.details();
        match failure.kind {
            FailureKind::ConstraintConflict => ModulaError::ConstraintConflict { target, details },
            FailureKind::MissingModule => ModulaError::MissingModule { target, details },
            FailureKind::VersionConflict => ModulaError::VersionConflict { target, details },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing_foolib() -> ResolutionFailure {
        let mut failure = ResolutionFailure::new(FailureKind::MissingModule, Identifier::of("FooLib"));
        failure.add(
            Requester::Module(Identifier::of("ModC")),
            "FooLib@3.0.0..4.0.0".parse().unwrap(),
        );
        failure
    }

    #[test]
    fn report_lists_edges() {
        let failure = missing_foolib();
        assert_eq!(failure.len(), 1);
        let s = failure.to_string();
        assert!(s.contains("missing module on FooLib"));
        assert!(s.contains("ModC requires FooLib[3.0.0,4.0.0)"));
    }

    #[test]
    fn duplicate_edges_collapse() {
        let mut failure = missing_foolib();
        failure.add(
            Requester::Module(Identifier::of("modc")),
            "FooLib@3.0.0..4.0.0".parse().unwrap(),
        );
        assert_eq!(failure.len(), 1);
    }

    #[test]
    fn root_requester_display() {
        let edge = UnsatisfiedEdge {
            requester: Requester::Root,
            constraint: DependencyConstraint::required("Core"),
        };
        assert_eq!(edge.to_string(), "<root> requires Core[*,*)");
    }

    #[test]
    fn converts_to_matching_error_kind() {
        let err: ModulaError = missing_foolib().into();
        assert!(matches!(err, ModulaError::MissingModule { .. }));
        assert!(err.to_string().contains("ModC requires FooLib[3.0.0,4.0.0)"));
    }
}
