//! Dependency constraints and their per-target merge.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use modula_util::errors::ModulaError;

use crate::config::OptionalMerge;
use crate::identifier::Identifier;
use crate::version::{Version, VersionRange};

/// One dependency edge: a target module, its optionality and a `[min, max)` range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyConstraint {
    target: Identifier,
    optional: bool,
    range: VersionRange,
}

impl DependencyConstraint {
    pub fn new(target: Identifier, optional: bool, range: VersionRange) -> Self {
        Self {
            target,
            optional,
            range,
        }
    }

    /// A required dependency on any version of `target`.
    pub fn required(target: impl Into<Identifier>) -> Self {
        Self::new(target.into(), false, VersionRange::unbounded())
    }

    /// An optional dependency on any version of `target`.
    pub fn optional(target: impl Into<Identifier>) -> Self {
        Self::new(target.into(), true, VersionRange::unbounded())
    }

    /// Replace the version range, keeping target and optionality.
    pub fn with_range(mut self, range: VersionRange) -> Self {
        self.range = range;
        self
    }

    pub fn target(&self) -> &Identifier {
        &self.target
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn range(&self) -> &VersionRange {
        &self.range
    }

    pub fn min_version(&self) -> Option<&Version> {
        self.range.min()
    }

    pub fn max_version(&self) -> Option<&Version> {
        self.range.max()
    }

    pub fn satisfied_by(&self, version: &Version) -> bool {
        self.range.satisfied_by(version)
    }

    /// Merge further constraints on the same target into this one.
    ///
    /// Ranges intersect; optionality combines per `policy`. An empty
    /// intersection is a [`ConstraintConflict`] listing every contributor.
    pub fn merged_with<'a>(
        &self,
        others: impl IntoIterator<Item = &'a DependencyConstraint>,
        policy: OptionalMerge,
    ) -> Result<DependencyConstraint, ConstraintConflict> {
        let mut merged = self.clone();
        let mut contributors = vec![self.clone()];
        for other in others {
            debug_assert_eq!(other.target, self.target);
            merged.range = merged.range.intersect(&other.range);
            merged.optional = policy.combine(merged.optional, other.optional);
            contributors.push(other.clone());
        }
        if merged.range.is_empty() {
            return Err(ConstraintConflict {
                target: self.target.clone(),
                constraints: contributors,
            });
        }
        Ok(merged)
    }
}

impl fmt::Display for DependencyConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.target, self.range)?;
        if self.optional {
            f.write_str("?")?;
        }
        Ok(())
    }
}

/// Parse a requirement written as `ID`, `ID@MIN`, `ID@MIN..MAX` or `ID@..MAX`,
/// with a trailing `?` marking it optional.
impl FromStr for DependencyConstraint {
    type Err = ModulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (body, optional) = match s.strip_suffix('?') {
            Some(body) => (body, true),
            None => (s, false),
        };
        let (id, range) = match body.split_once('@') {
            Some((id, range)) => (id, Some(range)),
            None => (body, None),
        };
        let target = Identifier::parse(id)?;
        let range = match range {
            None => VersionRange::unbounded(),
            Some(range) => {
                let (min, max) = match range.split_once("..") {
                    Some((min, max)) => (min, max),
                    None => (range, ""),
                };
                if min.is_empty() && max.is_empty() {
                    return Err(ModulaError::Parse {
                        message: format!("requirement '{s}' has an empty version range"),
                    });
                }
                let min = (!min.is_empty()).then(|| Version::parse(min)).transpose()?;
                let max = (!max.is_empty()).then(|| Version::parse(max)).transpose()?;
                VersionRange::new(min, max)?
            }
        };
        Ok(Self::new(target, optional, range))
    }
}

/// Constraints on one target whose ranges share no version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintConflict {
    pub target: Identifier,
    pub constraints: Vec<DependencyConstraint>,
}

impl fmt::Display for ConstraintConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "constraints on {} have no common version:", self.target)?;
        for c in &self.constraints {
            write!(f, " {c}")?;
        }
        Ok(())
    }
}

impl From<ConstraintConflict> for ModulaError {
    fn from(conflict: ConstraintConflict) -> Self {
        let details = conflict
            .constraints
            .iter()
            .map(|c| format!("  {c}"))
            .collect::<Vec<_>>()
            .join("\n");
        ModulaError::ConstraintConflict {
            target: conflict.target.to_string(),
            details,
        }
    }
}

/// Merge a constraint list so each target appears once, in first-seen order.
pub fn merge_by_target(
    constraints: &[DependencyConstraint],
    policy: OptionalMerge,
) -> Result<Vec<DependencyConstraint>, ConstraintConflict> {
    let mut order: Vec<&Identifier> = Vec::new();
    let mut groups: HashMap<&Identifier, Vec<&DependencyConstraint>> = HashMap::new();
    for c in constraints {
        let group = groups.entry(&c.target).or_default();
        if group.is_empty() {
            order.push(&c.target);
        }
        group.push(c);
    }

    let mut merged = Vec::with_capacity(order.len());
    for target in order {
        let Some((first, rest)) = groups[target].split_first() else {
            continue;
        };
        merged.push(first.merged_with(rest.iter().copied(), policy)?);
    }
    Ok(merged)
}
