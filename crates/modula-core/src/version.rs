//! Module version parsing, comparison, and half-open range matching.
//!
//! Versions have the form `MAJOR.MINOR.PATCH[-QUALIFIER]`:
//! - Numeric parts compare as numbers, most significant first
//! - At equal numeric parts a release (no qualifier) sorts after any
//!   qualified pre-release or snapshot
//! - Two qualifiers at equal numeric parts compare lexicographically

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use modula_util::errors::ModulaError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A parsed module version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    major: u64,
    minor: u64,
    patch: u64,
    qualifier: Option<String>,
}

impl Version {
    /// A release version with no qualifier.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            qualifier: None,
        }
    }

    /// A qualified (pre-release) version.
    pub fn with_qualifier(major: u64, minor: u64, patch: u64, qualifier: impl Into<String>) -> Self {
        Self {
            major,
            minor,
            patch,
            qualifier: Some(qualifier.into()),
        }
    }

    /// Parse `MAJOR.MINOR.PATCH[-QUALIFIER]`. Malformed text is rejected,
    /// never coerced.
    pub fn parse(text: &str) -> Result<Self, ModulaError> {
        let invalid = |reason: &str| ModulaError::Parse {
            message: format!("invalid version '{text}': {reason}"),
        };

        let (numeric, qualifier) = match text.split_once('-') {
            Some((numeric, qualifier)) => (numeric, Some(qualifier)),
            None => (text, None),
        };

        let parts: Vec<&str> = numeric.split('.').collect();
        if parts.len() != 3 {
            return Err(invalid("expected MAJOR.MINOR.PATCH"));
        }
        let mut numbers = [0u64; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid("version parts must be unsigned integers"));
            }
            *slot = part.parse().map_err(|_| invalid("version part out of range"))?;
        }

        let qualifier = match qualifier {
            Some("") => return Err(invalid("empty qualifier")),
            Some(q) if q.chars().any(char::is_whitespace) => {
                return Err(invalid("qualifier must not contain whitespace"));
            }
            Some(q) => Some(q.to_string()),
            None => None,
        };

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
            qualifier,
        })
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    /// Whether this is a pre-release or snapshot build.
    pub fn is_snapshot(&self) -> bool {
        self.qualifier.is_some()
    }

    /// The same numeric version without a qualifier.
    pub fn release(&self) -> Self {
        Self::new(self.major, self.minor, self.patch)
    }

    pub fn next_major(&self) -> Self {
        Self::new(self.major.saturating_add(1), 0, 0)
    }

    pub fn next_minor(&self) -> Self {
        Self::new(self.major, self.minor.saturating_add(1), 0)
    }

    pub fn next_patch(&self) -> Self {
        Self::new(self.major, self.minor, self.patch.saturating_add(1))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(ref q) = self.qualifier {
            write!(f, "-{q}")?;
        }
        Ok(())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.qualifier, &other.qualifier) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = ModulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Version::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// `true` iff `min <= version < max`, treating an absent bound as unbounded.
pub fn satisfied_by(min: Option<&Version>, max: Option<&Version>, version: &Version) -> bool {
    min.is_none_or(|min| version >= min) && max.is_none_or(|max| version < max)
}

/// A half-open version range `[min, max)`.
///
/// An absent `min` is unbounded below, an absent `max` unbounded above.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VersionRange {
    min: Option<Version>,
    max: Option<Version>,
}

impl VersionRange {
    /// Build a range, rejecting `min > max` when both bounds are finite.
    pub fn new(min: Option<Version>, max: Option<Version>) -> Result<Self, ModulaError> {
        if let (Some(lo), Some(hi)) = (&min, &max) {
            if lo > hi {
                return Err(ModulaError::Parse {
                    message: format!("range lower bound {lo} exceeds upper bound {hi}"),
                });
            }
        }
        Ok(Self { min, max })
    }

    /// Every version.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// `[min, *)`
    pub fn at_least(min: Version) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    /// `[*, max)`
    pub fn below(max: Version) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    /// `[version, next major)`: the conventional compatible-release range.
    pub fn compatible_with(version: &Version) -> Self {
        Self {
            min: Some(version.clone()),
            max: Some(version.next_major()),
        }
    }

    pub fn min(&self) -> Option<&Version> {
        self.min.as_ref()
    }

    pub fn max(&self) -> Option<&Version> {
        self.max.as_ref()
    }

    /// Check if a version lies within this range.
    pub fn satisfied_by(&self, version: &Version) -> bool {
        satisfied_by(self.min.as_ref(), self.max.as_ref(), version)
    }

    /// The widest lower bound and narrowest upper bound of both ranges.
    ///
    /// The result may be empty; check with [`VersionRange::is_empty`].
    pub fn intersect(&self, other: &VersionRange) -> VersionRange {
        let min = match (&self.min, &other.min) {
            (Some(a), Some(b)) => Some(a.max(b).clone()),
            (a, b) => a.clone().or_else(|| b.clone()),
        };
        let max = match (&self.max, &other.max) {
            (Some(a), Some(b)) => Some(a.min(b).clone()),
            (a, b) => a.clone().or_else(|| b.clone()),
        };
        VersionRange { min, max }
    }

    /// No version can satisfy this range.
    pub fn is_empty(&self) -> bool {
        matches!((&self.min, &self.max), (Some(lo), Some(hi)) if lo >= hi)
    }

    /// Whether every version in `other` is also in `self`.
    pub fn contains_range(&self, other: &VersionRange) -> bool {
        let lower_ok = match (&self.min, &other.min) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(a), Some(b)) => a <= b,
        };
        let upper_ok = match (&self.max, &other.max) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(a), Some(b)) => b <= a,
        };
        lower_ok && upper_ok
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        match self.min {
            Some(ref v) => write!(f, "{v}")?,
            None => f.write_str("*")?,
        }
        f.write_str(",")?;
        match self.max {
            Some(ref v) => write!(f, "{v}")?,
            None => f.write_str("*")?,
        }
        f.write_str(")")
    }
}
