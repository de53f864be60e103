use serde::{Deserialize, Serialize};
use std::path::Path;

use modula_util::errors::ModulaError;

/// Resolver settings loaded from `modula.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub resolver: ResolverSection,
}

/// Settings from `[resolver]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverSection {
    #[serde(default)]
    pub selection: SelectionPolicy,
    #[serde(default, rename = "optional-merge")]
    pub optional_merge: OptionalMerge,
    #[serde(default, rename = "descriptor-conflicts")]
    pub descriptor_conflicts: DescriptorConflicts,
}

/// Order in which candidate versions of one module are tried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// Newest satisfying version first.
    #[default]
    HighestFirst,
    /// Oldest satisfying version first.
    LowestFirst,
}

/// How the optionality of several constraints on one target combines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptionalMerge {
    /// Optional only if every contributing constraint is optional.
    #[default]
    AllOptional,
    /// Optional if any contributing constraint is optional.
    AnyOptional,
}

/// What to do with a module whose own dependency constraints contradict each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DescriptorConflicts {
    /// Set the version aside and resolve without it.
    #[default]
    Prune,
    /// Fail before searching if such a module is reachable from the roots.
    Fail,
}

impl OptionalMerge {
    pub fn combine(self, a: bool, b: bool) -> bool {
        match self {
            OptionalMerge::AllOptional => a && b,
            OptionalMerge::AnyOptional => a || b,
        }
    }
}

impl ResolverConfig {
    pub fn selection(&self) -> SelectionPolicy {
        self.resolver.selection
    }

    pub fn optional_merge(&self) -> OptionalMerge {
        self.resolver.optional_merge
    }

    pub fn descriptor_conflicts(&self) -> DescriptorConflicts {
        self.resolver.descriptor_conflicts
    }

    pub fn with_selection(mut self, selection: SelectionPolicy) -> Self {
        self.resolver.selection = selection;
        self
    }

    pub fn with_optional_merge(mut self, optional_merge: OptionalMerge) -> Self {
        self.resolver.optional_merge = optional_merge;
        self
    }

    pub fn with_descriptor_conflicts(mut self, descriptor_conflicts: DescriptorConflicts) -> Self {
        self.resolver.descriptor_conflicts = descriptor_conflicts;
        self
    }

    /// Parse configuration from TOML text.
    pub fn parse_toml(content: &str) -> Result<Self, ModulaError> {
        toml::from_str(content).map_err(|e| ModulaError::Config {
            message: format!("Failed to parse resolver config: {e}"),
        })
    }

    /// Load configuration from `path`, or return defaults if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, ModulaError> {
        if !path.is_file() {
            tracing::debug!("No resolver config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ModulaError::Config {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        Self::parse_toml(&content)
    }
}
