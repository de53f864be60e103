//! Module descriptors and the `module.json` input format.

use std::path::Path;

use modula_util::errors::ModulaError;
use serde::{Deserialize, Serialize};

use crate::config::OptionalMerge;
use crate::dependency::{merge_by_target, ConstraintConflict, DependencyConstraint};
use crate::identifier::Identifier;
use crate::version::{Version, VersionRange};

/// Raw descriptor as written by module authors.
///
/// ```json
/// { "id": "ModA", "version": "1.0.0",
///   "dependencies": [{ "id": "FooLib", "minVersion": "1.0.0", "maxVersion": "2.0.0" }] }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorDocument {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub dependencies: Vec<DependencyEntry>,
}

/// One entry of a descriptor's `dependencies` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyEntry {
    pub id: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub min_version: Option<String>,
    /// Exclusive.
    #[serde(default)]
    pub max_version: Option<String>,
}

/// A module's identity and its declared dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    id: Identifier,
    version: Version,
    dependencies: Vec<DependencyConstraint>,
}

impl ModuleDescriptor {
    pub fn new(id: Identifier, version: Version, dependencies: Vec<DependencyConstraint>) -> Self {
        Self {
            id,
            version,
            dependencies,
        }
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Dependencies in declaration order; a target may appear more than once.
    pub fn dependencies(&self) -> &[DependencyConstraint] {
        &self.dependencies
    }

    /// Dependencies merged so that every target appears once.
    pub fn merged_dependencies(
        &self,
        policy: OptionalMerge,
    ) -> Result<Vec<DependencyConstraint>, ConstraintConflict> {
        merge_by_target(&self.dependencies, policy)
    }

    /// Parse a descriptor from `module.json` text.
    pub fn from_json(content: &str) -> Result<Self, ModulaError> {
        let document: DescriptorDocument =
            serde_json::from_str(content).map_err(|e| ModulaError::Descriptor {
                message: e.to_string(),
            })?;
        Self::try_from(document)
    }

    /// Load and parse a descriptor file.
    pub fn from_path(path: &Path) -> Result<Self, ModulaError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content).map_err(|e| match e {
            ModulaError::Descriptor { message } => ModulaError::Descriptor {
                message: format!("{}: {message}", path.display()),
            },
            other => other,
        })
    }
}

impl TryFrom<DescriptorDocument> for ModuleDescriptor {
    type Error = ModulaError;

    fn try_from(document: DescriptorDocument) -> Result<Self, Self::Error> {
        let id = Identifier::parse(&document.id).map_err(|e| field_error("id", e))?;
        let version = Version::parse(&document.version).map_err(|e| field_error("version", e))?;

        let mut dependencies = Vec::with_capacity(document.dependencies.len());
        for (i, entry) in document.dependencies.into_iter().enumerate() {
            let field = |name: &str| format!("dependencies[{i}].{name}");
            let target = Identifier::parse(&entry.id).map_err(|e| field_error(&field("id"), e))?;
            let min = entry
                .min_version
                .as_deref()
                .map(Version::parse)
                .transpose()
                .map_err(|e| field_error(&field("minVersion"), e))?;
            let max = entry
                .max_version
                .as_deref()
                .map(Version::parse)
                .transpose()
                .map_err(|e| field_error(&field("maxVersion"), e))?;
            let range = VersionRange::new(min, max).map_err(|e| field_error(&field("minVersion"), e))?;
            dependencies.push(DependencyConstraint::new(target, entry.optional, range));
        }

        Ok(Self::new(id, version, dependencies))
    }
}

fn field_error(field: &str, err: ModulaError) -> ModulaError {
    ModulaError::Descriptor {
        message: format!("field `{field}`: {err}"),
    }
}
