//! Modules: a descriptor plus an opaque content handle.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::dependency::DependencyConstraint;
use crate::descriptor::ModuleDescriptor;
use crate::identifier::Identifier;
use crate::version::Version;

/// Handle to the files that make up a module.
///
/// Resolution never looks inside; it is handed back unchanged to whoever
/// loads the selected modules.
pub trait ModuleSource: fmt::Debug + Send + Sync {
    /// Filesystem location of the content, when it has one.
    fn location(&self) -> Option<&Path> {
        None
    }
}

/// A module with no attached content (built in code, or in tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedSource;

impl ModuleSource for DetachedSource {}

/// A module whose content is rooted at a directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ModuleSource for DirectorySource {
    fn location(&self) -> Option<&Path> {
        Some(&self.root)
    }
}

/// One distinct version of a module. Identity is `(id, version)`.
#[derive(Debug, Clone)]
pub struct Module {
    descriptor: ModuleDescriptor,
    source: Arc<dyn ModuleSource>,
}

impl Module {
    pub fn new(descriptor: ModuleDescriptor, source: Arc<dyn ModuleSource>) -> Self {
        Self { descriptor, source }
    }

    pub fn detached(descriptor: ModuleDescriptor) -> Self {
        Self::new(descriptor, Arc::new(DetachedSource))
    }

    pub fn id(&self) -> &Identifier {
        self.descriptor.id()
    }

    pub fn version(&self) -> &Version {
        self.descriptor.version()
    }

    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    pub fn dependencies(&self) -> &[DependencyConstraint] {
        self.descriptor.dependencies()
    }

    pub fn source(&self) -> &Arc<dyn ModuleSource> {
        &self.source
    }
}

impl PartialEq for Module {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id() && self.version() == other.version()
    }
}

impl Eq for Module {}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id(), self.version())
    }
}
