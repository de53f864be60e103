//! The module registry and the immutable snapshots the resolver reads.
//!
//! Storage is copy-on-write: taking a snapshot shares the current index, and
//! the next `add` clones it before mutating, so a snapshot can never observe a
//! half-applied registration.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use modula_util::errors::ModulaError;

use crate::identifier::Identifier;
use crate::module::Module;
use crate::version::Version;

#[derive(Debug, Clone, Default)]
struct ModuleIndex {
    modules: BTreeMap<Identifier, BTreeMap<Version, Arc<Module>>>,
}

impl ModuleIndex {
    fn versions_of(&self, id: &Identifier) -> Vec<Version> {
        self.modules
            .get(id)
            .map(|versions| versions.keys().rev().cloned().collect())
            .unwrap_or_default()
    }

    fn modules_of(&self, id: &Identifier) -> Vec<Arc<Module>> {
        self.modules
            .get(id)
            .map(|versions| versions.values().rev().cloned().collect())
            .unwrap_or_default()
    }

    fn get(&self, id: &Identifier, version: &Version) -> Option<&Arc<Module>> {
        self.modules.get(id)?.get(version)
    }

    fn latest(&self, id: &Identifier) -> Option<&Arc<Module>> {
        self.modules.get(id)?.values().next_back()
    }

    fn ids(&self) -> impl Iterator<Item = &Identifier> {
        self.modules.keys()
    }

    fn iter(&self) -> impl Iterator<Item = &Arc<Module>> {
        self.modules.values().flat_map(|versions| versions.values())
    }

    fn len(&self) -> usize {
        self.modules.values().map(BTreeMap::len).sum()
    }
}

/// All known modules, keyed by id and then by version.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    index: Arc<ModuleIndex>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module. Fails if the exact `(id, version)` is already present.
    pub fn add(&mut self, module: Module) -> Result<(), ModulaError> {
        if self.index.get(module.id(), module.version()).is_some() {
            return Err(ModulaError::DuplicateModule {
                id: module.id().to_string(),
                version: module.version().to_string(),
            });
        }
        tracing::debug!("Registered module {module}");
        Arc::make_mut(&mut self.index)
            .modules
            .entry(module.id().clone())
            .or_default()
            .insert(module.version().clone(), Arc::new(module));
        Ok(())
    }

    /// Known versions of `id`, newest first. Empty if `id` is unknown.
    pub fn versions_of(&self, id: &Identifier) -> Vec<Version> {
        self.index.versions_of(id)
    }

    pub fn get(&self, id: &Identifier, version: &Version) -> Option<&Arc<Module>> {
        self.index.get(id, version)
    }

    pub fn latest(&self, id: &Identifier) -> Option<&Arc<Module>> {
        self.index.latest(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &Identifier> {
        self.index.ids()
    }

    /// Every module, ordered by id then ascending version.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Module>> {
        self.index.iter()
    }

    /// Number of registered `(id, version)` pairs.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.modules.is_empty()
    }

    /// Freeze the current contents for one resolution.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            index: Arc::clone(&self.index),
        }
    }
}

/// Registry contents fixed at the moment [`ModuleRegistry::snapshot`] was called.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    index: Arc<ModuleIndex>,
}

impl RegistrySnapshot {
    /// Known versions of `id`, newest first. Empty if `id` is unknown.
    pub fn versions_of(&self, id: &Identifier) -> Vec<Version> {
        self.index.versions_of(id)
    }

    /// Modules registered under `id`, newest first.
    pub fn modules_of(&self, id: &Identifier) -> Vec<Arc<Module>> {
        self.index.modules_of(id)
    }

    pub fn get(&self, id: &Identifier, version: &Version) -> Option<&Arc<Module>> {
        self.index.get(id, version)
    }

    pub fn ids(&self) -> impl Iterator<Item = &Identifier> {
        self.index.ids()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Module>> {
        self.index.iter()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.modules.is_empty()
    }
}

impl From<&ModuleRegistry> for RegistrySnapshot {
    fn from(registry: &ModuleRegistry) -> Self {
        registry.snapshot()
    }
}

/// A registry shared between a discovery process and concurrent resolvers.
///
/// `add` holds the write lock; `snapshot` holds the read lock only long
/// enough to share the index.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<RwLock<ModuleRegistry>>,
}

impl SharedRegistry {
    pub fn new(registry: ModuleRegistry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(registry)),
        }
    }

    pub fn add(&self, module: Module) -> Result<(), ModulaError> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(module)
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
