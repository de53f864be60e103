//! Populate a registry from module directories on disk.
//!
//! Every directory below the root that contains a `module.json` is one module
//! version; the directory becomes the module's content source.

use std::path::Path;
use std::sync::Arc;

use modula_util::errors::ModulaError;
use modula_util::fs::find_files_named;

use crate::descriptor::ModuleDescriptor;
use crate::module::{DirectorySource, Module};
use crate::registry::ModuleRegistry;
use crate::DESCRIPTOR_FILE;

/// Scan `root` recursively and register every module found, in path order.
pub fn discover(root: &Path) -> Result<ModuleRegistry, ModulaError> {
    let mut registry = ModuleRegistry::new();
    discover_into(root, &mut registry)?;
    Ok(registry)
}

/// Scan `root` and add every module found to an existing registry.
///
/// Returns the number of modules added.
pub fn discover_into(root: &Path, registry: &mut ModuleRegistry) -> Result<usize, ModulaError> {
    let descriptors = find_files_named(root, DESCRIPTOR_FILE)?;
    for path in &descriptors {
        let descriptor = ModuleDescriptor::from_path(path)?;
        let dir = path.parent().unwrap_or(root);
        registry.add(Module::new(descriptor, Arc::new(DirectorySource::new(dir))))?;
    }
    tracing::info!(
        "Discovered {} module(s) under {}",
        descriptors.len(),
        root.display()
    );
    Ok(descriptors.len())
}
