//! Handler for `modula resolve`.

use std::path::Path;

use miette::Result;

use modula_core::config::{ResolverConfig, SelectionPolicy};
use modula_core::dependency::DependencyConstraint;
use modula_core::discovery::discover;
use modula_core::CONFIG_FILE;
use modula_resolver::{Resolver, Selection};
use modula_util::fs::find_ancestor_with;
use modula_util::status::status;

pub fn exec(requirements: &[String], dir: &Path, config: Option<&Path>, lowest: bool) -> Result<()> {
    let mut config = load_config(dir, config)?;
    if lowest {
        config = config.with_selection(SelectionPolicy::LowestFirst);
    }
    let selection = resolve_requirements(requirements, dir, config)?;

    status("Resolved", &format!("{} module(s)", selection.len()));
    for module in selection.load_order() {
        println!("{} {}", module.id(), module.version());
    }
    Ok(())
}

/// Read the resolver configuration from `explicit`, or else from the nearest
/// `modula.toml` at or above `dir`. No file means defaults.
pub(crate) fn load_config(dir: &Path, explicit: Option<&Path>) -> Result<ResolverConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match find_ancestor_with(dir, CONFIG_FILE) {
            Some(root) => root.join(CONFIG_FILE),
            None => return Ok(ResolverConfig::default()),
        },
    };
    tracing::debug!("Using resolver configuration {}", path.display());
    Ok(ResolverConfig::load(&path)?)
}

/// Discover the modules under `dir` and resolve `requirements` against them.
pub(crate) fn resolve_requirements(
    requirements: &[String],
    dir: &Path,
    config: ResolverConfig,
) -> Result<Selection> {
    let roots = requirements
        .iter()
        .map(|r| r.parse::<DependencyConstraint>())
        .collect::<Result<Vec<_>, _>>()?;
    let registry = discover(dir)?;
    Ok(Resolver::new(config)
        .resolve(&roots, &registry.snapshot())
        .into_result()?)
}
