//! Handler for `modula list`.

use std::path::Path;

use miette::Result;

use modula_core::discovery::discover;
use modula_util::status::status_warn;

pub fn exec(dir: &Path) -> Result<()> {
    let registry = discover(dir)?;
    if registry.is_empty() {
        status_warn("Empty", &format!("no modules found under {}", dir.display()));
        return Ok(());
    }

    for id in registry.ids() {
        let versions: Vec<String> = registry
            .versions_of(id)
            .iter()
            .map(ToString::to_string)
            .collect();
        println!("{id} {}", versions.join(", "));
    }
    Ok(())
}
