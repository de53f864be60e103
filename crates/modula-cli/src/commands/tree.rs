//! Handler for `modula tree`.

use std::path::Path;

use miette::Result;

use modula_core::identifier::Identifier;

use super::resolve::{load_config, resolve_requirements};

pub fn exec(
    requirements: &[String],
    dir: &Path,
    config: Option<&Path>,
    depth: Option<usize>,
    why: Option<&str>,
    inverted: Option<&str>,
) -> Result<()> {
    let config = load_config(dir, config)?;
    let selection = resolve_requirements(requirements, dir, config)?;
    let graph = selection.graph();

    if let Some(target) = why {
        let id = Identifier::parse(target)?;
        match graph.find_path(&id) {
            Some(path) => {
                println!("Path to {id}:");
                for (i, node) in path.iter().enumerate() {
                    let indent = "  ".repeat(i);
                    println!("{indent}{node}");
                }
            }
            None => println!("Module '{id}' is not part of the selection."),
        }
        return Ok(());
    }

    if let Some(target) = inverted {
        let id = Identifier::parse(target)?;
        if graph.find(&id).is_none() {
            println!("Module '{id}' is not part of the selection.");
        } else {
            print!("{}", graph.print_inverted_tree(&id));
        }
        return Ok(());
    }

    print!("{}", graph.print_tree(depth));
    Ok(())
}
