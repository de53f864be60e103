//! Command dispatch and handler modules.

mod list;
mod resolve;
mod tree;

use miette::Result;

use crate::cli::{Cli, Command};

/// Route a parsed CLI invocation to the appropriate command handler.
pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::List { dir } => list::exec(&dir),
        Command::Resolve {
            requirements,
            dir,
            config,
            lowest,
        } => resolve::exec(&requirements, &dir, config.as_deref(), lowest),
        Command::Tree {
            requirements,
            dir,
            config,
            depth,
            why,
            inverted,
        } => tree::exec(
            &requirements,
            &dir,
            config.as_deref(),
            depth,
            why.as_deref(),
            inverted.as_deref(),
        ),
    }
}
