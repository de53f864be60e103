//! CLI argument definitions for Modula.
//!
//! Uses `clap` derive macros to define the command surface. Each command
//! corresponds to a handler in the [`super::commands`] module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "modula",
    version,
    about = "Resolve module dependencies",
    long_about = "Modula discovers versioned modules from module.json descriptors and \
                  selects exactly one compatible version of every required module."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every discovered module and its versions
    List {
        /// Directory to scan for module.json files
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },

    /// Resolve requirements and print the selection in load order
    Resolve {
        /// Requirements: ID, ID@MIN, ID@MIN..MAX or ID@..MAX, `?` suffix for optional
        #[arg(required = true)]
        requirements: Vec<String>,
        /// Directory to scan for module.json files
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
        /// Resolver configuration file (default: nearest modula.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Prefer the lowest satisfying versions
        #[arg(long)]
        lowest: bool,
    },

    /// Show the resolved dependency tree
    Tree {
        /// Requirements, as for `resolve`
        #[arg(required = true)]
        requirements: Vec<String>,
        /// Directory to scan for module.json files
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
        /// Resolver configuration file (default: nearest modula.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Maximum depth
        #[arg(long)]
        depth: Option<usize>,
        /// Explain why a module is included
        #[arg(long, conflicts_with = "inverted")]
        why: Option<String>,
        /// Show the modules that depend on this one
        #[arg(long)]
        inverted: Option<String>,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}
