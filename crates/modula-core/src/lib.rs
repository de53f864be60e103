//! Core data types for Modula.
//!
//! This crate defines everything the resolver reads: case-insensitive module
//! identifiers, ordered versions and half-open version ranges, dependency
//! constraints, module descriptors and modules, the module registry with its
//! immutable snapshots, resolver configuration, and descriptor discovery.
//!
//! This crate has no async code and performs no network I/O.

/// File name of a module descriptor inside a module directory.
pub const DESCRIPTOR_FILE: &str = "module.json";

/// File name of the resolver configuration.
pub const CONFIG_FILE: &str = "modula.toml";

pub mod config;
pub mod dependency;
pub mod descriptor;
pub mod discovery;
pub mod identifier;
pub mod module;
pub mod registry;
pub mod version;
