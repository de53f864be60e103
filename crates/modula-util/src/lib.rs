//! Shared utilities for Modula.
//!
//! This crate provides the cross-cutting concerns used by the other Modula
//! crates: the unified error type and a few filesystem helpers used by module
//! discovery and configuration lookup. [`status`] holds the status lines
//! printed by the `modula` binary.

pub mod errors;
pub mod fs;
pub mod status;
