//! Dependency resolution engine: a depth-first backtracking search that picks
//! exactly one version of every required module, honoring version ranges,
//! optional dependencies and cycles, and reports structured failures.

pub mod candidates;
pub mod failure;
pub mod graph;
mod memo;
pub mod resolver;
mod state;

pub use failure::{FailureKind, Requester, ResolutionFailure, UnsatisfiedEdge};
pub use resolver::{resolve, Resolution, Resolver, Selection};
