use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all Modula operations.
#[derive(Debug, Error, Diagnostic)]
pub enum ModulaError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed version, range or identifier text.
    #[error("Parse error: {message}")]
    #[diagnostic(help("Versions use the form MAJOR.MINOR.PATCH[-QUALIFIER]"))]
    Parse { message: String },

    /// A module descriptor could not be read or is structurally invalid.
    #[error("Invalid module descriptor: {message}")]
    #[diagnostic(help("Check the module.json for missing fields or bad versions"))]
    Descriptor { message: String },

    /// Resolver configuration could not be loaded.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The exact (id, version) pair is already registered.
    #[error("Module {id} {version} is already registered")]
    DuplicateModule { id: String, version: String },

    /// Constraints on a single target intersect to an empty range.
    #[error("Conflicting constraints on {target}:\n{details}")]
    ConstraintConflict { target: String, details: String },

    /// No registered version satisfies a required dependency.
    #[error("No version of {target} satisfies the required range:\n{details}")]
    MissingModule { target: String, details: String },

    /// Every candidate version was exhausted during backtracking.
    #[error("Version conflict on {target}:\n{details}")]
    #[diagnostic(help("Relax the version ranges above or register a compatible version"))]
    VersionConflict { target: String, details: String },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

/// Convenience alias for `miette::Result<T>`.
pub type ModulaResult<T> = miette::Result<T>;
