use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for loading Pinion inputs from disk.
#[derive(Debug, Error, Diagnostic)]
pub enum PinionError {
    /// I/O operation on `path` failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid or malformed configuration (e.g. pinion.toml).
    #[error("Config error: {message}")]
    #[diagnostic(help("Check the [resolver] table in pinion.toml"))]
    Config { message: String },

    /// A registry file could not be read or parsed.
    #[error("Registry error: {message}")]
    #[diagnostic(help("Registries map library -> version -> {{ dependency: range }}"))]
    Registry { message: String },
}

/// Convenience alias for `miette::Result<T>`.
pub type PinionResult<T> = miette::Result<T>;
