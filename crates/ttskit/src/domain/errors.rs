//! Domain-specific errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while resolving and inlining XML includes.
#[derive(Debug, Error)]
pub enum BundleError {
    /// An include references a file absent from every search root.
    #[error("cannot resolve file '{0}'")]
    UnresolvedInclude(String),

    /// An include is already being resolved on the current branch.
    #[error("include cycle detected: '{}' is already being resolved", path.display())]
    Cycle { path: PathBuf },

    /// An include target could not be read.
    #[error("failed to read include '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while recovering include structure from bundled markers.
#[derive(Debug, Error)]
pub enum UnbundleError {
    /// Two bundled regions share a name but carry different content.
    #[error("conflicting content for include '{name}'")]
    ConflictingInclude { name: String },
}

/// Errors raised while reading an extracted tree back into a save.
#[derive(Debug, Error)]
pub enum AssembleError {
    /// A manifest references a directory that holds no object data.
    #[error(
        "manifest '{}' references missing object data at '{}'",
        manifest.display(),
        target.display()
    )]
    ManifestMismatch { manifest: PathBuf, target: PathBuf },
}
