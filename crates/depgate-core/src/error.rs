//! Error types for package operations.

use thiserror::Error;

use crate::types::PackageIdentity;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the action pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Every source in the final tier failed for a package.
    #[error("Failed to retrieve metadata for '{package}' from {} source(s)", errors.len())]
    SourceLookup {
        package: PackageIdentity,
        errors: Vec<SourceError>,
    },

    /// No source knows the package.
    #[error("Package '{0}' was not found in any package source")]
    Unresolved(PackageIdentity),

    /// Network or transport failure wrapping the underlying cause.
    #[error("Transport failure: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The caller asked to stop.
    #[error("Operation was cancelled")]
    Cancelled,

    /// Invalid configuration or malformed input.
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Error to show the user: transport wrappers are peeled one level so
    /// the underlying cause is reported instead.
    pub fn user_facing(&self) -> &(dyn std::error::Error + 'static) {
        match self {
            Self::Transport(inner) => inner.as_ref(),
            other => other,
        }
    }
}

/// Failure of a single source for a single lookup.
///
/// These are collected rather than raised; see
/// [`crate::metadata::MetadataResolver`].
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("{source_name}: request failed: {message}")]
    Transport {
        source_name: String,
        message: String,
    },

    #[error("{source_name}: lookup timed out after {timeout_ms}ms")]
    Timeout { source_name: String, timeout_ms: u64 },

    #[error("{source_name}: invalid metadata: {message}")]
    InvalidMetadata {
        source_name: String,
        message: String,
    },

    #[error("{source_name}: {error}")]
    Io {
        source_name: String,
        #[source]
        error: std::io::Error,
    },
}
