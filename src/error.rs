//! Error types for the recognition core.
//!
//! Callers can tell permanent input errors apart from upstream failures
//! worth retrying; see [`Error::is_retryable`].

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the index, the similarity engine and the recognition pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Vector length differs from the index dimension. No state was changed.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Persisted index artifacts are unreadable or inconsistent.
    #[error("Corrupt index state at {}: {reason}", path.display())]
    CorruptState { path: PathBuf, reason: String },

    /// The embedding model could not produce a vector.
    #[error("Failed to generate embedding: {0}")]
    EmbeddingFailure(String),

    /// The reverse-geocoding provider failed (network, timeout, bad payload).
    #[error("Reverse geocoding failed: {0}")]
    GeocodingFailure(String),

    /// An ordinal returned by the index has no catalog entry.
    #[error("Ordinal {0} not found in reference catalog")]
    NotFoundInCatalog(usize),

    /// Local filesystem I/O failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be read or is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Build an [`Error::Io`] for `path`.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Build an [`Error::CorruptState`] for `path`.
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::CorruptState {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for upstream collaborator failures that may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::EmbeddingFailure(_) | Error::GeocodingFailure(_))
    }
}

/// Result type for the recognition core.
pub type Result<T> = std::result::Result<T, Error>;
