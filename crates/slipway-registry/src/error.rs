//! Registry error types

use slipway_types::Digest;
use thiserror::Error;

/// Artifact publishing errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Transient: the registry could not be reached or returned a
    /// server-side failure. Retried with bounded backoff.
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    /// Fatal: the credential in use lacks push/pull scope. Never retried.
    #[error("registry rejected credentials: {0}")]
    Auth(String),

    /// The registry acknowledged a different digest than was computed
    /// locally, which means the upload was corrupted or rewritten
    #[error("digest mismatch: pushed {pushed}, registry reported {reported}")]
    DigestMismatch { pushed: Digest, reported: Digest },
}

impl RegistryError {
    /// Whether a retry can possibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, RegistryError::Unavailable(_))
    }
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
