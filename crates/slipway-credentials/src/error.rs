//! Credential broker error types

use thiserror::Error;

/// Credential acquisition errors
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The token's issuer or subject does not satisfy the trust condition.
    /// Fatal and never retried: the trust configuration is wrong, not the
    /// network.
    #[error("identity token rejected by trust boundary: {0}")]
    Authentication(String),

    /// The upstream identity token expired before it could be exchanged
    #[error("identity token expired at {expired_at}")]
    ExpiredToken { expired_at: chrono::DateTime<chrono::Utc> },

    /// The remote exchange boundary refused or failed the assume call
    #[error("credential exchange failed: {0}")]
    Exchange(String),
}

/// Result type for credential operations
pub type Result<T> = std::result::Result<T, CredentialError>;
