//! Orchestrator error types
//!
//! Stage errors pass through unchanged so their reason text survives
//! into diagnostics verbatim.

use thiserror::Error;

/// Errors surfaced by a deployment run
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Credential(#[from] slipway_credentials::CredentialError),

    #[error(transparent)]
    Registry(#[from] slipway_registry::RegistryError),

    #[error(transparent)]
    Reconcile(#[from] slipway_stack::ReconcileError),

    /// The reconciled stack did not export the output the health check
    /// needs
    #[error("stack output {key:?} not found; available outputs: {available:?}")]
    MissingStackOutput { key: String, available: Vec<String> },

    /// Config or template could not be read
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;
