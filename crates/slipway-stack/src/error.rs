//! Reconciler error types

use slipway_types::StackName;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by control plane boundary implementations
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    /// The plane could not be reached or failed server-side
    #[error("control plane unavailable: {0}")]
    Unavailable(String),

    /// The plane accepted the request syntactically but refused to act on
    /// it; carries the remote reason verbatim
    #[error("control plane rejected request: {0}")]
    Rejected(String),
}

/// Reconciliation errors
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Another reconciliation already holds the lock for this stack name.
    /// Retry later, not immediately.
    #[error("reconciliation already in flight for stack {0}")]
    ConcurrentModification(StackName),

    /// The plane drove the stack to FAILED or ROLLED_BACK; `reason` is
    /// the remote-reported cause, unmodified
    #[error("stack {name} failed: {reason}")]
    StackFailed { name: StackName, reason: String },

    /// The known service-linked-role failure signature: a one-time
    /// account-level prerequisite is absent. Self-service remediable.
    #[error("stack {name} is missing an account prerequisite: {reason}\n{remediation}")]
    PrerequisiteMissing {
        name: StackName,
        reason: String,
        remediation: String,
    },

    /// No terminal state observed within the wait budget; the remote
    /// operation continues independently
    #[error("stack {name} did not reach a terminal state within {waited:?}")]
    Timeout { name: StackName, waited: Duration },

    /// Polling was cancelled by the caller
    #[error("reconciliation of stack {0} cancelled")]
    Cancelled(StackName),

    /// Boundary-level failure talking to the plane
    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),
}

/// Result type for reconcile operations
pub type Result<T> = std::result::Result<T, ReconcileError>;
