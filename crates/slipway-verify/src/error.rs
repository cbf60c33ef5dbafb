//! Probe transport errors
//!
//! Every variant is transient from the verifier's point of view; the
//! distinction only matters for diagnostics.

use thiserror::Error;

/// A single probe attempt failing at the transport layer
#[derive(Debug, Error)]
pub enum ProbeError {
    /// TCP connect refused or reset; instances not registered yet
    #[error("connection failed: {0}")]
    Connect(String),

    /// The probe did not complete within its per-request timeout
    #[error("probe timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Any other transport-level failure
    #[error("probe transport error: {0}")]
    Transport(String),
}
