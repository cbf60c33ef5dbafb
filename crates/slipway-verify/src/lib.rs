//! Slipway Rollout Verifier
//!
//! After reconciliation the deployed service sits behind a load-balanced
//! front door whose instances register gradually. The verifier polls a
//! health endpoint at a fixed interval, treating connection refusals,
//! non-2xx statuses, and per-probe timeouts as transient. A single
//! successful probe inside the window is success; a window with zero
//! successes is a timeout.

#![deny(unsafe_code)]

pub mod error;
pub mod transport;
pub mod verifier;

// Re-exports
pub use error::ProbeError;
pub use transport::{HttpProbeTransport, ProbeTransport};
pub use verifier::{HealthOutcome, RolloutVerifier, VerifierConfig};
