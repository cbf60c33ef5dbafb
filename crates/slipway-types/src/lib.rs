//! Slipway shared types
//!
//! Data model for the deployment pipeline: strongly-typed identifiers,
//! short-lived credentials, content-addressed artifact references, the
//! declarative stack model, and the run result that every deployment
//! produces.
//!
//! ## Ownership boundaries
//!
//! - `Credential` is owned by the credential broker, held in memory only,
//!   and never serialized.
//! - `StackState` is owned by the remote control plane; this crate only
//!   models what `describe` reports.
//! - `DeploymentResult` is the sole externally observable artifact of a
//!   run and is immutable once the run finishes.

#![deny(unsafe_code)]

pub mod artifact;
pub mod credential;
pub mod ids;
pub mod result;
pub mod stack;

// Re-exports
pub use artifact::{ArtifactReference, Digest, DigestParseError};
pub use credential::Credential;
pub use ids::{RoleIdentifier, RunId, StackName};
pub use result::{DeploymentOutcome, DeploymentResult, DiagnosticEvent, Stage};
pub use stack::{StackDescription, StackObservation, StackState};
