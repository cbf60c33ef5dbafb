//! Slipway Artifact Publisher
//!
//! Pushes a built, immutable artifact to a content-addressed registry and
//! returns its durable reference. The digest is computed locally before
//! upload; if the registry already holds that digest the publish is a
//! confirmed no-op, which is what makes repeated pipeline runs on
//! unchanged code safe.
//!
//! Registry unavailability is retried with bounded exponential backoff
//! and jitter; authorization failures are fatal because they mean the
//! credential broker issued insufficient scope.

#![deny(unsafe_code)]

pub mod backoff;
pub mod error;
pub mod publisher;
pub mod registry;

// Re-exports
pub use backoff::BackoffPolicy;
pub use error::{RegistryError, Result};
pub use publisher::{ArtifactPublisher, PublisherConfig};
pub use registry::{InMemoryRegistry, Registry};
