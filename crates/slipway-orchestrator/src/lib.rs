//! Slipway Orchestrator
//!
//! Sequences one deployment run: credential acquisition, artifact
//! publish, stack reconciliation, rollout verification. Stages run
//! strictly sequentially; each stage's output is the next stage's input
//! and any fatal error skips the remaining stages. There is no
//! compensating rollback: the control plane performs its own automatic
//! rollback on partial failure and partially applied stacks are left
//! for operator inspection.
//!
//! The run's only externally observable artifact is the
//! [`slipway_types::DeploymentResult`], with an ordered diagnostics
//! trail carrying remote failure reasons verbatim.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod run;

// Re-exports
pub use config::{HealthConfig, RunConfig, StackConfig, TrustConfig};
pub use error::{OrchestratorError, Result};
pub use run::DeploymentRun;
