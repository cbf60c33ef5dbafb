//! Slipway Stack Reconciler
//!
//! Convergence state machine over a remote, asynchronous, partially
//! observable control plane. Given a declarative stack description the
//! reconciler decides between create, update, and no-op, then polls the
//! plane until a terminal state is observed or the wait budget runs out.
//!
//! ## Architectural boundaries
//!
//! - The control plane owns all resource state. This crate only requests
//!   transitions through [`ControlPlane`] and observes the result; it
//!   never mirrors state beyond the current run.
//! - At most one reconciliation is in flight per stack name. A second
//!   concurrent request fails fast with `ConcurrentModification` instead
//!   of racing the plane.
//! - Failure reasons reported by the plane are surfaced verbatim. The
//!   one known self-service failure mode, a missing service-linked role
//!   prerequisite, is classified into its own error by
//!   [`classify::classify_failure`].

#![deny(unsafe_code)]

pub mod cancel;
pub mod classify;
pub mod control_plane;
pub mod error;
pub mod lock;
pub mod reconciler;

// Re-exports
pub use cancel::CancelToken;
pub use classify::{classify_failure, FailureClass};
pub use control_plane::{ControlPlane, InMemoryControlPlane, MutatingCall};
pub use error::{ControlPlaneError, ReconcileError, Result};
pub use lock::{StackLockGuard, StackLocks};
pub use reconciler::{ReconcileAction, ReconcileSummary, ReconcilerConfig, StackReconciler};
