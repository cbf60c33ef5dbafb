//! The convergence state machine
//!
//! `ABSENT → (create) → CREATE_IN_PROGRESS → {STABLE | FAILED}`
//! `STABLE → (update) → UPDATE_IN_PROGRESS → {STABLE | FAILED | ROLLED_BACK}`
//!
//! A stable stack whose applied description structurally equals the
//! requested one short-circuits to success without a mutating call.

use crate::cancel::CancelToken;
use crate::classify::{classify_failure, prerequisite_remediation, FailureClass};
use crate::control_plane::ControlPlane;
use crate::error::{ControlPlaneError, ReconcileError, Result};
use crate::lock::{StackLockGuard, StackLocks};
use slipway_types::{Credential, StackDescription, StackName, StackObservation, StackState};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Polling budget for one reconciliation
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Interval between describe calls while waiting for a terminal state
    pub poll_interval: Duration,
    /// Total wait budget before giving up with `Timeout`
    pub max_wait: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(20 * 60),
        }
    }
}

/// What the reconciler did to converge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Created,
    Updated,
    /// Requested description already applied; no mutating call issued
    NoChange,
}

/// Successful reconciliation: the action taken and the final observation
#[derive(Debug, Clone)]
pub struct ReconcileSummary {
    pub action: ReconcileAction,
    pub observation: StackObservation,
}

/// Drives one stack toward its described state
pub struct StackReconciler {
    plane: Arc<dyn ControlPlane>,
    locks: StackLocks,
    config: ReconcilerConfig,
}

impl StackReconciler {
    pub fn new(plane: Arc<dyn ControlPlane>) -> Self {
        Self {
            plane,
            locks: StackLocks::new(),
            config: ReconcilerConfig::default(),
        }
    }

    /// Share a lock registry between reconcilers so runs for the same
    /// stack name serialize process-wide
    pub fn with_locks(mut self, locks: StackLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Converge the stack named in `description` to that description
    #[instrument(skip(self, credential, description, cancel), fields(stack = %description.name))]
    pub async fn reconcile(
        &self,
        credential: &Credential,
        description: &StackDescription,
        cancel: &CancelToken,
    ) -> Result<ReconcileSummary> {
        let name = &description.name;
        let guard = self
            .locks
            .try_acquire(name)
            .ok_or_else(|| ReconcileError::ConcurrentModification(name.clone()))?;
        self.reconcile_locked(credential, description, cancel, &guard)
            .await
    }

    /// Converge under a lock the caller already holds. Used when the
    /// caller's lock must span more than the reconciliation itself, e.g.
    /// a whole deployment run.
    pub async fn reconcile_locked(
        &self,
        credential: &Credential,
        description: &StackDescription,
        cancel: &CancelToken,
        guard: &StackLockGuard,
    ) -> Result<ReconcileSummary> {
        let name = &description.name;
        debug_assert_eq!(guard.stack(), name);

        let mut observation = self.plane.describe(credential, name).await?;
        if observation.state.is_in_progress() {
            // A previous request is still converging remotely; observe it
            // out before deciding anything.
            warn!(state = ?observation.state, "Stack already in progress, waiting");
            observation = self.wait_terminal(credential, name, cancel).await?;
        }

        match observation.state {
            StackState::Absent => {
                info!("Stack absent, requesting create");
                self.request(name, self.plane.create(credential, description))
                    .await?;
                let observation = self.await_converged(credential, name, cancel).await?;
                Ok(ReconcileSummary {
                    action: ReconcileAction::Created,
                    observation,
                })
            }
            StackState::Stable => {
                if let Some(applied) = self.plane.applied(credential, name).await? {
                    if !description.differs_from(&applied) {
                        info!("Requested description already applied, nothing to do");
                        return Ok(ReconcileSummary {
                            action: ReconcileAction::NoChange,
                            observation,
                        });
                    }
                }
                info!("Stack differs from requested description, requesting update");
                match self.plane.update(credential, description).await {
                    Err(ControlPlaneError::Rejected(reason)) if is_no_update_signal(&reason) => {
                        // The plane computed an empty change set; equivalent
                        // to the local no-diff short circuit.
                        debug!(reason = %reason, "Update rejected as empty change set");
                        return Ok(ReconcileSummary {
                            action: ReconcileAction::NoChange,
                            observation,
                        });
                    }
                    Err(err) => return Err(self.classify_request_error(name, err)),
                    Ok(()) => {}
                }
                let observation = self.await_converged(credential, name, cancel).await?;
                Ok(ReconcileSummary {
                    action: ReconcileAction::Updated,
                    observation,
                })
            }
            StackState::Failed | StackState::RolledBack => {
                // A previous run left the stack unconverged; request an
                // update with the full description and let the plane decide.
                warn!(state = ?observation.state, "Stack in failed state, requesting update");
                self.request(name, self.plane.update(credential, description))
                    .await?;
                let observation = self.await_converged(credential, name, cancel).await?;
                Ok(ReconcileSummary {
                    action: ReconcileAction::Updated,
                    observation,
                })
            }
            StackState::CreateInProgress | StackState::UpdateInProgress => {
                unreachable!("in-progress states are waited out above")
            }
        }
    }

    /// Issue a mutating request, classifying rejections
    async fn request(
        &self,
        name: &StackName,
        fut: impl std::future::Future<Output = std::result::Result<(), ControlPlaneError>>,
    ) -> Result<()> {
        fut.await
            .map_err(|err| self.classify_request_error(name, err))
    }

    fn classify_request_error(&self, name: &StackName, err: ControlPlaneError) -> ReconcileError {
        match err {
            ControlPlaneError::Rejected(reason) => match classify_failure(&reason) {
                FailureClass::PrerequisiteMissing => ReconcileError::PrerequisiteMissing {
                    name: name.clone(),
                    reason,
                    remediation: prerequisite_remediation(),
                },
                FailureClass::Generic => ReconcileError::StackFailed {
                    name: name.clone(),
                    reason,
                },
            },
            other => ReconcileError::ControlPlane(other),
        }
    }

    /// Wait for a terminal state, then map failure states to errors
    async fn await_converged(
        &self,
        credential: &Credential,
        name: &StackName,
        cancel: &CancelToken,
    ) -> Result<StackObservation> {
        let observation = self.wait_terminal(credential, name, cancel).await?;
        match observation.state {
            StackState::Stable => Ok(observation),
            StackState::Failed | StackState::RolledBack => {
                let reason = observation
                    .failure_reason
                    .unwrap_or_else(|| "<control plane reported no failure reason>".to_string());
                match classify_failure(&reason) {
                    FailureClass::PrerequisiteMissing => Err(ReconcileError::PrerequisiteMissing {
                        name: name.clone(),
                        reason,
                        remediation: prerequisite_remediation(),
                    }),
                    FailureClass::Generic => Err(ReconcileError::StackFailed {
                        name: name.clone(),
                        reason,
                    }),
                }
            }
            other => Err(ReconcileError::StackFailed {
                name: name.clone(),
                reason: format!("unexpected non-terminal state {:?} after wait", other),
            }),
        }
    }

    /// Poll `describe` until a terminal state, the wait budget, or
    /// cancellation. The remote operation continues independently on
    /// timeout and cancellation.
    async fn wait_terminal(
        &self,
        credential: &Credential,
        name: &StackName,
        cancel: &CancelToken,
    ) -> Result<StackObservation> {
        let started = Instant::now();
        loop {
            let observation = self.plane.describe(credential, name).await?;
            if observation.state.is_terminal() {
                return Ok(observation);
            }
            debug!(state = ?observation.state, "Stack not yet terminal");

            let waited = started.elapsed();
            if waited >= self.config.max_wait {
                return Err(ReconcileError::Timeout {
                    name: name.clone(),
                    waited,
                });
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(ReconcileError::Cancelled(name.clone()));
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }
}

/// Whether an update rejection means "empty change set" rather than a
/// real failure
fn is_no_update_signal(reason: &str) -> bool {
    reason.to_lowercase().contains("no updates are to be performed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_plane::{InMemoryControlPlane, MutatingCall};
    use serde_json::json;

    fn credential() -> Credential {
        Credential {
            access_key_id: "AKIDTEST".into(),
            secret_access_key: "test-secret".into(),
            session_token: "test-session".into(),
            expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
        }
    }

    fn description(name: &str) -> StackDescription {
        StackDescription::new(
            StackName::new(name),
            json!({"resources": {"service": {"image": "acme/shop"}}}),
        )
        .with_parameter("DesiredCount", "2")
    }

    fn fast_config() -> ReconcilerConfig {
        ReconcilerConfig {
            poll_interval: Duration::from_millis(50),
            max_wait: Duration::from_secs(60),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_stack_is_created_and_polled_to_stable() {
        let plane = Arc::new(InMemoryControlPlane::new());
        let desc = description("shop-prod");
        plane.script_observations(
            &desc.name,
            vec![
                StackObservation::absent(),
                StackObservation::in_state(StackState::CreateInProgress),
                StackObservation::in_state(StackState::CreateInProgress),
                StackObservation::in_state(StackState::Stable),
            ],
        );

        let reconciler = StackReconciler::new(plane.clone()).with_config(fast_config());
        let summary = reconciler
            .reconcile(&credential(), &desc, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(summary.action, ReconcileAction::Created);
        assert_eq!(summary.observation.state, StackState::Stable);
        assert_eq!(
            plane.mutating_calls(),
            vec![MutatingCall::Create(desc.name.clone())]
        );
    }

    #[tokio::test]
    async fn test_identical_description_issues_no_mutating_call() {
        let plane = Arc::new(InMemoryControlPlane::new());
        let desc = description("shop-prod");
        plane.seed_applied(desc.clone());

        let reconciler = StackReconciler::new(plane.clone()).with_config(fast_config());
        let summary = reconciler
            .reconcile(&credential(), &desc, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(summary.action, ReconcileAction::NoChange);
        assert!(plane.mutating_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_changed_parameters_trigger_update() {
        let plane = Arc::new(InMemoryControlPlane::new());
        let applied = description("shop-prod");
        plane.seed_applied(applied.clone());

        let requested = applied.clone().with_parameter("DesiredCount", "4");
        let reconciler = StackReconciler::new(plane.clone()).with_config(fast_config());
        let summary = reconciler
            .reconcile(&credential(), &requested, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(summary.action, ReconcileAction::Updated);
        assert_eq!(
            plane.mutating_calls(),
            vec![MutatingCall::Update(requested.name.clone())]
        );
    }

    #[tokio::test]
    async fn test_empty_change_set_rejection_is_success() {
        let plane = Arc::new(InMemoryControlPlane::new());
        let applied = description("shop-prod");
        plane.seed_applied(applied.clone());
        plane.reject_update_with(&applied.name, "No updates are to be performed.");

        // Differs textually, but the plane computes an empty change set
        let requested = applied.clone().with_parameter("Extra", "ignored");
        let reconciler = StackReconciler::new(plane.clone()).with_config(fast_config());
        let summary = reconciler
            .reconcile(&credential(), &requested, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(summary.action, ReconcileAction::NoChange);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_create_surfaces_reason_verbatim() {
        let plane = Arc::new(InMemoryControlPlane::new());
        let desc = description("shop-prod");
        let injected = "Resource creation cancelled: service quota exceeded in us-east-1";
        plane.script_observations(
            &desc.name,
            vec![
                StackObservation::absent(),
                StackObservation::in_state(StackState::CreateInProgress),
                StackObservation {
                    state: StackState::Failed,
                    outputs: Default::default(),
                    failure_reason: Some(injected.to_string()),
                },
            ],
        );

        let reconciler = StackReconciler::new(plane).with_config(fast_config());
        let err = reconciler
            .reconcile(&credential(), &desc, &CancelToken::new())
            .await
            .unwrap_err();
        match err {
            ReconcileError::StackFailed { reason, .. } => assert_eq!(reason, injected),
            other => panic!("expected StackFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_service_linked_role_is_distinct_error() {
        let plane = Arc::new(InMemoryControlPlane::new());
        let desc = description("shop-prod");
        plane.reject_create_with(
            &desc.name,
            "Unable to assume the service linked role. Please verify that the \
             ECS service linked role exists.",
        );

        let reconciler = StackReconciler::new(plane).with_config(fast_config());
        let err = reconciler
            .reconcile(&credential(), &desc, &CancelToken::new())
            .await
            .unwrap_err();
        match err {
            ReconcileError::PrerequisiteMissing { remediation, .. } => {
                assert!(remediation.contains("once per account"));
            }
            other => panic!("expected PrerequisiteMissing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_concurrent_reconcile_fails_fast() {
        let plane = Arc::new(InMemoryControlPlane::new());
        let desc = description("shop-prod");
        plane.seed_applied(desc.clone());

        let locks = StackLocks::new();
        let _held = locks.try_acquire(&desc.name).unwrap();

        let reconciler = StackReconciler::new(plane)
            .with_locks(locks)
            .with_config(fast_config());
        let err = reconciler
            .reconcile(&credential(), &desc, &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::ConcurrentModification(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_terminal_times_out() {
        let plane = Arc::new(InMemoryControlPlane::new());
        let desc = description("shop-prod");
        plane.script_observations(
            &desc.name,
            vec![
                StackObservation::absent(),
                StackObservation::in_state(StackState::CreateInProgress),
                StackObservation::in_state(StackState::CreateInProgress),
            ],
        );

        let reconciler = StackReconciler::new(plane).with_config(ReconcilerConfig {
            poll_interval: Duration::from_secs(5),
            max_wait: Duration::from_secs(30),
        });
        let err = reconciler
            .reconcile(&credential(), &desc, &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_cancellation_stops_polling_promptly() {
        let plane = Arc::new(InMemoryControlPlane::new());
        let desc = description("shop-prod");
        plane.script_observations(
            &desc.name,
            vec![
                StackObservation::absent(),
                StackObservation::in_state(StackState::CreateInProgress),
                StackObservation::in_state(StackState::CreateInProgress),
            ],
        );

        let cancel = CancelToken::new();
        let reconciler = Arc::new(StackReconciler::new(plane).with_config(ReconcilerConfig {
            poll_interval: Duration::from_millis(20),
            max_wait: Duration::from_secs(60),
        }));

        let task = {
            let reconciler = reconciler.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { reconciler.reconcile(&credential(), &desc, &cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let err = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("reconcile must return after cancel")
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Cancelled(_)));
    }
}
