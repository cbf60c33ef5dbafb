//! The deployment run driver

use crate::config::RunConfig;
use crate::error::{OrchestratorError, Result};
use bytes::Bytes;
use chrono::Utc;
use slipway_credentials::{CredentialBroker, IdentityToken, TokenExchange, TrustCondition};
use slipway_registry::{ArtifactPublisher, Registry};
use slipway_stack::{
    CancelToken, ControlPlane, ReconcileError, ReconcileSummary, ReconcilerConfig, StackLockGuard,
    StackLocks, StackReconciler,
};
use slipway_types::{
    ArtifactReference, Credential, DeploymentOutcome, DeploymentResult, DiagnosticEvent, RunId,
    StackDescription, Stage,
};
use slipway_verify::{HealthOutcome, ProbeTransport, RolloutVerifier, VerifierConfig};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, instrument};

/// One configured deployment pipeline
///
/// Stages share nothing mutable; a `DeploymentRun` can execute any
/// number of runs, and runs for different stack names may proceed
/// concurrently. Runs for the same stack name serialize through the
/// shared lock registry, whose lock is held from the first stage until
/// the result is built.
pub struct DeploymentRun {
    broker: CredentialBroker,
    publisher: ArtifactPublisher,
    plane: Arc<dyn ControlPlane>,
    reconciler: StackReconciler,
    verifier: RolloutVerifier,
    token: IdentityToken,
    config: RunConfig,
    locks: StackLocks,
    event_tx: broadcast::Sender<DiagnosticEvent>,
}

impl DeploymentRun {
    pub fn new(
        exchange: Arc<dyn TokenExchange>,
        registry: Arc<dyn Registry>,
        plane: Arc<dyn ControlPlane>,
        probe: Arc<dyn ProbeTransport>,
        token: IdentityToken,
        config: RunConfig,
        locks: StackLocks,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        let reconciler = StackReconciler::new(plane.clone()).with_config(ReconcilerConfig {
            poll_interval: config.poll_interval(),
            max_wait: config.max_wait(),
        });
        let verifier = RolloutVerifier::new(probe).with_config(VerifierConfig {
            probe_interval: config.probe_interval(),
        });

        Self {
            broker: CredentialBroker::new(exchange),
            publisher: ArtifactPublisher::new(registry),
            plane,
            reconciler,
            verifier,
            token,
            config,
            locks,
            event_tx,
        }
    }

    /// Observe diagnostics as they are emitted
    pub fn subscribe(&self) -> broadcast::Receiver<DiagnosticEvent> {
        self.event_tx.subscribe()
    }

    /// Execute one deployment run end to end
    ///
    /// Never returns an error: every failure is folded into the result's
    /// outcome and diagnostics trail.
    #[instrument(skip(self, artifact, cancel), fields(stack = %self.config.stack.name))]
    pub async fn execute(&self, artifact: Bytes, cancel: &CancelToken) -> DeploymentResult {
        let run_id = RunId::generate();
        let started_at = Utc::now();
        let mut diagnostics = Vec::new();
        info!(run_id = %run_id, "Deployment run starting");

        let (outcome, stack_outputs) = match self.drive(artifact, &mut diagnostics, cancel).await {
            Ok(outputs) => (DeploymentOutcome::Success, outputs),
            Err(StageFailure { stage, outcome, message }) => {
                error!(run_id = %run_id, stage = %stage, "Deployment run failed: {message}");
                self.emit(&mut diagnostics, stage, message);
                (outcome, BTreeMap::new())
            }
        };

        DeploymentResult {
            run_id,
            outcome,
            stack_outputs,
            diagnostics,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Tear the stack down; operator tooling, not part of a run
    #[instrument(skip(self), fields(stack = %self.config.stack.name))]
    pub async fn teardown(&self) -> Result<()> {
        let name = self.config.stack_name();
        let _guard = self
            .locks
            .try_acquire(&name)
            .ok_or_else(|| ReconcileError::ConcurrentModification(name.clone()))
            .map_err(OrchestratorError::Reconcile)?;
        let trust = TrustCondition::new(
            self.config.trust.issuer.clone(),
            self.config.trust.subject_pattern.clone(),
        );
        let credential = self
            .broker
            .acquire(&self.config.role_identifier(), &trust, &self.token)
            .await?;
        self.plane
            .delete(&credential, &name)
            .await
            .map_err(|e| OrchestratorError::Reconcile(ReconcileError::ControlPlane(e)))?;
        info!(stack = %name, "Stack deletion requested");
        Ok(())
    }

    /// The sequential stage pipeline; returns stack outputs on success.
    /// Holds the stack lock from before the first stage until it returns,
    /// so a second run for the same name fails fast even while this one
    /// is still publishing or verifying.
    async fn drive(
        &self,
        artifact: Bytes,
        diagnostics: &mut Vec<DiagnosticEvent>,
        cancel: &CancelToken,
    ) -> std::result::Result<BTreeMap<String, String>, StageFailure> {
        let name = self.config.stack_name();
        let guard = self.locks.try_acquire(&name).ok_or_else(|| {
            StageFailure::failed(
                Stage::Orchestrate,
                ReconcileError::ConcurrentModification(name.clone()).to_string(),
            )
        })?;

        // Stage 1: credentials
        let credential = self.acquire_credentials(diagnostics).await?;

        // Stage 2: publish
        let reference = self
            .publish_artifact(&credential, artifact, diagnostics)
            .await?;

        // Stage 3: reconcile, with the artifact reference flowing into the
        // stack parameters and a freshness check before the long wait
        let description = self.assemble_description(&reference).map_err(|e| {
            StageFailure::failed(Stage::Orchestrate, e.to_string())
        })?;
        let credential = self.refresh_credentials(credential, diagnostics).await?;
        let summary = self
            .reconcile_stack(&credential, &description, diagnostics, cancel, &guard)
            .await?;

        // Stage 4: verify
        self.verify_rollout(&summary, diagnostics).await?;

        Ok(summary.observation.outputs)
    }

    async fn acquire_credentials(
        &self,
        diagnostics: &mut Vec<DiagnosticEvent>,
    ) -> std::result::Result<Credential, StageFailure> {
        let trust = TrustCondition::new(
            self.config.trust.issuer.clone(),
            self.config.trust.subject_pattern.clone(),
        );
        let credential = self
            .broker
            .acquire(&self.config.role_identifier(), &trust, &self.token)
            .await
            .map_err(|e| StageFailure::failed(Stage::Credentials, e.to_string()))?;
        self.emit(
            diagnostics,
            Stage::Credentials,
            format!(
                "acquired credentials for role {} (expires {})",
                self.config.role, credential.expires_at
            ),
        );
        Ok(credential)
    }

    async fn publish_artifact(
        &self,
        credential: &Credential,
        artifact: Bytes,
        diagnostics: &mut Vec<DiagnosticEvent>,
    ) -> std::result::Result<ArtifactReference, StageFailure> {
        let tags = self.config.artifact.tags.iter().cloned().collect();
        let reference = self
            .publisher
            .publish(credential, artifact, &self.config.artifact.repository, tags)
            .await
            .map_err(|e| StageFailure::failed(Stage::Publish, e.to_string()))?;
        self.emit(
            diagnostics,
            Stage::Publish,
            format!("artifact available as {reference}"),
        );
        Ok(reference)
    }

    /// Ensure the credential outlives the reconcile and verify windows;
    /// the returned credential is the one later stages must use
    async fn refresh_credentials(
        &self,
        credential: Credential,
        diagnostics: &mut Vec<DiagnosticEvent>,
    ) -> std::result::Result<Credential, StageFailure> {
        // The reconcile wait budget plus the health window is the worst
        // case left in the pipeline.
        let remaining = chrono::Duration::from_std(
            self.config.max_wait() + self.config.health_timeout(),
        )
        .unwrap_or_else(|_| chrono::Duration::minutes(30));
        let trust = TrustCondition::new(
            self.config.trust.issuer.clone(),
            self.config.trust.subject_pattern.clone(),
        );
        let refreshed = self
            .broker
            .ensure_fresh(
                credential,
                remaining,
                &self.config.role_identifier(),
                &trust,
                &self.token,
            )
            .await
            .map_err(|e| StageFailure::failed(Stage::Credentials, e.to_string()))?;
        self.emit(
            diagnostics,
            Stage::Credentials,
            format!("credentials valid until {}", refreshed.expires_at),
        );
        Ok(refreshed)
    }

    fn assemble_description(&self, reference: &ArtifactReference) -> Result<StackDescription> {
        let mut description = self.config.stack_description()?;
        description.parameters.insert(
            self.config.artifact.image_parameter.clone(),
            reference.to_string(),
        );
        Ok(description)
    }

    async fn reconcile_stack(
        &self,
        credential: &Credential,
        description: &StackDescription,
        diagnostics: &mut Vec<DiagnosticEvent>,
        cancel: &CancelToken,
        guard: &StackLockGuard,
    ) -> std::result::Result<ReconcileSummary, StageFailure> {
        let summary = self
            .reconciler
            .reconcile_locked(credential, description, cancel, guard)
            .await
            .map_err(|e| {
                let outcome = match &e {
                    ReconcileError::Timeout { .. } | ReconcileError::Cancelled(_) => {
                        DeploymentOutcome::TimedOut
                    }
                    _ => DeploymentOutcome::Failed,
                };
                StageFailure {
                    stage: Stage::Reconcile,
                    outcome,
                    message: e.to_string(),
                }
            })?;
        self.emit(
            diagnostics,
            Stage::Reconcile,
            format!(
                "stack {} converged ({:?}), {} outputs",
                description.name,
                summary.action,
                summary.observation.outputs.len()
            ),
        );
        Ok(summary)
    }

    async fn verify_rollout(
        &self,
        summary: &ReconcileSummary,
        diagnostics: &mut Vec<DiagnosticEvent>,
    ) -> std::result::Result<(), StageFailure> {
        let key = &self.config.health.endpoint_output;
        let endpoint = summary.observation.outputs.get(key).ok_or_else(|| {
            StageFailure::failed(
                Stage::Verify,
                OrchestratorError::MissingStackOutput {
                    key: key.clone(),
                    available: summary.observation.outputs.keys().cloned().collect(),
                }
                .to_string(),
            )
        })?;
        let url = join_endpoint(endpoint, &self.config.health.path);

        match self
            .verifier
            .verify(&url, self.config.health_timeout())
            .await
        {
            HealthOutcome::Healthy => {
                self.emit(
                    diagnostics,
                    Stage::Verify,
                    format!("endpoint {url} reported healthy"),
                );
                Ok(())
            }
            HealthOutcome::TimedOut => Err(StageFailure {
                stage: Stage::Verify,
                outcome: DeploymentOutcome::TimedOut,
                message: format!(
                    "infrastructure converged but {url} never answered 2xx within {:?}; \
                     investigate the service, not the stack",
                    self.config.health_timeout()
                ),
            }),
        }
    }

    fn emit(&self, diagnostics: &mut Vec<DiagnosticEvent>, stage: Stage, message: String) {
        let event = DiagnosticEvent::new(stage, message);
        let _ = self.event_tx.send(event.clone());
        diagnostics.push(event);
    }
}

/// A stage error plus the outcome it implies for the whole run
struct StageFailure {
    stage: Stage,
    outcome: DeploymentOutcome,
    message: String,
}

impl StageFailure {
    fn failed(stage: Stage, message: String) -> Self {
        Self {
            stage,
            outcome: DeploymentOutcome::Failed,
            message,
        }
    }
}

/// Join a stack-exported endpoint with the health path; the output may
/// or may not carry a scheme
fn join_endpoint(endpoint: &str, path: &str) -> String {
    let base = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.trim_end_matches('/').to_string()
    } else {
        format!("http://{}", endpoint.trim_end_matches('/'))
    };
    format!("{base}{path}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_endpoint_handles_schemes_and_slashes() {
        assert_eq!(
            join_endpoint("alb-123.elb.example.com", "/health"),
            "http://alb-123.elb.example.com/health"
        );
        assert_eq!(
            join_endpoint("https://front.example.com/", "/health"),
            "https://front.example.com/health"
        );
    }
}
