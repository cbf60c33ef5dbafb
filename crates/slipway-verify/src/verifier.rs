//! Fixed-interval health polling

use crate::transport::ProbeTransport;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

/// Outcome of verifying a rollout
///
/// A single successful probe within the window is `Healthy`; a window
/// that expires with zero successes is `TimedOut`. There is no separate
/// unhealthy outcome because every probe failure is treated as the front
/// door still converging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthOutcome {
    Healthy,
    TimedOut,
}

/// Verifier tuning
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Interval between probes
    pub probe_interval: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(2),
        }
    }
}

/// Polls a health endpoint until it answers 2xx or the window closes
pub struct RolloutVerifier {
    transport: Arc<dyn ProbeTransport>,
    config: VerifierConfig,
}

impl RolloutVerifier {
    pub fn new(transport: Arc<dyn ProbeTransport>) -> Self {
        Self {
            transport,
            config: VerifierConfig::default(),
        }
    }

    pub fn with_config(mut self, config: VerifierConfig) -> Self {
        self.config = config;
        self
    }

    /// Probe `endpoint` until healthy or `timeout` elapses
    #[instrument(skip(self), fields(endpoint = endpoint))]
    pub async fn verify(&self, endpoint: &str, timeout: Duration) -> HealthOutcome {
        let deadline = Instant::now() + timeout;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match self.transport.probe(endpoint).await {
                Ok(status) if (200..300).contains(&status) => {
                    info!(attempts, status, "Endpoint healthy");
                    return HealthOutcome::Healthy;
                }
                Ok(status) => {
                    debug!(attempts, status, "Endpoint not yet healthy");
                }
                Err(err) => {
                    debug!(attempts, error = %err, "Probe failed, front door still converging");
                }
            }

            if Instant::now() + self.config.probe_interval > deadline {
                info!(attempts, "Health window expired with no successful probe");
                return HealthOutcome::TimedOut;
            }
            tokio::time::sleep(self.config.probe_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with connection refused for the first `failures` probes,
    /// then answers with `status`
    struct ScriptedTransport {
        failures: u32,
        then_status: u16,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(failures: u32, then_status: u16) -> Self {
            Self {
                failures,
                then_status,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ProbeTransport for ScriptedTransport {
        async fn probe(&self, _url: &str) -> Result<u16, ProbeError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(ProbeError::Connect("connection refused".into()))
            } else {
                Ok(self.then_status)
            }
        }
    }

    fn verifier(transport: ScriptedTransport) -> RolloutVerifier {
        RolloutVerifier::new(Arc::new(transport)).with_config(VerifierConfig {
            probe_interval: Duration::from_secs(1),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_success_within_window_is_healthy() {
        // 8 of ~10 probes in a 10 second window fail, then one success
        let outcome = verifier(ScriptedTransport::new(8, 200))
            .verify("http://front-door/health", Duration::from_secs(10))
            .await;
        assert_eq!(outcome, HealthOutcome::Healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_succeeding_endpoint_times_out() {
        let outcome = verifier(ScriptedTransport::new(u32::MAX, 200))
            .verify("http://front-door/health", Duration::from_secs(10))
            .await;
        assert_eq!(outcome, HealthOutcome::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_2xx_is_transient_not_success() {
        struct FlipTransport {
            calls: AtomicU32,
        }

        #[async_trait]
        impl ProbeTransport for FlipTransport {
            async fn probe(&self, _url: &str) -> Result<u16, ProbeError> {
                let call = self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(if call < 3 { 503 } else { 200 })
            }
        }

        let verifier = RolloutVerifier::new(Arc::new(FlipTransport {
            calls: AtomicU32::new(0),
        }))
        .with_config(VerifierConfig {
            probe_interval: Duration::from_secs(1),
        });
        let outcome = verifier
            .verify("http://front-door/health", Duration::from_secs(10))
            .await;
        assert_eq!(outcome, HealthOutcome::Healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_success_returns_without_sleeping() {
        let outcome = verifier(ScriptedTransport::new(0, 204))
            .verify("http://front-door/health", Duration::from_secs(10))
            .await;
        assert_eq!(outcome, HealthOutcome::Healthy);
    }
}
