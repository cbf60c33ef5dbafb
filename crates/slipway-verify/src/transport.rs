//! Probe transport boundary
//!
//! The verifier only needs "GET this URL, what status came back". Tests
//! script a transport; production wires the reqwest-backed one.

use crate::error::ProbeError;
use async_trait::async_trait;
use std::time::Duration;

/// One HTTP GET against a health endpoint
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    /// Returns the HTTP status code, or a transport-level error
    async fn probe(&self, url: &str) -> Result<u16, ProbeError>;
}

/// Reqwest-backed transport with a per-request timeout
pub struct HttpProbeTransport {
    client: reqwest::Client,
    probe_timeout: Duration,
}

impl HttpProbeTransport {
    pub fn new(probe_timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(probe_timeout)
            .build()
            .map_err(|e| ProbeError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            probe_timeout,
        })
    }
}

#[async_trait]
impl ProbeTransport for HttpProbeTransport {
    async fn probe(&self, url: &str) -> Result<u16, ProbeError> {
        match self.client.get(url).send().await {
            Ok(response) => Ok(response.status().as_u16()),
            Err(e) if e.is_timeout() => Err(ProbeError::Timeout {
                timeout_ms: self.probe_timeout.as_millis() as u64,
            }),
            Err(e) if e.is_connect() => Err(ProbeError::Connect(e.to_string())),
            Err(e) => Err(ProbeError::Transport(e.to_string())),
        }
    }
}
