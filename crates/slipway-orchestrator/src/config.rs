//! Run configuration
//!
//! Everything a deployment run needs that is not the artifact itself:
//! role and trust condition, target repository, stack description
//! source, health-check wiring, and timeouts. Deserializable from TOML
//! so the CLI can load it from a file; region and account context come
//! in here rather than being hardcoded anywhere.

use crate::error::{OrchestratorError, Result};
use serde::{Deserialize, Serialize};
use slipway_types::{RoleIdentifier, StackDescription, StackName};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Full configuration for one deployment run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Role assumed via federated exchange
    pub role: String,

    /// Trust condition tokens must satisfy
    pub trust: TrustConfig,

    /// Region/account context passed to boundary implementations
    #[serde(default)]
    pub context: ContextConfig,

    /// Artifact destination
    pub artifact: ArtifactConfig,

    /// Stack to reconcile
    pub stack: StackConfig,

    /// Rollout verification
    #[serde(default)]
    pub health: HealthConfig,

    /// Reconciler polling budget
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

/// Expected issuer and subject pattern
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustConfig {
    pub issuer: String,
    pub subject_pattern: String,
}

/// Cloud context; opaque to the orchestrator core
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
}

/// Where the artifact gets published
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    pub repository: String,
    #[serde(default = "default_tags")]
    pub tags: Vec<String>,
    /// Stack parameter that receives the published artifact reference
    #[serde(default = "default_image_parameter")]
    pub image_parameter: String,
}

/// Stack description source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    pub name: String,
    /// JSON template file
    pub template_file: PathBuf,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

/// Health-check wiring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Stack output holding the reachable endpoint
    #[serde(default = "default_endpoint_output")]
    pub endpoint_output: String,
    #[serde(default = "default_health_path")]
    pub path: String,
    #[serde(default = "default_health_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            endpoint_output: default_endpoint_output(),
            path: default_health_path(),
            timeout_secs: default_health_timeout_secs(),
            probe_interval_secs: default_probe_interval_secs(),
        }
    }
}

/// Reconciler polling budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_wait_secs: default_max_wait_secs(),
        }
    }
}

fn default_tags() -> Vec<String> {
    vec!["latest".to_string()]
}

fn default_image_parameter() -> String {
    "ImageReference".to_string()
}

fn default_endpoint_output() -> String {
    "ServiceEndpoint".to_string()
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_health_timeout_secs() -> u64 {
    120
}

fn default_probe_interval_secs() -> u64 {
    2
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_max_wait_secs() -> u64 {
    20 * 60
}

impl RunConfig {
    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| OrchestratorError::Config(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| OrchestratorError::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn role_identifier(&self) -> RoleIdentifier {
        RoleIdentifier::new(self.role.clone())
    }

    pub fn stack_name(&self) -> StackName {
        StackName::new(self.stack.name.clone())
    }

    /// Load the template file and assemble the stack description
    pub fn stack_description(&self) -> Result<StackDescription> {
        let raw = std::fs::read_to_string(&self.stack.template_file).map_err(|e| {
            OrchestratorError::Config(format!(
                "reading template {}: {e}",
                self.stack.template_file.display()
            ))
        })?;
        let template: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
            OrchestratorError::Config(format!(
                "parsing template {}: {e}",
                self.stack.template_file.display()
            ))
        })?;
        Ok(StackDescription {
            name: self.stack_name(),
            template,
            parameters: self.stack.parameters.clone(),
        })
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health.timeout_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.health.probe_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.timeouts.poll_interval_secs)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.timeouts.max_wait_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
role = "arn:aws:iam::123456789012:role/deployer"

[trust]
issuer = "https://token.actions.example.com"
subject_pattern = "repo:acme/shop:ref:refs/heads/main"

[context]
region = "us-east-1"

[artifact]
repository = "acme/shop"
tags = ["latest", "v42"]

[stack]
name = "shop-prod"
template_file = "stack.json"

[stack.parameters]
DesiredCount = "2"

[health]
timeout_secs = 60
"#;

    #[test]
    fn test_sample_config_parses() {
        let config: RunConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.stack.name, "shop-prod");
        assert_eq!(config.artifact.tags.len(), 2);
        assert_eq!(config.health.timeout_secs, 60);
        // defaults fill the gaps
        assert_eq!(config.health.endpoint_output, "ServiceEndpoint");
        assert_eq!(config.timeouts.max_wait_secs, 1200);
        assert_eq!(config.artifact.image_parameter, "ImageReference");
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let minimal = r#"
role = "deployer"
[trust]
issuer = "https://issuer"
subject_pattern = "repo:acme/shop:*"
[artifact]
repository = "acme/shop"
[stack]
name = "s"
template_file = "t.json"
"#;
        let config: RunConfig = toml::from_str(minimal).unwrap();
        assert_eq!(config.artifact.tags, vec!["latest".to_string()]);
        assert_eq!(config.health.path, "/health");
        assert_eq!(config.timeouts.poll_interval_secs, 10);
    }
}
