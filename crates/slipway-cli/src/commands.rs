//! Command implementations

use crate::output::{print_result, OutputFormat};
use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, Utc};
use clap::Args;
use slipway_credentials::{IdentityToken, StaticTokenExchange, TokenClaims};
use slipway_orchestrator::{DeploymentRun, RunConfig};
use slipway_registry::InMemoryRegistry;
use slipway_stack::{CancelToken, InMemoryControlPlane, StackLocks};
use slipway_types::StackObservation;
use slipway_verify::{HttpProbeTransport, ProbeError, ProbeTransport};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Arguments shared by deploy
#[derive(Args)]
pub struct DeployArgs {
    /// Run configuration file
    #[arg(short, long, env = "SLIPWAY_CONFIG", default_value = "slipway.toml")]
    pub config: PathBuf,

    /// Built artifact to publish
    #[arg(short, long)]
    pub artifact: PathBuf,

    /// Identity token file (raw token bytes)
    #[arg(long, env = "SLIPWAY_TOKEN_FILE")]
    pub token_file: PathBuf,

    /// Issuer claim of the identity token
    #[arg(long, env = "SLIPWAY_TOKEN_ISSUER")]
    pub token_issuer: String,

    /// Subject claim of the identity token
    #[arg(long, env = "SLIPWAY_TOKEN_SUBJECT")]
    pub token_subject: String,

    /// Probe this endpoint over HTTP instead of assuming health
    #[arg(long)]
    pub probe_endpoint: Option<String>,
}

#[derive(Args)]
pub struct TeardownArgs {
    /// Run configuration file
    #[arg(short, long, env = "SLIPWAY_CONFIG", default_value = "slipway.toml")]
    pub config: PathBuf,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Probe transport that reports success without a network call; used by
/// the rehearsal backend where no real front door exists
struct AssumeHealthy;

#[async_trait]
impl ProbeTransport for AssumeHealthy {
    async fn probe(&self, _url: &str) -> Result<u16, ProbeError> {
        Ok(200)
    }
}

pub async fn deploy(args: DeployArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = RunConfig::from_file(&args.config)?;
    let artifact = std::fs::read(&args.artifact)
        .with_context(|| format!("reading artifact {}", args.artifact.display()))?;
    let raw_token = std::fs::read(&args.token_file)
        .with_context(|| format!("reading token {}", args.token_file.display()))?;

    let token = IdentityToken::new(
        raw_token,
        TokenClaims {
            issuer: args.token_issuer,
            subject: args.token_subject,
            expires_at: Utc::now() + Duration::minutes(5),
        },
    );

    // Rehearsal backend: in-memory exchange/registry/plane. The plane is
    // seeded so the created stack exports the endpoint the verifier
    // expects.
    let plane = Arc::new(InMemoryControlPlane::new());
    let endpoint = args
        .probe_endpoint
        .clone()
        .unwrap_or_else(|| "rehearsal.invalid".to_string());
    let mut stable = StackObservation::in_state(slipway_types::StackState::Stable);
    stable
        .outputs
        .insert(config.health.endpoint_output.clone(), endpoint);
    plane.script_observations(
        &config.stack_name(),
        vec![StackObservation::absent(), stable],
    );

    let probe: Arc<dyn ProbeTransport> = match &args.probe_endpoint {
        Some(_) => Arc::new(HttpProbeTransport::new(std::time::Duration::from_secs(5))?),
        None => Arc::new(AssumeHealthy),
    };

    let run = DeploymentRun::new(
        Arc::new(StaticTokenExchange::new()),
        Arc::new(InMemoryRegistry::new()),
        plane,
        probe,
        token,
        config,
        StackLocks::new(),
    );

    let result = run.execute(Bytes::from(artifact), &CancelToken::new()).await;
    print_result(&result, format)?;

    if !result.succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

pub async fn teardown(args: TeardownArgs) -> anyhow::Result<()> {
    let config = RunConfig::from_file(&args.config)?;
    if !args.yes {
        anyhow::bail!(
            "refusing to delete stack {} without --yes",
            config.stack.name
        );
    }

    let plane = Arc::new(InMemoryControlPlane::new());
    let run = DeploymentRun::new(
        Arc::new(StaticTokenExchange::new()),
        Arc::new(InMemoryRegistry::new()),
        plane,
        Arc::new(AssumeHealthy),
        IdentityToken::new(
            Vec::new(),
            TokenClaims {
                issuer: config.trust.issuer.clone(),
                subject: config.trust.subject_pattern.clone(),
                expires_at: Utc::now() + Duration::minutes(5),
            },
        ),
        config,
        StackLocks::new(),
    );
    run.teardown().await?;
    info!("teardown requested");
    Ok(())
}

/// Example config printed by `slipway render-config`
pub const EXAMPLE_CONFIG: &str = r#"# Slipway run configuration

# Role assumed via federated credential exchange
role = "arn:cloud:iam::123456789012:role/deployer"

[trust]
# Tokens must come from this issuer...
issuer = "https://token.actions.example.com"
# ...and carry a subject matching this pattern (trailing * wildcard allowed)
subject_pattern = "repo:acme/shop:ref:refs/heads/main"

[context]
region = "us-east-1"
account = "123456789012"

[artifact]
repository = "acme/shop"
tags = ["latest"]
# Stack parameter that receives the published artifact reference
image_parameter = "ImageReference"

[stack]
name = "shop-prod"
template_file = "stack.json"

[stack.parameters]
DesiredCount = "2"

[health]
# Stack output holding the reachable endpoint
endpoint_output = "ServiceEndpoint"
path = "/health"
timeout_secs = 120
probe_interval_secs = 2

[timeouts]
poll_interval_secs = 10
max_wait_secs = 1200
"#;
