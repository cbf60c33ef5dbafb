//! Token exchange boundary
//!
//! The remote side of federated credential exchange (an STS-like
//! service). The broker decides trust; this boundary only trades an
//! accepted token for credentials.

use crate::error::{CredentialError, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use slipway_types::{Credential, RoleIdentifier};

use crate::trust::IdentityToken;

/// Remote credential exchange boundary
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Assume `role` with an already trust-checked token
    async fn assume(&self, role: &RoleIdentifier, token: &IdentityToken) -> Result<Credential>;
}

/// In-memory exchange for tests and local development
///
/// Issues deterministic credentials with a configurable lifetime, or a
/// scripted rejection.
pub struct StaticTokenExchange {
    lifetime: Duration,
    reject_with: Option<String>,
}

impl StaticTokenExchange {
    pub fn new() -> Self {
        Self {
            lifetime: Duration::hours(1),
            reject_with: None,
        }
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Make every assume call fail with the given reason
    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self {
            lifetime: Duration::zero(),
            reject_with: Some(reason.into()),
        }
    }
}

impl Default for StaticTokenExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenExchange for StaticTokenExchange {
    async fn assume(&self, role: &RoleIdentifier, _token: &IdentityToken) -> Result<Credential> {
        if let Some(reason) = &self.reject_with {
            return Err(CredentialError::Exchange(reason.clone()));
        }
        Ok(Credential {
            access_key_id: format!("AKID-{}", role.as_str()),
            secret_access_key: "static-secret".into(),
            session_token: "static-session".into(),
            expires_at: Utc::now() + self.lifetime,
        })
    }
}
