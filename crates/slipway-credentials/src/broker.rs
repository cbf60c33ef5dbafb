//! Credential broker - trust check then exchange
//!
//! The broker is the only component that touches identity tokens. It
//! refuses expired tokens and trust-condition mismatches locally, without
//! contacting the exchange boundary, so a misconfigured trust policy
//! never produces a credential.

use crate::error::{CredentialError, Result};
use crate::exchange::TokenExchange;
use crate::trust::{IdentityToken, TrustCondition};
use chrono::{Duration, Utc};
use slipway_types::{Credential, RoleIdentifier};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Broker tuning
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Extra lifetime a credential must retain beyond the estimated
    /// remaining work before it is considered fresh enough to reuse
    pub freshness_margin: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            freshness_margin: Duration::minutes(2),
        }
    }
}

/// Exchanges identity tokens for scoped credentials
pub struct CredentialBroker {
    exchange: Arc<dyn TokenExchange>,
    config: BrokerConfig,
}

impl CredentialBroker {
    pub fn new(exchange: Arc<dyn TokenExchange>) -> Self {
        Self {
            exchange,
            config: BrokerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: BrokerConfig) -> Self {
        self.config = config;
        self
    }

    /// Acquire credentials for `role` if `token` satisfies `trust`
    #[instrument(skip(self, token), fields(role = %role))]
    pub async fn acquire(
        &self,
        role: &RoleIdentifier,
        trust: &TrustCondition,
        token: &IdentityToken,
    ) -> Result<Credential> {
        let now = Utc::now();
        if token.is_expired(now) {
            return Err(CredentialError::ExpiredToken {
                expired_at: token.claims.expires_at,
            });
        }
        if !trust.matches(&token.claims) {
            return Err(CredentialError::Authentication(format!(
                "subject {:?} from issuer {:?} does not match trust condition {:?}",
                token.claims.subject, token.claims.issuer, trust.subject_pattern
            )));
        }

        let credential = self.exchange.assume(role, token).await?;
        info!(
            role = %role,
            expires_at = %credential.expires_at,
            "Acquired scoped credentials"
        );
        Ok(credential)
    }

    /// Return `credential` if it still covers `remaining_work` plus the
    /// configured margin, otherwise acquire a fresh one
    #[instrument(skip(self, credential, token), fields(role = %role))]
    pub async fn ensure_fresh(
        &self,
        credential: Credential,
        remaining_work: Duration,
        role: &RoleIdentifier,
        trust: &TrustCondition,
        token: &IdentityToken,
    ) -> Result<Credential> {
        let now = Utc::now();
        if credential.usable_for(remaining_work, self.config.freshness_margin, now) {
            debug!("Credential still fresh, reusing");
            return Ok(credential);
        }
        info!(
            remaining = %credential.remaining(now),
            "Credential lifetime insufficient for remaining pipeline, re-acquiring"
        );
        self.acquire(role, trust, token).await
    }
}
