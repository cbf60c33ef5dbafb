//! Identity tokens and trust conditions
//!
//! A trust condition pins the expected issuer and a subject pattern of the
//! form `repo:<org>/<name>:ref:refs/heads/<branch>`, with an optional
//! trailing `*` wildcard on the pattern. Matching is an explicit function
//! so it can be unit-tested against real subject strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Claims carried by an identity token, parsed upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Token issuer URL
    pub issuer: String,
    /// Subject, e.g. `repo:acme/shop:ref:refs/heads/main`
    pub subject: String,
    /// Token expiry
    pub expires_at: DateTime<Utc>,
}

/// An externally issued identity token: opaque bytes plus its claims
#[derive(Debug, Clone)]
pub struct IdentityToken {
    /// Raw token as handed to the exchange boundary
    pub raw: Vec<u8>,
    pub claims: TokenClaims,
}

impl IdentityToken {
    pub fn new(raw: impl Into<Vec<u8>>, claims: TokenClaims) -> Self {
        Self {
            raw: raw.into(),
            claims,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.claims.expires_at <= now
    }
}

/// Expected issuer and subject pattern for tokens allowed to assume a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustCondition {
    pub issuer: String,
    /// Exact subject, or a prefix ending in `*`
    pub subject_pattern: String,
}

impl TrustCondition {
    pub fn new(issuer: impl Into<String>, subject_pattern: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            subject_pattern: subject_pattern.into(),
        }
    }

    /// Whether the claims satisfy this condition
    pub fn matches(&self, claims: &TokenClaims) -> bool {
        if claims.issuer != self.issuer {
            return false;
        }
        match self.subject_pattern.strip_suffix('*') {
            Some(prefix) => claims.subject.starts_with(prefix),
            None => claims.subject == self.subject_pattern,
        }
    }
}
