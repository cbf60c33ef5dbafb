//! Short-lived access credentials
//!
//! Credentials come out of a federated exchange and live only in memory
//! for the duration of one run. They are deliberately not serializable,
//! and the `Debug` impl redacts the secret material so credentials can
//! appear in traces without leaking.

use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Scoped, time-limited access credentials
#[derive(Clone)]
pub struct Credential {
    /// Public key identifier
    pub access_key_id: String,
    /// Secret half of the key pair; redacted from Debug output
    pub secret_access_key: String,
    /// Session token binding the credential to the exchanged identity
    pub session_token: String,
    /// Hard expiry set by the issuing boundary
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Remaining lifetime relative to `now`; negative once expired
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }

    /// Whether the credential will outlive `required` work plus a safety
    /// margin, measured from `now`
    pub fn usable_for(&self, required: Duration, margin: Duration, now: DateTime<Utc>) -> bool {
        self.remaining(now) >= required + margin
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
