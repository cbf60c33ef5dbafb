//! Slipway Credential Broker
//!
//! Exchanges a short-lived, externally issued identity token for scoped,
//! time-limited access credentials. The trust decision (does this token's
//! issuer and subject match what the role is configured to accept) is made
//! locally before any remote call; the exchange itself happens behind the
//! [`TokenExchange`] boundary trait.
//!
//! Credentials never leave memory and must be re-acquired, not reused,
//! when their remaining lifetime no longer covers the rest of the
//! pipeline plus a safety margin.

#![deny(unsafe_code)]

pub mod broker;
pub mod error;
pub mod exchange;
pub mod trust;

// Re-exports
pub use broker::{BrokerConfig, CredentialBroker};
pub use error::{CredentialError, Result};
pub use exchange::{StaticTokenExchange, TokenExchange};
pub use trust::{IdentityToken, TokenClaims, TrustCondition};
