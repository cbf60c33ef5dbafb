//! Content-addressed artifact references
//!
//! An artifact is identified by a sha256 digest of its content, so
//! republishing identical content is a safe no-op at the registry.

use serde::{Deserialize, Serialize};
use sha2::{Digest as Sha2Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// A `sha256:<hex>` content digest
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest(String);

/// Error parsing a digest string
#[derive(Debug, Error)]
#[error("invalid digest {0:?}: expected sha256:<64 hex chars>")]
pub struct DigestParseError(pub String);

impl Digest {
    /// Compute the digest of raw content bytes
    pub fn from_content(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Parse a `sha256:<hex>` string
    pub fn parse(s: &str) -> Result<Self, DigestParseError> {
        let hex = s
            .strip_prefix("sha256:")
            .ok_or_else(|| DigestParseError(s.to_string()))?;
        if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DigestParseError(s.to_string()));
        }
        Ok(Self(hex.to_ascii_lowercase()))
    }

    /// Hex portion without the algorithm prefix
    pub fn hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", self.0)
    }
}

/// Durable reference to a published artifact
///
/// Immutable once published; the digest uniquely identifies the
/// deployable unit regardless of which tags point at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactReference {
    /// Repository the artifact lives in
    pub repository: String,
    /// Content digest
    pub digest: Digest,
    /// Tags applied at publish time
    pub tags: BTreeSet<String>,
}

impl fmt::Display for ArtifactReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.repository, self.digest)
    }
}
