//! Registry boundary
//!
//! Push and existence-check against a content-addressed registry. The
//! in-memory implementation records call counts so idempotence can be
//! asserted in tests.

use crate::error::{RegistryError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use slipway_types::{Credential, Digest};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Content-addressed registry boundary
///
/// Calls are authenticated with the credential the current run acquired;
/// an `Auth` error means that credential carried insufficient scope.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Whether `repository` already contains `digest`
    async fn head(
        &self,
        credential: &Credential,
        repository: &str,
        digest: &Digest,
    ) -> Result<bool>;

    /// Upload `content` under `tags` and return the digest the registry
    /// computed for it
    async fn push(
        &self,
        credential: &Credential,
        repository: &str,
        tags: &BTreeSet<String>,
        content: Bytes,
    ) -> Result<Digest>;
}

/// In-memory registry for tests and local development
pub struct InMemoryRegistry {
    blobs: DashMap<(String, Digest), Bytes>,
    push_calls: AtomicU32,
    head_calls: AtomicU32,
    /// Number of upcoming push/head calls that fail as unavailable
    outages_remaining: AtomicU32,
    last_access_key: Mutex<Option<String>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self {
            blobs: DashMap::new(),
            push_calls: AtomicU32::new(0),
            head_calls: AtomicU32::new(0),
            outages_remaining: AtomicU32::new(0),
            last_access_key: Mutex::new(None),
        }
    }

    /// Fail the next `n` calls with `Unavailable`
    pub fn with_outages(self, n: u32) -> Self {
        self.outages_remaining.store(n, Ordering::SeqCst);
        self
    }

    pub fn push_count(&self) -> u32 {
        self.push_calls.load(Ordering::SeqCst)
    }

    pub fn head_count(&self) -> u32 {
        self.head_calls.load(Ordering::SeqCst)
    }

    /// Access key id of the most recent call, for asserting that calls
    /// were made with the run's credential
    pub fn last_access_key(&self) -> Option<String> {
        self.last_access_key.lock().unwrap().clone()
    }

    fn authenticate(&self, credential: &Credential) {
        *self.last_access_key.lock().unwrap() = Some(credential.access_key_id.clone());
    }

    fn check_outage(&self) -> Result<()> {
        let remaining = self.outages_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.outages_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(RegistryError::Unavailable("simulated outage".into()));
        }
        Ok(())
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Registry for InMemoryRegistry {
    async fn head(&self, credential: &Credential, repository: &str, digest: &Digest) -> Result<bool> {
        self.authenticate(credential);
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        self.check_outage()?;
        Ok(self
            .blobs
            .contains_key(&(repository.to_string(), digest.clone())))
    }

    async fn push(
        &self,
        credential: &Credential,
        repository: &str,
        _tags: &BTreeSet<String>,
        content: Bytes,
    ) -> Result<Digest> {
        self.authenticate(credential);
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        self.check_outage()?;
        let digest = Digest::from_content(&content);
        self.blobs
            .insert((repository.to_string(), digest.clone()), content);
        Ok(digest)
    }
}
