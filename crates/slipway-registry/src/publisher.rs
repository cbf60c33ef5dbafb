//! Artifact publisher - digest locally, push only when absent

use crate::backoff::BackoffPolicy;
use crate::error::{RegistryError, Result};
use crate::registry::Registry;
use bytes::Bytes;
use slipway_types::{ArtifactReference, Credential, Digest};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Publisher tuning
#[derive(Debug, Clone, Default)]
pub struct PublisherConfig {
    pub backoff: BackoffPolicy,
}

/// Publishes immutable artifacts to a content-addressed registry
pub struct ArtifactPublisher {
    registry: Arc<dyn Registry>,
    config: PublisherConfig,
}

impl ArtifactPublisher {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self {
            registry,
            config: PublisherConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PublisherConfig) -> Self {
        self.config = config;
        self
    }

    /// Publish `content` to `repository`, returning its durable reference
    ///
    /// Registry calls carry `credential`. If the registry already holds
    /// the content digest, no upload is issued and the existing reference
    /// is returned.
    #[instrument(skip(self, credential, content), fields(repository = repository, bytes = content.len()))]
    pub async fn publish(
        &self,
        credential: &Credential,
        content: Bytes,
        repository: &str,
        tags: BTreeSet<String>,
    ) -> Result<ArtifactReference> {
        let digest = Digest::from_content(&content);

        if self
            .retrying(|| self.registry.head(credential, repository, &digest))
            .await?
        {
            info!(digest = %digest, "Artifact already present, skipping upload");
            return Ok(ArtifactReference {
                repository: repository.to_string(),
                digest,
                tags,
            });
        }

        let reported = self
            .retrying(|| self.registry.push(credential, repository, &tags, content.clone()))
            .await?;
        if reported != digest {
            return Err(RegistryError::DigestMismatch {
                pushed: digest,
                reported,
            });
        }

        info!(digest = %digest, "Artifact published");
        Ok(ArtifactReference {
            repository: repository.to_string(),
            digest,
            tags,
        })
    }

    /// Run `op`, retrying transient failures per the backoff policy
    async fn retrying<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.config.backoff.max_attempts => {
                    let delay = self.config.backoff.delay_for(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Registry call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryRegistry;

    fn tags() -> BTreeSet<String> {
        BTreeSet::from(["latest".to_string()])
    }

    fn credential() -> Credential {
        Credential {
            access_key_id: "AKIDTEST".into(),
            secret_access_key: "test-secret".into(),
            session_token: "test-session".into(),
            expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn test_republish_is_a_confirmed_noop() {
        let registry = Arc::new(InMemoryRegistry::new());
        let publisher = ArtifactPublisher::new(registry.clone());

        let first = publisher
            .publish(&credential(), Bytes::from_static(b"image-bytes"), "acme/shop", tags())
            .await
            .unwrap();
        let second = publisher
            .publish(&credential(), Bytes::from_static(b"image-bytes"), "acme/shop", tags())
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.push_count(), 1, "second publish must not upload");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_is_retried_until_success() {
        let registry = Arc::new(InMemoryRegistry::new().with_outages(2));
        let publisher = ArtifactPublisher::new(registry.clone());

        let reference = publisher
            .publish(&credential(), Bytes::from_static(b"image-bytes"), "acme/shop", tags())
            .await
            .unwrap();
        assert_eq!(reference.repository, "acme/shop");
    }

    #[tokio::test]
    async fn test_calls_carry_the_credential() {
        let registry = Arc::new(InMemoryRegistry::new());
        let publisher = ArtifactPublisher::new(registry.clone());

        publisher
            .publish(&credential(), Bytes::from_static(b"image-bytes"), "acme/shop", tags())
            .await
            .unwrap();
        assert_eq!(registry.last_access_key().as_deref(), Some("AKIDTEST"));
    }

    struct DenyingRegistry;

    #[async_trait::async_trait]
    impl Registry for DenyingRegistry {
        async fn head(
            &self,
            _credential: &Credential,
            _repository: &str,
            _digest: &Digest,
        ) -> Result<bool> {
            Err(RegistryError::Auth("insufficient scope: push".into()))
        }

        async fn push(
            &self,
            _credential: &Credential,
            _repository: &str,
            _tags: &BTreeSet<String>,
            _content: Bytes,
        ) -> Result<Digest> {
            Err(RegistryError::Auth("insufficient scope: push".into()))
        }
    }

    #[tokio::test]
    async fn test_auth_failure_is_fatal_not_retried() {
        let publisher = ArtifactPublisher::new(Arc::new(DenyingRegistry));
        let err = publisher
            .publish(&credential(), Bytes::from_static(b"image-bytes"), "acme/shop", tags())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Auth(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_attempts_then_error() {
        let registry = Arc::new(InMemoryRegistry::new().with_outages(10));
        let publisher = ArtifactPublisher::new(registry);

        let err = publisher
            .publish(&credential(), Bytes::from_static(b"image-bytes"), "acme/shop", tags())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Unavailable(_)));
    }
}
