//! Retry and cancellation around any [`Registry`]

use crate::error::RegistryError;
use crate::registry::Registry;
use crate::types::{Descriptor, ImageReference, RepositoryRef};
use async_trait::async_trait;
use sigscan_core::retry::{RetryExecutor, RetryPredicate, TracingObserver};
use sigscan_core::RetryPolicy;
use tokio_util::sync::CancellationToken;

/// Retries transport failures and throttling/5xx responses only
#[derive(Debug, Clone, Copy, Default)]
pub struct TransientErrors;

impl RetryPredicate<RegistryError> for TransientErrors {
    fn should_retry(&self, error: &RegistryError) -> bool {
        error.is_transient()
    }
}

/// Wraps a registry so every call is retried with backoff and aborted on cancellation
pub struct RetryingRegistry<R> {
    inner: R,
    policy: RetryPolicy,
    cancel: CancellationToken,
    jitter: bool,
}

impl<R: Registry> RetryingRegistry<R> {
    pub fn new(inner: R, policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            inner,
            policy,
            cancel,
            jitter: true,
        }
    }

    /// Enable or disable backoff jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    fn executor(&self, operation: String) -> RetryExecutor<TransientErrors, TracingObserver> {
        RetryExecutor::new(self.policy.clone())
            .with_predicate(TransientErrors)
            .with_observer(TracingObserver::new(operation))
            .with_jitter(self.jitter)
            .with_cancellation(self.cancel.clone())
    }
}

#[async_trait]
impl<R: Registry> Registry for RetryingRegistry<R> {
    async fn list_tags(&self, repository: &RepositoryRef) -> Result<Vec<String>, RegistryError> {
        self.executor(format!("list tags {}", repository))
            .execute(|| self.inner.list_tags(repository))
            .await
            .map_err(|e| RegistryError::from_retry(e, &repository.to_string()))
    }

    async fn get_descriptor(&self, image: &ImageReference) -> Result<Descriptor, RegistryError> {
        self.executor(format!("get descriptor {}", image))
            .execute(|| self.inner.get_descriptor(image))
            .await
            .map_err(|e| RegistryError::from_retry(e, &image.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Digest;
    use sigscan_core::RetryStrategy;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with the given status `failures` times, then succeeds
    struct Flaky {
        status: u16,
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Registry for Flaky {
        async fn list_tags(&self, repository: &RepositoryRef) -> Result<Vec<String>, RegistryError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(RegistryError::communication(
                    repository.to_string(),
                    Some(self.status),
                    "flaky",
                ));
            }
            Ok(vec!["v1".to_string()])
        }

        async fn get_descriptor(&self, image: &ImageReference) -> Result<Descriptor, RegistryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(RegistryError::not_found(image.to_string()))
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            strategy: RetryStrategy::None,
            ..RetryPolicy::default()
        }
    }

    fn flaky(status: u16, failures: u32) -> RetryingRegistry<Flaky> {
        RetryingRegistry::new(
            Flaky {
                status,
                failures,
                calls: AtomicU32::new(0),
            },
            policy(),
            CancellationToken::new(),
        )
        .with_jitter(false)
    }

    fn repo() -> RepositoryRef {
        RepositoryRef::new("r.example", "ns/app").unwrap()
    }

    #[tokio::test]
    async fn test_retries_transient_status() {
        let registry = flaky(503, 2);
        let tags = registry.list_tags(&repo()).await.unwrap();
        assert_eq!(tags, vec!["v1"]);
        assert_eq!(registry.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_auth_failures() {
        let registry = flaky(401, 5);
        let err = registry.list_tags(&repo()).await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(registry.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let registry = flaky(503, 0);
        let image = repo().digest(&Digest::of_bytes(b"x"));
        let err = registry.get_descriptor(&image).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(registry.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();
        let registry = RetryingRegistry::new(
            Flaky {
                status: 503,
                failures: 0,
                calls: AtomicU32::new(0),
            },
            policy(),
            token,
        );

        let err = registry.list_tags(&repo()).await.unwrap_err();
        assert!(matches!(err, RegistryError::Cancelled { .. }));
        assert_eq!(registry.inner().calls.load(Ordering::SeqCst), 0);
    }
}
