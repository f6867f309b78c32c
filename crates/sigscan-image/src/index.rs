//! Tag → digest index, built by resolving every tag against the registry

use crate::error::{RegistryError, ScanError};
use crate::registry::Registry;
use crate::signature::is_signature_tag;
use crate::types::{Descriptor, Digest, RepositoryRef};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Snapshot of which digest every tag resolved to.
///
/// Keys are unique; iteration is sorted by tag so reports are stable
/// regardless of the order in which resolutions completed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagIndex {
    entries: BTreeMap<String, Descriptor>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: impl Into<String>, descriptor: Descriptor) {
        self.entries.insert(tag.into(), descriptor);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, tag: &str) -> Option<&Descriptor> {
        self.entries.get(tag)
    }

    pub fn digest(&self, tag: &str) -> Option<&Digest> {
        self.entries.get(tag).map(|d| &d.digest)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Descriptor)> {
        self.entries.iter().map(|(tag, d)| (tag.as_str(), d))
    }

    /// Hex payloads of digests that at least one ordinary (non-signature) tag resolves to
    pub fn ordinary_digests(&self) -> HashSet<&str> {
        self.iter()
            .filter(|(tag, _)| !is_signature_tag(tag))
            .map(|(_, d)| d.digest.hex())
            .collect()
    }

    /// Tags in signature form, sorted
    pub fn signature_tags(&self) -> impl Iterator<Item = &str> {
        self.entries
            .keys()
            .map(String::as_str)
            .filter(|tag| is_signature_tag(tag))
    }
}

impl FromIterator<(String, Descriptor)> for TagIndex {
    fn from_iter<I: IntoIterator<Item = (String, Descriptor)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// What to do when a single tag cannot be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Keep going; report the failure alongside the partial index
    #[default]
    Collect,
    /// Abort the build on the first failure
    FailFast,
}

/// A tag that could not be resolved
#[derive(Debug)]
pub struct TagFailure {
    pub tag: String,
    pub error: RegistryError,
}

/// Partial index plus the tags that failed
#[derive(Debug, Default)]
pub struct IndexBuild {
    pub index: TagIndex,
    pub failures: Vec<TagFailure>,
}

impl IndexBuild {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Resolves tags through a bounded pool of concurrent registry calls
pub struct IndexBuilder<'a, R: ?Sized> {
    registry: &'a R,
    concurrency: usize,
    failure_policy: FailurePolicy,
    cancel: CancellationToken,
}

impl<'a, R: Registry + ?Sized> IndexBuilder<'a, R> {
    pub fn new(registry: &'a R) -> Self {
        Self {
            registry,
            concurrency: 8,
            failure_policy: FailurePolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Maximum number of descriptor requests in flight
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Resolve every tag in `tags` against `repository`
    pub async fn build(
        &self,
        repository: &RepositoryRef,
        tags: &[String],
    ) -> Result<IndexBuild, ScanError> {
        info!(
            "Resolving {} tags in {} ({} concurrent)",
            tags.len(),
            repository,
            self.concurrency
        );

        let semaphore = Semaphore::new(self.concurrency);
        let mut pending = FuturesUnordered::new();

        for tag in tags {
            let semaphore = &semaphore;
            pending.push(async move {
                let _permit = semaphore.acquire().await.ok();
                let result = match repository.tag(tag) {
                    Ok(image) => self.registry.get_descriptor(&image).await,
                    Err(e) => Err(e),
                };
                (tag, result)
            });
        }

        let mut build = IndexBuild::default();

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ScanError::Cancelled),
                next = pending.next() => next,
            };
            let Some((tag, result)) = next else {
                break;
            };

            match result {
                Ok(descriptor) => {
                    debug!("{} -> {}", tag, descriptor.digest);
                    build.index.insert(tag.clone(), descriptor);
                }
                Err(RegistryError::Cancelled { .. }) => return Err(ScanError::Cancelled),
                Err(error) => {
                    if self.failure_policy == FailurePolicy::FailFast {
                        // Dropping `pending` aborts every outstanding request.
                        return Err(ScanError::TagFailed {
                            tag: tag.clone(),
                            source: error,
                        });
                    }
                    warn!("Failed to resolve tag {}: {}", tag, error);
                    build.failures.push(TagFailure {
                        tag: tag.clone(),
                        error,
                    });
                }
            }
        }

        build.failures.sort_by(|a, b| a.tag.cmp(&b.tag));
        info!(
            "Resolved {} of {} tags ({} failed)",
            build.index.len(),
            tags.len(),
            build.failures.len()
        );
        Ok(build)
    }
}
