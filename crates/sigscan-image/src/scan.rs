//! Full scan of one repository: list, resolve, probe, correlate

use crate::correlate::{is_signed_by_get, SignatureCorrelator};
use crate::error::{RegistryError, ScanError};
use crate::index::{FailurePolicy, IndexBuilder, TagFailure, TagIndex};
use crate::registry::Registry;
use crate::retrying::RetryingRegistry;
use crate::signature::{sig_tag_for, signature_target};
use crate::types::{Digest, ImageReference, RepositoryRef};
use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use sigscan_core::{ScanSettings, SignedCheckMode};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Classification of one ordinary tag
#[derive(Debug, Clone, Serialize)]
pub struct TagReport {
    pub tag: String,
    pub digest: Digest,
    pub media_type: String,
    /// Signature tag expected for this digest
    pub signature_tag: String,
    /// Listing-based check
    pub signed_by_listing: bool,
    /// Existence probe; `None` when probing is disabled
    pub signed_by_probe: Option<bool>,
}

impl TagReport {
    /// Whether the two signed checks gave different answers
    pub fn detectors_disagree(&self) -> bool {
        self.signed_by_probe
            .is_some_and(|probe| probe != self.signed_by_listing)
    }
}

/// A signature-form tag and whether an ordinary tag still uses its target
#[derive(Debug, Clone, Serialize)]
pub struct SignatureReport {
    pub tag: String,
    /// Digest the signature tag itself resolves to
    pub digest: Digest,
    pub media_type: String,
    /// Hex of the manifest the signature was made for
    pub target: String,
    pub used: bool,
}

/// A tag that could not be resolved
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub tag: String,
    pub error: String,
    pub status: Option<u16>,
    pub not_found: bool,
}

impl From<TagFailure> for FailureReport {
    fn from(failure: TagFailure) -> Self {
        Self {
            status: failure.error.status(),
            not_found: failure.error.is_not_found(),
            error: failure.error.to_string(),
            tag: failure.tag,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub listed: usize,
    pub ordinary: usize,
    pub signatures: usize,
    pub signed: usize,
    pub unsigned: usize,
    pub orphaned: usize,
    pub failed: usize,
    pub disagreements: usize,
}

/// Everything a scan found, ready for rendering or serialization
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub repository: String,
    pub scanned_at: DateTime<Utc>,
    pub signed_check: SignedCheckMode,
    pub tags: Vec<TagReport>,
    pub signatures: Vec<SignatureReport>,
    pub orphaned_signatures: Vec<String>,
    pub failures: Vec<FailureReport>,
    pub summary: ScanSummary,
}

impl ScanReport {
    /// No tag failed to resolve
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Result of inspecting a single tag or digest
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub image: String,
    pub digest: Digest,
    pub media_type: String,
    pub size: Option<u64>,
    pub signature_tag: String,
    /// Set when the inspected tag is itself a signature artifact
    pub signs: Option<String>,
    pub signed_by_listing: bool,
    pub signed_by_probe: Option<bool>,
}

/// Drives a scan against any [`Registry`], adding retries and cancellation
pub struct Scanner<R> {
    registry: RetryingRegistry<R>,
    settings: ScanSettings,
    cancel: CancellationToken,
}

impl<R: Registry> Scanner<R> {
    pub fn new(registry: R, settings: ScanSettings, cancel: CancellationToken) -> Self {
        let registry = RetryingRegistry::new(registry, settings.retry.clone(), cancel.clone());
        Self {
            registry,
            settings,
            cancel,
        }
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// The wrapped registry, retries included
    pub fn registry(&self) -> &RetryingRegistry<R> {
        &self.registry
    }

    /// Scan every tag of `repository`
    pub async fn scan(&self, repository: &RepositoryRef) -> Result<ScanReport, ScanError> {
        let scanned_at = Utc::now();
        let tags = self.list_tags(repository).await?;
        info!("Listed {} tags in {}", tags.len(), repository);

        let policy = if self.settings.fail_fast {
            FailurePolicy::FailFast
        } else {
            FailurePolicy::Collect
        };
        let build = IndexBuilder::new(&self.registry)
            .with_concurrency(self.settings.concurrency)
            .with_failure_policy(policy)
            .with_cancellation(self.cancel.clone())
            .build(repository, &tags)
            .await?;

        let correlator = SignatureCorrelator::new(&build.index, &tags, self.settings.signed_check);

        let probes = if self.settings.probe_signatures {
            let digests: BTreeSet<&Digest> = build
                .index
                .iter()
                .filter(|(tag, _)| signature_target(tag).is_none())
                .map(|(_, d)| &d.digest)
                .collect();
            Some(self.probe(repository, digests).await?)
        } else {
            None
        };

        let mut report = ScanReport {
            repository: repository.to_string(),
            scanned_at,
            signed_check: self.settings.signed_check,
            tags: Vec::new(),
            signatures: Vec::new(),
            orphaned_signatures: correlator.orphaned_signatures(),
            failures: build.failures.into_iter().map(FailureReport::from).collect(),
            summary: ScanSummary {
                listed: tags.len(),
                ..ScanSummary::default()
            },
        };

        for (tag, descriptor) in build.index.iter() {
            if let Some(target) = signature_target(tag) {
                report.signatures.push(SignatureReport {
                    tag: tag.to_string(),
                    digest: descriptor.digest.clone(),
                    media_type: descriptor.media_type.clone(),
                    target: target.to_string(),
                    used: correlator.is_signature_used(tag),
                });
                continue;
            }

            let digest = &descriptor.digest;
            let entry = TagReport {
                tag: tag.to_string(),
                digest: digest.clone(),
                media_type: descriptor.media_type.clone(),
                signature_tag: sig_tag_for(digest),
                signed_by_listing: correlator.is_signed(digest),
                signed_by_probe: probes
                    .as_ref()
                    .map(|p| p.get(digest).copied().unwrap_or(false)),
            };
            if entry.detectors_disagree() {
                warn!(
                    "Signed checks disagree for {} ({}): listing={}, probe={}",
                    entry.tag,
                    digest,
                    entry.signed_by_listing,
                    entry.signed_by_probe.unwrap_or_default()
                );
            }
            report.tags.push(entry);
        }

        let summary = &mut report.summary;
        summary.ordinary = report.tags.len();
        summary.signatures = report.signatures.len();
        summary.signed = report.tags.iter().filter(|t| t.signed_by_listing).count();
        summary.unsigned = summary.ordinary - summary.signed;
        summary.orphaned = report.orphaned_signatures.len();
        summary.failed = report.failures.len();
        summary.disagreements = report.tags.iter().filter(|t| t.detectors_disagree()).count();

        info!(
            "Scan of {} complete: {} signed, {} unsigned, {} orphaned signatures, {} failed",
            repository, summary.signed, summary.unsigned, summary.orphaned, summary.failed
        );
        Ok(report)
    }

    /// Resolve one image and run both signed checks for it
    pub async fn inspect(&self, image: &ImageReference) -> Result<InspectReport, ScanError> {
        let repository = &image.repository;
        let descriptor = self
            .registry
            .get_descriptor(image)
            .await
            .map_err(|e| match e {
                RegistryError::Cancelled { .. } => ScanError::Cancelled,
                source => ScanError::TagFailed {
                    tag: image.reference.to_string(),
                    source,
                },
            })?;
        let tags = self.list_tags(repository).await?;

        let tag = image.reference.to_string();
        let mut index = TagIndex::new();
        index.insert(tag.clone(), descriptor.clone());
        let correlator = SignatureCorrelator::new(&index, &tags, self.settings.signed_check);

        let signed_by_probe = if self.settings.probe_signatures {
            let probes = self.probe(repository, BTreeSet::from([&descriptor.digest])).await?;
            probes.get(&descriptor.digest).copied()
        } else {
            None
        };

        Ok(InspectReport {
            image: image.to_string(),
            signature_tag: sig_tag_for(&descriptor.digest),
            signs: signature_target(&tag).map(str::to_string),
            signed_by_listing: correlator.is_signed(&descriptor.digest),
            signed_by_probe,
            digest: descriptor.digest,
            media_type: descriptor.media_type,
            size: descriptor.size,
        })
    }

    async fn list_tags(&self, repository: &RepositoryRef) -> Result<Vec<String>, ScanError> {
        self.registry
            .list_tags(repository)
            .await
            .map_err(|e| match e {
                RegistryError::Cancelled { .. } => ScanError::Cancelled,
                source => ScanError::ListTags {
                    repository: repository.to_string(),
                    source,
                },
            })
    }

    /// Existence probe per distinct digest, bounded like the index build
    async fn probe(
        &self,
        repository: &RepositoryRef,
        digests: BTreeSet<&Digest>,
    ) -> Result<HashMap<Digest, bool>, ScanError> {
        debug!("Probing signatures for {} digests", digests.len());

        let semaphore = Semaphore::new(self.settings.concurrency.max(1));
        let mut pending = FuturesUnordered::new();
        for digest in digests {
            let semaphore = &semaphore;
            pending.push(async move {
                let _permit = semaphore.acquire().await.ok();
                let signed = is_signed_by_get(&self.registry, repository, digest).await;
                (digest, signed)
            });
        }

        let mut results = HashMap::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ScanError::Cancelled),
                next = pending.next() => next,
            };
            let Some((digest, signed)) = next else {
                break;
            };
            results.insert(digest.clone(), signed);
        }

        // A probe interrupted by cancellation reports false; don't trust it.
        if self.cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        Ok(results)
    }
}
