//! Classifies digests as signed/unsigned and signature tags as used/orphaned

use crate::index::TagIndex;
use crate::registry::Registry;
use crate::signature::{digest_of, sig_tag_for};
use crate::types::{Digest, RepositoryRef};
use sigscan_core::SignedCheckMode;
use std::collections::HashSet;
use tracing::debug;

/// Correlates a tag listing and its resolved index.
///
/// The listing-based check and the registry probe ([`is_signed_by_get`]) are
/// independent detectors; they are reported side by side and never merged.
#[derive(Debug)]
pub struct SignatureCorrelator<'a> {
    index: &'a TagIndex,
    listing: &'a [String],
    listed: HashSet<&'a str>,
    ordinary: HashSet<&'a str>,
    mode: SignedCheckMode,
}

impl<'a> SignatureCorrelator<'a> {
    pub fn new(index: &'a TagIndex, listing: &'a [String], mode: SignedCheckMode) -> Self {
        Self {
            index,
            listing,
            listed: listing.iter().map(String::as_str).collect(),
            ordinary: index.ordinary_digests(),
            mode,
        }
    }

    pub fn mode(&self) -> SignedCheckMode {
        self.mode
    }

    /// Whether the tag listing holds a signature for `digest`
    pub fn is_signed(&self, digest: &Digest) -> bool {
        match self.mode {
            SignedCheckMode::Exact => self.listed.contains(sig_tag_for(digest).as_str()),
            SignedCheckMode::Substring => {
                self.listing.iter().any(|tag| tag.contains(digest.hex()))
            }
        }
    }

    /// Whether some ordinary tag still resolves to the digest `sig_tag` names
    pub fn is_signature_used(&self, sig_tag: &str) -> bool {
        self.ordinary.contains(digest_of(sig_tag))
    }

    /// Signature tags whose target digest no longer has an ordinary tag, sorted
    pub fn orphaned_signatures(&self) -> Vec<String> {
        self.index
            .signature_tags()
            .filter(|tag| !self.is_signature_used(tag))
            .map(str::to_string)
            .collect()
    }
}

/// Whether the registry serves `sha256-<hex>.sig` for `digest`.
///
/// Any failure, not-found or otherwise, counts as unsigned.
pub async fn is_signed_by_get<R: Registry + ?Sized>(
    registry: &R,
    repository: &RepositoryRef,
    digest: &Digest,
) -> bool {
    let image = match repository.tag(&sig_tag_for(digest)) {
        Ok(image) => image,
        Err(e) => {
            debug!("Cannot build signature reference for {}: {}", digest, e);
            return false;
        }
    };

    match registry.get_descriptor(&image).await {
        Ok(_) => true,
        Err(e) if e.is_not_found() => false,
        Err(e) => {
            debug!("Signature probe for {} failed: {}", image, e);
            false
        }
    }
}
