//! In-memory registry for correlation and scan scenarios
//!
//! The tag listing and the set of resolvable manifests are kept apart, so a
//! test can hide a tag from the listing while it stays fetchable (a truncated
//! or paginated listing), or list a tag that then fails to resolve.

use async_trait::async_trait;
use sigscan_image::{
    sig_tag_of, Descriptor, ImageReference, Reference, Registry, RegistryError, RepositoryRef,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::constants::descriptor;

#[derive(Default)]
pub struct FakeRegistry {
    listing: Vec<String>,
    manifests: HashMap<String, Descriptor>,
    failures: HashMap<String, u16>,
    listing_status: Option<u16>,
    descriptor_calls: AtomicUsize,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listed tag resolving to `sha256:<hex>`
    pub fn tag(mut self, tag: &str, hex: &str) -> Self {
        self.listing.push(tag.to_string());
        self.manifests.insert(tag.to_string(), descriptor(hex));
        self
    }

    /// Listed signature tag for `target_hex`, itself stored at `own_hex`
    pub fn signature(self, target_hex: &str, own_hex: &str) -> Self {
        self.tag(&sig_tag_of(target_hex), own_hex)
    }

    /// Resolvable tag that the listing does not return
    pub fn unlisted(mut self, tag: &str, hex: &str) -> Self {
        self.manifests.insert(tag.to_string(), descriptor(hex));
        self
    }

    /// Listed tag whose descriptor request fails with `status`
    pub fn failing(mut self, tag: &str, status: u16) -> Self {
        self.listing.push(tag.to_string());
        self.failures.insert(tag.to_string(), status);
        self
    }

    /// Make the tag listing itself fail with `status`
    pub fn listing_fails(mut self, status: u16) -> Self {
        self.listing_status = Some(status);
        self
    }

    pub fn descriptor_calls(&self) -> usize {
        self.descriptor_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn list_tags(&self, repository: &RepositoryRef) -> Result<Vec<String>, RegistryError> {
        match self.listing_status {
            Some(status) => Err(RegistryError::communication(
                repository.to_string(),
                Some(status),
                format!("HTTP {}", status),
            )),
            None => Ok(self.listing.clone()),
        }
    }

    async fn get_descriptor(&self, image: &ImageReference) -> Result<Descriptor, RegistryError> {
        self.descriptor_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        let Reference::Tag(tag) = &image.reference else {
            return Err(RegistryError::not_found(image.to_string()));
        };
        if let Some(status) = self.failures.get(tag) {
            return Err(RegistryError::communication(
                image.to_string(),
                Some(*status),
                format!("HTTP {}", status),
            ));
        }
        self.manifests
            .get(tag)
            .cloned()
            .ok_or_else(|| RegistryError::not_found(image.to_string()))
    }
}
