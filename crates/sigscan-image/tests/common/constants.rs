//! Shared constants and small factories for test data

use sigscan_core::{RetryPolicy, ScanSettings, SignedCheckMode};
use sigscan_image::{Descriptor, Digest, RepositoryRef};

pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const NAMESPACE_REPO: &str = "ns/app";

pub const HEX_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
pub const HEX_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
pub const HEX_C: &str = "cccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccc";
pub const HEX_D: &str = "dddddddddddddddddddddddddddddddddddddddddddddddddddddddddddddddd";
pub const HEX_E: &str = "eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";

pub fn digest(hex: &str) -> Digest {
    Digest::sha256(hex).unwrap()
}

pub fn descriptor(hex: &str) -> Descriptor {
    Descriptor {
        digest: digest(hex),
        media_type: OCI_MANIFEST.to_string(),
        size: Some(512),
    }
}

pub fn repo() -> RepositoryRef {
    RepositoryRef::new("registry.test", NAMESPACE_REPO).unwrap()
}

/// Settings with retries disabled so failing tags fail immediately
pub fn settings() -> ScanSettings {
    ScanSettings {
        retry: RetryPolicy::no_retry(),
        ..ScanSettings::default()
    }
}

pub fn settings_with_mode(mode: SignedCheckMode) -> ScanSettings {
    ScanSettings {
        signed_check: mode,
        ..settings()
    }
}
