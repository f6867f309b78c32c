//! Naming convention for detached signature artifacts
//!
//! A signature for manifest `sha256:<hex>` is stored under the tag
//! `sha256-<hex>.sig` in the same repository. Both directions of the mapping
//! are pure string functions, so correlation never needs to fetch the
//! signature manifest itself.

use crate::types::Digest;
use regex::Regex;
use std::sync::LazyLock;

/// Prefix of every signature tag
pub const SIGNATURE_PREFIX: &str = "sha256-";

/// Suffix of every signature tag
pub const SIGNATURE_SUFFIX: &str = ".sig";

static SIGNATURE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^sha256-[0-9a-f]{64}\.sig$").expect("signature tag regex is valid")
});

/// Signature tag for a sha256 hex payload
pub fn sig_tag_of(hex: &str) -> String {
    format!("{}{}{}", SIGNATURE_PREFIX, hex, SIGNATURE_SUFFIX)
}

/// Signature tag for a digest
pub fn sig_tag_for(digest: &Digest) -> String {
    sig_tag_of(digest.hex())
}

/// Recover the hex payload a signature tag points at.
///
/// Total: the prefix and suffix are stripped when present, so any input maps
/// to some string. Only meaningful for tags where [`is_signature_tag`] holds.
pub fn digest_of(sig_tag: &str) -> &str {
    let without_prefix = sig_tag.strip_prefix(SIGNATURE_PREFIX).unwrap_or(sig_tag);
    without_prefix
        .strip_suffix(SIGNATURE_SUFFIX)
        .unwrap_or(without_prefix)
}

/// Whether `tag` has the exact shape `sha256-<64 lowercase hex>.sig`
pub fn is_signature_tag(tag: &str) -> bool {
    SIGNATURE_TAG.is_match(tag)
}

/// Hex payload of a well-formed signature tag
pub fn signature_target(tag: &str) -> Option<&str> {
    is_signature_tag(tag).then(|| digest_of(tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex_of(seed: u8) -> String {
        (0..32).map(|i| format!("{:02x}", seed.wrapping_add(i * 7))).collect()
    }

    #[test]
    fn test_round_trip() {
        for seed in [0u8, 1, 17, 128, 255] {
            let hex = hex_of(seed);
            assert_eq!(hex.len(), 64);
            let tag = sig_tag_of(&hex);
            assert!(is_signature_tag(&tag));
            assert_eq!(digest_of(&tag), hex);
            assert_eq!(signature_target(&tag), Some(hex.as_str()));
        }
    }

    #[test]
    fn test_sig_tag_for_digest() {
        let hex = hex_of(3);
        let digest = Digest::sha256(&hex).unwrap();
        assert_eq!(sig_tag_for(&digest), format!("sha256-{}.sig", hex));
    }

    #[test]
    fn test_signature_shape() {
        let hex = hex_of(9);
        assert!(is_signature_tag(&format!("sha256-{}.sig", hex)));

        assert!(!is_signature_tag("v1"));
        assert!(!is_signature_tag("latest.sig"));
        assert!(!is_signature_tag(&format!("sha256-{}.sig", &hex[..63])));
        assert!(!is_signature_tag(&format!("sha256-{}.sig", hex.to_uppercase())));
        assert!(!is_signature_tag(&format!("sha256-{}.att", hex)));
        assert!(!is_signature_tag(&format!("sha512-{}.sig", hex)));
        assert!(!is_signature_tag(&format!("v1-sha256-{}.sig", hex)));
        assert!(!is_signature_tag(&format!("sha256-{}.sig.bak", hex)));
    }

    #[test]
    fn test_digest_of_is_total() {
        assert_eq!(digest_of("v1"), "v1");
        assert_eq!(digest_of("sha256-abc"), "abc");
        assert_eq!(digest_of("abc.sig"), "abc");
        assert_eq!(signature_target("sha256-abc.sig"), None);
    }
}
