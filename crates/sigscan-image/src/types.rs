use crate::error::RegistryError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Character set of a repository path component; OCIR compartment OCIDs
/// (`ocid1.compartment.oc1..aaaa`) fall outside the stricter OCI grammar
static PATH_COMPONENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9._-]+$").expect("path component regex is valid")
});

const MAX_REPOSITORY_LEN: usize = 255;

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9._-]{0,127}$").expect("tag regex is valid")
});

static ALGORITHM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:[+._-][a-z0-9]+)*$").expect("digest algorithm regex is valid")
});

static SHA256_HEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-f]{64}$").expect("sha256 hex regex is valid")
});

/// Content digest of a manifest, e.g. `sha256:3f1c...`
///
/// The algorithm and the hex payload are kept apart; signature tags are
/// derived from the hex alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest {
    algorithm: String,
    hex: String,
}

impl Digest {
    /// Parse an `algorithm:hex` digest string
    pub fn parse(s: &str) -> Result<Self, RegistryError> {
        let (algorithm, hex) = s
            .split_once(':')
            .ok_or_else(|| RegistryError::reference_parse(s, "digest must be <algorithm>:<hex>"))?;

        if !ALGORITHM.is_match(algorithm) {
            return Err(RegistryError::reference_parse(s, "invalid digest algorithm"));
        }
        if algorithm == "sha256" && !SHA256_HEX.is_match(hex) {
            return Err(RegistryError::reference_parse(
                s,
                "sha256 digest must be 64 lowercase hex characters",
            ));
        }
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(RegistryError::reference_parse(s, "invalid digest payload"));
        }

        Ok(Self {
            algorithm: algorithm.to_string(),
            hex: hex.to_string(),
        })
    }

    /// Build a sha256 digest from its hex payload
    pub fn sha256(hex: &str) -> Result<Self, RegistryError> {
        Self::parse(&format!("sha256:{}", hex))
    }

    /// sha256 digest of raw manifest bytes
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self {
            algorithm: "sha256".to_string(),
            hex: hex::encode(Sha256::digest(bytes)),
        }
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Hex payload without the algorithm prefix
    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl FromStr for Digest {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Digest {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.to_string()
    }
}

/// What the registry reports for a manifest reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub digest: Digest,
    pub media_type: String,
    pub size: Option<u64>,
}

/// A repository on a specific registry, e.g. `iad.ocir.io` + `tenancy/app`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    /// Registry host, with an optional `http://` or `https://` scheme
    pub registry: String,
    /// Repository path (e.g., "tenancy-ns/app")
    pub repository: String,
}

impl RepositoryRef {
    /// Validate and build a repository reference
    pub fn new(registry: &str, repository: &str) -> Result<Self, RegistryError> {
        let registry = registry.trim().trim_end_matches('/');
        let host = strip_scheme(registry);
        let display = format!("{}/{}", host, repository);

        if host.is_empty() || host.contains('/') || host.chars().any(char::is_whitespace) {
            return Err(RegistryError::reference_parse(display, "invalid registry host"));
        }
        if repository.is_empty() {
            return Err(RegistryError::reference_parse(display, "empty repository"));
        }
        if repository.len() > MAX_REPOSITORY_LEN {
            return Err(RegistryError::reference_parse(
                display,
                format!("repository longer than {} characters", MAX_REPOSITORY_LEN),
            ));
        }
        if let Some(bad) = repository
            .split('/')
            .find(|component| !PATH_COMPONENT.is_match(component))
        {
            return Err(RegistryError::reference_parse(
                display,
                format!("invalid repository path component '{}'", bad),
            ));
        }

        Ok(Self {
            registry: registry.to_string(),
            repository: repository.to_string(),
        })
    }

    /// Registry host without scheme
    pub fn host(&self) -> &str {
        strip_scheme(&self.registry)
    }

    /// Base URL for API calls; bare hosts default to https
    pub fn base_url(&self) -> String {
        if self.registry.starts_with("http://") || self.registry.starts_with("https://") {
            self.registry.clone()
        } else {
            format!("https://{}", self.registry)
        }
    }

    /// Reference a tag in this repository
    pub fn tag(&self, tag: &str) -> Result<ImageReference, RegistryError> {
        if !TAG.is_match(tag) {
            return Err(RegistryError::reference_parse(
                format!("{}:{}", self, tag),
                "invalid tag",
            ));
        }
        Ok(ImageReference {
            repository: self.clone(),
            reference: Reference::Tag(tag.to_string()),
        })
    }

    /// Reference a manifest by digest in this repository
    pub fn digest(&self, digest: &Digest) -> ImageReference {
        ImageReference {
            repository: self.clone(),
            reference: Reference::Digest(digest.clone()),
        }
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host(), self.repository)
    }
}

fn strip_scheme(registry: &str) -> &str {
    registry
        .strip_prefix("https://")
        .or_else(|| registry.strip_prefix("http://"))
        .unwrap_or(registry)
}

/// Tag or digest part of an image reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    Tag(String),
    Digest(Digest),
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Tag(tag) => write!(f, "{}", tag),
            Reference::Digest(digest) => write!(f, "{}", digest),
        }
    }
}

/// Container image reference with registry, repository, and tag/digest
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    pub repository: RepositoryRef,
    pub reference: Reference,
}

impl ImageReference {
    /// Parse `host[:port]/path[:tag|@digest]`; the tag defaults to `latest`
    pub fn parse(s: &str) -> Result<Self, RegistryError> {
        let (image_part, digest) = match s.split_once('@') {
            Some((before, after)) => (before, Some(after)),
            None => (s, None),
        };

        let (registry_repo, tag) = match (digest, image_part.rfind(':')) {
            (Some(_), _) => (image_part, None),
            // A ':' followed by a '/' belongs to the registry port
            (None, Some(idx)) if !image_part[idx + 1..].contains('/') => {
                (&image_part[..idx], Some(&image_part[idx + 1..]))
            }
            (None, _) => (image_part, Some("latest")),
        };

        let (registry, repository) = registry_repo
            .split_once('/')
            .ok_or_else(|| RegistryError::reference_parse(s, "expected <registry>/<repository>"))?;
        let repository = RepositoryRef::new(registry, repository)?;

        match (tag, digest) {
            (_, Some(digest)) => Ok(repository.digest(&Digest::parse(digest)?)),
            (Some(tag), None) => repository.tag(tag),
            (None, None) => repository.tag("latest"),
        }
    }
}

impl FromStr for ImageReference {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reference {
            Reference::Tag(tag) => write!(f, "{}:{}", self.repository, tag),
            Reference::Digest(digest) => write!(f, "{}@{}", self.repository, digest),
        }
    }
}
