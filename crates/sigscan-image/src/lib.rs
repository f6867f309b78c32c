//! Registry signature scanning for sigscan
//!
//! This crate provides functionality for:
//! - Querying OCI-compatible container registries (tags, manifest descriptors)
//! - Indexing every tag of a repository by the digest it resolves to
//! - Correlating tags with `sha256-<hex>.sig` signature artifacts, both by
//!   tag listing and by direct probe, and finding orphaned signatures
//!
//! # Example
//!
//! ```no_run
//! use sigscan_core::{Credentials, ScanSettings};
//! use sigscan_image::{RegistryClient, RepositoryRef, Scanner};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RegistryClient::new(Credentials::Anonymous)?;
//!     let scanner = Scanner::new(client, ScanSettings::default(), CancellationToken::new());
//!
//!     let repository = RepositoryRef::new("iad.ocir.io", "tenancy/app")?;
//!     let report = scanner.scan(&repository).await?;
//!
//!     for tag in &report.tags {
//!         println!("{} {} signed={}", tag.tag, tag.digest, tag.signed_by_listing);
//!     }
//!     println!("orphaned: {:?}", report.orphaned_signatures);
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod correlate;
pub mod error;
pub mod index;
pub mod registry;
pub mod retrying;
pub mod scan;
pub mod signature;
pub mod types;

// Re-export main types for convenience
pub use auth::Authenticator;
pub use correlate::{is_signed_by_get, SignatureCorrelator};
pub use error::{RegistryError, ScanError};
pub use index::{FailurePolicy, IndexBuild, IndexBuilder, TagFailure, TagIndex};
pub use registry::{Registry, RegistryClient};
pub use retrying::{RetryingRegistry, TransientErrors};
pub use scan::{
    FailureReport, InspectReport, ScanReport, ScanSummary, Scanner, SignatureReport, TagReport,
};
pub use signature::{digest_of, is_signature_tag, sig_tag_for, sig_tag_of, signature_target};
pub use types::{Descriptor, Digest, ImageReference, Reference, RepositoryRef};

/// Version of the sigscan-image crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
