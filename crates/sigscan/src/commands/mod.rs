//! Command implementations

pub mod inspect;
pub mod scan;

use anyhow::{Context, Result};
use camino::Utf8Path;
use sigscan_core::{ScanConfig, ScanSettings};
use sigscan_image::{RegistryClient, RepositoryRef, Scanner};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Load config.yaml (or the `--config` path)
fn load_config(path: Option<&Utf8Path>) -> Result<ScanConfig> {
    ScanConfig::load(path).context("Failed to load configuration")
}

/// The repository named by the configuration
fn repository(config: &ScanConfig) -> Result<RepositoryRef> {
    RepositoryRef::new(&config.registry_url, &config.repository_path()).with_context(|| {
        format!(
            "Invalid repository {}/{}",
            config.registry_url,
            config.repository_path()
        )
    })
}

/// HTTP-backed scanner using the configured credentials and `settings`
fn scanner(
    config: &ScanConfig,
    settings: ScanSettings,
    cancel: CancellationToken,
) -> Result<Scanner<RegistryClient>> {
    debug!(
        "Connecting to {} with {} authentication",
        config.registry_url,
        config.credentials.scheme()
    );
    let client = RegistryClient::from_config(config).context("Failed to create registry client")?;
    Ok(Scanner::new(client, settings, cancel))
}
