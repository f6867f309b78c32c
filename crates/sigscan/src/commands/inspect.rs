//! Single-tag inspection

use anyhow::{anyhow, Context, Result};
use camino::Utf8Path;
use sigscan_core::ScanConfig;
use sigscan_image::{ImageReference, InspectReport};
use tokio_util::sync::CancellationToken;

use crate::cli::InspectArgs;
use crate::output;

pub async fn run(
    args: InspectArgs,
    config_path: Option<&Utf8Path>,
    cancel: CancellationToken,
) -> Result<()> {
    let config = super::load_config(config_path)?;
    let image = image_reference(&config, args.tag.as_deref())?;

    let mut settings = config.settings.clone();
    settings.probe_signatures &= !args.no_probe;
    let scanner = super::scanner(&config, settings, cancel)?;

    let report = scanner
        .inspect(&image)
        .await
        .with_context(|| format!("Failed to inspect {}", image))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render(&report);
    }
    Ok(())
}

/// A full reference is used as given; a bare tag is looked up in the configured repository
fn image_reference(config: &ScanConfig, tag: Option<&str>) -> Result<ImageReference> {
    let tag = tag.or(config.image_tag.as_deref()).ok_or_else(|| {
        anyhow!("No tag given and image_tag is not set in the configuration file")
    })?;

    if tag.contains('/') {
        return ImageReference::parse(tag).with_context(|| format!("Invalid image reference {}", tag));
    }
    super::repository(config)?
        .tag(tag)
        .with_context(|| format!("Invalid tag {}", tag))
}

fn render(report: &InspectReport) {
    output::header(&report.image);
    output::kv("Digest", &report.digest.to_string());
    output::kv("Media type", &report.media_type);
    if let Some(size) = report.size {
        output::kv("Size", &format!("{} bytes", size));
    }
    output::kv("Signature tag", &report.signature_tag);
    output::kv("Signed (listing)", &output::check(Some(report.signed_by_listing)));
    output::kv("Signed (probe)", &output::check(report.signed_by_probe));
    if let Some(target) = &report.signs {
        output::info(&format!(
            "This tag is a signature artifact for sha256:{}",
            target
        ));
    }

    if report.signed_by_probe.is_some_and(|p| p != report.signed_by_listing) {
        output::warning("Listing and probe disagree; the tag listing may be incomplete");
    }
}
