//! Full repository scan

use anyhow::{bail, Context, Result};
use camino::Utf8Path;
use console::style;
use sigscan_image::{Digest, ScanReport, SignatureReport, TagReport};
use tabled::{settings::Style as TableStyle, Table, Tabled};
use tokio_util::sync::CancellationToken;

use crate::cli::ScanArgs;
use crate::output;

pub async fn run(
    args: ScanArgs,
    config_path: Option<&Utf8Path>,
    cancel: CancellationToken,
) -> Result<()> {
    let config = super::load_config(config_path)?;
    let repository = super::repository(&config)?;

    let mut settings = config.settings.clone();
    if let Some(concurrency) = args.concurrency {
        if concurrency == 0 {
            bail!("--concurrency must be at least 1");
        }
        settings.concurrency = concurrency;
    }
    if let Some(mode) = args.signed_check {
        settings.signed_check = mode.into();
    }
    settings.fail_fast |= args.fail_fast;
    settings.probe_signatures &= !args.no_probe;

    let scanner = super::scanner(&config, settings, cancel)?;

    let spinner = (!args.json).then(|| output::spinner(&format!("Scanning {}", repository)));
    let result = scanner.scan(&repository).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let report = result.with_context(|| format!("Scan of {} failed", repository))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render(&report);
    }

    if !report.is_complete() && !args.allow_partial {
        bail!(
            "{} of {} tags could not be resolved (pass --allow-partial to accept partial results)",
            report.summary.failed,
            report.summary.listed
        );
    }
    Ok(())
}

fn short_digest(digest: &Digest) -> String {
    format!("{}:{}", digest.algorithm(), output::short_hex(digest.hex()))
}

#[derive(Tabled)]
struct TagRow {
    tag: String,
    digest: String,
    #[tabled(rename = "media type")]
    media_type: String,
    #[tabled(rename = "signed (listing)")]
    signed_by_listing: String,
    #[tabled(rename = "signed (probe)")]
    signed_by_probe: String,
}

impl From<&TagReport> for TagRow {
    fn from(tag: &TagReport) -> Self {
        let mut probe = output::check(tag.signed_by_probe);
        if tag.detectors_disagree() {
            probe.push_str(" !");
        }
        Self {
            tag: tag.tag.clone(),
            digest: short_digest(&tag.digest),
            media_type: tag.media_type.clone(),
            signed_by_listing: output::check(Some(tag.signed_by_listing)),
            signed_by_probe: probe,
        }
    }
}

#[derive(Tabled)]
struct SignatureRow {
    #[tabled(rename = "signature tag")]
    tag: String,
    digest: String,
    #[tabled(rename = "media type")]
    media_type: String,
    target: String,
    status: String,
}

impl From<&SignatureReport> for SignatureRow {
    fn from(sig: &SignatureReport) -> Self {
        Self {
            tag: sig.tag.clone(),
            digest: short_digest(&sig.digest),
            media_type: sig.media_type.clone(),
            target: format!("sha256:{}", output::short_hex(&sig.target)),
            status: if sig.used {
                style("used").green().to_string()
            } else {
                style("orphaned").yellow().to_string()
            },
        }
    }
}

fn render(report: &ScanReport) {
    output::header(&format!("Repository {}", report.repository));
    output::kv("Scanned at", &report.scanned_at.to_rfc3339());
    output::kv("Tags listed", &report.summary.listed.to_string());

    if report.tags.is_empty() {
        output::info("No image tags found");
    } else {
        let rows: Vec<TagRow> = report.tags.iter().map(TagRow::from).collect();
        println!("{}", Table::new(&rows).with(TableStyle::rounded()));
    }

    if !report.signatures.is_empty() {
        output::header("Signatures");
        let rows: Vec<SignatureRow> = report.signatures.iter().map(SignatureRow::from).collect();
        println!("{}", Table::new(&rows).with(TableStyle::rounded()));
    }

    if !report.failures.is_empty() {
        output::header("Failures");
        for failure in &report.failures {
            output::error(&format!("{}: {}", failure.tag, failure.error));
        }
    }

    let summary = &report.summary;
    println!();
    if summary.unsigned == 0 && summary.ordinary > 0 {
        output::success(&format!("All {} tags are signed", summary.ordinary));
    } else {
        output::info(&format!(
            "{} signed, {} unsigned",
            style(summary.signed).green().bold(),
            style(summary.unsigned).red().bold()
        ));
    }
    if summary.orphaned > 0 {
        output::warning(&format!(
            "{} orphaned signature(s): {}",
            summary.orphaned,
            report.orphaned_signatures.join(", ")
        ));
    }
    if summary.disagreements > 0 {
        output::warning(&format!(
            "Listing and probe disagree for {} tag(s) (marked !); the tag listing may be incomplete",
            summary.disagreements
        ));
    }
}
