//! sigscan - audit container image tags for signature artifacts
//!
//! This is the main entry point for the sigscan command-line interface.

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use sigscan_image::ScanError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

/// Exit status after an interrupted run (128 + SIGINT)
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls crypto provider (required for rustls 0.23+)
    // This must be done before any TLS operations
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let cancel = CancellationToken::new();
    watch_ctrl_c(cancel.clone());

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Scan(args) => commands::scan::run(args, config, cancel).await,
        Commands::Inspect(args) => commands::inspect::run(args, config, cancel).await,
    };

    if let Err(e) = &result {
        if matches!(e.downcast_ref::<ScanError>(), Some(ScanError::Cancelled)) {
            output::warning("Interrupted");
            std::process::exit(EXIT_INTERRUPTED);
        }
    }
    result
}

/// First Ctrl-C cancels outstanding registry calls; a second one exits at once
fn watch_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !cancel.is_cancelled() {
                eprintln!("Ctrl+C: cancelling scan (press again to force)");
                cancel.cancel();
            } else {
                std::process::exit(EXIT_INTERRUPTED);
            }
        }
    });
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            // Phase progress at info; -v adds per-request detail
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
