//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use sigscan_core::SignedCheckMode;

/// sigscan - find unsigned image tags and orphaned signatures in a registry repository
#[derive(Parser, Debug)]
#[command(name = "sigscan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to config file (default: ./config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan every tag of the configured repository
    Scan(ScanArgs),

    /// Resolve a single tag and check whether it is signed
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Abort on the first tag that cannot be resolved
    #[arg(long)]
    pub fail_fast: bool,

    /// Maximum concurrent registry requests (overrides scan.concurrency)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// How tag listings are matched against signature tags
    #[arg(long, value_enum)]
    pub signed_check: Option<SignedCheckArg>,

    /// Skip the per-digest signature existence probe
    #[arg(long)]
    pub no_probe: bool,

    /// Exit successfully even if some tags could not be resolved
    #[arg(long)]
    pub allow_partial: bool,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Tag, or full reference (registry/repo:tag or registry/repo@digest).
    /// Defaults to image_tag from the config file.
    pub tag: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Skip the signature existence probe
    #[arg(long)]
    pub no_probe: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignedCheckArg {
    /// Listing must contain exactly sha256-<hex>.sig
    Exact,
    /// Any listed tag containing the digest hex counts
    Substring,
}

impl From<SignedCheckArg> for SignedCheckMode {
    fn from(arg: SignedCheckArg) -> Self {
        match arg {
            SignedCheckArg::Exact => SignedCheckMode::Exact,
            SignedCheckArg::Substring => SignedCheckMode::Substring,
        }
    }
}
