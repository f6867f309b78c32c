//! Settings shared between the configuration file and the scanning engine

use serde::{Deserialize, Serialize};

/// Tuning knobs for a scan run, read from the `scan:` block of config.yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Maximum number of registry calls in flight at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Abort the whole run on the first tag that cannot be resolved
    #[serde(default)]
    pub fail_fast: bool,

    /// How the listing-based signed check matches tags
    #[serde(default)]
    pub signed_check: SignedCheckMode,

    /// Probe the registry for `sha256-<hex>.sig` per resolved tag
    #[serde(default = "default_probe_signatures")]
    pub probe_signatures: bool,

    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Retry policy applied to every registry call
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            fail_fast: false,
            signed_check: SignedCheckMode::default(),
            probe_signatures: default_probe_signatures(),
            request_timeout_secs: default_request_timeout(),
            retry: RetryPolicy::default(),
        }
    }
}

fn default_concurrency() -> usize {
    8
}
fn default_probe_signatures() -> bool {
    true
}
fn default_request_timeout() -> u64 {
    30
}

/// Matching rule for the listing-based signed check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SignedCheckMode {
    /// The listing must contain exactly `sha256-<hex>.sig`
    #[default]
    Exact,
    /// Any tag whose text contains the hex counts as a signature
    Substring,
}

/// Retry policy for an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Retry strategy
    #[serde(default)]
    pub strategy: RetryStrategy,

    /// Backoff multiplier for exponential strategies
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            strategy: RetryStrategy::default(),
            backoff_multiplier: default_backoff_multiplier(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            strategy: RetryStrategy::None,
            ..Self::default()
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_initial_delay() -> u64 {
    250
}
fn default_max_delay() -> u64 {
    10_000
}

/// Retry strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    /// No delay between attempts
    None,

    /// Fixed delay between retries
    FixedDelay,

    /// Exponential backoff (default)
    #[default]
    ExponentialBackoff,

    /// Linear backoff
    LinearBackoff,
}
