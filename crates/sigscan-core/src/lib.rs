//! # sigscan-core
//!
//! Core library for the sigscan CLI providing:
//! - Configuration file parsing (config.yaml) and credential resolution
//! - Shared scan settings types
//! - Retry execution engine with policy-based configuration and cancellation

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

pub use config::{Credentials, ScanConfig, DEFAULT_CONFIG_FILE};
pub use error::{Error, Result};
pub use types::{RetryPolicy, RetryStrategy, ScanSettings, SignedCheckMode};
