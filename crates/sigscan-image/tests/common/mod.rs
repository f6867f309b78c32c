//! Common test infrastructure for sigscan-image tests
//!
//! # Usage
//!
//! In your test file, add:
//! ```ignore
//! mod common;
//! use common::*;
//! ```
//!
//! # Modules
//!
//! - `constants`: Digests, media types and settings shared by the tests
//! - `fake_registry`: In-memory `Registry` with a separately controlled listing
//! - `mock_server`: Wiremock setup helpers for the OCI distribution endpoints

// Not every test binary uses every helper
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod constants;
pub mod fake_registry;
pub mod mock_server;

pub use constants::*;
pub use fake_registry::*;
pub use mock_server::*;
