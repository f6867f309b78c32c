//! Retry execution engine for registry calls
//!
//! Every registry round trip goes through a [`RetryExecutor`]: transient
//! failures are retried with the configured backoff, permanent ones surface
//! immediately, and a [`CancellationToken`](tokio_util::sync::CancellationToken)
//! aborts both the in-flight attempt and any pending backoff sleep.
//!
//! # Example
//!
//! ```rust,no_run
//! use sigscan_core::retry::{RetryError, RetryExecutor, TracingObserver};
//! use sigscan_core::types::RetryPolicy;
//!
//! async fn example() -> Result<String, RetryError<std::io::Error>> {
//!     RetryExecutor::new(RetryPolicy::default())
//!         .with_observer(TracingObserver::new("list tags"))
//!         .execute(|| async { Ok("v1".to_string()) })
//!         .await
//! }
//! ```

mod error;
mod executor;
mod observer;
mod strategies;

pub use error::RetryError;
pub use executor::RetryExecutor;
pub use observer::{NoOpObserver, RetryObserver, TracingObserver};
pub use strategies::{calculate_delay, AlwaysRetry, HttpStatusPredicate, NeverRetry, RetryPredicate};
