//! Retry observation and logging

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Observer trait for retry attempt events
pub trait RetryObserver: Send + Sync {
    /// Called when an attempt is about to start (1-indexed)
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32);

    /// Called when an attempt fails and will be retried after `delay`
    fn on_attempt_failed(&self, attempt: u32, error: &dyn Display, delay: Duration);

    /// Called when the operation succeeds
    fn on_success(&self, attempt: u32, total_duration: Duration);

    /// Called when all retry attempts are exhausted
    fn on_exhausted(&self, attempts: u32, final_error: &dyn Display);

    /// Called when the run stops early, either on a permanent error or on cancellation
    fn on_cancelled(&self, attempt: u32, error: Option<&dyn Display>) {
        let _ = (attempt, error);
    }
}

impl<T: RetryObserver + ?Sized> RetryObserver for Arc<T> {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        (**self).on_attempt_start(attempt, max_attempts)
    }

    fn on_attempt_failed(&self, attempt: u32, error: &dyn Display, delay: Duration) {
        (**self).on_attempt_failed(attempt, error, delay)
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        (**self).on_success(attempt, total_duration)
    }

    fn on_exhausted(&self, attempts: u32, final_error: &dyn Display) {
        (**self).on_exhausted(attempts, final_error)
    }

    fn on_cancelled(&self, attempt: u32, error: Option<&dyn Display>) {
        (**self).on_cancelled(attempt, error)
    }
}

/// A no-op observer
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {
    fn on_attempt_start(&self, _attempt: u32, _max_attempts: u32) {}

    fn on_attempt_failed(&self, _attempt: u32, _error: &dyn Display, _delay: Duration) {}

    fn on_success(&self, _attempt: u32, _total_duration: Duration) {}

    fn on_exhausted(&self, _attempts: u32, _final_error: &dyn Display) {}
}

/// An observer that logs retry events using the `tracing` crate
///
/// # Log Levels
///
/// - `on_attempt_start`: DEBUG (retries only)
/// - `on_attempt_failed`: WARN
/// - `on_success`: INFO after a retry, DEBUG otherwise
/// - `on_exhausted`: ERROR
/// - `on_cancelled`: DEBUG
#[derive(Debug, Clone)]
pub struct TracingObserver {
    operation: String,
}

impl TracingObserver {
    /// Create an observer labelled with the operation being retried
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }

    /// The operation label
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl RetryObserver for TracingObserver {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        if attempt > 1 {
            debug!(
                operation = %self.operation,
                "Attempt {}/{}", attempt, max_attempts
            );
        }
    }

    fn on_attempt_failed(&self, attempt: u32, error: &dyn Display, delay: Duration) {
        warn!(
            operation = %self.operation,
            "Attempt {} failed: {} (retrying in {}ms)",
            attempt,
            error,
            delay.as_millis()
        );
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        if attempt > 1 {
            info!(
                operation = %self.operation,
                "Succeeded on attempt {} after {:.2}s",
                attempt,
                total_duration.as_secs_f64()
            );
        } else {
            debug!(operation = %self.operation, "Succeeded");
        }
    }

    fn on_exhausted(&self, attempts: u32, final_error: &dyn Display) {
        error!(
            operation = %self.operation,
            "Giving up after {} attempts: {}", attempts, final_error
        );
    }

    fn on_cancelled(&self, attempt: u32, error: Option<&dyn Display>) {
        match error {
            Some(err) => debug!(
                operation = %self.operation,
                "Stopped at attempt {}: {}", attempt, err
            ),
            None => debug!(operation = %self.operation, "Cancelled at attempt {}", attempt),
        }
    }
}
