//! Retry delay strategies and predicates

use crate::types::{RetryPolicy, RetryStrategy};
use rand::Rng;
use std::time::Duration;

/// Calculate the delay before the next retry attempt
///
/// `attempt` is the 1-indexed attempt that just failed. With jitter enabled
/// up to 25% is added on top of the capped delay.
///
/// ```rust
/// use sigscan_core::retry::calculate_delay;
/// use sigscan_core::types::{RetryPolicy, RetryStrategy};
///
/// let policy = RetryPolicy {
///     max_attempts: 3,
///     strategy: RetryStrategy::ExponentialBackoff,
///     backoff_multiplier: 2.0,
///     initial_delay_ms: 1000,
///     max_delay_ms: 30000,
/// };
///
/// assert_eq!(calculate_delay(&policy, 1, false).as_millis(), 1000);
/// assert_eq!(calculate_delay(&policy, 2, false).as_millis(), 2000);
/// ```
pub fn calculate_delay(policy: &RetryPolicy, attempt: u32, jitter: bool) -> Duration {
    let attempt_index = attempt.saturating_sub(1);

    let base_delay_ms = match policy.strategy {
        RetryStrategy::None => 0,
        RetryStrategy::FixedDelay => policy.initial_delay_ms,
        RetryStrategy::ExponentialBackoff => {
            let multiplier = policy.backoff_multiplier.powf(attempt_index as f64);
            (policy.initial_delay_ms as f64 * multiplier) as u64
        }
        RetryStrategy::LinearBackoff => {
            policy.initial_delay_ms.saturating_mul(attempt_index as u64 + 1)
        }
    };

    let capped_delay_ms = base_delay_ms.min(policy.max_delay_ms);

    let final_delay_ms = if jitter && capped_delay_ms > 0 {
        let jitter_range = capped_delay_ms / 4;
        capped_delay_ms + rand::rng().random_range(0..=jitter_range)
    } else {
        capped_delay_ms
    };

    Duration::from_millis(final_delay_ms)
}

/// Decides whether a failed attempt is worth repeating
pub trait RetryPredicate<E: ?Sized>: Send + Sync {
    /// Determine whether the given error should be retried
    fn should_retry(&self, error: &E) -> bool;
}

/// Every error is retryable
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl<E: ?Sized> RetryPredicate<E> for AlwaysRetry {
    fn should_retry(&self, _error: &E) -> bool {
        true
    }
}

/// No error is retryable
#[derive(Debug, Clone, Copy)]
pub struct NeverRetry;

impl<E: ?Sized> RetryPredicate<E> for NeverRetry {
    fn should_retry(&self, _error: &E) -> bool {
        false
    }
}

/// Classifies HTTP status codes as transient or permanent
#[derive(Debug, Clone)]
pub struct HttpStatusPredicate {
    retryable_codes: Vec<u16>,
}

impl Default for HttpStatusPredicate {
    fn default() -> Self {
        Self::default_http()
    }
}

impl HttpStatusPredicate {
    /// Default retryable codes: 408, 425, 429, 500, 502, 503, 504
    pub fn default_http() -> Self {
        Self {
            retryable_codes: vec![408, 425, 429, 500, 502, 503, 504],
        }
    }

    /// Check if a status code is retryable
    pub fn is_retryable_code(&self, code: u16) -> bool {
        self.retryable_codes.contains(&code)
    }
}
