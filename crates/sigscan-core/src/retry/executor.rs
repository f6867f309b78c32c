//! Retry execution engine

use std::fmt::Display;
use std::future::Future;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::types::RetryPolicy;

use super::error::RetryError;
use super::observer::{NoOpObserver, RetryObserver};
use super::strategies::{calculate_delay, AlwaysRetry, RetryPredicate};

/// A retry executor with configurable policy, predicate, observer and cancellation
///
/// ```rust
/// use sigscan_core::retry::{NeverRetry, RetryExecutor};
/// use sigscan_core::types::RetryPolicy;
///
/// let executor = RetryExecutor::new(RetryPolicy::default())
///     .with_predicate(NeverRetry)
///     .with_jitter(false);
/// ```
pub struct RetryExecutor<P = AlwaysRetry, O = NoOpObserver> {
    policy: RetryPolicy,
    predicate: P,
    observer: O,
    jitter: bool,
    cancel: CancellationToken,
}

impl RetryExecutor<AlwaysRetry, NoOpObserver> {
    /// Create an executor that retries every error, with jitter enabled
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            predicate: AlwaysRetry,
            observer: NoOpObserver,
            jitter: true,
            cancel: CancellationToken::new(),
        }
    }
}

impl<P, O> RetryExecutor<P, O> {
    /// Set the retry predicate
    pub fn with_predicate<P2>(self, predicate: P2) -> RetryExecutor<P2, O> {
        RetryExecutor {
            policy: self.policy,
            predicate,
            observer: self.observer,
            jitter: self.jitter,
            cancel: self.cancel,
        }
    }

    /// Set the observer
    pub fn with_observer<O2>(self, observer: O2) -> RetryExecutor<P, O2> {
        RetryExecutor {
            policy: self.policy,
            predicate: self.predicate,
            observer,
            jitter: self.jitter,
            cancel: self.cancel,
        }
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Abort attempts and backoff sleeps once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }
}

impl<P, O> RetryExecutor<P, O>
where
    O: RetryObserver,
{
    /// Execute an operation with retry logic
    ///
    /// `op` is invoked once per attempt. The future it returns is dropped
    /// as soon as the cancellation token fires.
    pub async fn execute<F, Fut, T, E>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: RetryPredicate<E>,
    {
        let start = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error: Option<E> = None;

        for attempt in 1..=max_attempts {
            if self.cancel.is_cancelled() {
                self.observer.on_cancelled(attempt, None);
                return Err(RetryError::cancelled(attempt - 1, last_error));
            }

            self.observer.on_attempt_start(attempt, max_attempts);

            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                result = op() => Some(result),
            };

            let err = match outcome {
                None => {
                    self.observer.on_cancelled(attempt, None);
                    return Err(RetryError::cancelled(attempt, last_error));
                }
                Some(Ok(value)) => {
                    self.observer.on_success(attempt, start.elapsed());
                    return Ok(value);
                }
                Some(Err(err)) => err,
            };

            if !self.predicate.should_retry(&err) {
                self.observer.on_cancelled(attempt, Some(&err));
                return Err(RetryError::non_retryable(err));
            }

            if attempt >= max_attempts {
                self.observer.on_exhausted(attempt, &err);
                return Err(RetryError::exhausted(attempt, err, start.elapsed()));
            }

            let delay = calculate_delay(&self.policy, attempt, self.jitter);
            self.observer.on_attempt_failed(attempt, &err, delay);
            last_error = Some(err);

            if !delay.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        self.observer.on_cancelled(attempt, None);
                        return Err(RetryError::cancelled(attempt, last_error));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        Err(RetryError::cancelled(max_attempts, last_error))
    }
}
