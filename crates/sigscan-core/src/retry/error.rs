//! Error type returned by the retry executor

use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Errors that can occur during retry execution
///
/// Generic over `E`, the error type of the operation being retried.
#[derive(Debug)]
pub enum RetryError<E> {
    /// All attempts failed with retryable errors
    Exhausted {
        /// Number of attempts made before giving up
        attempts: u32,
        /// The error from the final attempt
        source: E,
        /// Total duration spent across all attempts
        total_duration: Duration,
    },

    /// The cancellation token fired before the operation completed
    Cancelled {
        /// Number of attempts started before cancellation
        attempts: u32,
        /// The last error that occurred, if any
        last_error: Option<E>,
    },

    /// The predicate classified the error as permanent
    NonRetryable(E),
}

impl<E> RetryError<E> {
    /// Create a new exhausted error
    pub fn exhausted(attempts: u32, source: E, total_duration: Duration) -> Self {
        RetryError::Exhausted {
            attempts,
            source,
            total_duration,
        }
    }

    /// Create a new cancelled error
    pub fn cancelled(attempts: u32, last_error: Option<E>) -> Self {
        RetryError::Cancelled {
            attempts,
            last_error,
        }
    }

    /// Create a new non-retryable error
    pub fn non_retryable(source: E) -> Self {
        RetryError::NonRetryable(source)
    }

    /// Whether the run was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }

    /// Collapse into the underlying operation error, if there is one
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::Exhausted { source, .. } => Some(source),
            RetryError::NonRetryable(source) => Some(source),
            RetryError::Cancelled { last_error, .. } => last_error,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted {
                attempts,
                source,
                total_duration,
            } => write!(
                f,
                "retry exhausted after {} attempts over {:.2}s: {}",
                attempts,
                total_duration.as_secs_f64(),
                source
            ),
            RetryError::Cancelled {
                attempts,
                last_error: Some(err),
            } => write!(f, "cancelled after {} attempts: {}", attempts, err),
            RetryError::Cancelled { attempts, .. } => {
                write!(f, "cancelled after {} attempts", attempts)
            }
            RetryError::NonRetryable(source) => write!(f, "{}", source),
        }
    }
}

impl<E: Error + 'static> Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RetryError::Exhausted { source, .. } => Some(source),
            RetryError::Cancelled {
                last_error: Some(err),
                ..
            } => Some(err),
            RetryError::NonRetryable(source) => Some(source),
            _ => None,
        }
    }
}
