//! Error taxonomy for registry calls and scan runs

use sigscan_core::retry::{HttpStatusPredicate, RetryError};
use thiserror::Error;

/// Failure of a single registry operation
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The requested tag or digest does not exist
    #[error("{reference} not found")]
    NotFound { reference: String },

    /// Network, authentication or protocol failure
    #[error("registry request for {reference} failed: {message}")]
    Communication {
        reference: String,
        status: Option<u16>,
        message: String,
    },

    /// A constructed reference is syntactically invalid
    #[error("invalid reference '{reference}': {reason}")]
    ReferenceParse { reference: String, reason: String },

    /// The run was cancelled while the request was outstanding
    #[error("cancelled while requesting {reference}")]
    Cancelled { reference: String },
}

impl RegistryError {
    pub fn not_found(reference: impl Into<String>) -> Self {
        Self::NotFound {
            reference: reference.into(),
        }
    }

    pub fn communication(
        reference: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::Communication {
            reference: reference.into(),
            status,
            message: message.into(),
        }
    }

    pub fn reference_parse(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ReferenceParse {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Map a transport-level reqwest failure
    pub(crate) fn transport(reference: impl Into<String>, err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        let message = if err.is_timeout() {
            format!("request timed out: {}", err)
        } else {
            err.to_string()
        };
        Self::communication(reference, status, message)
    }

    /// HTTP status attached to the failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            RegistryError::NotFound { .. } => Some(404),
            RegistryError::Communication { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound { .. })
    }

    /// Transport failures and throttling/5xx statuses are worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            RegistryError::Communication { status: None, .. } => true,
            RegistryError::Communication {
                status: Some(code), ..
            } => HttpStatusPredicate::default_http().is_retryable_code(*code),
            _ => false,
        }
    }

    /// Unwrap a retry outcome back into the registry error that ended it
    pub fn from_retry(err: RetryError<RegistryError>, reference: &str) -> Self {
        match err {
            RetryError::Exhausted { source, .. } | RetryError::NonRetryable(source) => source,
            RetryError::Cancelled { .. } => RegistryError::Cancelled {
                reference: reference.to_string(),
            },
        }
    }
}

/// Failure of a whole scan run
#[derive(Error, Debug)]
pub enum ScanError {
    /// The tag listing could not be retrieved; nothing can be correlated
    #[error("failed to list tags for {repository}: {source}")]
    ListTags {
        repository: String,
        #[source]
        source: RegistryError,
    },

    /// A tag could not be resolved and the run is configured to fail fast
    #[error("failed to resolve tag '{tag}': {source}")]
    TagFailed {
        tag: String,
        #[source]
        source: RegistryError,
    },

    /// The run was cancelled
    #[error("scan cancelled")]
    Cancelled,
}
