//! Observability module for the account service
//!
//! # Privacy by Default
//!
//! Instrumentation uses `#[instrument(skip_all)]` with explicitly allow-listed
//! fields. Fields fall into three groups:
//! - **SAFE**: may be logged in plaintext (operation names, outcomes, URL hosts)
//! - **HASHED**: logged only through [`hash_for_correlation`] (usernames)
//! - **NEVER**: must never appear in logs (passwords, digests, login token,
//!   outbound response bodies)

pub mod metrics;

use sha2::{Digest, Sha256};

/// Hash a field value for correlation in logs (SHA-256, first 8 hex chars)
///
/// Used for usernames, which need correlation across log entries but should
/// not be stored in plaintext.
///
/// # Privacy
///
/// This is NOT a credential hash. It is a one-way transform for correlation
/// only; the truncation to 8 chars limits reversibility.
pub fn hash_for_correlation(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let result = hasher.finalize();
    hex::encode(result.get(..4).unwrap_or_default())
}

/// Error categories for metrics labels (bounded cardinality)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller supplied something unusable (bad input, duplicate username, unknown user)
    Client,
    /// Credential verification failed
    Authentication,
    /// Outbound fetch was rejected or failed
    Egress,
    /// Storage, crypto, or other internal failures
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Client => "client",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Egress => "egress",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl From<&crate::errors::AccountError> for ErrorCategory {
    fn from(err: &crate::errors::AccountError) -> Self {
        use crate::errors::AccountError;
        match err {
            AccountError::UsernameTaken
            | AccountError::NotFound
            | AccountError::InvalidRequest(_) => ErrorCategory::Client,
            AccountError::InvalidCredentials => ErrorCategory::Authentication,
            AccountError::MalformedUrl(_)
            | AccountError::NotAllowed(_)
            | AccountError::Timeout
            | AccountError::TransportFailure(_) => ErrorCategory::Egress,
            AccountError::Database(_) | AccountError::Crypto(_) | AccountError::Internal => {
                ErrorCategory::Internal
            }
        }
    }
}
