//! Error types for the VM DNS system
//!
//! Two layers of errors exist here:
//!
//! - [`BackendError`]: faults reported by the DNS provider itself
//!   (precondition conflicts, missing records, auth failures, transport).
//! - [`Error`]: what this crate surfaces to callers after its bounded
//!   local recoveries (connect backoff, slot repair, precondition retry)
//!   are spent.
//!
//! Original provider error information is preserved through `#[source]`
//! chaining rather than flattened into strings.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for VM DNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the pool and the record mutator
#[derive(Error, Debug)]
pub enum Error {
    /// Connection establishment failed after exhausting the configured
    /// number of tries. Fatal to the lease that requested it; mutation
    /// retries never apply to connect failures.
    #[error("failed to open a DNS backend connection after {attempts} attempt(s)")]
    Connect {
        /// How many open attempts were made before giving up
        attempts: u32,
        #[source]
        source: BackendError,
    },

    /// No pooled slot became free within the lease timeout.
    ///
    /// Retryable at a higher level; not retried internally.
    #[error("no pooled DNS connection became available within {timeout:?}")]
    PoolExhausted {
        /// The lease timeout that elapsed
        timeout: Duration,
    },

    /// A record mutation failed: either a non-transient backend error, or
    /// the precondition-retry budget was exhausted.
    #[error("DNS record mutation failed for '{hostname}'")]
    RecordMutation {
        /// Hostname the mutation was operating on
        hostname: String,
        #[source]
        source: BackendError,
    },

    /// The IP resolver itself failed (distinct from "no address recorded",
    /// which is a deliberate skip and not an error).
    #[error("ip resolution failed for '{hostname}': {message}")]
    IpResolver {
        /// Hostname being resolved
        hostname: String,
        /// Resolver-reported failure detail
        message: String,
    },

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a record mutation error for a hostname
    pub fn record_mutation(hostname: impl Into<String>, source: BackendError) -> Self {
        Self::RecordMutation {
            hostname: hostname.into(),
            source,
        }
    }

    /// Create an IP resolver error for a hostname
    pub fn ip_resolver(hostname: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IpResolver {
            hostname: hostname.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Faults reported by the DNS backend through a [`ProviderConnection`]
///
/// [`ProviderConnection`]: crate::traits::ProviderConnection
#[derive(Error, Debug)]
pub enum BackendError {
    /// Optimistic-concurrency conflict on record-set metadata. Expected to
    /// resolve on retry; the mutator applies its fixed-delay budget to
    /// exactly this variant.
    #[error("precondition not met: {0}")]
    PreconditionFailed(String),

    /// The named record does not exist
    #[error("record not found: {0}")]
    NotFound(String),

    /// The backend rejected the session's credentials
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The request never produced a backend response
    #[error("transport error: {0}")]
    Transport(String),

    /// Any other backend-reported API failure
    #[error("backend api error (status {status}): {message}")]
    Api {
        /// HTTP-ish status code reported by the backend
        status: u16,
        /// Backend-reported message
        message: String,
    },
}

impl BackendError {
    /// Whether this fault is the transient precondition conflict that the
    /// mutation retry policy applies to
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, Self::PreconditionFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_predicate_matches_only_precondition() {
        assert!(BackendError::PreconditionFailed("conditionNotMet".into()).is_precondition_failed());
        assert!(!BackendError::NotFound("host".into()).is_precondition_failed());
        assert!(
            !BackendError::Api {
                status: 500,
                message: "boom".into()
            }
            .is_precondition_failed()
        );
    }

    #[test]
    fn mutation_error_preserves_backend_source() {
        let err = Error::record_mutation(
            "vm-1.example.net",
            BackendError::PreconditionFailed("conditionNotMet".into()),
        );
        let source = std::error::Error::source(&err).expect("source is chained");
        assert!(source.to_string().contains("conditionNotMet"));
    }
}
