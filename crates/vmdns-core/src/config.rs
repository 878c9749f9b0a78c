//! Configuration types for the VM DNS system

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_max_tries() -> u32 {
    3
}

fn default_retry_factor_secs() -> u64 {
    10
}

fn default_task_limit() -> usize {
    10
}

fn default_lease_timeout_secs() -> u64 {
    60
}

/// Configuration for the DNS zone, backend identity and reliability knobs
///
/// Deserializable from whatever outer configuration source the embedding
/// application uses; `vmdnsctl` builds it from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Name of the managed zone all records live in
    pub zone_name: String,

    /// Backend project / account identity
    pub project: String,

    /// Names of the VM pools this deployment serves. Only the count
    /// matters here: it feeds the connection pool sizing rule.
    #[serde(default)]
    pub managed_pools: Vec<String>,

    /// Maximum connection-open attempts before giving up
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,

    /// Linear backoff factor between open attempts, in seconds
    /// (attempt 1 sleeps 1x, attempt 2 sleeps 2x, ...)
    #[serde(default = "default_retry_factor_secs")]
    pub retry_factor_secs: u64,

    /// Upper bound on concurrent mutation tasks; feeds pool sizing
    #[serde(default = "default_task_limit")]
    pub task_limit: usize,

    /// How long a caller waits for a free pool slot
    #[serde(default = "default_lease_timeout_secs")]
    pub lease_timeout_secs: u64,

    /// Mirror mutator debug lines to stdout for local development.
    /// Tracing events are emitted regardless of this flag.
    #[serde(default)]
    pub verbose_local_echo: bool,
}

impl DnsConfig {
    /// Create a configuration with defaults for everything but identity
    pub fn new(zone_name: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            zone_name: zone_name.into(),
            project: project.into(),
            managed_pools: Vec::new(),
            max_tries: default_max_tries(),
            retry_factor_secs: default_retry_factor_secs(),
            task_limit: default_task_limit(),
            lease_timeout_secs: default_lease_timeout_secs(),
            verbose_local_echo: false,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.project.is_empty() {
            return Err(crate::Error::config("project cannot be empty"));
        }
        validate_zone_name(&self.zone_name)?;

        if self.max_tries == 0 {
            return Err(crate::Error::config("max_tries must be at least 1"));
        }
        if self.lease_timeout_secs == 0 {
            return Err(crate::Error::config("lease_timeout_secs must be at least 1"));
        }

        Ok(())
    }

    /// Connection pool size: enough slots for one per managed VM pool and
    /// one per concurrent task, never fewer than 2.
    pub fn pool_capacity(&self) -> usize {
        self.managed_pools.len().max(self.task_limit).max(2)
    }

    /// How long a caller waits for a free pool slot
    pub fn lease_timeout(&self) -> Duration {
        Duration::from_secs(self.lease_timeout_secs)
    }

    /// Retry policy for connection establishment
    pub fn connect_policy(&self) -> RetryPolicy {
        RetryPolicy::linear_backoff(self.max_tries, Duration::from_secs(self.retry_factor_secs))
    }
}

/// Basic RFC 1035 shape check for the zone's domain name
///
/// Not comprehensive, but catches empty labels, over-long names and
/// characters no backend will accept.
fn validate_zone_name(zone_name: &str) -> Result<(), crate::Error> {
    if zone_name.is_empty() {
        return Err(crate::Error::config("zone_name cannot be empty"));
    }
    if zone_name.len() > 253 {
        return Err(crate::Error::config(format!(
            "zone_name too long: {} chars (max 253)",
            zone_name.len()
        )));
    }

    for label in zone_name.trim_end_matches('.').split('.') {
        if label.is_empty() {
            return Err(crate::Error::config(format!(
                "zone_name has an empty label: '{zone_name}'"
            )));
        }
        if label.len() > 63 {
            return Err(crate::Error::config(format!(
                "zone_name label too long: '{label}' ({} chars, max 63)",
                label.len()
            )));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(crate::Error::config(format!(
                "zone_name label contains invalid characters: '{label}'"
            )));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(crate::Error::config(format!(
                "zone_name label cannot start or end with a hyphen: '{label}'"
            )));
        }
    }

    Ok(())
}
