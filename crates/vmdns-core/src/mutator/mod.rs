//! Record mutation state machines
//!
//! The [`RecordMutator`] drives the two operations a VM lifecycle needs:
//! create-or-replace on provisioning and delete on teardown. Both run
//! against a single pool lease held for the whole call, retries included,
//! and both apply the same fixed-delay retry budget to the one transient
//! fault the backend is known for (precondition conflicts on record-set
//! metadata that has not settled yet).

use crate::config::DnsConfig;
use crate::error::{BackendError, Error, Result};
use crate::pool::ConnectionPool;
use crate::retry::{retry, RetryPolicy};
use crate::traits::{
    AddOutcome, AddressRecord, ConnectionFactory, IpResolver, ProviderConnection, RecordType,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Total attempts for a mutation hitting precondition conflicts
const MUTATION_RETRY_ATTEMPTS: u32 = 30;

/// Fixed delay between mutation attempts
const MUTATION_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Orchestrates record mutations over pooled backend connections
pub struct RecordMutator<F: ConnectionFactory, R: IpResolver> {
    pool: Arc<ConnectionPool<F>>,
    resolver: R,
    zone_name: String,
    mutation_policy: RetryPolicy,
    verbose_local_echo: bool,
}

impl<F: ConnectionFactory, R: IpResolver> RecordMutator<F, R> {
    /// Create a mutator for the configured zone
    pub fn new(pool: Arc<ConnectionPool<F>>, resolver: R, config: &DnsConfig) -> Self {
        Self {
            pool,
            resolver,
            zone_name: config.zone_name.clone(),
            mutation_policy: RetryPolicy::fixed_delay(
                MUTATION_RETRY_ATTEMPTS,
                MUTATION_RETRY_DELAY,
            ),
            verbose_local_echo: config.verbose_local_echo,
        }
    }

    /// Ensure `hostname` resolves to its VM's current address
    ///
    /// Resolves the IP first; a VM with no recorded address is a logged
    /// no-op and DNS is left untouched. Otherwise adds the address record,
    /// falling back to exactly one replace when a record of that name and
    /// type already exists. Precondition conflicts on the add are retried
    /// under the fixed-delay budget; a failing replace, or any other
    /// backend error, surfaces immediately as [`Error::RecordMutation`].
    ///
    /// Calling this twice for the same hostname and IP is idempotent: the
    /// zone ends up with the one address record either way.
    pub async fn create_or_replace(&self, hostname: &str) -> Result<()> {
        let Some(ip) = self.resolver.get_ip(hostname).await? else {
            self.local_echo(&format!(
                "no IP address recorded for {hostname}, leaving DNS untouched"
            ));
            return Ok(());
        };

        let record = AddressRecord::new(hostname, ip);
        let lease = self.pool.lease().await?;
        let connection = lease.connection();
        let zone = self.zone_name.as_str();
        let record = &record;

        let outcome = retry(
            &self.mutation_policy,
            BackendError::is_precondition_failed,
            move || async move {
                match connection.add_record(zone, record).await {
                    Err(err) if err.is_precondition_failed() => {
                        debug!(hostname, error = %err, "record add hit a precondition conflict, retrying");
                        Err(err)
                    }
                    other => other,
                }
            },
        )
        .await
        .map_err(|source| Error::record_mutation(hostname, source))?;

        match outcome {
            AddOutcome::Created => {
                self.local_echo(&format!("DNS address added for {hostname}"));
            }
            AddOutcome::AlreadyExists => {
                // one replace, outside the retry budget
                connection
                    .replace_record(zone, record)
                    .await
                    .map_err(|source| Error::record_mutation(hostname, source))?;
                self.local_echo(&format!(
                    "DNS address for {hostname} previously existed and was replaced"
                ));
            }
        }

        Ok(())
    }

    /// Remove the address record for `hostname` from the zone
    ///
    /// Precondition conflicts retry under the same fixed-delay budget as
    /// create-or-replace. A missing record is whatever the backend says it
    /// is; if it reports one as an error, that propagates like any other
    /// non-transient failure.
    pub async fn delete(&self, hostname: &str) -> Result<()> {
        let lease = self.pool.lease().await?;
        let connection = lease.connection();
        let zone = self.zone_name.as_str();

        retry(
            &self.mutation_policy,
            BackendError::is_precondition_failed,
            move || async move {
                match connection.remove_record(zone, hostname, RecordType::A).await {
                    Err(err) if err.is_precondition_failed() => {
                        debug!(hostname, error = %err, "record removal hit a precondition conflict, retrying");
                        Err(err)
                    }
                    other => other,
                }
            },
        )
        .await
        .map_err(|source| Error::record_mutation(hostname, source))?;

        self.local_echo(&format!("DNS address removed for {hostname}"));
        Ok(())
    }

    /// Debug line, optionally mirrored to stdout for local development
    fn local_echo(&self, message: &str) {
        if self.verbose_local_echo {
            println!("{message}");
        }
        debug!("{message}");
    }
}
