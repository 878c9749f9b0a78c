//! Bounded pool of lazily opened, self-healing backend connections
//!
//! The pool owns a fixed set of [`ConnectionSlot`]s. A slot's identity is
//! stable for the pool's lifetime; only its `connection` field is ever
//! replaced. Connections to the backend can silently expire, so instead of
//! keep-alive traffic the pool validates lazily: every [`lease`] probes the
//! slot's connection and reopens it in place when the probe fails or the
//! slot was never populated. A successful lease therefore always hands out
//! a connection proven live within that same call.
//!
//! Leases are scoped borrows: [`SlotLease`] returns its slot on drop, on
//! every exit path, so capacity is never leaked.
//!
//! [`lease`]: ConnectionPool::lease

use crate::config::DnsConfig;
use crate::error::Error;
use crate::retry::{retry, RetryPolicy};
use crate::traits::{counters, ConnectionFactory, MetricsSink, ProviderConnection};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::time::timeout;
use tracing::{debug, warn};

/// A stable-identity cell holding one backend connection
///
/// Callers that retain a lease across a repair observe the new connection
/// through the same slot; the slot itself is never swapped out.
pub struct ConnectionSlot<C> {
    id: usize,
    connection: Option<C>,
}

impl<C> ConnectionSlot<C> {
    /// Identity of this slot, stable for the pool's lifetime
    pub fn id(&self) -> usize {
        self.id
    }
}

/// Bounded pool of connection slots
///
/// Sized per [`DnsConfig::pool_capacity`]; `lease` blocks (up to the
/// configured lease timeout) when every slot is checked out. No two live
/// leases ever reference the same slot.
pub struct ConnectionPool<F: ConnectionFactory> {
    factory: F,
    metrics: Arc<dyn MetricsSink>,
    connect_policy: RetryPolicy,
    lease_timeout: Duration,
    capacity: usize,
    permits: Semaphore,
    idle: Mutex<Vec<ConnectionSlot<F::Connection>>>,
}

impl<F: ConnectionFactory> ConnectionPool<F> {
    /// Create a pool of empty slots
    ///
    /// Connections are opened lazily through `factory` on first use of
    /// each slot, not up front.
    pub fn new(factory: F, metrics: Arc<dyn MetricsSink>, config: &DnsConfig) -> Self {
        let capacity = config.pool_capacity();
        let lease_timeout = config.lease_timeout();
        debug!(capacity, ?lease_timeout, "creating DNS connection pool");

        let idle = (0..capacity)
            .map(|id| ConnectionSlot { id, connection: None })
            .collect();

        Self {
            factory,
            metrics,
            connect_policy: config.connect_policy(),
            lease_timeout,
            capacity,
            permits: Semaphore::new(capacity),
            idle: Mutex::new(idle),
        }
    }

    /// Number of slots in this pool
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Borrow a validated slot
    ///
    /// Waits up to the lease timeout for a free slot, then ensures the
    /// slot holds a live connection before handing it out. Fails with
    /// [`Error::PoolExhausted`] when the timeout elapses and
    /// [`Error::Connect`] when the slot cannot be (re)opened; in both
    /// cases no capacity is lost.
    pub async fn lease(&self) -> Result<SlotLease<'_, F>, Error> {
        let permit = timeout(self.lease_timeout, self.permits.acquire())
            .await
            .map_err(|_| Error::PoolExhausted {
                timeout: self.lease_timeout,
            })?
            .expect("pool semaphore is never closed");

        let mut slot = self
            .idle
            .lock()
            .expect("pool slot list mutex poisoned")
            .pop()
            .expect("a permit guarantees an idle slot");

        if let Err(err) = self.ensure_connection(&mut slot).await {
            self.idle
                .lock()
                .expect("pool slot list mutex poisoned")
                .push(slot);
            return Err(err);
        }

        Ok(SlotLease {
            pool: self,
            slot: Some(slot),
            _permit: permit,
        })
    }

    /// Validate the slot's connection, replacing it in place when absent
    /// or no longer healthy
    async fn ensure_connection(
        &self,
        slot: &mut ConnectionSlot<F::Connection>,
    ) -> Result<(), Error> {
        let healthy = match &slot.connection {
            Some(connection) => connection.health_check().await,
            None => false,
        };

        if !healthy {
            if slot.connection.is_some() {
                debug!(slot = slot.id, "pooled connection failed its health probe, reopening");
            } else {
                debug!(slot = slot.id, "populating empty slot with a new connection");
            }
            slot.connection = Some(self.open_connection().await?);
        }

        Ok(())
    }

    /// Open one backend connection under the linear-backoff policy
    ///
    /// Every failed attempt increments `connect.fail`; a success
    /// increments `connect.open`. Exhausting the budget surfaces the last
    /// backend error as [`Error::Connect`].
    async fn open_connection(&self) -> Result<F::Connection, Error> {
        let factory = &self.factory;
        let metrics = self.metrics.as_ref();

        retry(&self.connect_policy, |_| true, move || async move {
            match factory.open().await {
                Ok(connection) => {
                    metrics.increment(counters::CONNECT_OPEN);
                    Ok(connection)
                }
                Err(err) => {
                    metrics.increment(counters::CONNECT_FAIL);
                    warn!(error = %err, "backend connection attempt failed");
                    Err(err)
                }
            }
        })
        .await
        .map_err(|source| Error::Connect {
            attempts: self.connect_policy.max_attempts(),
            source,
        })
    }
}

/// Exclusive, scope-bound borrow of one pool slot
///
/// Holds the slot (and its pool permit) until dropped; dropping returns
/// the slot, connection intact, so a caller can hold one lease across all
/// retries of a logical operation.
pub struct SlotLease<'pool, F: ConnectionFactory> {
    pool: &'pool ConnectionPool<F>,
    slot: Option<ConnectionSlot<F::Connection>>,
    _permit: SemaphorePermit<'pool>,
}

impl<F: ConnectionFactory> SlotLease<'_, F> {
    /// The leased slot's stable identity
    pub fn slot_id(&self) -> usize {
        self.slot().id
    }

    /// The validated connection held by the leased slot
    pub fn connection(&self) -> &F::Connection {
        self.slot()
            .connection
            .as_ref()
            .expect("a leased slot always holds a validated connection")
    }

    fn slot(&self) -> &ConnectionSlot<F::Connection> {
        self.slot
            .as_ref()
            .expect("slot is only taken on drop")
    }
}

impl<F: ConnectionFactory> std::fmt::Debug for SlotLease<'_, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotLease")
            .field("slot_id", &self.slot_id())
            .finish_non_exhaustive()
    }
}

impl<F: ConnectionFactory> Drop for SlotLease<'_, F> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.pool
                .idle
                .lock()
                .expect("pool slot list mutex poisoned")
                .push(slot);
        }
        // the permit is released after the slot is back on the idle list
    }
}
