// # Provider Connection Traits
//
// The DNS backend is an opaque capability: one authenticated session that
// can add, replace and remove address records in a zone, plus a cheap
// liveness probe. Wire protocol and authentication are the concrete
// backend crate's business (e.g. `vmdns-provider-clouddns`).
//
// ## Usage
//
// ```rust,ignore
// use vmdns_core::traits::{AddOutcome, AddressRecord, ProviderConnection};
//
// async fn ensure(conn: &impl ProviderConnection, zone: &str) -> anyhow::Result<()> {
//     let record = AddressRecord::new("vm-8.test.example.net", "10.0.4.8".parse()?);
//     match conn.add_record(zone, &record).await? {
//         AddOutcome::Created => {}
//         AddOutcome::AlreadyExists => conn.replace_record(zone, &record).await?,
//     }
//     Ok(())
// }
// ```

use crate::error::BackendError;
use async_trait::async_trait;
use std::fmt;
use std::net::IpAddr;

/// Default TTL for managed address records, in seconds
///
/// Ephemeral VMs come and go quickly; a short TTL keeps resolvers from
/// caching a hostname past its instance's lifetime.
pub const DEFAULT_RECORD_TTL: u32 = 60;

/// DNS record types this system manages
///
/// Address records only; anything else is out of scope for a VM fleet's
/// hostname-to-IP mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// IPv4 address record
    A,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
        }
    }
}

/// One address record to be written to the managed zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    /// Fully qualified hostname
    pub name: String,
    /// Record time-to-live in seconds
    pub ttl: u32,
    /// The address the hostname maps to
    pub ip: IpAddr,
}

impl AddressRecord {
    /// Create an address record with the default TTL
    pub fn new(name: impl Into<String>, ip: IpAddr) -> Self {
        Self {
            name: name.into(),
            ttl: DEFAULT_RECORD_TTL,
            ip,
        }
    }
}

/// Outcome of an add-as-create attempt
///
/// "Already exists" is a normal branch of create for this backend, not a
/// failure: the mutator answers it with a single replace. Modelling it as
/// a tagged result keeps that fallback explicit instead of buried in
/// error matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The record did not exist and was created
    Created,
    /// A record with this name and type already exists; nothing was written
    AlreadyExists,
}

/// One authenticated session against the DNS backend
///
/// Connections are owned by the pool's slots and only ever used through a
/// lease, so implementations can assume one caller at a time per session.
///
/// Implementations must not retry or back off internally; retry policy is
/// owned by the pool (for opens) and the mutator (for mutations).
#[async_trait]
pub trait ProviderConnection: Send + Sync {
    /// Add an address record to `zone`
    ///
    /// Returns [`AddOutcome::AlreadyExists`] when a record with the same
    /// name and type is present (nothing written), and an error for
    /// everything else the backend reports.
    async fn add_record(
        &self,
        zone: &str,
        record: &AddressRecord,
    ) -> Result<AddOutcome, BackendError>;

    /// Replace the existing address record for `record.name` in `zone`
    async fn replace_record(&self, zone: &str, record: &AddressRecord)
        -> Result<(), BackendError>;

    /// Remove the record named `name` of type `record_type` from `zone`
    ///
    /// Removing a record that does not exist is whatever the backend says
    /// it is; this layer adds no special case.
    async fn remove_record(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<(), BackendError>;

    /// Cheap read-only liveness probe
    ///
    /// Reports `false` on any failure and never errors. Pooled sessions
    /// can silently expire; the pool probes at lease time and reopens
    /// through the factory when this says no.
    async fn health_check(&self) -> bool;
}

/// How to open a new backend session with the current credentials
///
/// Bound once at pool construction; invoked lazily on first use of a slot
/// and again whenever a slot's connection fails its health probe.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// The session type this factory produces
    type Connection: ProviderConnection + 'static;

    /// Open one new authenticated session
    ///
    /// A single attempt; the pool wraps this in its linear-backoff policy.
    async fn open(&self) -> Result<Self::Connection, BackendError>;
}
