// # vmdns-core
//
// Core library for managing dynamic DNS address records for ephemeral
// virtual machines: provisioning upserts a hostname-to-IP mapping,
// teardown removes it. The DNS API itself is the easy part; this crate is
// the reliability layer around it:
//
// - **ConnectionPool**: a bounded set of stable-identity slots holding
//   lazily opened backend connections, validated with a health probe on
//   every lease and repaired in place when stale.
// - **RecordMutator**: idempotent create-or-replace and delete state
//   machines run over a leased connection, with an "already exists" add
//   answered by a single replace and the backend's transient precondition
//   conflicts absorbed by a bounded fixed-delay retry.
// - **RetryPolicy**: the two named policies (linear backoff for opens,
//   fixed delay for mutations) and the combinator both run under.
//
// External collaborators stay behind traits: the backend session
// (`ProviderConnection` / `ConnectionFactory`), hostname-to-IP resolution
// (`IpResolver`) and counter emission (`MetricsSink`). Concrete backends
// live in their own crates, e.g. `vmdns-provider-clouddns`.

pub mod config;
pub mod error;
pub mod mutator;
pub mod pool;
pub mod retry;
pub mod traits;

// Re-export core types for convenience
pub use config::DnsConfig;
pub use error::{BackendError, Error, Result};
pub use mutator::RecordMutator;
pub use pool::{ConnectionPool, ConnectionSlot, SlotLease};
pub use retry::RetryPolicy;
pub use traits::{
    AddOutcome, AddressRecord, ConnectionFactory, IpResolver, MetricsSink, ProviderConnection,
    RecordType, StaticIpResolver,
};
