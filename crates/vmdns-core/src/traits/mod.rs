//! Trait seams to the external collaborators
//!
//! - [`ProviderConnection`] / [`ConnectionFactory`]: the opaque DNS backend
//!   capability (one authenticated session, and how to open one)
//! - [`IpResolver`]: hostname to current-IP lookup
//! - [`MetricsSink`]: counter emission call contract

pub mod connection;
pub mod ip_resolver;
pub mod metrics;

pub use connection::{
    AddOutcome, AddressRecord, ConnectionFactory, ProviderConnection, RecordType,
    DEFAULT_RECORD_TTL,
};
pub use ip_resolver::{IpResolver, StaticIpResolver};
pub use metrics::{counters, LogMetricsSink, MetricsSink, NullMetricsSink};
