// # Metrics Sink Trait
//
// Call contract for counter emission. The embedding application owns the
// actual metrics pipeline; this crate only promises which counters it
// increments and when.

use tracing::debug;

/// Counter names emitted by this crate
pub mod counters {
    /// Incremented once per successfully opened backend connection
    pub const CONNECT_OPEN: &str = "connect.open";
    /// Incremented once per failed connection-open attempt
    pub const CONNECT_FAIL: &str = "connect.fail";
}

/// Trait for counter emission
pub trait MetricsSink: Send + Sync {
    /// Increment the named counter by one
    fn increment(&self, counter: &str);
}

/// Sink that discards every counter
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMetricsSink;

impl MetricsSink for NullMetricsSink {
    fn increment(&self, _counter: &str) {}
}

/// Sink that emits counters as tracing debug events
///
/// Useful stand-in when no metrics pipeline is wired up, as in `vmdnsctl`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMetricsSink;

impl MetricsSink for LogMetricsSink {
    fn increment(&self, counter: &str) {
        debug!(counter, "counter incremented");
    }
}
