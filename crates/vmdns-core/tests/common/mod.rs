//! Test doubles and common utilities for the contract tests
//!
//! `FakeZone` is a real (in-memory) zone: adds, replaces and removes
//! mutate actual record state, so idempotency assertions check final zone
//! contents rather than call shapes alone. Faults are injected per
//! operation through bounded scripts, and every backend call is counted.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use vmdns_core::error::BackendError;
use vmdns_core::traits::{
    AddOutcome, AddressRecord, ConnectionFactory, MetricsSink, ProviderConnection, RecordType,
};
use vmdns_core::DnsConfig;

/// A scriptable backend fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Transient optimistic-concurrency conflict
    Precondition,
    /// Named record missing
    NotFound,
    /// Arbitrary API failure with this status
    Api(u16),
}

impl Fault {
    fn into_error(self, name: &str) -> BackendError {
        match self {
            Fault::Precondition => {
                BackendError::PreconditionFailed(format!("conditionNotMet for '{name}'"))
            }
            Fault::NotFound => BackendError::NotFound(name.to_string()),
            Fault::Api(status) => BackendError::Api {
                status,
                message: format!("scripted failure for '{name}'"),
            },
        }
    }
}

/// Shared in-memory zone with per-operation fault scripts and counters
#[derive(Default)]
pub struct FakeZone {
    records: Mutex<HashMap<String, (u32, IpAddr)>>,
    add_faults: Mutex<VecDeque<Fault>>,
    replace_faults: Mutex<VecDeque<Fault>>,
    remove_faults: Mutex<VecDeque<Fault>>,
    add_log: Mutex<Vec<(String, AddressRecord)>>,
    replace_log: Mutex<Vec<(String, AddressRecord)>>,
    remove_log: Mutex<Vec<(String, String, RecordType)>>,
    health_checks: AtomicUsize,
}

impl FakeZone {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue `count` copies of `fault` ahead of add attempts
    pub fn script_add_faults(&self, fault: Fault, count: usize) {
        self.add_faults.lock().unwrap().extend(std::iter::repeat_n(fault, count));
    }

    /// Queue `count` copies of `fault` ahead of replace attempts
    pub fn script_replace_faults(&self, fault: Fault, count: usize) {
        self.replace_faults.lock().unwrap().extend(std::iter::repeat_n(fault, count));
    }

    /// Queue `count` copies of `fault` ahead of remove attempts
    pub fn script_remove_faults(&self, fault: Fault, count: usize) {
        self.remove_faults.lock().unwrap().extend(std::iter::repeat_n(fault, count));
    }

    /// Seed a record directly, bypassing scripts and logs
    pub fn seed_record(&self, name: &str, ttl: u32, ip: IpAddr) {
        self.records.lock().unwrap().insert(name.to_string(), (ttl, ip));
    }

    pub fn record(&self, name: &str) -> Option<(u32, IpAddr)> {
        self.records.lock().unwrap().get(name).copied()
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn add_calls(&self) -> usize {
        self.add_log.lock().unwrap().len()
    }

    pub fn replace_calls(&self) -> usize {
        self.replace_log.lock().unwrap().len()
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_log.lock().unwrap().len()
    }

    pub fn health_checks(&self) -> usize {
        self.health_checks.load(Ordering::SeqCst)
    }

    pub fn last_add(&self) -> Option<(String, AddressRecord)> {
        self.add_log.lock().unwrap().last().cloned()
    }

    pub fn last_replace(&self) -> Option<(String, AddressRecord)> {
        self.replace_log.lock().unwrap().last().cloned()
    }

    pub fn last_remove(&self) -> Option<(String, String, RecordType)> {
        self.remove_log.lock().unwrap().last().cloned()
    }

    /// Faults scripted for add but never consumed
    pub fn unconsumed_add_faults(&self) -> usize {
        self.add_faults.lock().unwrap().len()
    }
}

/// One fake backend session against the shared zone
pub struct FakeConnection {
    pub id: usize,
    healthy: Arc<AtomicBool>,
    zone: Arc<FakeZone>,
}

#[async_trait]
impl ProviderConnection for FakeConnection {
    async fn add_record(
        &self,
        zone: &str,
        record: &AddressRecord,
    ) -> Result<AddOutcome, BackendError> {
        self.zone
            .add_log
            .lock()
            .unwrap()
            .push((zone.to_string(), record.clone()));
        if let Some(fault) = self.zone.add_faults.lock().unwrap().pop_front() {
            return Err(fault.into_error(&record.name));
        }

        let mut records = self.zone.records.lock().unwrap();
        if records.contains_key(&record.name) {
            Ok(AddOutcome::AlreadyExists)
        } else {
            records.insert(record.name.clone(), (record.ttl, record.ip));
            Ok(AddOutcome::Created)
        }
    }

    async fn replace_record(
        &self,
        zone: &str,
        record: &AddressRecord,
    ) -> Result<(), BackendError> {
        self.zone
            .replace_log
            .lock()
            .unwrap()
            .push((zone.to_string(), record.clone()));
        if let Some(fault) = self.zone.replace_faults.lock().unwrap().pop_front() {
            return Err(fault.into_error(&record.name));
        }

        self.zone
            .records
            .lock()
            .unwrap()
            .insert(record.name.clone(), (record.ttl, record.ip));
        Ok(())
    }

    async fn remove_record(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<(), BackendError> {
        self.zone
            .remove_log
            .lock()
            .unwrap()
            .push((zone.to_string(), name.to_string(), record_type));
        if let Some(fault) = self.zone.remove_faults.lock().unwrap().pop_front() {
            return Err(fault.into_error(name));
        }

        match self.zone.records.lock().unwrap().remove(name) {
            Some(_) => Ok(()),
            None => Err(BackendError::NotFound(name.to_string())),
        }
    }

    async fn health_check(&self) -> bool {
        self.zone.health_checks.fetch_add(1, Ordering::SeqCst);
        self.healthy.load(Ordering::SeqCst)
    }
}

/// Factory producing [`FakeConnection`]s, with scriptable open failures
///
/// Cheap to clone: clones share scripts, counters and opened-connection
/// handles, so a test keeps one handle while the pool owns another.
#[derive(Clone)]
pub struct FakeFactory {
    inner: Arc<FactoryInner>,
}

#[derive(Default)]
struct FactoryInner {
    zone: Arc<FakeZone>,
    open_faults: Mutex<VecDeque<BackendError>>,
    opened: AtomicUsize,
    handles: Mutex<Vec<(usize, Arc<AtomicBool>)>>,
}

impl FakeFactory {
    pub fn new(zone: Arc<FakeZone>) -> Self {
        Self {
            inner: Arc::new(FactoryInner {
                zone,
                ..FactoryInner::default()
            }),
        }
    }

    /// Script the next `count` open attempts to fail
    pub fn fail_next_opens(&self, count: usize) {
        let mut faults = self.inner.open_faults.lock().unwrap();
        for _ in 0..count {
            faults.push_back(BackendError::Transport("connection refused".to_string()));
        }
    }

    /// Number of successful opens so far
    pub fn opened(&self) -> usize {
        self.inner.opened.load(Ordering::SeqCst)
    }

    /// Make the identified connection fail its next health probe
    pub fn invalidate(&self, connection_id: usize) {
        for (id, healthy) in self.inner.handles.lock().unwrap().iter() {
            if *id == connection_id {
                healthy.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Make every connection opened so far fail its next health probe
    pub fn invalidate_all(&self) {
        for (_, healthy) in self.inner.handles.lock().unwrap().iter() {
            healthy.store(false, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl ConnectionFactory for FakeFactory {
    type Connection = FakeConnection;

    async fn open(&self) -> Result<FakeConnection, BackendError> {
        if let Some(fault) = self.inner.open_faults.lock().unwrap().pop_front() {
            return Err(fault);
        }

        let id = self.inner.opened.fetch_add(1, Ordering::SeqCst) + 1;
        let healthy = Arc::new(AtomicBool::new(true));
        self.inner
            .handles
            .lock()
            .unwrap()
            .push((id, Arc::clone(&healthy)));
        Ok(FakeConnection {
            id,
            healthy,
            zone: Arc::clone(&self.inner.zone),
        })
    }
}

/// Metrics sink recording per-counter totals
#[derive(Default)]
pub struct CountingMetrics {
    counts: Mutex<HashMap<String, usize>>,
}

impl CountingMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self, counter: &str) -> usize {
        self.counts.lock().unwrap().get(counter).copied().unwrap_or(0)
    }
}

impl MetricsSink for CountingMetrics {
    fn increment(&self, counter: &str) {
        *self.counts.lock().unwrap().entry(counter.to_string()).or_insert(0) += 1;
    }
}

/// Configuration used by the contract tests
pub fn test_config() -> DnsConfig {
    let mut config = DnsConfig::new("test.example.net", "test-project");
    config.managed_pools = vec!["pool-a".to_string(), "pool-b".to_string()];
    config
}
