//! Test doubles and common utilities for engine contract tests
//!
//! The fakes record every remote call so tests can assert on exactly which
//! API requests a cycle would have made.

#![allow(dead_code)]

use flaresync_core::error::{Error, Result};
use flaresync_core::traits::{DnsProvider, DnsRecord, IpSource};
use flaresync_core::{Config, RecordType, ReconcileEngine, ZoneConfig};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One recorded provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ResolveZone(String),
    FindRecord {
        zone_id: String,
        record_type: RecordType,
        fqdn: String,
    },
    CreateRecord {
        zone_id: String,
        record: DnsRecord,
    },
    UpdateRecord {
        zone_id: String,
        record_id: String,
        record: DnsRecord,
    },
}

#[derive(Default)]
struct ProviderState {
    calls: Vec<Call>,
    /// Remote records keyed by (fqdn, type)
    remote: HashMap<(String, RecordType), String>,
    failing_zones: HashSet<String>,
    fail_creates: bool,
    fail_updates: bool,
    next_id: usize,
}

/// An in-memory DnsProvider that tracks calls
///
/// Clones share state, so a test can keep a handle after boxing one into the
/// engine.
#[derive(Clone, Default)]
pub struct FakeProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend a record already exists remotely
    pub fn with_remote_record(self, fqdn: &str, record_type: RecordType, id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .remote
            .insert((fqdn.to_string(), record_type), id.to_string());
        self
    }

    /// Make zone lookups for `zone` fail (or succeed again)
    pub fn set_zone_failing(&self, zone: &str, failing: bool) {
        let mut state = self.state.lock().unwrap();
        if failing {
            state.failing_zones.insert(zone.to_string());
        } else {
            state.failing_zones.remove(zone);
        }
    }

    pub fn set_fail_creates(&self, fail: bool) {
        self.state.lock().unwrap().fail_creates = fail;
    }

    pub fn set_fail_updates(&self, fail: bool) {
        self.state.lock().unwrap().fail_updates = fail;
    }

    /// Remove a record remotely (as if deleted in the dashboard)
    pub fn delete_remote_record(&self, fqdn: &str, record_type: RecordType) {
        self.state
            .lock()
            .unwrap()
            .remote
            .remove(&(fqdn.to_string(), record_type));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Return and forget the calls recorded so far
    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut self.state.lock().unwrap().calls)
    }

    pub fn zone_resolves(&self) -> usize {
        self.count(|c| matches!(c, Call::ResolveZone(_)))
    }

    pub fn finds(&self) -> usize {
        self.count(|c| matches!(c, Call::FindRecord { .. }))
    }

    pub fn creates(&self) -> Vec<DnsRecord> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CreateRecord { record, .. } => Some(record),
                _ => None,
            })
            .collect()
    }

    pub fn updates(&self) -> Vec<DnsRecord> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::UpdateRecord { record, .. } => Some(record),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|c| pred(c)).count()
    }
}

#[async_trait::async_trait]
impl DnsProvider for FakeProvider {
    async fn resolve_zone_id(&self, zone_name: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::ResolveZone(zone_name.to_string()));
        if state.failing_zones.contains(zone_name) {
            return Err(Error::not_found(format!("zone {:?} not found", zone_name)));
        }
        Ok(format!("zone-{}", zone_name))
    }

    async fn find_record_id(
        &self,
        zone_id: &str,
        record_type: RecordType,
        fqdn: &str,
    ) -> Result<Option<String>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::FindRecord {
            zone_id: zone_id.to_string(),
            record_type,
            fqdn: fqdn.to_string(),
        });
        Ok(state.remote.get(&(fqdn.to_string(), record_type)).cloned())
    }

    async fn create_record(&self, zone_id: &str, record: &DnsRecord) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CreateRecord {
            zone_id: zone_id.to_string(),
            record: record.clone(),
        });
        if state.fail_creates {
            return Err(Error::provider("fake", "create record failed: 400 Bad Request"));
        }
        state.next_id += 1;
        let id = format!("rec-{}", state.next_id);
        state
            .remote
            .insert((record.name.clone(), record.record_type), id.clone());
        Ok(id)
    }

    async fn update_record(&self, zone_id: &str, record_id: &str, record: &DnsRecord) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::UpdateRecord {
            zone_id: zone_id.to_string(),
            record_id: record_id.to_string(),
            record: record.clone(),
        });
        if state.fail_updates {
            return Err(Error::provider("fake", "update failed: 404 Not Found"));
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// An IpSource whose answer the test controls
#[derive(Clone)]
pub struct ScriptedIpSource {
    /// `None` makes the next fetch fail
    current: Arc<Mutex<Option<String>>>,
    fetch_count: Arc<AtomicUsize>,
}

impl ScriptedIpSource {
    pub fn new(ip: &str) -> Self {
        Self {
            current: Arc::new(Mutex::new(Some(ip.to_string()))),
            fetch_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_ip(&self, ip: &str) {
        *self.current.lock().unwrap() = Some(ip.to_string());
    }

    /// Make subsequent fetches fail
    pub fn fail(&self) {
        *self.current.lock().unwrap() = None;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IpSource for ScriptedIpSource {
    async fn fetch_ip(&self) -> Result<String> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.current
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::ip_source("connection refused"))
    }

    fn source_name(&self) -> &str {
        "scripted"
    }
}

/// Helper to create a valid Config for the given zones
pub fn config_with(zones: Vec<ZoneConfig>) -> Config {
    Config {
        poll_interval: 1,
        cloudflare_api_token: "test-token".to_string(),
        ip_provider: "ip.example.test".to_string(),
        zones,
    }
}

/// Build an engine wired to the given fakes
pub fn engine_with(
    ip_source: &ScriptedIpSource,
    provider: &FakeProvider,
    zones: Vec<ZoneConfig>,
) -> ReconcileEngine {
    let (engine, _event_rx) = ReconcileEngine::new(
        Box::new(ip_source.clone()),
        Box::new(provider.clone()),
        config_with(zones),
    )
    .expect("engine construction succeeds");
    engine
}
