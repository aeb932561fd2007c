// # Identifier Cache
//
// In-memory memo of remote identifiers, owned by the reconciliation engine.
//
// ## Lifecycle
//
// - Starts empty: every zone and record is "unresolved"
// - A zone ID is stored on its first successful lookup and kept for the
//   lifetime of the process
// - A record ID is stored on its first successful find-or-create and removed
//   only when an update against it fails
//
// ## Crash Behavior
//
// Nothing is persisted. After a restart every identifier is looked up again,
// which costs one zone lookup per zone and one find per record.

use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::{RecordConfig, RecordType};
use crate::error::Result;
use crate::traits::{DnsProvider, DnsRecord};

/// How a record identifier was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Already in the cache, no remote call made
    Cached,
    /// Found an existing remote record
    Found,
    /// No remote record existed, so one was created
    Created,
}

/// Records are keyed by logical name and type within their zone
type RecordKey = (String, RecordType);

#[derive(Debug, Default)]
struct ZoneEntry {
    zone_id: Option<String>,
    records: HashMap<RecordKey, String>,
}

/// Per-zone, per-record identifier cache
#[derive(Debug, Default)]
pub struct IdentifierCache {
    zones: HashMap<String, ZoneEntry>,
}

impl IdentifierCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached zone identifier, if resolved
    pub fn zone_id(&self, zone: &str) -> Option<&str> {
        self.zones.get(zone)?.zone_id.as_deref()
    }

    /// Cached record identifier, if resolved
    pub fn record_id(&self, zone: &str, record: &RecordConfig) -> Option<&str> {
        self.zones
            .get(zone)?
            .records
            .get(&key(record))
            .map(String::as_str)
    }

    /// Number of resolved record identifiers across all zones
    pub fn resolved_records(&self) -> usize {
        self.zones.values().map(|z| z.records.len()).sum()
    }

    /// Forget a record identifier, returning the one that was cached
    pub fn invalidate_record(&mut self, zone: &str, record: &RecordConfig) -> Option<String> {
        self.zones.get_mut(zone)?.records.remove(&key(record))
    }

    /// Return the cached zone ID or look it up
    ///
    /// Failures leave the zone unresolved so the next call retries.
    pub async fn get_or_resolve_zone_id(
        &mut self,
        provider: &dyn DnsProvider,
        zone: &str,
    ) -> Result<String> {
        if let Some(zone_id) = self.zone_id(zone) {
            return Ok(zone_id.to_string());
        }

        let zone_id = provider.resolve_zone_id(zone).await?;
        debug!("[{}] Resolved zone ID {}", zone, zone_id);

        self.zones.entry(zone.to_string()).or_default().zone_id = Some(zone_id.clone());
        Ok(zone_id)
    }

    /// Return the cached record ID, or find the remote record, or create it
    ///
    /// `ip` is only used as content when the record has to be created.
    pub async fn get_or_create_record_id(
        &mut self,
        provider: &dyn DnsProvider,
        zone_id: &str,
        zone: &str,
        record: &RecordConfig,
        ip: &str,
    ) -> Result<(String, Resolution)> {
        if let Some(record_id) = self.record_id(zone, record) {
            return Ok((record_id.to_string(), Resolution::Cached));
        }

        let fqdn = record.fqdn(zone);
        let (record_id, resolution) = match provider
            .find_record_id(zone_id, record.record_type, &fqdn)
            .await?
        {
            Some(record_id) => (record_id, Resolution::Found),
            None => {
                info!("Record {} {} not found, creating it...", record.record_type, fqdn);
                let body = DnsRecord::for_config(record, zone, ip);
                (provider.create_record(zone_id, &body).await?, Resolution::Created)
            }
        };

        self.zones
            .entry(zone.to_string())
            .or_default()
            .records
            .insert(key(record), record_id.clone());

        Ok((record_id, resolution))
    }
}

fn key(record: &RecordConfig) -> RecordKey {
    (record.name.clone(), record.record_type)
}
