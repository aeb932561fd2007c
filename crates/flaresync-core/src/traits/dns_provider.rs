// # DNS Provider Trait
//
// Defines the remote operations the reconciliation engine needs from a
// hosted DNS provider.
//
// ## Implementations
//
// - Cloudflare: `flaresync-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use flaresync_core::{DnsProvider, DnsRecord, RecordType};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//
//     let zone_id = provider.resolve_zone_id("example.com").await?;
//     let record = DnsRecord::new(RecordType::A, "example.com", "1.2.3.4", true);
//     match provider.find_record_id(&zone_id, record.record_type, &record.name).await? {
//         Some(id) => provider.update_record(&zone_id, &id, &record).await?,
//         None => { provider.create_record(&zone_id, &record).await?; }
//     }
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::Serialize;

use crate::config::{RecordConfig, RecordType};

/// TTL value meaning "automatic"; required for proxied records
pub const TTL_AUTOMATIC: u32 = 1;

/// TTL for records that resolve directly
pub const TTL_DIRECT_SECS: u32 = 300;

/// Body of a create or update request
///
/// Serializes to `{"type", "name", "content", "ttl", "proxied"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsRecord {
    /// Record type
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Fully-qualified record name
    pub name: String,
    /// Resolved content
    pub content: String,
    /// 1 when proxied, else 300
    pub ttl: u32,
    /// Proxy flag
    pub proxied: bool,
}

impl DnsRecord {
    /// Build a request body; the TTL follows the proxy flag
    pub fn new(
        record_type: RecordType,
        name: impl Into<String>,
        content: impl Into<String>,
        proxied: bool,
    ) -> Self {
        Self {
            record_type,
            name: name.into(),
            content: content.into(),
            ttl: if proxied { TTL_AUTOMATIC } else { TTL_DIRECT_SECS },
            proxied,
        }
    }

    /// Build the body for a configured record in `zone`
    pub fn for_config(record: &RecordConfig, zone: &str, ip: &str) -> Self {
        Self::new(
            record.record_type,
            record.fqdn(zone),
            record.content(zone, ip),
            record.proxied,
        )
    }
}

/// Trait for DNS provider implementations
///
/// Each method is one remote call. Implementations keep no state between
/// calls; identifier caching belongs to the engine.
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Parse provider-specific responses
/// - ✅ Return success or failure (the engine decides what happens next)
///
/// ## Forbidden Capabilities
/// - ❌ Spawn tasks or threads
/// - ❌ Implement retry logic or backoff (the poll interval is the backoff)
/// - ❌ Cache zone or record identifiers (owned by `IdentifierCache`)
/// - ❌ Decide whether an update is needed (owned by `ReconcileEngine`)
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Look up a zone identifier by exact zone name
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The zone identifier
    /// - `Err(Error::NotFound)`: No zone has that name
    /// - `Err(Error)`: Transport, status or decode failure
    async fn resolve_zone_id(&self, zone_name: &str) -> Result<String, crate::Error>;

    /// Look up an existing record by exact type and FQDN
    ///
    /// # Returns
    ///
    /// - `Ok(Some(String))`: The first matching record's identifier
    /// - `Ok(None)`: No such record
    /// - `Err(Error)`: Transport, status or decode failure
    async fn find_record_id(
        &self,
        zone_id: &str,
        record_type: RecordType,
        fqdn: &str,
    ) -> Result<Option<String>, crate::Error>;

    /// Create a record and return its identifier
    async fn create_record(&self, zone_id: &str, record: &DnsRecord)
    -> Result<String, crate::Error>;

    /// Overwrite an existing record
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        record: &DnsRecord,
    ) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
