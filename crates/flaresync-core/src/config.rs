//! Configuration types for flaresync
//!
//! The configuration is a TOML file:
//!
//! ```toml
//! poll_interval = 300
//! cloudflare_api_token = "..."
//! ip_provider = "ipv4.icanhazip.com"
//!
//! [[zone]]
//! name = "example.com"
//! records = [
//!   { name = "@", proxied = true },
//!   { name = "www", type = "CNAME", target = "example.com" },
//! ]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Poll interval used when `poll_interval` is missing or not positive
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

/// Environment variable consulted when the file carries no API token
pub const API_TOKEN_ENV: &str = "CLOUDFLARE_API_TOKEN";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Seconds between reconciliation cycles
    #[serde(default)]
    pub poll_interval: i64,

    /// Cloudflare API token (bearer)
    #[serde(default)]
    pub cloudflare_api_token: String,

    /// Host (or full URL) answering with the caller's public IP
    #[serde(default)]
    pub ip_provider: String,

    /// Zones to manage, in order
    #[serde(default, rename = "zone")]
    pub zones: Vec<ZoneConfig>,
}

impl Config {
    /// Load and parse a TOML configuration file
    ///
    /// An empty `cloudflare_api_token` is filled from `CLOUDFLARE_API_TOKEN`.
    /// The result is not validated; call [`Config::validate`] before use.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let mut config = Self::from_toml_str(&raw)?;
        config.fill_token_from(std::env::var(API_TOKEN_ENV).ok());
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Use `fallback` as the API token when the file left it empty
    pub fn fill_token_from(&mut self, fallback: Option<String>) {
        if self.cloudflare_api_token.is_empty() {
            if let Some(token) = fallback.filter(|t| !t.is_empty()) {
                self.cloudflare_api_token = token;
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.cloudflare_api_token.is_empty() {
            return Err(Error::config("cloudflare_api_token is required in config"));
        }
        if self.ip_provider.trim().is_empty() {
            return Err(Error::config("ip_provider is required in config"));
        }
        if self.zones.is_empty() {
            return Err(Error::config("At least one [[zone]] must be defined in config"));
        }

        for zone in &self.zones {
            zone.validate()?;
        }

        Ok(())
    }

    /// Interval between cycles
    pub fn interval(&self) -> Duration {
        match u64::try_from(self.poll_interval) {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }

    /// URL of the public IP endpoint
    ///
    /// A bare host becomes `https://{host}`; explicit `http://` or `https://`
    /// URLs are kept as written.
    pub fn ip_provider_url(&self) -> String {
        let provider = self.ip_provider.trim();
        if provider.starts_with("https://") || provider.starts_with("http://") {
            provider.to_string()
        } else {
            format!("https://{}", provider)
        }
    }
}

/// A DNS zone and the records managed in it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Zone name, e.g. "example.com"
    pub name: String,

    /// Records to reconcile, in order
    #[serde(default)]
    pub records: Vec<RecordConfig>,
}

impl ZoneConfig {
    /// Create a zone with no records
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Vec::new(),
        }
    }

    /// Append a record
    pub fn with_record(mut self, record: RecordConfig) -> Self {
        self.records.push(record);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config("Zone name cannot be empty"));
        }
        if let Some(record) = self.records.iter().find(|r| r.name.trim().is_empty()) {
            return Err(Error::config(format!(
                "[{}] Record name cannot be empty (type {})",
                self.name, record.record_type
            )));
        }

        // (name, type) identifies one remote record
        let mut seen = HashSet::new();
        for record in &self.records {
            if !seen.insert((record.name.as_str(), record.record_type)) {
                return Err(Error::config(format!(
                    "[{}] Duplicate record {} {}",
                    self.name, record.record_type, record.name
                )));
            }
        }
        Ok(())
    }
}

/// DNS record configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordConfig {
    /// Name relative to the zone; `@` is the apex
    pub name: String,

    /// Record type, `A` when unset
    #[serde(default, rename = "type")]
    pub record_type: RecordType,

    /// Route traffic through Cloudflare's proxy
    #[serde(default)]
    pub proxied: bool,

    /// Static content for non-address records
    #[serde(default)]
    pub target: Option<String>,
}

impl RecordConfig {
    /// Create an `A` record configuration
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            record_type: RecordType::A,
            proxied: false,
            target: None,
        }
    }

    /// Set the record type
    pub fn with_record_type(mut self, record_type: RecordType) -> Self {
        self.record_type = record_type;
        self
    }

    /// Set the proxy flag
    pub fn with_proxied(mut self, proxied: bool) -> Self {
        self.proxied = proxied;
        self
    }

    /// Set the static target
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Address records follow the public IP; everything else is static
    pub fn is_dynamic(&self) -> bool {
        self.record_type.is_address()
    }

    /// Fully-qualified name within `zone`
    pub fn fqdn(&self, zone: &str) -> String {
        if self.name == "@" {
            zone.to_string()
        } else {
            format!("{}.{}", self.name, zone)
        }
    }

    /// Record content for this cycle
    ///
    /// Address records carry the public IP. Other records carry `target`, or
    /// the zone name when no target is set.
    pub fn content(&self, zone: &str, ip: &str) -> String {
        if self.is_dynamic() {
            return ip.to_string();
        }
        match self.target.as_deref() {
            Some(target) if !target.is_empty() => target.to_string(),
            _ => zone.to_string(),
        }
    }
}

/// DNS record types accepted by Cloudflare
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    /// IPv4 address
    #[default]
    A,
    /// IPv6 address
    Aaaa,
    Caa,
    Cert,
    Cname,
    Dnskey,
    Ds,
    Https,
    Loc,
    Mx,
    Naptr,
    Ns,
    Openpgpkey,
    Ptr,
    Smimea,
    Srv,
    Sshfp,
    Svcb,
    Tlsa,
    Txt,
    Uri,
}

impl RecordType {
    /// `A` and `AAAA` carry the public IP
    pub fn is_address(self) -> bool {
        matches!(self, RecordType::A | RecordType::Aaaa)
    }

    /// Wire name used by the API
    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Caa => "CAA",
            RecordType::Cert => "CERT",
            RecordType::Cname => "CNAME",
            RecordType::Dnskey => "DNSKEY",
            RecordType::Ds => "DS",
            RecordType::Https => "HTTPS",
            RecordType::Loc => "LOC",
            RecordType::Mx => "MX",
            RecordType::Naptr => "NAPTR",
            RecordType::Ns => "NS",
            RecordType::Openpgpkey => "OPENPGPKEY",
            RecordType::Ptr => "PTR",
            RecordType::Smimea => "SMIMEA",
            RecordType::Srv => "SRV",
            RecordType::Sshfp => "SSHFP",
            RecordType::Svcb => "SVCB",
            RecordType::Tlsa => "TLSA",
            RecordType::Txt => "TXT",
            RecordType::Uri => "URI",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
