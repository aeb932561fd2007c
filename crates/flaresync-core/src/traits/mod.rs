//! Core traits for flaresync
//!
//! - [`IpSource`]: Look up the caller's public IP
//! - [`DnsProvider`]: Zone and record operations against the DNS provider

pub mod ip_source;
pub mod dns_provider;

pub use ip_source::IpSource;
pub use dns_provider::{DnsProvider, DnsRecord, TTL_AUTOMATIC, TTL_DIRECT_SECS};
