// # flaresync-core
//
// Core library for keeping Cloudflare DNS records in sync with the caller's
// public IP address, while making sure statically-targeted records exist.
//
// ## Architecture Overview
//
// - **IpSource**: Trait for looking up the current public IP
// - **DnsProvider**: Trait for zone/record lookups, creation and updates
// - **IdentifierCache**: In-memory memo of zone and record identifiers
// - **ReconcileEngine**: Poll loop deciding, per record, whether to skip,
//   create or update
// - **Config**: TOML configuration with validation
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Decision logic lives here; HTTP lives in the
//    provider and IP source crates
// 2. **Library-First**: The daemon is a thin wrapper around this crate
// 3. **Cheap steady state**: With an unchanged IP and warm cache a cycle
//    makes no DNS API calls
// 4. **Interval as backoff**: Failures are retried on the next cycle, never
//    inline

pub mod traits;
pub mod engine;
pub mod cache;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{DnsProvider, DnsRecord, IpSource};
pub use engine::{CycleReport, EngineEvent, ReconcileEngine, format_duration};
pub use cache::{IdentifierCache, Resolution};
pub use config::{Config, RecordConfig, RecordType, ZoneConfig};
pub use error::{Error, Result};
