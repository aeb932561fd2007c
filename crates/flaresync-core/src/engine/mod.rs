//! Reconciliation engine
//!
//! The ReconcileEngine is responsible for:
//! - Fetching the public IP once per cycle via IpSource
//! - Detecting whether it changed since the last successful fetch
//! - Creating, finding and updating records via DnsProvider
//! - Memoizing zone and record identifiers in the IdentifierCache
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  IpSource   │─── fetch_ip() ──────┐
//! └─────────────┘                     │
//!                                     ▼
//!                          ┌──────────────────┐
//!                          │ ReconcileEngine  │
//!                          └──────────────────┘
//!                                     │
//!         ┌───────────────────────────┼───────────────────────────┐
//!         │                           │                           │
//!         ▼                           ▼                           ▼
//! ┌─────────────────┐       ┌──────────────┐           ┌─────────────┐
//! │ IdentifierCache │       │ DnsProvider  │           │   Events    │
//! │ (memoize)       │       │ (API calls)  │           │  (notify)   │
//! └─────────────────┘       └──────────────┘           └─────────────┘
//! ```
//!
//! ## Cycle
//!
//! 1. Fetch the IP; on failure skip straight to the sleep
//! 2. Compare with the last known IP, then remember the new one
//! 3. For every zone: resolve its ID (cached after the first success)
//! 4. For every record:
//!    - address record, IP unchanged → skip
//!    - static record, ID cached → skip
//!    - ID unknown → find, or create when absent
//!    - address record → update with the current IP; drop the ID on failure
//! 5. Sleep for the poll interval, or stop if shutdown was requested

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::cache::{IdentifierCache, Resolution};
use crate::config::{Config, ZoneConfig};
use crate::error::Result;
use crate::traits::{DnsProvider, DnsRecord, IpSource};

/// Capacity of the monitoring event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Events emitted by the ReconcileEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started { zones_count: usize },

    /// Public IP differs from the last known value
    IpChanged {
        new_ip: String,
        previous_ip: Option<String>,
    },

    /// Public IP is the same as last cycle
    IpUnchanged { ip: String },

    /// Public IP lookup failed; the cycle was skipped
    IpFetchFailed { error: String },

    /// Zone ID lookup failed; the zone's records were skipped
    ZoneFailed { zone: String, error: String },

    /// A missing record was created
    RecordCreated {
        zone: String,
        record_name: String,
        content: String,
    },

    /// An address record was updated
    RecordUpdated {
        zone: String,
        record_name: String,
        content: String,
    },

    /// Find, create or update failed for a record
    RecordFailed {
        zone: String,
        record_name: String,
        error: String,
    },

    /// A cycle finished
    CycleCompleted { report: CycleReport },

    /// Engine stopped
    Stopped { reason: String },
}

/// Outcome of a single reconciliation cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// IP fetched this cycle, `None` when the fetch failed
    pub ip: Option<String>,
    /// Whether the IP differs from the last successful fetch
    pub ip_changed: bool,
    /// Records created
    pub created: usize,
    /// Address records updated
    pub updated: usize,
    /// Records skipped without any remote call
    pub skipped: usize,
    /// Zones or records that failed and will be retried next cycle
    pub failed: usize,
}

/// Core reconciliation engine
///
/// Owns the identifier cache and the last known IP; the provider and IP
/// source are shared, stateless collaborators.
///
/// ## Lifecycle
///
/// 1. Create with [`ReconcileEngine::new()`]
/// 2. Drive single cycles with [`ReconcileEngine::run_cycle()`], or loop with
///    [`ReconcileEngine::run()`] / [`ReconcileEngine::run_with_shutdown()`]
/// 3. The loop stops at the next cycle boundary once shutdown is requested
pub struct ReconcileEngine {
    /// Public IP lookup
    ip_source: Box<dyn IpSource>,

    /// DNS provider API client
    provider: Box<dyn DnsProvider>,

    /// Zones to reconcile, in order
    zones: Vec<ZoneConfig>,

    /// Sleep between cycles
    interval: Duration,

    /// Memoized zone and record identifiers
    cache: IdentifierCache,

    /// IP from the last successful fetch
    last_ip: Option<String>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl ReconcileEngine {
    /// Create a new engine
    ///
    /// The configuration is validated first; no network call is made.
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        ip_source: Box<dyn IpSource>,
        provider: Box<dyn DnsProvider>,
        config: Config,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let interval = config.interval();

        let engine = Self {
            ip_source,
            provider,
            zones: config.zones,
            interval,
            cache: IdentifierCache::new(),
            last_ip: None,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// IP from the last successful fetch
    pub fn last_ip(&self) -> Option<&str> {
        self.last_ip.as_deref()
    }

    /// Identifier cache (read-only view)
    pub fn cache(&self) -> &IdentifierCache {
        &self.cache
    }

    /// Sleep between cycles
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run until Ctrl-C
    pub async fn run(&mut self) -> Result<()> {
        self.run_with_shutdown(None).await
    }

    /// Run until `shutdown_rx` fires (or its sender is dropped)
    ///
    /// With `None`, Ctrl-C is the shutdown signal. Shutdown is checked while
    /// sleeping between cycles; a cycle in progress always completes.
    pub async fn run_with_shutdown(&mut self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.emit_event(EngineEvent::Started {
            zones_count: self.zones.len(),
        });

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for Ctrl-C: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        loop {
            self.run_cycle().await;

            info!("Checking again in {}", format_duration(self.interval));

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(EngineEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        Ok(())
    }

    /// Run one reconciliation cycle
    ///
    /// Errors never escape: they are logged, counted in the report and the
    /// affected zone or record is retried on the next cycle.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        let ip = match self.ip_source.fetch_ip().await {
            Ok(ip) => ip,
            Err(e) => {
                let source = self.ip_source.source_name();
                error!("Failed to get public IP from {}: {}", source, e);
                self.emit_event(EngineEvent::IpFetchFailed {
                    error: format!("{}: {}", source, e),
                });
                self.emit_event(EngineEvent::CycleCompleted {
                    report: report.clone(),
                });
                return report;
            }
        };

        let ip_changed = self.last_ip.as_deref() != Some(ip.as_str());
        if ip_changed {
            info!("Public IP changed to {}", ip);
            self.emit_event(EngineEvent::IpChanged {
                new_ip: ip.clone(),
                previous_ip: self.last_ip.clone(),
            });
        } else {
            info!("IP hasn't changed");
            self.emit_event(EngineEvent::IpUnchanged { ip: ip.clone() });
        }
        self.last_ip = Some(ip.clone());
        report.ip = Some(ip.clone());
        report.ip_changed = ip_changed;

        let provider_name = self.provider.provider_name();

        for zone in &self.zones {
            let zone_id = match self
                .cache
                .get_or_resolve_zone_id(self.provider.as_ref(), &zone.name)
                .await
            {
                Ok(zone_id) => zone_id,
                Err(e) => {
                    error!("[{}] Failed to get zone ID from {}: {}", zone.name, provider_name, e);
                    report.failed += 1;
                    self.emit_event(EngineEvent::ZoneFailed {
                        zone: zone.name.clone(),
                        error: format!("{}: {}", provider_name, e),
                    });
                    continue;
                }
            };

            for record in &zone.records {
                let dynamic = record.is_dynamic();

                if dynamic && !ip_changed {
                    report.skipped += 1;
                    continue;
                }
                if !dynamic && self.cache.record_id(&zone.name, record).is_some() {
                    report.skipped += 1;
                    continue;
                }

                let record_id = match self
                    .cache
                    .get_or_create_record_id(self.provider.as_ref(), &zone_id, &zone.name, record, &ip)
                    .await
                {
                    Ok((record_id, resolution)) => {
                        if resolution == Resolution::Created {
                            report.created += 1;
                            self.emit_event(EngineEvent::RecordCreated {
                                zone: zone.name.clone(),
                                record_name: record.name.clone(),
                                content: record.content(&zone.name, &ip),
                            });
                        }
                        record_id
                    }
                    Err(e) => {
                        error!(
                            "[{}] [{}] Failed to get/create record via {}: {}",
                            zone.name, record.name, provider_name, e
                        );
                        report.failed += 1;
                        self.emit_event(EngineEvent::RecordFailed {
                            zone: zone.name.clone(),
                            record_name: record.name.clone(),
                            error: format!("{}: {}", provider_name, e),
                        });
                        continue;
                    }
                };

                if !dynamic {
                    continue;
                }

                let body = DnsRecord::for_config(record, &zone.name, &ip);
                match self.provider.update_record(&zone_id, &record_id, &body).await {
                    Ok(()) => {
                        info!(
                            "[{}] [{} {}] Updated to {} (proxied={})",
                            zone.name, record.record_type, record.name, ip, record.proxied
                        );
                        report.updated += 1;
                        self.emit_event(EngineEvent::RecordUpdated {
                            zone: zone.name.clone(),
                            record_name: record.name.clone(),
                            content: body.content,
                        });
                    }
                    Err(e) => {
                        error!(
                            "[{}] [{}] Failed to update record via {}: {}",
                            zone.name, record.name, provider_name, e
                        );
                        self.cache.invalidate_record(&zone.name, record);
                        report.failed += 1;
                        self.emit_event(EngineEvent::RecordFailed {
                            zone: zone.name.clone(),
                            record_name: record.name.clone(),
                            error: format!("{}: {}", provider_name, e),
                        });
                    }
                }
            }
        }

        debug!(
            "Cycle done: created={} updated={} skipped={} failed={}",
            report.created, report.updated, report.skipped, report.failed
        );
        self.emit_event(EngineEvent::CycleCompleted {
            report: report.clone(),
        });

        report
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event");
            }
            // Nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

/// Human-readable interval: `45s`, `5m`, `1m 30s`, `2h`, `1h 5m`
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs();
    if seconds < 60 {
        return format!("{}s", seconds);
    }

    let (minutes, seconds) = (seconds / 60, seconds % 60);
    if minutes < 60 {
        return if seconds == 0 {
            format!("{}m", minutes)
        } else {
            format!("{}m {}s", minutes, seconds)
        };
    }

    let (hours, minutes) = (minutes / 60, minutes % 60);
    if minutes == 0 {
        format!("{}h", hours)
    } else {
        format!("{}h {}m", hours, minutes)
    }
}
