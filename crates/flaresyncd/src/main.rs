// # flaresyncd - Cloudflare dynamic DNS daemon
//
// Thin integration layer: all reconciliation logic lives in flaresync-core.
//
// The flaresyncd daemon is responsible for:
// 1. Parsing arguments and loading the TOML configuration
// 2. Initializing logging and the runtime
// 3. Wiring the Cloudflare provider and the HTTP IP source into the engine
// 4. Translating SIGTERM/SIGINT into an engine shutdown
//
// ## Example
//
// ```bash
// export CLOUDFLARE_API_TOKEN=your_token   # if not set in the file
// flaresyncd /etc/flaresync/config.toml --log-level debug
// ```

use anyhow::Result;
use clap::Parser;
use flaresync_core::{Config, EngineEvent, ReconcileEngine};
use flaresync_ip_http::HttpIpSource;
use flaresync_provider_cloudflare::CloudflareProvider;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::sync::{mpsc, oneshot};
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlaresyncExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<FlaresyncExitCode> for ExitCode {
    fn from(code: FlaresyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Keep Cloudflare DNS records pointed at this host's public IP
#[derive(Debug, Parser)]
#[command(name = "flaresyncd", version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(default_value = "config.toml")]
    config: PathBuf,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, env = "FLARESYNC_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "Log level '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load(path)?;
    config.validate()?;
    Ok(config)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = match parse_log_level(&args.log_level) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return FlaresyncExitCode::ConfigError.into();
        }
    };

    // Load and validate configuration before any network activity
    let config = match load_config(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return FlaresyncExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return FlaresyncExitCode::ConfigError.into();
    }

    info!("Starting flaresyncd");
    info!(
        "Configuration loaded from {}: {} zone(s)",
        args.config.display(),
        config.zones.len()
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return FlaresyncExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {}", e);
            FlaresyncExitCode::RuntimeError
        } else {
            FlaresyncExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon until a shutdown signal arrives
async fn run_daemon(config: Config) -> Result<()> {
    let provider = CloudflareProvider::from_config(&config)?;
    let ip_source = HttpIpSource::from_config(&config)?;
    info!("IP provider: {}", ip_source.url());

    for zone in &config.zones {
        for record in &zone.records {
            info!(
                "Managing record: [{}] {} {}",
                zone.name, record.record_type, record.name
            );
        }
    }

    let (mut engine, events) =
        ReconcileEngine::new(Box::new(ip_source), Box::new(provider), config)?;
    tokio::spawn(log_events(events));

    // Install handlers up front so a failure is reported before the loop starts
    let signal = shutdown_signal()?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        let name = signal.await;
        info!("Received shutdown signal: {}", name);
        let _ = shutdown_tx.send(());
    });

    engine.run_with_shutdown(Some(shutdown_rx)).await?;

    info!("Shutting down daemon");
    Ok(())
}

/// Surface engine events in the debug log
async fn log_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::CycleCompleted { report } => debug!(
                "Cycle completed: ip={:?} changed={} created={} updated={} skipped={} failed={}",
                report.ip,
                report.ip_changed,
                report.created,
                report.updated,
                report.skipped,
                report.failed
            ),
            other => debug!("Engine event: {:?}", other),
        }
    }
}

/// Future resolving with the name of the first SIGTERM or SIGINT received
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = &'static str> + Send> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    })
}

/// Future resolving on Ctrl-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = &'static str> + Send> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for CTRL-C: {}", e);
            std::future::pending::<()>().await;
        }
        "SIGINT"
    })
}
