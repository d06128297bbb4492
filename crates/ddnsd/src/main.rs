// # ddnsd - DDNS Daemon
//
// Thin integration layer: all reconciliation logic lives in ddns-core.
//
// The ddnsd daemon is responsible for:
// 1. Initializing logging
// 2. Loading settings
// 3. Registering providers and building the resolver and gateway clients
// 4. Running the DDNS engine until SIGTERM/SIGINT
//
// ## Configuration
//
// Settings are read from `settings.jsonc` (or `settings.json`) in the
// settings directory:
//
// - `DDNS_SETTINGS_DIR`: Settings directory (default: working directory)
// - `DDNS_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```jsonc
// {
//   "interval": 5,          // minutes
//   "ipv6": true,
//   "unifi": { "enable": false },
//   "accounts": [
//     {
//       "email": "ops@example.com",
//       "key": "<global api key>",
//       "zones": { "example.com": ["home.example.com", "vpn.example.com"] }
//     }
//   ]
// }
// ```

use anyhow::{Context, Result};
use ddns_core::{
    AccountTarget, DdnsEngine, EngineEvent, FirewallGateway, ProviderRegistry, Settings,
};
use ddns_gateway_unifi::UnifiGateway;
use ddns_ip_http::HttpAddressResolver;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
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
#[derive(Debug, Clone, Copy)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Parse a `DDNS_LOG_LEVEL` value
fn parse_log_level(value: &str) -> Option<Level> {
    match value.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn settings_dir() -> PathBuf {
    env::var_os("DDNS_SETTINGS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn main() -> ExitCode {
    // Initialize tracing
    let level_var = env::var("DDNS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let Some(log_level) = parse_log_level(&level_var) else {
        eprintln!(
            "DDNS_LOG_LEVEL '{}' is not valid. Valid levels: trace, debug, info, warn, error",
            level_var
        );
        return DdnsExitCode::ConfigError.into();
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    info!("Starting ddnsd daemon");

    // Load settings
    let dir = settings_dir();
    let settings = match Settings::load(&dir) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Configuration error: {}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    info!(
        "Configuration loaded: {} account(s), {} record(s), ipv6 {}, gateway push {}",
        settings.accounts.len(),
        settings.record_count(),
        if settings.ipv6 { "on" } else { "off" },
        if settings.unifi.enable { "on" } else { "off" }
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let (engine, events) = match build_engine(&settings) {
            Ok(built) => built,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return DdnsExitCode::ConfigError;
            }
        };

        if let Err(e) = run_daemon(engine, events).await {
            error!("Daemon error: {:#}", e);
            DdnsExitCode::RuntimeError
        } else {
            DdnsExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Wire providers, resolver and gateway into an engine
fn build_engine(settings: &Settings) -> Result<(DdnsEngine, mpsc::Receiver<EngineEvent>)> {
    // Create provider registry
    let registry = ProviderRegistry::new();

    #[cfg(feature = "cloudflare")]
    {
        info!("Registering Cloudflare provider");
        ddns_provider_cloudflare::register(&registry);
    }

    let accounts = settings
        .accounts
        .iter()
        .map(|account| -> Result<AccountTarget> {
            let provider = registry
                .create_provider(account)
                .with_context(|| format!("failed to create provider for {}", account.email))?;
            Ok(AccountTarget::from_config(account, provider))
        })
        .collect::<Result<Vec<_>>>()?;

    let resolver =
        Arc::new(HttpAddressResolver::new().context("failed to create address resolver")?);

    let gateway = if settings.unifi.enable {
        let gateway =
            UnifiGateway::from_config(&settings.unifi).context("failed to create UniFi client")?;
        Some(Arc::new(gateway) as Arc<dyn FirewallGateway>)
    } else {
        None
    };

    let built = DdnsEngine::new(resolver, accounts, gateway, settings)?;
    Ok(built)
}

/// Run the engine until a shutdown signal arrives
async fn run_daemon(engine: DdnsEngine, events: mpsc::Receiver<EngineEvent>) -> Result<()> {
    let event_logger = tokio::spawn(log_events(events));

    let result = engine.run_until(shutdown_signal()).await;

    // Dropping the engine closes the event channel and ends the logger
    drop(engine);
    if let Err(e) = event_logger.await {
        debug!("Event logger ended abnormally: {}", e);
    }

    result?;
    info!("Shutting down daemon");
    Ok(())
}

/// Mirror engine events into the debug log
async fn log_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::RecordReconciled {
                zone,
                record,
                family,
                result,
                ..
            } => debug!(
                "event: {} {} record {} in {}",
                result.verb(),
                family.record_type(),
                record,
                zone
            ),
            EngineEvent::CycleCompleted {
                changes,
                writes,
                failures,
            } => debug!(
                "event: cycle completed (ipv4 changed: {}, ipv6 changed: {}, {} write(s), {} failure(s))",
                changes.ipv4, changes.ipv6, writes, failures
            ),
            other => debug!("event: {:?}", other),
        }
    }
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn shutdown_signal() {
    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to setup signal handlers, falling back to Ctrl-C: {}", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to wait for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            return;
        }
    };

    let received = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    info!("Received shutdown signal: {}", received);
}

/// Wait for Ctrl-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal: Ctrl-C"),
        Err(e) => {
            error!("Failed to wait for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
