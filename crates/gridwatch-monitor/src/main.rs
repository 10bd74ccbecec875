//! gridwatch - trading-bot monitor entry point.

use anyhow::Result;
use clap::Parser;
use gridwatch_monitor::{AppConfig, Monitor};
use gridwatch_notify::{DynGateway, LogGateway, StatusPoller, TelegramClient, TelegramGateway};
use gridwatch_telemetry::Metrics;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Trading-bot monitor with Telegram alerts
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via GRIDWATCH_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before any WS connections
    gridwatch_ws::init_crypto();

    let args = Args::parse();

    gridwatch_telemetry::init_logging()?;

    info!("Starting gridwatch v{}", env!("CARGO_PKG_VERSION"));

    let config_path = AppConfig::resolve_path(args.config);
    info!(config_path = %config_path, "Loading configuration");

    let config = AppConfig::from_file(&config_path)?;
    config.validate()?;
    info!(
        bots = config.bots.len(),
        periodic_interval_secs = config.reporting.periodic_interval_secs,
        error_cooldown_secs = config.reporting.error_cooldown_secs,
        "Configuration loaded"
    );

    let telegram = if config.telegram.has_credentials() {
        Some(Arc::new(TelegramClient::new(&config.telegram)?))
    } else {
        warn!("Telegram credentials not configured, notifications go to the log only");
        None
    };

    let gateway: DynGateway = match &telegram {
        Some(client) => Arc::new(TelegramGateway::new(
            Arc::clone(client),
            config.telegram.chat_id.clone(),
        )),
        None => Arc::new(LogGateway),
    };

    let monitor = Arc::new(Monitor::new(
        config.endpoints()?,
        config.monitor_settings(),
        gateway,
    ));

    let poller = match telegram {
        Some(client) if config.telegram.commands_enabled => {
            let poller = StatusPoller::new(
                client,
                config.telegram.chat_id.clone(),
                monitor.clone(),
                config.telegram.poll_timeout_secs,
                monitor.shutdown_token(),
            );
            Some(tokio::spawn(async move { poller.run().await }))
        }
        _ => None,
    };

    {
        let monitor = Arc::clone(&monitor);
        tokio::spawn(async move {
            wait_for_signal().await;
            info!("Shutdown signal received");
            monitor.shutdown();
        });
    }

    monitor.run().await?;

    if let Some(poller) = poller {
        if let Err(e) = poller.await {
            warn!(error = %e, "Command poller task failed");
        }
    }

    match Metrics::gather_text() {
        Ok(text) => debug!(metrics = %text, "Final metrics"),
        Err(e) => warn!(error = %e, "Failed to render metrics"),
    }

    info!("gridwatch stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
