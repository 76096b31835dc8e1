//! mockngm Binary Entry Point
//!
//! Subscribes to Top SQL data of the configured TiDB and TiKV instances and
//! keeps those subscriptions alive until shutdown.
//! Core functionality is provided by the `mockngm` library crate.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use mockngm::{
    config::{AppConfig, parse_duration},
    scrape::{ScraperRegistry, Target},
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// mockngm - Top SQL subscription scraper
#[derive(Parser, Debug)]
#[command(name = "mockngm", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "MOCKNGM_CONFIG")]
    config: Option<PathBuf>,

    /// TiDB status address to scrape (repeatable)
    #[arg(long = "tidb", value_name = "ADDR")]
    tidb: Vec<String>,

    /// TiKV status address to scrape (repeatable)
    #[arg(long = "tikv", value_name = "ADDR")]
    tikv: Vec<String>,

    /// CA certificate (enables TLS; overrides config file)
    #[arg(long, env = "MOCKNGM_CA")]
    ca: Option<PathBuf>,

    /// Client certificate (overrides config file)
    #[arg(long, env = "MOCKNGM_CERT", requires = "key")]
    cert: Option<PathBuf>,

    /// Client private key (overrides config file)
    #[arg(long, env = "MOCKNGM_KEY", requires = "cert")]
    key: Option<PathBuf>,

    /// Throughput report interval, e.g. `1s` (overrides config file)
    #[arg(long, value_parser = parse_duration)]
    report_interval: Option<Duration>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mockngm=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("mockngm - Top SQL subscription scraper");

    // Parse CLI arguments
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading configuration");
            AppConfig::load(path)?
        }
        None => AppConfig::default(),
    };

    // Apply CLI/env overrides (CLI > ENV > config file)
    for address in cli.tidb {
        config.add_target(Target::tidb(address));
    }
    for address in cli.tikv {
        config.add_target(Target::tikv(address));
    }
    config.override_tls(cli.ca, cli.cert.zip(cli.key))?;
    if let Some(interval) = cli.report_interval {
        config.scrape.report_interval = interval;
    }
    config.validate()?;

    let targets = config.resolve_targets()?;
    if targets.is_empty() {
        return Err("no targets configured, pass --tidb/--tikv or a config file".into());
    }

    let dialer = config.dialer()?;
    tracing::info!(
        targets = targets.len(),
        tls = dialer.is_tls(),
        dial_timeout = ?dialer.options().timeout,
        "Configuration loaded"
    );

    let shutdown = CancellationToken::new();
    let mut registry = ScraperRegistry::new(&shutdown, dialer)
        .with_policy(config.scrape.backoff)
        .with_report_interval(config.scrape.report_interval);

    let started = registry.update_targets(targets.iter().cloned());
    tracing::info!(started, "Scrapers started");
    tracing::info!("Press Ctrl+C to shutdown");

    // Restart scrapers that exhausted their retries until a signal arrives
    let mut restart = tokio::time::interval(config.scrape.restart_interval);
    restart.tick().await;
    let signal = shutdown_signal();
    tokio::pin!(signal);
    loop {
        tokio::select! {
            _ = &mut signal => break,
            _ = restart.tick() => {
                let restarted = registry.update_targets(targets.iter().cloned());
                if restarted > 0 {
                    tracing::info!(restarted, "Restarted stopped scrapers");
                }
            }
        }
    }

    shutdown.cancel();
    registry.shutdown().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
