//! mockngm - Top SQL subscription scraper
//!
//! This crate keeps long-lived Top SQL subscriptions open against TiDB
//! (`tipb.TopSQLPubSub`) and TiKV (`resource_usage_agent.ResourceMeteringPubSub`)
//! instances. It can be used as a library, or run as a standalone binary with
//! the `mockngm` executable.
//!
//! # Architecture
//!
//! - **Scrape**: Per-target scrapers over reconnecting subscription streams
//! - **Config**: YAML configuration with environment expansion and TLS material
//! - **Proto**: Wire messages and client stubs for both subscription services
//!
//! # Example
//!
//! ```rust,no_run
//! use mockngm::config::AppConfig;
//! use mockngm::scrape::ScraperRegistry;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load("configs/mockngm.yaml")?;
//! let shutdown = CancellationToken::new();
//! let mut registry = ScraperRegistry::new(&shutdown, config.dialer()?)
//!     .with_policy(config.scrape.backoff);
//! registry.update_targets(config.resolve_targets()?);
//!
//! tokio::signal::ctrl_c().await?;
//! registry.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod proto;
pub mod scrape;

pub use config::{AppConfig, ConfigError};
pub use scrape::{
    BackoffPolicy, Record, ReconnectingStream, ScrapeError, Scraper, ScraperRegistry, Target,
    TargetKind,
};
