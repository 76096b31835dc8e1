//! Configuration module for mockngm.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Scrape targets (kind and address)
//! - TLS material (CA, client certificate and key)
//! - Scraper settings (reconnect backoff, dial options, report interval)

mod app;
mod security;
mod validation;

pub use app::{AppConfig, DEFAULT_RESTART_INTERVAL, ScrapeConfig, TargetConfig};
pub use security::SecurityConfig;
pub use validation::{ConfigError, expand_env_vars, parse_duration};
