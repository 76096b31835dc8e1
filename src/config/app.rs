//! Application configuration structures.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::scrape::{BackoffPolicy, DEFAULT_REPORT_INTERVAL, DialOptions, GrpcDialer, Target, TargetKind};

use super::security::SecurityConfig;
use super::validation::{ConfigError, expand_env_vars, invalid, read_file};

// =============================================================================
// Constants
// =============================================================================

/// Default interval between target reconciliations (30 seconds).
pub const DEFAULT_RESTART_INTERVAL: Duration = Duration::from_secs(30);

fn default_report_interval() -> Duration {
    DEFAULT_REPORT_INTERVAL
}

fn default_restart_interval() -> Duration {
    DEFAULT_RESTART_INTERVAL
}

// =============================================================================
// Target Configuration
// =============================================================================

/// One scrape target as written in the config file.
///
/// The kind stays a string until validation so that an unknown kind is
/// reported as a configuration error naming the offending entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Component kind: `tidb` or `tikv`.
    pub kind: String,

    /// Status address, `host:port`.
    pub address: String,
}

impl TargetConfig {
    pub fn new(kind: TargetKind, address: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            address: address.into(),
        }
    }

    /// Resolve into a typed [`Target`].
    pub fn to_target(&self) -> Result<Target, ConfigError> {
        let kind: TargetKind = self
            .kind
            .parse()
            .map_err(|e| invalid(&format!("target '{}'", self.address), e))?;
        if self.address.trim().is_empty() {
            return Err(invalid("targets", format!("{kind} target has an empty address")));
        }
        Ok(Target::new(kind, self.address.trim()))
    }
}

impl From<Target> for TargetConfig {
    fn from(target: Target) -> Self {
        Self::new(target.kind, target.address)
    }
}

// =============================================================================
// Scrape Configuration
// =============================================================================

/// Reconnect, dial and reporting settings shared by every scraper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Reconnect policy (default: 8 attempts, 2s doubling up to 10s).
    #[serde(default)]
    pub backoff: BackoffPolicy,

    /// Transport dial settings.
    #[serde(default)]
    pub dial: DialOptions,

    /// Minimum interval between throughput log lines (default: 1s).
    #[serde(default = "default_report_interval", with = "humantime_serde")]
    pub report_interval: Duration,

    /// How often scrapers that gave up are restarted (default: 30s).
    #[serde(default = "default_restart_interval", with = "humantime_serde")]
    pub restart_interval: Duration,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            dial: DialOptions::default(),
            report_interval: DEFAULT_REPORT_INTERVAL,
            restart_interval: DEFAULT_RESTART_INTERVAL,
        }
    }
}

impl ScrapeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backoff
            .validate()
            .map_err(|e| invalid("scrape.backoff", e))?;
        self.dial.validate().map_err(|e| invalid("scrape.dial", e))?;
        if self.report_interval.is_zero() {
            return Err(invalid("scrape", "report_interval must be non-zero"));
        }
        if self.restart_interval.is_zero() {
            return Err(invalid("scrape", "restart_interval must be non-zero"));
        }
        Ok(())
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Components to scrape.
    #[serde(default)]
    pub targets: Vec<TargetConfig>,

    /// TLS material; targets are dialed in plaintext when absent.
    #[serde(default)]
    pub security: Option<SecurityConfig>,

    /// Scraper settings.
    #[serde(default)]
    pub scrape: ScrapeConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// `${VAR}` and `${VAR:-default}` references are expanded before parsing.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = String::from_utf8(read_file(path.as_ref())?)
            .map_err(|e| invalid(&path.as_ref().display().to_string(), e))?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(&expand_env_vars(content))?;
        config.validate()?;
        Ok(config)
    }

    /// Add a target unless it is already listed.
    pub fn add_target(&mut self, target: Target) {
        let entry = TargetConfig::from(target);
        if !self.targets.contains(&entry) {
            self.targets.push(entry);
        }
    }

    /// Apply TLS file overrides on top of the `security` section.
    ///
    /// A CA override keeps any client identity from the file. A client
    /// identity without any CA is rejected rather than dropped.
    pub fn override_tls(
        &mut self,
        ca_path: Option<PathBuf>,
        identity: Option<(PathBuf, PathBuf)>,
    ) -> Result<(), ConfigError> {
        let security = match (self.security.take(), ca_path) {
            (Some(mut security), Some(ca_path)) => {
                security.ca_path = ca_path;
                Some(security)
            }
            (None, Some(ca_path)) => Some(SecurityConfig::new(ca_path)),
            (security, None) => security,
        };

        self.security = match (security, identity) {
            (Some(security), Some((cert_path, key_path))) => {
                Some(security.with_identity(cert_path, key_path))
            }
            (None, Some(_)) => {
                return Err(invalid(
                    "security",
                    "client certificate and key given without a CA certificate",
                ));
            }
            (security, None) => security,
        };
        Ok(())
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Resolves kinds and rejects duplicates
        self.resolve_targets()?;

        if let Some(security) = &self.security {
            security.validate()?;
        }

        self.scrape.validate()
    }

    /// Typed targets in file order.
    pub fn resolve_targets(&self) -> Result<Vec<Target>, ConfigError> {
        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(self.targets.len());
        for entry in &self.targets {
            let target = entry.to_target()?;
            if !seen.insert(target.clone()) {
                return Err(invalid("targets", format!("duplicate target: {target}")));
            }
            targets.push(target);
        }
        Ok(targets)
    }

    /// Build the dialer described by the `security` and `scrape.dial`
    /// sections. TLS files are read here.
    pub fn dialer(&self) -> Result<GrpcDialer, ConfigError> {
        let tls = self
            .security
            .as_ref()
            .map(SecurityConfig::load_tls)
            .transpose()?;
        Ok(GrpcDialer::new(tls).with_options(self.scrape.dial))
    }
}
