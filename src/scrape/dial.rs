//! gRPC transport dialer.
//!
//! Opens one `tonic` channel per call, bounded by a dial timeout. Inside
//! that window, failed connects are retried with a short jittered backoff
//! ([`ConnectBackoff`]), separate from the reconnect policy that drives
//! whole resubscribe cycles.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};

use crate::scrape::backoff::growth;
use crate::scrape::{Connect, ScrapeError};

/// Default bound on a single dial (5 seconds).
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default HTTP/2 keepalive ping interval (10 seconds).
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

/// Default wait for a keepalive ack before the connection is dropped (3 seconds).
pub const DEFAULT_KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(3);

fn default_dial_timeout() -> Duration {
    DEFAULT_DIAL_TIMEOUT
}

fn default_keepalive_interval() -> Duration {
    DEFAULT_KEEPALIVE_INTERVAL
}

fn default_keepalive_timeout() -> Duration {
    DEFAULT_KEEPALIVE_TIMEOUT
}

fn default_base_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_connect_multiplier() -> f64 {
    1.6
}

fn default_jitter() -> f64 {
    0.2
}

fn default_connect_max_delay() -> Duration {
    Duration::from_secs(3)
}

/// Backoff between low-level connect retries within one dial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectBackoff {
    /// Wait after the first failed connect (default: 100ms).
    #[serde(default = "default_base_delay", with = "humantime_serde")]
    pub base_delay: Duration,
    /// Growth factor (default: 1.6).
    #[serde(default = "default_connect_multiplier")]
    pub multiplier: f64,
    /// Relative randomization, `0.2` means ±20% (default: 0.2).
    #[serde(default = "default_jitter")]
    pub jitter: f64,
    /// Cap before jitter is applied (default: 3s).
    #[serde(default = "default_connect_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for ConnectBackoff {
    fn default() -> Self {
        Self {
            base_delay: default_base_delay(),
            multiplier: default_connect_multiplier(),
            jitter: default_jitter(),
            max_delay: default_connect_max_delay(),
        }
    }
}

impl ConnectBackoff {
    /// Un-jittered wait after `retries` failed connects.
    pub fn base(&self, retries: u32) -> Duration {
        let exponent = i32::try_from(retries).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * growth(self.multiplier).powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }

    /// Jittered wait after `retries` failed connects.
    pub fn delay(&self, retries: u32) -> Duration {
        let base = self.base(retries).as_secs_f64();
        let jitter = self.jitter.min(1.0);
        if jitter.is_nan() || jitter <= 0.0 {
            return Duration::from_secs_f64(base);
        }
        let spread = rand::thread_rng().gen_range(-jitter..=jitter);
        Duration::from_secs_f64((base * (1.0 + spread)).max(0.0))
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(format!(
                "connect_backoff multiplier must be a finite value >= 1.0, got {}",
                self.multiplier
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(format!(
                "connect_backoff jitter must be within [0, 1], got {}",
                self.jitter
            ));
        }
        if self.max_delay < self.base_delay {
            return Err("connect_backoff max_delay must not be less than base_delay".to_string());
        }
        Ok(())
    }
}

/// Transport settings applied to every dial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DialOptions {
    /// Bound on one dial, retries included (default: 5s).
    #[serde(default = "default_dial_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// HTTP/2 keepalive ping interval (default: 10s).
    #[serde(default = "default_keepalive_interval", with = "humantime_serde")]
    pub keepalive_interval: Duration,
    /// Keepalive ack timeout (default: 3s).
    #[serde(default = "default_keepalive_timeout", with = "humantime_serde")]
    pub keepalive_timeout: Duration,
    /// Low-level connect retry backoff.
    #[serde(default)]
    pub connect_backoff: ConnectBackoff,
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_DIAL_TIMEOUT,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            keepalive_timeout: DEFAULT_KEEPALIVE_TIMEOUT,
            connect_backoff: ConnectBackoff::default(),
        }
    }
}

impl DialOptions {
    /// Set the dial timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.timeout.is_zero() {
            return Err("dial timeout must be non-zero".to_string());
        }
        if self.keepalive_interval.is_zero() || self.keepalive_timeout.is_zero() {
            return Err("keepalive interval and timeout must be non-zero".to_string());
        }
        self.connect_backoff.validate()
    }
}

/// Dials gRPC channels, plaintext or TLS.
#[derive(Clone)]
pub struct GrpcDialer {
    tls: Option<ClientTlsConfig>,
    options: DialOptions,
}

impl GrpcDialer {
    /// Create a dialer; `None` selects plaintext transport.
    pub fn new(tls: Option<ClientTlsConfig>) -> Self {
        Self {
            tls,
            options: DialOptions::default(),
        }
    }

    /// Replace the transport settings.
    pub fn with_options(mut self, options: DialOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &DialOptions {
        &self.options
    }

    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    fn endpoint(&self, address: &str) -> Result<Endpoint, ScrapeError> {
        let uri = if address.contains("://") {
            address.to_string()
        } else if self.tls.is_some() {
            format!("https://{address}")
        } else {
            format!("http://{address}")
        };

        let endpoint = Endpoint::from_shared(uri)
            .map_err(|e| ScrapeError::InvalidAddress {
                address: address.to_string(),
                reason: e.to_string(),
            })?
            .connect_timeout(self.options.timeout)
            .http2_keep_alive_interval(self.options.keepalive_interval)
            .keep_alive_timeout(self.options.keepalive_timeout)
            .tcp_nodelay(true);

        match &self.tls {
            Some(tls) => endpoint
                .tls_config(tls.clone())
                .map_err(|e| ScrapeError::Tls(e.to_string())),
            None => Ok(endpoint),
        }
    }
}

impl std::fmt::Debug for GrpcDialer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrpcDialer")
            .field("tls", &self.tls.is_some())
            .field("options", &self.options)
            .finish()
    }
}

#[async_trait::async_trait]
impl Connect for GrpcDialer {
    type Connection = Channel;

    async fn connect(
        &self,
        address: &str,
        cancel: &CancellationToken,
    ) -> Result<Channel, ScrapeError> {
        let endpoint = self.endpoint(address)?;
        let timeout = self.options.timeout;
        let backoff = self.options.connect_backoff;
        let deadline = Instant::now() + timeout;

        let dial = async {
            let mut retries = 0u32;
            loop {
                match endpoint.connect().await {
                    Ok(channel) => return Ok(channel),
                    Err(e) => {
                        let wait = backoff.delay(retries);
                        if Instant::now() + wait >= deadline {
                            return Err(ScrapeError::Dial(e));
                        }
                        tracing::debug!(address, retries, wait = ?wait, error = %e, "Connect failed, retrying");
                        tokio::time::sleep(wait).await;
                        retries += 1;
                    }
                }
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ScrapeError::Cancelled),
            result = tokio::time::timeout_at(deadline, dial) => {
                result.unwrap_or(Err(ScrapeError::DialTimeout(timeout)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;
    use tokio::net::TcpListener;

    #[test]
    fn test_dial_options_defaults() {
        let options = DialOptions::default();
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.keepalive_interval, Duration::from_secs(10));
        assert_eq!(options.keepalive_timeout, Duration::from_secs(3));
        assert_eq!(options.connect_backoff.base_delay, Duration::from_millis(100));
        assert_eq!(options.connect_backoff.multiplier, 1.6);
        assert_eq!(options.connect_backoff.jitter, 0.2);
        assert_eq!(options.connect_backoff.max_delay, Duration::from_secs(3));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_connect_backoff_growth_and_cap() {
        let backoff = ConnectBackoff::default();
        assert_eq!(backoff.base(0), Duration::from_millis(100));
        assert_eq!(backoff.base(1), Duration::from_secs_f64(0.1 * 1.6));
        assert_eq!(backoff.base(20), Duration::from_secs(3));
        assert_eq!(backoff.base(u32::MAX), Duration::from_secs(3));
    }

    #[test]
    fn test_connect_backoff_jitter_bounds() {
        let backoff = ConnectBackoff::default();
        for retries in 0..12 {
            let base = backoff.base(retries).as_secs_f64();
            let delay = backoff.delay(retries).as_secs_f64();
            assert!(delay >= base * 0.8 - 1e-9, "{delay} below jitter range");
            assert!(delay <= base * 1.2 + 1e-9, "{delay} above jitter range");
        }
    }

    #[test]
    fn test_connect_backoff_unvalidated_values() {
        let backoff = ConnectBackoff {
            multiplier: -3.0,
            jitter: 7.5,
            ..ConnectBackoff::default()
        };
        for retries in 0..8 {
            assert_eq!(backoff.base(retries), Duration::from_millis(100));
            assert!(backoff.delay(retries) <= Duration::from_millis(200));
        }

        let backoff = ConnectBackoff {
            jitter: f64::NAN,
            ..ConnectBackoff::default()
        };
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
    }

    #[test]
    fn test_connect_backoff_validation() {
        let backoff = ConnectBackoff {
            jitter: 1.5,
            ..ConnectBackoff::default()
        };
        assert!(backoff.validate().unwrap_err().contains("jitter"));
    }

    #[test]
    fn test_endpoint_invalid_address() {
        let dialer = GrpcDialer::new(None);
        let result = dialer.endpoint("not a uri");
        assert!(matches!(result, Err(ScrapeError::InvalidAddress { .. })));
    }

    #[test]
    fn test_endpoint_plaintext_scheme() {
        let dialer = GrpcDialer::new(None);
        let endpoint = dialer.endpoint("127.0.0.1:10080").unwrap();
        assert_eq!(endpoint.uri().scheme_str(), Some("http"));
        assert!(!dialer.is_tls());
    }

    #[tokio::test]
    async fn test_dial_refused_within_timeout() {
        // Bind then drop to get a port with nothing listening.
        let listener = match TcpListener::bind("127.0.0.1:0").await {
            Ok(l) => l,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => return,
            Err(e) => panic!("Failed to bind test listener: {e}"),
        };
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let options = DialOptions::default().with_timeout(Duration::from_millis(500));
        let dialer = GrpcDialer::new(None).with_options(options);
        let cancel = CancellationToken::new();

        let start = std::time::Instant::now();
        let result = dialer.connect(&addr.to_string(), &cancel).await;

        assert!(result.is_err());
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_dial_cancelled() {
        let dialer = GrpcDialer::new(None);
        let cancel = CancellationToken::new();
        cancel.cancel();

        // Non-routable address; only cancellation can end this quickly.
        let start = std::time::Instant::now();
        let result = dialer.connect("10.255.255.1:80", &cancel).await;

        assert!(matches!(result, Err(ScrapeError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
