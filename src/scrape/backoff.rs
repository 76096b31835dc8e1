//! Retry driver with capped exponential backoff.
//!
//! [`with_retry_backoff`] decides how many times to try and how long to wait
//! in between; what a single try does is supplied as an [`Attempt`].

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Default wait after the first failed attempt (2 seconds).
pub const DEFAULT_INITIAL_WAIT: Duration = Duration::from_secs(2);

/// Default number of attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

/// Default growth factor between consecutive waits.
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Default upper bound of a single wait (10 seconds).
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

fn default_initial_wait() -> Duration {
    DEFAULT_INITIAL_WAIT
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_multiplier() -> f64 {
    DEFAULT_MULTIPLIER
}

fn default_max_delay() -> Duration {
    DEFAULT_MAX_DELAY
}

/// Reconnect policy: how many attempts, and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Wait after the first failure (default: 2s).
    #[serde(default = "default_initial_wait", with = "humantime_serde")]
    pub initial_wait: Duration,
    /// Total attempts, including the first one (default: 8).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Growth factor applied to the wait after each failure (default: 2.0).
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Cap on a single wait (default: 10s).
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_wait: DEFAULT_INITIAL_WAIT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            multiplier: DEFAULT_MULTIPLIER,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl BackoffPolicy {
    /// Create a policy with default growth and cap.
    pub fn new(max_attempts: u32, initial_wait: Duration) -> Self {
        Self {
            initial_wait,
            max_attempts,
            ..Self::default()
        }
    }

    /// Set the growth factor.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Set the cap on a single wait.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Wait that follows the failure of attempt `retried` (0-based).
    ///
    /// `initial_wait * multiplier^retried`, capped at `max_delay`. A
    /// multiplier below 1 (or NaN) is treated as 1, so waits never shrink.
    pub fn delay(&self, retried: u32) -> Duration {
        let exponent = i32::try_from(retried).unwrap_or(i32::MAX);
        let multiplier = growth(self.multiplier);
        let secs = self.initial_wait.as_secs_f64() * multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs).min(self.max_delay)
    }

    /// Check that the policy can make progress.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be positive".to_string());
        }
        if self.initial_wait.is_zero() {
            return Err("initial_wait must be non-zero".to_string());
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(format!(
                "multiplier must be a finite value >= 1.0, got {}",
                self.multiplier
            ));
        }
        if self.max_delay < self.initial_wait {
            return Err(format!(
                "max_delay ({:?}) must not be less than initial_wait ({:?})",
                self.max_delay, self.initial_wait
            ));
        }
        Ok(())
    }
}

/// Growth factor actually applied: at least 1, NaN included.
pub(crate) fn growth(multiplier: f64) -> f64 {
    if multiplier >= 1.0 { multiplier } else { 1.0 }
}

/// One try of a retried operation.
///
/// Receives the 0-based index of the attempt and reports whether it
/// succeeded. Side effects belong here; the driver itself keeps no state
/// beyond its loop counter.
#[async_trait::async_trait]
pub trait Attempt: Send {
    async fn attempt(&mut self, retried: u32) -> bool;
}

#[async_trait::async_trait]
impl<F, Fut> Attempt for F
where
    F: FnMut(u32) -> Fut + Send,
    Fut: Future<Output = bool> + Send + 'static,
{
    async fn attempt(&mut self, retried: u32) -> bool {
        (self)(retried).await
    }
}

/// Run `attempt` until it succeeds, `policy.max_attempts` are used up, or
/// `cancel` fires.
///
/// Returns `true` as soon as an attempt succeeds. Waits between failures
/// are interruptible; no wait follows the last attempt.
pub async fn with_retry_backoff<A>(
    cancel: &CancellationToken,
    policy: &BackoffPolicy,
    attempt: &mut A,
) -> bool
where
    A: Attempt + ?Sized,
{
    for retried in 0..policy.max_attempts {
        if cancel.is_cancelled() {
            return false;
        }
        if attempt.attempt(retried).await {
            return true;
        }
        if retried + 1 >= policy.max_attempts {
            break;
        }

        let wait = policy.delay(retried);
        tracing::debug!(retried, wait = ?wait, "Attempt failed, backing off");
        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = tokio::time::sleep(wait) => {}
        }
    }
    false
}
