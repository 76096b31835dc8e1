//! Core scrape traits and types.

use std::pin::Pin;
use std::time::Duration;

use futures::Stream;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::scrape::TargetKind;

/// Server stream of decoded records, as returned by a subscribe call.
pub type RecordStream<R> = Pin<Box<dyn Stream<Item = Result<R, tonic::Status>> + Send>>;

/// Errors that can occur while establishing or reading a subscription.
///
/// Everything except [`ScrapeError::Task`] is transient from the caller's
/// point of view: the reconnecting stream logs it and retries, and never
/// hands it out.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Target address cannot be turned into an endpoint URI.
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// TLS material was rejected by the transport.
    #[error("tls config error: {0}")]
    Tls(String),

    /// Transport connection failed.
    #[error("dial error: {0}")]
    Dial(#[from] tonic::transport::Error),

    /// No connection was established within the dial timeout.
    #[error("dial timed out after {0:?}")]
    DialTimeout(Duration),

    /// Subscribe RPC was rejected.
    #[error("subscribe failed: {0}")]
    Subscribe(tonic::Status),

    /// Reading from the server stream failed.
    #[error("stream read failed: {0}")]
    Stream(tonic::Status),

    /// Server closed the stream.
    #[error("stream closed by server")]
    EndOfStream,

    /// Cancellation token fired.
    #[error("cancelled")]
    Cancelled,

    /// Scraper task panicked or was aborted.
    #[error("scraper task failed: {0}")]
    Task(String),
}

/// Establishes transport connections to a target address.
///
/// Implementations must return promptly once `cancel` fires.
#[async_trait::async_trait]
pub trait Connect: Send + Sync + 'static {
    /// Live transport connection. Dropping it releases the connection.
    type Connection: Send + Sync + 'static;

    /// Open a fresh connection to `address`.
    async fn connect(
        &self,
        address: &str,
        cancel: &CancellationToken,
    ) -> Result<Self::Connection, ScrapeError>;
}

/// Kind-specific subscribe procedure.
///
/// One implementation exists per [`TargetKind`]; the reconnect, backoff and
/// close logic around it is shared.
#[async_trait::async_trait]
pub trait Subscribe<C: Send + Sync>: Send + Sync + 'static {
    /// Record type carried by the server stream.
    type Record: Send + 'static;

    /// Kind of target this subscriber speaks to.
    fn kind(&self) -> TargetKind;

    /// Issue the subscribe call over `connection` and return its stream.
    async fn subscribe(&self, connection: &C) -> Result<RecordStream<Self::Record>, ScrapeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_error_display() {
        let err = ScrapeError::InvalidAddress {
            address: "::bad".to_string(),
            reason: "invalid uri".to_string(),
        };
        assert_eq!(err.to_string(), "invalid address '::bad': invalid uri");

        let err = ScrapeError::DialTimeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "dial timed out after 5s");

        let err = ScrapeError::Stream(tonic::Status::unavailable("gone"));
        assert!(err.to_string().starts_with("stream read failed"));
        assert!(err.to_string().contains("gone"));
    }
}
