//! Scrape Layer
//!
//! Long-lived Top SQL subscriptions against TiDB and TiKV instances. Each
//! target gets a [`Scraper`] running in its own Tokio task; the scraper
//! drains a [`ReconnectingStream`] that hides dial failures, broken streams
//! and server-side closes behind a retry policy.
//!
//! # Architecture
//!
//! - [`Connect`]: Opens transport connections ([`GrpcDialer`] for gRPC)
//! - [`Subscribe`]: Kind-specific subscribe call, one per [`TargetKind`]
//! - [`ReconnectingStream`]: Yields records in order, reconnecting as needed
//! - [`ScraperRegistry`]: Keeps one scraper per configured target
//!
//! # Example
//!
//! ```rust,no_run
//! use mockngm::scrape::{GrpcDialer, ScraperRegistry, Target};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() {
//! let shutdown = CancellationToken::new();
//! let mut registry = ScraperRegistry::new(&shutdown, GrpcDialer::new(None));
//! registry.update_targets([
//!     Target::tidb("127.0.0.1:10080"),
//!     Target::tikv("127.0.0.1:20180"),
//! ]);
//! // ...
//! registry.shutdown().await.ok();
//! # }
//! ```

pub mod backoff;
pub mod dial;
mod record;
mod registry;
mod scraper;
pub(crate) mod stream;
pub mod subscriber;
mod target;
mod traits;

pub use backoff::{Attempt, BackoffPolicy, with_retry_backoff};
pub use dial::{ConnectBackoff, DialOptions, GrpcDialer};
pub use record::Record;
pub use registry::{DEFAULT_SHUTDOWN_TIMEOUT, ScraperInfo, ScraperRegistry};
pub use scraper::{DEFAULT_REPORT_INTERVAL, Scraper};
pub use stream::ReconnectingStream;
pub use subscriber::{ResourceMeteringSubscriber, TopSqlSubscriber};
pub use target::{Target, TargetKind};
pub use traits::{Connect, RecordStream, ScrapeError, Subscribe};
