//! Per-target scraper.
//!
//! A [`Scraper`] owns a cancellation scope for one target, picks the
//! subscriber matching the target kind, and drains a
//! [`ReconnectingStream`] until it reports terminal. Received records are
//! counted, reported at most once per report interval, and forwarded to an
//! optional sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::transport::ClientTlsConfig;

use crate::scrape::backoff::BackoffPolicy;
use crate::scrape::dial::GrpcDialer;
use crate::scrape::stream::ReconnectingStream;
use crate::scrape::subscriber::{ResourceMeteringSubscriber, TopSqlSubscriber};
use crate::scrape::{Connect, Record, Subscribe, Target, TargetKind};

/// Default interval between throughput log lines (1 second).
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Scrapes one target until its stream is exhausted or it is closed.
pub struct Scraper {
    cancel: CancellationToken,
    target: Target,
    dialer: Arc<GrpcDialer>,
    policy: BackoffPolicy,
    report_interval: Duration,
    sink: Option<mpsc::Sender<Record>>,
    received: AtomicU64,
}

impl Scraper {
    /// Create a scraper scoped under `parent`; `tls` of `None` dials plaintext.
    pub fn new(parent: &CancellationToken, target: Target, tls: Option<ClientTlsConfig>) -> Self {
        Self::with_dialer(parent, target, Arc::new(GrpcDialer::new(tls)))
    }

    /// Create a scraper that shares an existing dialer.
    pub fn with_dialer(parent: &CancellationToken, target: Target, dialer: Arc<GrpcDialer>) -> Self {
        Self {
            cancel: parent.child_token(),
            target,
            dialer,
            policy: BackoffPolicy::default(),
            report_interval: DEFAULT_REPORT_INTERVAL,
            sink: None,
            received: AtomicU64::new(0),
        }
    }

    /// Set the reconnect policy.
    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the minimum interval between throughput log lines.
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Forward every received record to `sink`.
    pub fn with_sink(mut self, sink: mpsc::Sender<Record>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Total records received since creation.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Whether this scraper has been closed, directly or through its parent.
    pub fn is_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel the scraper. In-flight dials, reads and waits return promptly
    /// and [`run`](Self::run) releases the stream on its way out.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Scrape until the stream reports terminal.
    pub async fn run(&self) {
        tracing::info!(component = %self.target, "Starting Top SQL scraping");
        match self.target.kind {
            TargetKind::TiDb => self.drain(self.stream(TopSqlSubscriber)).await,
            TargetKind::TiKv => self.drain(self.stream(ResourceMeteringSubscriber)).await,
        }
        tracing::info!(
            component = %self.target,
            received = self.received(),
            closed = self.is_down(),
            "Top SQL scraping stopped"
        );
    }

    fn stream<S>(&self, subscriber: S) -> ReconnectingStream<GrpcDialer, S>
    where
        S: Subscribe<tonic::transport::Channel>,
    {
        ReconnectingStream::new(
            self.target.clone(),
            self.cancel.clone(),
            Arc::clone(&self.dialer),
            subscriber,
            self.policy,
        )
    }

    /// Drain `stream` until terminal. The stream is owned here, so it is
    /// released on every exit path, unwinding included.
    async fn drain<D, S>(&self, mut stream: ReconnectingStream<D, S>)
    where
        D: Connect,
        S: Subscribe<D::Connection>,
        S::Record: Into<Record>,
    {
        let mut last_log = Instant::now();
        let mut suppressed: u64 = 0;

        while let Some(record) = stream.next_record().await {
            self.received.fetch_add(1, Ordering::Relaxed);
            suppressed += 1;
            if last_log.elapsed() > self.report_interval {
                tracing::info!(records = suppressed, component = %self.target, "Received Top SQL records");
                last_log = Instant::now();
                suppressed = 0;
            }

            if let Some(sink) = &self.sink {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    sent = sink.send(record.into()) => {
                        if sent.is_err() {
                            tracing::debug!(component = %self.target, "Record sink closed, counting only");
                        }
                    }
                }
            }
        }

        stream.close();
    }
}

impl std::fmt::Debug for Scraper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scraper")
            .field("target", &self.target)
            .field("policy", &self.policy)
            .field("received", &self.received())
            .field("down", &self.is_down())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::tipb::TopSqlSubResponse;
    use crate::scrape::{RecordStream, ScrapeError};
    use futures::StreamExt;
    use std::io::ErrorKind;
    use std::sync::atomic::{AtomicBool, AtomicU32};
    use tokio::net::TcpListener;

    struct FakeConnection {
        released: Arc<AtomicU32>,
    }

    impl Drop for FakeConnection {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct FakeDialer {
        released: Arc<AtomicU32>,
    }

    #[async_trait::async_trait]
    impl Connect for FakeDialer {
        type Connection = FakeConnection;

        async fn connect(
            &self,
            _address: &str,
            _cancel: &CancellationToken,
        ) -> Result<FakeConnection, ScrapeError> {
            Ok(FakeConnection {
                released: Arc::clone(&self.released),
            })
        }
    }

    /// First subscribe serves `count` empty Top SQL responses; later
    /// subscribes get an immediately ending stream.
    struct FiniteTopSql {
        count: usize,
        served: AtomicBool,
    }

    #[async_trait::async_trait]
    impl Subscribe<FakeConnection> for FiniteTopSql {
        type Record = TopSqlSubResponse;

        fn kind(&self) -> TargetKind {
            TargetKind::TiDb
        }

        async fn subscribe(
            &self,
            _connection: &FakeConnection,
        ) -> Result<RecordStream<TopSqlSubResponse>, ScrapeError> {
            let count = if self.served.swap(true, Ordering::SeqCst) {
                0
            } else {
                self.count
            };
            let items = (0..count).map(|_| Ok(TopSqlSubResponse::default()));
            Ok(futures::stream::iter(items).boxed())
        }
    }

    fn one_shot_policy() -> BackoffPolicy {
        BackoffPolicy::new(1, Duration::from_millis(10))
    }

    fn fake_stream(
        scraper: &Scraper,
        dialer: &Arc<FakeDialer>,
        count: usize,
    ) -> ReconnectingStream<FakeDialer, FiniteTopSql> {
        ReconnectingStream::new(
            scraper.target.clone(),
            scraper.cancel.clone(),
            Arc::clone(dialer),
            FiniteTopSql {
                count,
                served: AtomicBool::new(false),
            },
            scraper.policy,
        )
    }

    #[test]
    fn test_close_marks_down() {
        let parent = CancellationToken::new();
        let scraper = Scraper::new(&parent, Target::tidb("127.0.0.1:10080"), None);

        assert_eq!(scraper.target(), &Target::tidb("127.0.0.1:10080"));
        assert!(!scraper.is_down());
        scraper.close();
        assert!(scraper.is_down());
        // Closing a scraper does not affect its parent scope.
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_parent_cancel_cascades() {
        let parent = CancellationToken::new();
        let scraper = Scraper::new(&parent, Target::tikv("127.0.0.1:20160"), None);

        parent.cancel();
        assert!(scraper.is_down());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_counts_and_forwards_in_order() {
        let parent = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(16);
        let scraper = Scraper::new(&parent, Target::tidb("127.0.0.1:10080"), None)
            .with_policy(one_shot_policy())
            .with_sink(tx);
        let dialer = Arc::new(FakeDialer::default());

        // Three records, then end of stream; the single reconnect attempt
        // reads an empty stream and the drain loop ends.
        let stream = fake_stream(&scraper, &dialer, 3);
        scraper.drain(stream).await;

        assert_eq!(scraper.received(), 3);
        let mut forwarded = Vec::new();
        while let Ok(record) = rx.try_recv() {
            forwarded.push(record);
        }
        assert_eq!(forwarded.len(), 3);
        assert!(forwarded.iter().all(|r| r.kind() == TargetKind::TiDb));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_releases_stream_on_exit() {
        let parent = CancellationToken::new();
        let scraper = Scraper::new(&parent, Target::tidb("127.0.0.1:10080"), None)
            .with_policy(one_shot_policy());
        let dialer = Arc::new(FakeDialer::default());

        scraper.drain(fake_stream(&scraper, &dialer, 2)).await;

        // Both dials (initial and the failed reconnect) were released.
        assert_eq!(dialer.released.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_with_dropped_sink_keeps_counting() {
        let parent = CancellationToken::new();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let scraper = Scraper::new(&parent, Target::tidb("127.0.0.1:10080"), None)
            .with_policy(one_shot_policy())
            .with_sink(tx);
        let dialer = Arc::new(FakeDialer::default());

        scraper.drain(fake_stream(&scraper, &dialer, 4)).await;
        assert_eq!(scraper.received(), 4);
    }

    #[tokio::test]
    async fn test_run_closed_scraper_returns_immediately() {
        let parent = CancellationToken::new();
        let scraper = Scraper::new(&parent, Target::tikv("10.255.255.1:20160"), None);
        scraper.close();

        let result = tokio::time::timeout(Duration::from_secs(1), scraper.run()).await;
        assert!(result.is_ok(), "run() should return once closed");
        assert_eq!(scraper.received(), 0);
    }

    #[tokio::test]
    async fn test_run_unreachable_target_terminates() {
        let listener = match TcpListener::bind("127.0.0.1:0").await {
            Ok(l) => l,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => return,
            Err(e) => panic!("Failed to bind test listener: {e}"),
        };
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let parent = CancellationToken::new();
        let dialer = GrpcDialer::new(None).with_options(
            crate::scrape::dial::DialOptions::default().with_timeout(Duration::from_millis(200)),
        );
        let scraper = Scraper::with_dialer(&parent, Target::tidb(addr.to_string()), Arc::new(dialer))
            .with_policy(BackoffPolicy::new(2, Duration::from_millis(10)));

        let result = tokio::time::timeout(Duration::from_secs(5), scraper.run()).await;
        assert!(result.is_ok(), "run() should end after retries are exhausted");
        assert_eq!(scraper.received(), 0);
        // Exhaustion ends the run without closing the scope.
        assert!(!scraper.is_down());
    }
}
