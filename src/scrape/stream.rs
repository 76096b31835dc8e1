//! Reconnecting subscription stream.
//!
//! [`ReconnectingStream`] owns the connection and server stream for one
//! target. It is either disconnected (no session) or streaming (session
//! present, last read succeeded). Any read failure drops the session and
//! falls into a dial, subscribe, read cycle driven by
//! [`with_retry_backoff`]. Only two outcomes leave [`next_record`]: a
//! record, or `None` once retries are exhausted or the token has fired.
//!
//! [`next_record`]: ReconnectingStream::next_record

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::scrape::backoff::{Attempt, BackoffPolicy, with_retry_backoff};
use crate::scrape::{Connect, RecordStream, ScrapeError, Subscribe, Target};

/// Live connection plus the stream opened over it. Always populated together.
struct Session<C, R> {
    // Held so the transport stays open for as long as the stream is read.
    _connection: C,
    stream: RecordStream<R>,
}

/// Subscription stream that transparently reconnects and resubscribes.
pub struct ReconnectingStream<D, S>
where
    D: Connect,
    S: Subscribe<D::Connection>,
{
    target: Target,
    cancel: CancellationToken,
    dialer: Arc<D>,
    subscriber: S,
    policy: BackoffPolicy,
    session: Option<Session<D::Connection, S::Record>>,
    terminal: bool,
}

impl<D, S> ReconnectingStream<D, S>
where
    D: Connect,
    S: Subscribe<D::Connection>,
{
    /// Create a disconnected stream; the first [`next_record`] call dials.
    ///
    /// [`next_record`]: Self::next_record
    pub fn new(
        target: Target,
        cancel: CancellationToken,
        dialer: Arc<D>,
        subscriber: S,
        policy: BackoffPolicy,
    ) -> Self {
        debug_assert_eq!(
            target.kind,
            subscriber.kind(),
            "subscriber does not match target kind"
        );
        Self {
            target,
            cancel,
            dialer,
            subscriber,
            policy,
            session: None,
            terminal: false,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Whether [`next_record`](Self::next_record) has reported the end.
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Whether a connection and stream are currently held.
    pub fn is_streaming(&self) -> bool {
        self.session.is_some()
    }

    /// Next record from the target, reconnecting as needed.
    ///
    /// Returns `None` when the reconnect policy is exhausted or the
    /// cancellation token fires. Both are permanent: the stream holds no
    /// connection afterwards and a new instance is needed to try again.
    pub async fn next_record(&mut self) -> Option<S::Record> {
        if self.terminal || self.cancel.is_cancelled() {
            return self.finish();
        }

        if let Some(session) = self.session.as_mut() {
            match read_next(&self.cancel, &mut session.stream).await {
                Ok(record) => return Some(record),
                Err(ScrapeError::Cancelled) => return self.finish(),
                Err(e) => {
                    tracing::warn!(component = %self.target, error = %e, "Scrape stream broken, reconnecting");
                    self.close();
                }
            }
        }

        self.reconnect().await
    }

    /// Release the connection, if any. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.session.take().is_some() {
            tracing::debug!(component = %self.target, "Scrape connection released");
        }
    }

    fn finish(&mut self) -> Option<S::Record> {
        self.terminal = true;
        self.close();
        None
    }

    async fn reconnect(&mut self) -> Option<S::Record> {
        let cancel = self.cancel.clone();
        let policy = self.policy;

        let mut reconnect = Reconnect {
            stream: self,
            first: None,
        };
        let ok = with_retry_backoff(&cancel, &policy, &mut reconnect).await;
        let first = reconnect.first.take();

        match first {
            Some(record) if ok => Some(record),
            _ => {
                if !cancel.is_cancelled() {
                    tracing::warn!(
                        component = %self.target,
                        attempts = policy.max_attempts,
                        "Giving up on scrape target"
                    );
                }
                self.finish()
            }
        }
    }
}

impl<D, S> Drop for ReconnectingStream<D, S>
where
    D: Connect,
    S: Subscribe<D::Connection>,
{
    fn drop(&mut self) {
        self.close();
    }
}

impl<D, S> std::fmt::Debug for ReconnectingStream<D, S>
where
    D: Connect,
    S: Subscribe<D::Connection>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectingStream")
            .field("target", &self.target)
            .field("policy", &self.policy)
            .field("streaming", &self.session.is_some())
            .field("terminal", &self.terminal)
            .finish_non_exhaustive()
    }
}

/// One reconnect try, run by the backoff driver.
struct Reconnect<'a, D, S>
where
    D: Connect,
    S: Subscribe<D::Connection>,
{
    stream: &'a mut ReconnectingStream<D, S>,
    first: Option<S::Record>,
}

#[async_trait::async_trait]
impl<'a, D, S> Attempt for Reconnect<'a, D, S>
where
    D: Connect,
    S: Subscribe<D::Connection>,
{
    async fn attempt(&mut self, retried: u32) -> bool {
        // Never reuse a stale handle.
        self.stream.close();

        // Borrow fields individually; the session itself is not `Sync`.
        let opened = open(
            &self.stream.target,
            &self.stream.cancel,
            self.stream.dialer.as_ref(),
            &self.stream.subscriber,
        )
        .await;

        match opened {
            Ok((session, first)) => {
                tracing::debug!(component = %self.stream.target, retried, "Subscribed to scrape target");
                self.stream.session = Some(session);
                self.first = Some(first);
                true
            }
            Err(ScrapeError::Cancelled) => false,
            Err(e) => {
                tracing::warn!(component = %self.stream.target, retried, error = %e, "Failed to scrape target");
                false
            }
        }
    }
}

/// Dial, subscribe and read the first record.
async fn open<D, S>(
    target: &Target,
    cancel: &CancellationToken,
    dialer: &D,
    subscriber: &S,
) -> Result<(Session<D::Connection, S::Record>, S::Record), ScrapeError>
where
    D: Connect,
    S: Subscribe<D::Connection>,
{
    let connection = dialer.connect(&target.address, cancel).await?;

    let mut stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
        result = subscriber.subscribe(&connection) => result?,
    };

    let first = read_next(cancel, &mut stream).await?;
    Ok((
        Session {
            _connection: connection,
            stream,
        },
        first,
    ))
}

async fn read_next<R>(
    cancel: &CancellationToken,
    stream: &mut RecordStream<R>,
) -> Result<R, ScrapeError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ScrapeError::Cancelled),
        item = stream.next() => match item {
            Some(Ok(record)) => Ok(record),
            Some(Err(status)) => Err(ScrapeError::Stream(status)),
            None => Err(ScrapeError::EndOfStream),
        },
    }
}
