//! Scraper registry for managing scraper lifecycle.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::scrape::backoff::BackoffPolicy;
use crate::scrape::dial::GrpcDialer;
use crate::scrape::scraper::{DEFAULT_REPORT_INTERVAL, Scraper};
use crate::scrape::{Record, ScrapeError, Target};

/// Default timeout for graceful shutdown (5 seconds).
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Snapshot of a registered scraper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScraperInfo {
    /// Scraped target.
    pub target: Target,
    /// Records received so far.
    pub received: u64,
    /// Whether the scraper task is still running.
    pub running: bool,
}

struct ScraperHandle {
    scraper: Arc<Scraper>,
    task: JoinHandle<()>,
}

impl ScraperHandle {
    fn is_finished(&self) -> bool {
        self.task.is_finished() || self.scraper.is_down()
    }
}

/// Registry running one [`Scraper`] task per target.
///
/// All scrapers live under one cancellation scope, so cancelling the parent
/// token passed to [`ScraperRegistry::new`] stops every scraper.
pub struct ScraperRegistry {
    cancel: CancellationToken,
    dialer: Arc<GrpcDialer>,
    policy: BackoffPolicy,
    report_interval: Duration,
    sink: Option<mpsc::Sender<Record>>,
    scrapers: HashMap<Target, ScraperHandle>,
}

impl ScraperRegistry {
    /// Create an empty registry scoped under `parent`.
    pub fn new(parent: &CancellationToken, dialer: GrpcDialer) -> Self {
        Self {
            cancel: parent.child_token(),
            dialer: Arc::new(dialer),
            policy: BackoffPolicy::default(),
            report_interval: DEFAULT_REPORT_INTERVAL,
            sink: None,
            scrapers: HashMap::new(),
        }
    }

    /// Set the reconnect policy for scrapers started from now on.
    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the throughput report interval for scrapers started from now on.
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Forward records of every scraper to `sink`.
    pub fn with_sink(mut self, sink: mpsc::Sender<Record>) -> Self {
        self.sink = Some(sink);
        self
    }
}

impl std::fmt::Debug for ScraperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScraperRegistry")
            .field("scraper_count", &self.scrapers.len())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ScraperRegistry {
    /// Reconcile running scrapers with `targets`.
    ///
    /// Scrapers for targets no longer listed are closed. Targets without a
    /// live scraper get a new one; this includes scrapers that gave up after
    /// exhausting their reconnect policy. Returns the number started.
    pub fn update_targets(&mut self, targets: impl IntoIterator<Item = Target>) -> usize {
        let wanted: HashSet<Target> = targets.into_iter().collect();

        self.scrapers.retain(|target, handle| {
            if wanted.contains(target) {
                return true;
            }
            handle.scraper.close();
            tracing::info!(component = %target, "Scraper removed");
            false
        });

        let mut started = 0;
        for target in wanted {
            match self.scrapers.get(&target) {
                Some(handle) if !handle.is_finished() => continue,
                Some(handle) => {
                    tracing::info!(
                        component = %target,
                        received = handle.scraper.received(),
                        "Scraper is down, restarting"
                    );
                    handle.scraper.close();
                }
                None => {}
            }
            self.start(target);
            started += 1;
        }
        started
    }

    /// List all registered scrapers.
    pub fn list(&self) -> Vec<ScraperInfo> {
        self.scrapers
            .iter()
            .map(|(target, handle)| ScraperInfo {
                target: target.clone(),
                received: handle.scraper.received(),
                running: !handle.is_finished(),
            })
            .collect()
    }

    /// Targets with a registered scraper.
    pub fn targets(&self) -> Vec<Target> {
        self.scrapers.keys().cloned().collect()
    }

    /// Get the number of registered scrapers.
    pub fn len(&self) -> usize {
        self.scrapers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scrapers.is_empty()
    }

    /// Close every scraper and wait for them with the default timeout.
    pub async fn shutdown(self) -> Result<(), ScrapeError> {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await
    }

    /// Shutdown with custom timeout.
    ///
    /// A timeout is logged, not returned as an error; a scraper task that
    /// panicked is.
    pub async fn shutdown_with_timeout(mut self, timeout: Duration) -> Result<(), ScrapeError> {
        let scraper_count = self.scrapers.len();
        self.cancel.cancel();

        let tasks: Vec<_> = self
            .scrapers
            .drain()
            .map(|(target, handle)| (target, handle.task))
            .collect();

        let joined = tokio::time::timeout(timeout, async {
            let mut failure = None;
            for (target, task) in tasks {
                if let Err(e) = task.await {
                    tracing::error!(component = %target, error = %e, "Scraper task failed");
                    failure.get_or_insert(ScrapeError::Task(e.to_string()));
                }
            }
            failure
        })
        .await;

        match joined {
            Ok(None) => {
                tracing::info!(scraper_count, "Scraper registry shutdown complete");
                Ok(())
            }
            Ok(Some(err)) => Err(err),
            Err(_) => {
                tracing::warn!(scraper_count, "Scraper registry shutdown timed out");
                Ok(())
            }
        }
    }

    // --- Private helpers ---

    fn start(&mut self, target: Target) {
        let mut scraper =
            Scraper::with_dialer(&self.cancel, target.clone(), Arc::clone(&self.dialer))
                .with_policy(self.policy)
                .with_report_interval(self.report_interval);
        if let Some(sink) = &self.sink {
            scraper = scraper.with_sink(sink.clone());
        }

        let scraper = Arc::new(scraper);
        let task = tokio::spawn({
            let scraper = Arc::clone(&scraper);
            async move { scraper.run().await }
        });

        tracing::info!(component = %target, "Scraper registered");
        self.scrapers.insert(target, ScraperHandle { scraper, task });
    }
}
