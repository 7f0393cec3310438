//! Follower handle and the background producer task.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc, watch};
use tracing::{debug, error, info};

use super::policy::{ErrorTolerance, RetryPolicy};
use super::stream::ChangesStream;
use super::{DEFAULT_BATCH_SIZE, LONGPOLL_TIMEOUT, MIN_CLIENT_TIMEOUT, estimate_batch_size};
use crate::error::{Error, Result};
use crate::observability::FeedStats;
use crate::service::CouchService;
use crate::types::{ChangesFeed, ChangesResultItem, PostChangesOptions};

/// A batch or the error that ended the feed.
pub(crate) type Batch = Result<Vec<ChangesResultItem>>;

const UNLIMITED: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Ends after the batch that reports nothing pending
    Finite,
    /// Runs until stopped
    Listen,
}

impl Mode {
    fn default_since(self) -> &'static str {
        match self {
            Mode::Finite => "0",
            Mode::Listen => "now",
        }
    }
}

/// State shared by the follower handle, the producer and the stream.
pub(crate) struct Shared {
    service: Arc<dyn CouchService>,
    options: PostChangesOptions,
    tolerance: ErrorTolerance,
    stop_tx: watch::Sender<bool>,
    remaining: AtomicU64,
}

impl Shared {
    pub(crate) fn stop(&self) {
        self.remaining.store(0, Ordering::SeqCst);
        self.stop_tx.send_replace(true);
    }

    pub(crate) fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    /// Claims one item of the delivery limit; stops the follower on the last one.
    pub(crate) fn take_one(&self) -> bool {
        let claimed = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                UNLIMITED => Some(UNLIMITED),
                n => Some(n - 1),
            });
        match claimed {
            Ok(1) => {
                self.stop();
                true
            }
            Ok(_) => true,
            Err(_) => false,
        }
    }
}

/// Follows the `_changes` feed of one database.
///
/// Options are validated at construction and frozen. A follower can be
/// started once, either with [`start_one_off`](Self::start_one_off) to read
/// up to the current end of the feed or with [`start`](Self::start) to keep
/// listening for new changes. [`stop`](Self::stop) may be called from any
/// thread; the follower is `Send + Sync` and is usually shared in an `Arc`.
///
/// The following options are rejected because the follower owns them:
/// `descending`, `feed`, `heartbeat`, `last_event_id` and `timeout`. The only
/// accepted `filter` is `_selector`. The service's call and read timeouts
/// must be at least 60 seconds.
pub struct ChangesFollower {
    shared: Arc<Shared>,
    started: AtomicBool,
}

impl std::fmt::Debug for ChangesFollower {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangesFollower")
            .field("db", &self.shared.options.db)
            .field("tolerance", &self.shared.tolerance)
            .field("started", &self.started.load(Ordering::SeqCst))
            .field("stopped", &self.shared.is_stopped())
            .finish()
    }
}

impl ChangesFollower {
    /// Create a follower that suppresses transient errors forever.
    pub fn new(service: Arc<dyn CouchService>, options: PostChangesOptions) -> Result<Self> {
        Self::with_error_tolerance(service, options, Duration::MAX)
    }

    /// Create a follower that suppresses transient errors for `tolerance`
    /// after the last successful response.
    ///
    /// `Duration::ZERO` makes the first transient error end the feed,
    /// `Duration::MAX` suppresses them forever.
    pub fn with_error_tolerance(
        service: Arc<dyn CouchService>,
        options: PostChangesOptions,
        tolerance: Duration,
    ) -> Result<Self> {
        validate(service.as_ref(), &options)?;

        let (stop_tx, _) = watch::channel(false);
        let remaining = options.limit.unwrap_or(UNLIMITED);
        Ok(Self {
            shared: Arc::new(Shared {
                service,
                options,
                tolerance: ErrorTolerance::from(tolerance),
                stop_tx,
                remaining: AtomicU64::new(remaining),
            }),
            started: AtomicBool::new(false),
        })
    }

    /// Read the feed up to its current end, starting from `since` or the
    /// beginning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] if the follower was already started.
    pub fn start_one_off(&self) -> Result<ChangesStream> {
        self.run(Mode::Finite)
    }

    /// Keep reading the feed until stopped, starting from `since` or now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] if the follower was already started.
    pub fn start(&self) -> Result<ChangesStream> {
        self.run(Mode::Listen)
    }

    /// Stop the feed. Items not yet handed out are discarded.
    ///
    /// This only raises the stop signal and returns without waiting. The
    /// producer observes it at its next request, backoff sleep or hand-off and
    /// exits without issuing further requests. Dropping the stream aborts it
    /// outright.
    pub fn stop(&self) {
        if !self.shared.is_stopped() {
            info!(db = %self.shared.options.db, "Stopping changes follower");
        }
        self.shared.stop();
    }

    fn run(&self, mode: Mode) -> Result<ChangesStream> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::IllegalState(
                "Cannot start a feed that has already started".to_string(),
            ));
        }
        info!(db = %self.shared.options.db, ?mode, "Starting changes follower");
        if self.shared.options.limit == Some(0) {
            self.shared.stop();
        }

        let (tx, rx) = mpsc::channel(1);
        let drained = Arc::new(Semaphore::new(1));
        let producer = Producer {
            shared: self.shared.clone(),
            mode,
            policy: RetryPolicy::new(self.shared.tolerance),
            stats: FeedStats::new(self.shared.options.db.clone()),
            stop: self.shared.subscribe(),
            tx,
            drained: drained.clone(),
        };
        Ok(ChangesStream::new(self.shared.clone(), producer, rx, drained))
    }
}

fn validate(service: &dyn CouchService, options: &PostChangesOptions) -> Result<()> {
    if options.db.is_empty() {
        return Err(Error::InvalidRequest("db must be provided".to_string()));
    }

    let blocked: Vec<&str> = [
        ("descending", options.descending.is_some()),
        ("feed", options.feed.is_some()),
        ("heartbeat", options.heartbeat.is_some()),
        ("last_event_id", options.last_event_id.is_some()),
        ("timeout", options.timeout.is_some()),
    ]
    .into_iter()
    .filter_map(|(name, set)| set.then_some(name))
    .collect();
    if !blocked.is_empty() {
        return Err(Error::InvalidRequest(format!(
            "The option(s) {} are invalid when using ChangesFollower",
            blocked.join(", ")
        )));
    }

    if let Some(filter) = &options.filter
        && filter != "_selector"
    {
        return Err(Error::InvalidRequest(format!(
            "Only the `_selector` filter may be used with ChangesFollower, got `{filter}`"
        )));
    }

    for (kind, timeout) in [
        ("call", service.call_timeout()),
        ("read", service.read_timeout()),
    ] {
        if let Some(timeout) = timeout
            && timeout < MIN_CLIENT_TIMEOUT
        {
            return Err(Error::InvalidRequest(format!(
                "ChangesFollower needs a client {kind} timeout of at least {}s, got {:?}",
                MIN_CLIENT_TIMEOUT.as_secs(),
                timeout
            )));
        }
    }
    Ok(())
}

/// Resolves once the stop signal is raised.
pub(crate) async fn wait_for_stop(rx: &mut watch::Receiver<bool>) {
    loop {
        let stopped = *rx.borrow_and_update();
        if stopped {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone without a stop: nothing can raise it any more
            return std::future::pending().await;
        }
    }
}

/// Issues the long-poll requests and hands batches to the stream.
pub(crate) struct Producer {
    shared: Arc<Shared>,
    mode: Mode,
    policy: RetryPolicy,
    stats: FeedStats,
    stop: watch::Receiver<bool>,
    tx: mpsc::Sender<Batch>,
    drained: Arc<Semaphore>,
}

impl Producer {
    pub(crate) async fn run(mut self) {
        // The window counts from the first request, not from `start()`
        self.policy.reset();
        let reason = match self.follow().await {
            Ok(reason) => reason,
            Err(e) => {
                error!(db = %self.shared.options.db, error = %e, "Changes follower terminated");
                let tx = self.tx.clone();
                tokio::select! {
                    biased;
                    _ = wait_for_stop(&mut self.stop) => {}
                    _ = tx.send(Err(e)) => {}
                }
                "error"
            }
        };
        self.stats.log_finished(reason);
    }

    async fn follow(&mut self) -> Result<&'static str> {
        let Some(batch_size) = self.batch_size().await? else {
            return Ok("stopped");
        };
        let mut since = self
            .shared
            .options
            .since
            .clone()
            .unwrap_or_else(|| self.mode.default_since().to_string());

        loop {
            let mut request = self.shared.options.clone();
            request.feed = Some(ChangesFeed::Longpoll);
            request.timeout = Some(LONGPOLL_TIMEOUT.as_millis() as u64);
            request.since = Some(since.clone());
            request.limit = Some(batch_size);
            debug!(db = %request.db, since = %since, limit = batch_size, "Requesting changes");

            let Some(result) = self
                .fetch(move |service| {
                    let request = request.clone();
                    async move { service.post_changes(&request).await }
                })
                .await?
            else {
                return Ok("stopped");
            };

            since = result.last_seq;
            let pending = result.pending;
            if !result.results.is_empty() {
                self.stats
                    .record_batch(result.results.len(), &since, pending);
                if !self.put(result.results).await {
                    return Ok("stopped");
                }
            }
            if self.mode == Mode::Finite && pending == 0 {
                return Ok("complete");
            }
        }
    }

    async fn batch_size(&mut self) -> Result<Option<u64>> {
        let options = &self.shared.options;
        let mut size = DEFAULT_BATCH_SIZE;
        // The estimate is at least one, so a limit of one needs no lookup
        if options.include_docs == Some(true) && options.limit.is_none_or(|limit| limit > 1) {
            let db = options.db.clone();
            let Some(info) = self
                .fetch(move |service| {
                    let db = db.clone();
                    async move { service.get_database_information(&db).await }
                })
                .await?
            else {
                return Ok(None);
            };
            size = estimate_batch_size(&info);
            info!(db = %info.db_name, batch_size = size, "Estimated changes batch size");
        }
        if let Some(limit) = self.shared.options.limit {
            size = size.min(limit);
        }
        Ok(Some(size.max(1)))
    }

    /// Runs `call` until it succeeds, the policy gives up, or the feed stops.
    async fn fetch<T, F, Fut>(&mut self, call: F) -> Result<Option<T>>
    where
        F: Fn(Arc<dyn CouchService>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        loop {
            let service = self.shared.service.clone();
            let outcome = tokio::select! {
                biased;
                _ = wait_for_stop(&mut self.stop) => return Ok(None),
                outcome = call(service) => outcome,
            };

            let error = match outcome {
                Ok(value) => {
                    self.policy.on_success();
                    return Ok(Some(value));
                }
                Err(e) => e,
            };
            let attempt = self.policy.retry();
            let Some(delay) = self.policy.on_failure(&error) else {
                return Err(error);
            };
            self.stats.record_retry(attempt, delay, &error.to_string());

            tokio::select! {
                biased;
                _ = wait_for_stop(&mut self.stop) => return Ok(None),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Waits for the previous batch to drain, then sends `batch`.
    async fn put(&mut self, batch: Vec<ChangesResultItem>) -> bool {
        let permit = tokio::select! {
            biased;
            _ = wait_for_stop(&mut self.stop) => return false,
            permit = self.drained.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => return false,
            },
        };
        permit.forget();

        tokio::select! {
            biased;
            _ = wait_for_stop(&mut self.stop) => false,
            sent = self.tx.send(Ok(batch)) => sent.is_ok(),
        }
    }
}
