//! Centralized observability utilities for structured logging
//!
//! HTTP requests issued by the client and the progress of changes feeds are
//! logged through this layer so field names stay consistent.

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// HTTP request metadata for structured logging
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Request path, without the query string
    pub path: String,
    /// Request body size in bytes (optional)
    pub body_size: Option<usize>,
}

impl RequestMetadata {
    /// Create new request metadata
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            body_size: None,
        }
    }

    /// Set the request body size
    pub fn with_body_size(mut self, size: usize) -> Self {
        self.body_size = Some(size);
        self
    }

    /// Log request being sent
    pub fn log_request(&self) {
        debug!(
            method = %self.method,
            path = %self.path,
            body_size = self.body_size,
            "Sending HTTP request"
        );
    }
}

/// HTTP response metadata for structured logging
#[derive(Debug, Clone)]
pub struct ResponseMetadata {
    /// HTTP status code
    pub status: u16,
    /// Response body size in bytes (optional)
    pub body_size: Option<usize>,
    /// Time elapsed for the request
    pub elapsed: Duration,
    /// Number of retries taken (if any)
    pub retries: u32,
    /// Server request id, if any
    pub trace: Option<String>,
}

impl ResponseMetadata {
    /// Create new response metadata
    pub fn new(status: u16, elapsed: Duration) -> Self {
        Self {
            status,
            body_size: None,
            elapsed,
            retries: 0,
            trace: None,
        }
    }

    /// Set the response body size
    pub fn with_body_size(mut self, size: usize) -> Self {
        self.body_size = Some(size);
        self
    }

    /// Set the number of retries
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set the server request id
    pub fn with_trace(mut self, trace: Option<String>) -> Self {
        self.trace = trace;
        self
    }

    /// Log the outcome: `debug` for 2xx/3xx, `warn` otherwise.
    pub fn log(&self, request: &RequestMetadata) {
        if self.status < 400 {
            debug!(
                method = %request.method,
                path = %request.path,
                status = self.status,
                elapsed_ms = self.elapsed.as_millis() as u64,
                body_size = self.body_size,
                retries = self.retries,
                "HTTP request succeeded"
            );
        } else {
            warn!(
                method = %request.method,
                path = %request.path,
                status = self.status,
                elapsed_ms = self.elapsed.as_millis() as u64,
                trace = self.trace.as_deref(),
                retries = self.retries,
                "HTTP request failed"
            );
        }
    }
}

/// Timer for measuring request duration
pub struct RequestTimer {
    start: Instant,
}

impl RequestTimer {
    /// Start a new timer
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Running totals of a changes feed, logged when the feed ends.
#[derive(Debug)]
pub struct FeedStats {
    /// Database the feed reads
    pub db: String,
    /// Non-empty batches handed to the consumer
    pub batches: u64,
    /// Change items in those batches
    pub items: u64,
    /// Failed requests that were retried
    pub retries: u64,
    started: Instant,
}

impl FeedStats {
    /// Start counting for `db`
    pub fn new(db: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            batches: 0,
            items: 0,
            retries: 0,
            started: Instant::now(),
        }
    }

    /// Record a delivered batch
    pub fn record_batch(&mut self, items: usize, since: &str, pending: u64) {
        self.batches += 1;
        self.items += items as u64;
        debug!(
            db = %self.db,
            items,
            since = %since,
            pending,
            "Changes batch received"
        );
    }

    /// Record a suppressed failure
    pub fn record_retry(&mut self, attempt: u32, delay: Duration, error: &str) {
        self.retries += 1;
        warn!(
            db = %self.db,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Suppressed transient error, retrying"
        );
    }

    /// Log the final totals
    pub fn log_finished(&self, reason: &str) {
        info!(
            db = %self.db,
            batches = self.batches,
            items = self.items,
            retries = self.retries,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            reason,
            "Changes feed finished"
        );
    }
}

/// Install a `tracing-subscriber` formatter honouring `RUST_LOG`.
///
/// Returns `false` when a global subscriber was already set.
#[cfg(feature = "trace")]
#[cfg_attr(docsrs, doc(cfg(feature = "trace")))]
pub fn init_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .is_ok()
}
