//! Error suppression and retry spacing for the changes follower.

use std::time::Duration;

use tokio::time::Instant;
use turbocouch_core::retry::{BackoffStrategy, ExponentialBackoff, Jitter};

use super::LONGPOLL_TIMEOUT;
use crate::error::Error;

/// Base of the exponential retry delay.
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// How long transient errors are suppressed before they end the feed.
///
/// Built from the `Duration` handed to
/// [`ChangesFollower::with_error_tolerance`](super::ChangesFollower::with_error_tolerance):
/// `Duration::ZERO` never suppresses, `Duration::MAX` always does, anything
/// else is a window measured from the last successful response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorTolerance {
    /// The first transient error ends the feed
    Never,
    /// Transient errors are retried forever
    #[default]
    Always,
    /// Transient errors are retried while `now < last_success + window`
    Timer(Duration),
}

impl From<Duration> for ErrorTolerance {
    fn from(window: Duration) -> Self {
        if window.is_zero() {
            ErrorTolerance::Never
        } else if window == Duration::MAX {
            ErrorTolerance::Always
        } else {
            ErrorTolerance::Timer(window)
        }
    }
}

/// Per-producer retry state.
#[derive(Debug)]
pub(crate) struct RetryPolicy {
    tolerance: ErrorTolerance,
    backoff: ExponentialBackoff,
    retry: u32,
    last_success: Instant,
}

impl RetryPolicy {
    pub(crate) fn new(tolerance: ErrorTolerance) -> Self {
        Self {
            tolerance,
            backoff: ExponentialBackoff::builder()
                .max_retries(u32::MAX)
                .initial_delay(RETRY_BASE_DELAY)
                .max_delay(LONGPOLL_TIMEOUT)
                .jitter(Jitter::Full)
                .build(),
            retry: 0,
            last_success: Instant::now(),
        }
    }

    /// Index of the next retry.
    pub(crate) fn retry(&self) -> u32 {
        self.retry
    }

    /// Restart the tolerance window from now and forget earlier retries.
    pub(crate) fn reset(&mut self) {
        self.retry = 0;
        self.last_success = Instant::now();
    }

    pub(crate) fn on_success(&mut self) {
        self.reset();
    }

    /// Delay before the next attempt, or `None` when `error` ends the feed.
    pub(crate) fn on_failure(&mut self, error: &Error) -> Option<Duration> {
        if error.is_terminal() {
            return None;
        }
        match self.tolerance {
            ErrorTolerance::Never => return None,
            ErrorTolerance::Always => {}
            ErrorTolerance::Timer(window) => {
                // An unrepresentable deadline never expires
                if let Some(deadline) = self.last_success.checked_add(window)
                    && Instant::now() >= deadline
                {
                    return None;
                }
            }
        }

        let delay = self
            .backoff
            .next_delay(self.retry)
            .unwrap_or_else(|| self.backoff.cap(self.retry));
        self.retry = self.retry.saturating_add(1);
        Some(delay)
    }
}
