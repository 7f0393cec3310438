//! The backoff strategy abstraction.

use std::error::Error;
use std::time::Duration;

/// A strategy for spacing out retries of a failed operation.
///
/// Callers own the retry loop; the strategy only answers three questions:
/// is this error worth retrying, how long to wait before attempt `n + 1`,
/// and how many retries are allowed in total.
///
/// # Examples
///
/// ```rust
/// use turbocouch_core::retry::{BackoffStrategy, ExponentialBackoff};
/// use std::time::Duration;
///
/// struct Fixed(Duration);
///
/// impl BackoffStrategy for Fixed {
///     fn next_delay(&self, _attempt: u32) -> Option<Duration> {
///         Some(self.0)
///     }
///
///     fn max_retries(&self) -> u32 {
///         5
///     }
/// }
///
/// let fixed = Fixed(Duration::from_millis(10));
/// assert_eq!(fixed.next_delay(4), Some(Duration::from_millis(10)));
/// ```
pub trait BackoffStrategy: Send + Sync {
    /// Determine if an error is retryable.
    ///
    /// Default implementation returns `true` for all errors.
    ///
    /// # Parameters
    /// - `error`: The error to evaluate
    /// - `attempt`: The current retry index (0-indexed)
    fn should_retry(&self, error: &dyn Error, attempt: u32) -> bool {
        let _ = (error, attempt);
        true
    }

    /// Calculate the delay before the next retry attempt.
    ///
    /// Called after a failure and before sleeping; `attempt == 0` is the
    /// delay before the first retry.
    ///
    /// Returns `None` when no further retries should be attempted.
    fn next_delay(&self, attempt: u32) -> Option<Duration>;

    /// Maximum number of retries after the initial attempt.
    ///
    /// `u32::MAX` means unbounded.
    fn max_retries(&self) -> u32;
}
