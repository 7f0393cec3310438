//! Retry strategies and backoff implementations.
//!
//! # Key Types
//!
//! - [`BackoffStrategy`] - how long to wait before the next attempt, and whether to try at all
//! - [`ExponentialBackoff`] - exponential growth with a cap and configurable [`Jitter`]
//!
//! # Examples
//!
//! ```rust
//! use turbocouch_core::retry::{BackoffStrategy, ExponentialBackoff, Jitter};
//! use std::time::Duration;
//!
//! let backoff = ExponentialBackoff::builder()
//!     .max_retries(3)
//!     .initial_delay(Duration::from_millis(100))
//!     .jitter(Jitter::None)
//!     .build();
//!
//! assert_eq!(backoff.next_delay(2), Some(Duration::from_millis(400)));
//! ```

mod exponential;
mod strategy;

pub use exponential::{ExponentialBackoff, ExponentialBackoffBuilder, Jitter};
pub use strategy::BackoffStrategy;
