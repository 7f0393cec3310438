#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Core abstractions for the turbocouch crates.
//!
//! This crate holds the retry primitives shared by the HTTP request layer and
//! the changes follower:
//!
//! - **Backoff strategies** via the [`BackoffStrategy`](retry::BackoffStrategy) trait
//! - **Exponential backoff** with proportional or full jitter, each instance
//!   drawing from its own seeded random source
//!
//! # Examples
//!
//! ```rust
//! use turbocouch_core::prelude::*;
//! use std::time::Duration;
//!
//! let backoff = ExponentialBackoff::builder()
//!     .initial_delay(Duration::from_millis(100))
//!     .max_delay(Duration::from_secs(57))
//!     .jitter(Jitter::Full)
//!     .build();
//!
//! let delay = backoff.next_delay(3).unwrap();
//! assert!(delay <= Duration::from_millis(800));
//! ```

pub mod retry;

/// Convenient re-exports of commonly used items.
///
/// ```rust
/// use turbocouch_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::retry::{BackoffStrategy, ExponentialBackoff, ExponentialBackoffBuilder, Jitter};
}
