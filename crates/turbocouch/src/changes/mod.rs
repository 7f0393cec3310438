//! Resumable consumer of a database's `_changes` feed.
//!
//! A [`ChangesFollower`] repeatedly issues long-poll `_changes` requests from a
//! background task and hands each batch to a [`ChangesStream`]. Transient
//! failures are retried with full-jitter exponential backoff for as long as
//! the [`ErrorTolerance`] allows; 400, 401, 403 and 404 always end the feed.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use futures::TryStreamExt;
//! use turbocouch::{ChangesFollower, Client, types::PostChangesOptions};
//!
//! # async fn example() -> turbocouch::Result<()> {
//! let client = Arc::new(Client::new("http://localhost:5984")?);
//! let follower = ChangesFollower::new(client, PostChangesOptions::new("orders"))?;
//!
//! let mut changes = follower.start_one_off()?;
//! while let Some(change) = changes.try_next().await? {
//!     println!("{} @ {}", change.id, change.seq);
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use crate::types::DatabaseInformation;

mod follower;
mod policy;
mod stream;

pub use follower::ChangesFollower;
pub use policy::{ErrorTolerance, RETRY_BASE_DELAY};
pub use stream::ChangesStream;

/// Server-side hold time of each long-poll request.
pub const LONGPOLL_TIMEOUT: Duration = Duration::from_millis(57_000);

/// Smallest client call/read timeout a follower accepts.
pub const MIN_CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Batch size used when documents are not included.
pub const DEFAULT_BATCH_SIZE: u64 = 10_000;

const BATCH_BYTES: f64 = (5 * 1024 * 1024) as f64;
const ROW_OVERHEAD_BYTES: f64 = 500.0;

/// Number of changes that keeps an `include_docs` batch near 5 MiB.
///
/// Never less than one.
pub fn estimate_batch_size(info: &DatabaseInformation) -> u64 {
    let per_row = info.average_document_size() + ROW_OVERHEAD_BYTES;
    ((BATCH_BYTES / per_row).floor() as u64).max(1)
}
