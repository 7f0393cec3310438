//! # TurboCouch
//!
//! Async Rust client for CouchDB-compatible databases supporting:
//! - A resilient follower for the `_changes` feed with error suppression,
//!   jittered backoff and adaptive batch sizes
//! - Uniform pagination over all-docs, design-docs, views, find and search
//! - Basic, bearer and cookie session authentication
//! - Optional request retries and rate limiting
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use futures::TryStreamExt;
//! use turbocouch::{AuthConfig, ChangesFollower, Client, Pagination};
//! use turbocouch::types::{PostChangesOptions, PostViewOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(
//!         Client::builder()
//!             .base_url("http://localhost:5984")
//!             .auth(AuthConfig::session("admin", "password"))
//!             .build()?,
//!     );
//!
//!     // Every row of a view, 50 at a time
//!     let options = PostViewOptions::builder()
//!         .db("orders")
//!         .ddoc("reports")
//!         .view("by_customer")
//!         .limit(50u32)
//!         .build()?;
//!     let rows = Pagination::view(client.clone(), options)?.pager().get_all().await?;
//!     println!("{} rows", rows.len());
//!
//!     // Everything that changed so far
//!     let follower = ChangesFollower::new(client, PostChangesOptions::new("orders"))?;
//!     let mut changes = follower.start_one_off()?;
//!     while let Some(change) = changes.try_next().await? {
//!         println!("{} {}", change.seq, change.id);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Re-export commonly used types
pub use changes::{ChangesFollower, ChangesStream, ErrorTolerance};
pub use client::{Client, ClientBuilder};
pub use config::{AuthConfig, ClientConfig, RateLimitConfig};
pub use error::{Error, Result};
pub use pagination::{Page, Pager, PagerType, Pagination};
pub use service::CouchService;

// Module declarations
pub mod changes;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod observability;
pub mod pagination;
pub mod service;
pub mod types;

// Re-export key dependencies for convenience
pub use async_trait::async_trait;
pub use serde_json::Value as JsonValue;

/// Prelude module for common imports
///
/// # Examples
///
/// ```rust
/// use turbocouch::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        AuthConfig, ChangesFollower, Client, ClientConfig, CouchService, Error, Pagination,
        Result,
        types::{
            ChangesResultItem, Document, PostAllDocsOptions, PostChangesOptions, PostFindOptions,
            PostSearchOptions, PostViewOptions,
        },
    };
}

/// SDK version, automatically updated from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use config::DEFAULT_BASE_URL;
