//! The request-layer seam used by the streaming utilities.
//!
//! [`ChangesFollower`](crate::changes::ChangesFollower) and
//! [`Pagination`](crate::pagination::Pagination) only talk to the server
//! through [`CouchService`]. [`Client`](crate::Client) implements it over
//! HTTP; tests plug in an in-memory implementation.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    AllDocsResult, ChangesResult, DatabaseInformation, FindResult, PostAllDocsOptions,
    PostChangesOptions, PostFindOptions, PostSearchOptions, PostViewOptions, SearchResult,
    ViewResult,
};

/// Database operations needed by the changes follower and the paginators.
#[async_trait]
pub trait CouchService: Send + Sync {
    /// `POST /{db}/_changes`
    async fn post_changes(&self, options: &PostChangesOptions) -> Result<ChangesResult>;

    /// `GET /{db}`
    async fn get_database_information(&self, db: &str) -> Result<DatabaseInformation>;

    /// `POST /{db}/_all_docs`
    async fn post_all_docs(&self, options: &PostAllDocsOptions) -> Result<AllDocsResult>;

    /// `POST /{db}/_partition/{partition_key}/_all_docs`
    async fn post_partition_all_docs(
        &self,
        partition_key: &str,
        options: &PostAllDocsOptions,
    ) -> Result<AllDocsResult>;

    /// `POST /{db}/_design_docs`
    async fn post_design_docs(&self, options: &PostAllDocsOptions) -> Result<AllDocsResult>;

    /// `POST /{db}/_design/{ddoc}/_view/{view}`
    async fn post_view(&self, options: &PostViewOptions) -> Result<ViewResult>;

    /// `POST /{db}/_partition/{partition_key}/_design/{ddoc}/_view/{view}`
    async fn post_partition_view(
        &self,
        partition_key: &str,
        options: &PostViewOptions,
    ) -> Result<ViewResult>;

    /// `POST /{db}/_find`
    async fn post_find(&self, options: &PostFindOptions) -> Result<FindResult>;

    /// `POST /{db}/_partition/{partition_key}/_find`
    async fn post_partition_find(
        &self,
        partition_key: &str,
        options: &PostFindOptions,
    ) -> Result<FindResult>;

    /// `POST /{db}/_design/{ddoc}/_search/{index}`
    async fn post_search(&self, options: &PostSearchOptions) -> Result<SearchResult>;

    /// `POST /{db}/_partition/{partition_key}/_design/{ddoc}/_search/{index}`
    async fn post_partition_search(
        &self,
        partition_key: &str,
        options: &PostSearchOptions,
    ) -> Result<SearchResult>;

    /// Timeout applied to a whole request; `None` when unbounded.
    fn call_timeout(&self) -> Option<Duration> {
        None
    }

    /// Timeout between reads of a response; `None` when unbounded.
    fn read_timeout(&self) -> Option<Duration> {
        None
    }
}
