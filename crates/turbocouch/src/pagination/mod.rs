//! Uniform pagination over the row-returning query endpoints.
//!
//! A [`Pagination`] freezes the options of one query and hands out
//! independent iterators over its results:
//!
//! - [`Pagination::pager`] for explicit page-by-page control,
//! - [`Pagination::pages`] for a stream of pages,
//! - [`Pagination::rows`] for a stream of single rows.
//!
//! All-docs, design-docs and view queries page by key range; find and search
//! queries page by bookmark. See [`Pager`] for the details.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use futures::TryStreamExt;
//! use turbocouch::{Client, Pagination, types::PostAllDocsOptions};
//!
//! # async fn example() -> turbocouch::Result<()> {
//! let client = Arc::new(Client::new("http://localhost:5984")?);
//! let options = PostAllDocsOptions::builder().db("orders").limit(50u32).build()?;
//!
//! let mut rows = Pagination::all_docs(client, options)?.rows();
//! while let Some(row) = rows.try_next().await? {
//!     println!("{}", row.key);
//! }
//! # Ok(())
//! # }
//! ```

use std::ops::Deref;
use std::sync::Arc;

use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};

use crate::error::{Error, Result};
use crate::service::CouchService;
use crate::types::{
    DocsResultRow, Document, PostAllDocsOptions, PostFindOptions, PostSearchOptions,
    PostViewOptions, SearchResultRow, ViewResultRow,
};

mod pager;
mod request;

pub use pager::Pager;
use request::{AllDocsRequest, FindRequest, PageRequest, SearchRequest, ViewRequest};

/// Largest and default page size.
pub const MAX_LIMIT: u32 = 200;

/// The operation a [`Pagination`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PagerType {
    /// `POST /{db}/_all_docs`
    PostAllDocs,
    /// `POST /{db}/_partition/{partition_key}/_all_docs`
    PostPartitionAllDocs,
    /// `POST /{db}/_design_docs`
    PostDesignDocs,
    /// `POST /{db}/_design/{ddoc}/_view/{view}`
    PostView,
    /// `POST /{db}/_partition/{partition_key}/_design/{ddoc}/_view/{view}`
    PostPartitionView,
    /// `POST /{db}/_find`
    PostFind,
    /// `POST /{db}/_partition/{partition_key}/_find`
    PostPartitionFind,
    /// `POST /{db}/_design/{ddoc}/_search/{index}`
    PostSearch,
    /// `POST /{db}/_partition/{partition_key}/_design/{ddoc}/_search/{index}`
    PostPartitionSearch,
}

impl PagerType {
    /// Whether pages are delimited by key range rather than bookmark.
    pub fn is_key_range(self) -> bool {
        matches!(
            self,
            PagerType::PostAllDocs
                | PagerType::PostPartitionAllDocs
                | PagerType::PostDesignDocs
                | PagerType::PostView
                | PagerType::PostPartitionView
        )
    }
}

/// One page of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<R> {
    rows: Vec<R>,
}

impl<R> Page<R> {
    pub(crate) fn new(rows: Vec<R>) -> Self {
        Self { rows }
    }

    /// Take the rows out of the page.
    pub fn into_rows(self) -> Vec<R> {
        self.rows
    }
}

impl<R> Deref for Page<R> {
    type Target = [R];

    fn deref(&self) -> &[R] {
        &self.rows
    }
}

impl<R> IntoIterator for Page<R> {
    type Item = R;
    type IntoIter = std::vec::IntoIter<R>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a, R> IntoIterator for &'a Page<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Validated, frozen options of a paginated query.
///
/// `limit` is the page size: at most [`MAX_LIMIT`], which is also the
/// default. `keys` is rejected for key-range queries; the faceting options
/// `counts`, `group_field`, `group_limit`, `group_sort` and `ranges` are
/// rejected for search queries.
pub struct Pagination<R> {
    service: Arc<dyn CouchService>,
    request: Arc<dyn PageRequest<Row = R>>,
    limit: u32,
}

impl<R> Clone for Pagination<R> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            request: self.request.clone(),
            limit: self.limit,
        }
    }
}

impl<R> std::fmt::Debug for Pagination<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pagination")
            .field("pager_type", &self.request.pager_type())
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

impl Pagination<DocsResultRow> {
    /// Paginate `POST /{db}/_all_docs`.
    pub fn all_docs(service: Arc<dyn CouchService>, options: PostAllDocsOptions) -> Result<Self> {
        Self::docs(service, options, None, false)
    }

    /// Paginate `POST /{db}/_partition/{partition_key}/_all_docs`.
    pub fn partition_all_docs(
        service: Arc<dyn CouchService>,
        partition_key: impl Into<String>,
        options: PostAllDocsOptions,
    ) -> Result<Self> {
        Self::docs(service, options, Some(partition(partition_key)?), false)
    }

    /// Paginate `POST /{db}/_design_docs`.
    pub fn design_docs(
        service: Arc<dyn CouchService>,
        options: PostAllDocsOptions,
    ) -> Result<Self> {
        Self::docs(service, options, None, true)
    }

    fn docs(
        service: Arc<dyn CouchService>,
        options: PostAllDocsOptions,
        partition_key: Option<String>,
        design: bool,
    ) -> Result<Self> {
        reject_keys(options.keys.is_some())?;
        let limit = page_size(options.limit)?;
        Ok(Self::from_request(
            service,
            AllDocsRequest {
                options,
                partition_key,
                design,
            },
            limit,
        ))
    }
}

impl Pagination<ViewResultRow> {
    /// Paginate `POST /{db}/_design/{ddoc}/_view/{view}`.
    pub fn view(service: Arc<dyn CouchService>, options: PostViewOptions) -> Result<Self> {
        Self::views(service, options, None)
    }

    /// Paginate `POST /{db}/_partition/{partition_key}/_design/{ddoc}/_view/{view}`.
    pub fn partition_view(
        service: Arc<dyn CouchService>,
        partition_key: impl Into<String>,
        options: PostViewOptions,
    ) -> Result<Self> {
        Self::views(service, options, Some(partition(partition_key)?))
    }

    fn views(
        service: Arc<dyn CouchService>,
        options: PostViewOptions,
        partition_key: Option<String>,
    ) -> Result<Self> {
        reject_keys(options.keys.is_some())?;
        let limit = page_size(options.limit)?;
        Ok(Self::from_request(
            service,
            ViewRequest {
                options,
                partition_key,
            },
            limit,
        ))
    }
}

impl Pagination<Document> {
    /// Paginate `POST /{db}/_find`.
    pub fn find(service: Arc<dyn CouchService>, options: PostFindOptions) -> Result<Self> {
        Self::finds(service, options, None)
    }

    /// Paginate `POST /{db}/_partition/{partition_key}/_find`.
    pub fn partition_find(
        service: Arc<dyn CouchService>,
        partition_key: impl Into<String>,
        options: PostFindOptions,
    ) -> Result<Self> {
        Self::finds(service, options, Some(partition(partition_key)?))
    }

    fn finds(
        service: Arc<dyn CouchService>,
        options: PostFindOptions,
        partition_key: Option<String>,
    ) -> Result<Self> {
        let limit = page_size(options.limit)?;
        Ok(Self::from_request(
            service,
            FindRequest {
                options,
                partition_key,
            },
            limit,
        ))
    }
}

impl Pagination<SearchResultRow> {
    /// Paginate `POST /{db}/_design/{ddoc}/_search/{index}`.
    pub fn search(service: Arc<dyn CouchService>, options: PostSearchOptions) -> Result<Self> {
        Self::searches(service, options, None)
    }

    /// Paginate `POST /{db}/_partition/{partition_key}/_design/{ddoc}/_search/{index}`.
    pub fn partition_search(
        service: Arc<dyn CouchService>,
        partition_key: impl Into<String>,
        options: PostSearchOptions,
    ) -> Result<Self> {
        Self::searches(service, options, Some(partition(partition_key)?))
    }

    fn searches(
        service: Arc<dyn CouchService>,
        options: PostSearchOptions,
        partition_key: Option<String>,
    ) -> Result<Self> {
        let facets: Vec<&str> = [
            ("counts", options.counts.is_some()),
            ("group_field", options.group_field.is_some()),
            ("group_limit", options.group_limit.is_some()),
            ("group_sort", options.group_sort.is_some()),
            ("ranges", options.ranges.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect();
        if !facets.is_empty() {
            return Err(Error::InvalidRequest(format!(
                "The option(s) {} are invalid when using pagination",
                facets.join(", ")
            )));
        }

        let limit = page_size(options.limit)?;
        Ok(Self::from_request(
            service,
            SearchRequest {
                options,
                partition_key,
            },
            limit,
        ))
    }
}

impl<R: Send + 'static> Pagination<R> {
    fn from_request(
        service: Arc<dyn CouchService>,
        request: impl PageRequest<Row = R> + 'static,
        limit: u32,
    ) -> Self {
        Self {
            service,
            request: Arc::new(request),
            limit,
        }
    }

    /// The operation this pagination runs.
    pub fn pager_type(&self) -> PagerType {
        self.request.pager_type()
    }

    /// Page size.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// A fresh pager positioned before the first page.
    pub fn pager(&self) -> Pager<R> {
        Pager::new(self.service.clone(), self.request.clone(), self.limit)
    }

    /// A fresh stream of pages. It ends after the last page or the first error.
    pub fn pages(&self) -> BoxStream<'static, Result<Page<R>>> {
        stream::unfold(Some(self.pager()), |pager| async move {
            let mut pager = pager?;
            if !pager.has_next() {
                return None;
            }
            match pager.get_next().await {
                Ok(page) => Some((Ok(page), Some(pager))),
                Err(e) => Some((Err(e), None)),
            }
        })
        .boxed()
    }

    /// A fresh stream of rows, page after page.
    pub fn rows(&self) -> BoxStream<'static, Result<R>> {
        self.pages()
            .map_ok(|page| stream::iter(page.into_iter().map(Ok::<R, Error>)))
            .try_flatten()
            .boxed()
    }
}

fn page_size(limit: Option<u32>) -> Result<u32> {
    match limit {
        None => Ok(MAX_LIMIT),
        Some(limit) if (1..=MAX_LIMIT).contains(&limit) => Ok(limit),
        Some(limit) => Err(Error::InvalidRequest(format!(
            "The provided limit {limit} is out of range [1, {MAX_LIMIT}]"
        ))),
    }
}

fn reject_keys(keys_set: bool) -> Result<()> {
    if keys_set {
        return Err(Error::InvalidRequest(
            "The option `keys` is invalid when using pagination".to_string(),
        ));
    }
    Ok(())
}

fn partition(partition_key: impl Into<String>) -> Result<String> {
    let partition_key = partition_key.into();
    if partition_key.is_empty() {
        return Err(Error::InvalidRequest(
            "partition_key must not be empty".to_string(),
        ));
    }
    Ok(partition_key)
}
