//! Page-at-a-time iteration.

use std::sync::Arc;

use tracing::debug;

use super::Page;
use super::request::{NextPage, PageParams, PageRequest};
use crate::error::{Error, Result};
use crate::service::CouchService;

/// Fetches the pages of one [`Pagination`](super::Pagination), one at a time.
///
/// Key-range families ask the server for `limit + 1` rows and keep the extra
/// row as the first row of the next page. Stepping on a row that is already
/// known, rather than on the last row returned, is what lets a page boundary
/// fall between rows that share a key. Bookmark families ask for `limit`
/// rows and continue from the response bookmark.
///
/// A pager is single use. Errors are not retried; after one the pager has no
/// next page.
pub struct Pager<R> {
    service: Arc<dyn CouchService>,
    request: Arc<dyn PageRequest<Row = R>>,
    limit: u32,
    has_next: bool,
    first: bool,
    next: Option<NextPage>,
    deferred: Option<Error>,
}

impl<R> std::fmt::Debug for Pager<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pager")
            .field("pager_type", &self.request.pager_type())
            .field("limit", &self.limit)
            .field("has_next", &self.has_next)
            .finish_non_exhaustive()
    }
}

impl<R: Send + 'static> Pager<R> {
    pub(crate) fn new(
        service: Arc<dyn CouchService>,
        request: Arc<dyn PageRequest<Row = R>>,
        limit: u32,
    ) -> Self {
        Self {
            service,
            request,
            limit,
            has_next: true,
            first: true,
            next: None,
            deferred: None,
        }
    }

    /// Whether [`get_next`](Self::get_next) has anything left to return.
    pub fn has_next(&self) -> bool {
        self.has_next
    }

    /// Fetch the next page.
    ///
    /// # Errors
    ///
    /// - [`Error::IllegalState`] when there is no next page
    /// - [`Error::Pagination`] when the previous page ended on rows with the
    ///   same key and document ID, so the cursor cannot advance
    /// - any error of the underlying request
    pub async fn get_next(&mut self) -> Result<Page<R>> {
        if let Some(e) = self.deferred.take() {
            self.has_next = false;
            return Err(e);
        }
        if !self.has_next {
            return Err(Error::IllegalState("No more pages".to_string()));
        }

        let pager_type = self.request.pager_type();
        let key_range = pager_type.is_key_range();
        let limit = self.limit as usize;
        let params = PageParams {
            limit: if key_range { self.limit + 1 } else { self.limit },
            first: self.first,
            next: self.next.take(),
        };
        debug!(
            ?pager_type,
            limit = params.limit,
            cursor = params.next.is_some(),
            "Requesting page"
        );

        let response = match self.request.fetch(self.service.as_ref(), params).await {
            Ok(response) => response,
            Err(e) => {
                self.has_next = false;
                return Err(e);
            }
        };
        self.first = false;

        let mut rows = response.rows;
        if key_range {
            if rows.len() > limit {
                rows.truncate(limit + 1);
                let next = rows.pop();
                if let (Some(last), Some(next)) = (rows.last(), next.as_ref()) {
                    self.deferred = self
                        .request
                        .boundary_failure(last, next)
                        .map(Error::Pagination);
                }
                self.next = next
                    .as_ref()
                    .and_then(|row| self.request.start_of(row))
                    .map(NextPage::Key);
                self.has_next = self.next.is_some();
            } else {
                self.has_next = false;
            }
        } else {
            self.has_next = rows.len() >= limit && response.bookmark.is_some();
            self.next = response.bookmark.map(NextPage::Bookmark);
        }

        debug!(?pager_type, rows = rows.len(), has_next = self.has_next, "Received page");
        Ok(Page::new(rows))
    }

    /// Fetch every remaining page and return their rows in order.
    pub async fn get_all(&mut self) -> Result<Vec<R>> {
        let mut rows = Vec::new();
        while self.has_next() {
            rows.extend(self.get_next().await?);
        }
        Ok(rows)
    }
}
