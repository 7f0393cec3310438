//! Page requests for each operation family.

use async_trait::async_trait;
use serde_json::Value;

use super::PagerType;
use crate::error::Result;
use crate::service::CouchService;
use crate::types::{
    DocsResultRow, Document, PostAllDocsOptions, PostFindOptions, PostSearchOptions,
    PostViewOptions, SearchResultRow, ViewResultRow,
};

/// Where the next page starts.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NextPage {
    /// First row of the next key-range page, inclusive
    Key(KeyCursor),
    /// Opaque continuation token
    Bookmark(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct KeyCursor {
    pub(crate) key: Value,
    pub(crate) doc_id: Option<String>,
}

/// Per-page overrides of the frozen options.
#[derive(Debug, Clone)]
pub(crate) struct PageParams {
    pub(crate) limit: u32,
    pub(crate) first: bool,
    pub(crate) next: Option<NextPage>,
}

pub(crate) struct PageResponse<R> {
    pub(crate) rows: Vec<R>,
    pub(crate) bookmark: Option<String>,
}

/// One operation family bound to its frozen options.
#[async_trait]
pub(crate) trait PageRequest: Send + Sync {
    type Row;

    fn pager_type(&self) -> PagerType;

    async fn fetch(
        &self,
        service: &dyn CouchService,
        params: PageParams,
    ) -> Result<PageResponse<Self::Row>>;

    /// Cursor that makes `row` the first row of the next page.
    fn start_of(&self, _row: &Self::Row) -> Option<KeyCursor> {
        None
    }

    /// Message when the cursor at `next` cannot move past `last`.
    fn boundary_failure(&self, _last: &Self::Row, _next: &Self::Row) -> Option<String> {
        None
    }
}

/// `_all_docs`, `_design_docs` and partitioned `_all_docs`.
pub(crate) struct AllDocsRequest {
    pub(crate) options: PostAllDocsOptions,
    pub(crate) partition_key: Option<String>,
    pub(crate) design: bool,
}

#[async_trait]
impl PageRequest for AllDocsRequest {
    type Row = DocsResultRow;

    fn pager_type(&self) -> PagerType {
        match (&self.partition_key, self.design) {
            (_, true) => PagerType::PostDesignDocs,
            (Some(_), false) => PagerType::PostPartitionAllDocs,
            (None, false) => PagerType::PostAllDocs,
        }
    }

    async fn fetch(
        &self,
        service: &dyn CouchService,
        params: PageParams,
    ) -> Result<PageResponse<DocsResultRow>> {
        let mut options = self.options.clone();
        options.limit = Some(params.limit);
        if !params.first {
            options.skip = None;
        }
        if let Some(NextPage::Key(cursor)) = params.next {
            options.start_key = Some(match cursor.key {
                Value::String(key) => key,
                other => other.to_string(),
            });
        }

        let result = match (&self.partition_key, self.design) {
            (_, true) => service.post_design_docs(&options).await?,
            (Some(partition_key), false) => {
                service
                    .post_partition_all_docs(partition_key, &options)
                    .await?
            }
            (None, false) => service.post_all_docs(&options).await?,
        };
        Ok(PageResponse {
            rows: result.rows,
            bookmark: None,
        })
    }

    // Document IDs are the keys here, so the key alone is a unique cursor
    fn start_of(&self, row: &DocsResultRow) -> Option<KeyCursor> {
        Some(KeyCursor {
            key: Value::String(row.key.clone()),
            doc_id: None,
        })
    }
}

/// MapReduce views, global or partitioned.
pub(crate) struct ViewRequest {
    pub(crate) options: PostViewOptions,
    pub(crate) partition_key: Option<String>,
}

#[async_trait]
impl PageRequest for ViewRequest {
    type Row = ViewResultRow;

    fn pager_type(&self) -> PagerType {
        if self.partition_key.is_some() {
            PagerType::PostPartitionView
        } else {
            PagerType::PostView
        }
    }

    async fn fetch(
        &self,
        service: &dyn CouchService,
        params: PageParams,
    ) -> Result<PageResponse<ViewResultRow>> {
        let mut options = self.options.clone();
        options.limit = Some(params.limit);
        if !params.first {
            options.skip = None;
        }
        if let Some(NextPage::Key(cursor)) = params.next {
            options.start_key = Some(cursor.key);
            options.start_key_doc_id = cursor.doc_id;
        }

        let result = match &self.partition_key {
            Some(partition_key) => service.post_partition_view(partition_key, &options).await?,
            None => service.post_view(&options).await?,
        };
        Ok(PageResponse {
            rows: result.rows,
            bookmark: None,
        })
    }

    fn start_of(&self, row: &ViewResultRow) -> Option<KeyCursor> {
        Some(KeyCursor {
            key: row.key.clone(),
            doc_id: row.id.clone(),
        })
    }

    fn boundary_failure(&self, last: &ViewResultRow, next: &ViewResultRow) -> Option<String> {
        (last.key == next.key && last.id == next.id).then(|| {
            format!(
                "Cannot paginate on a boundary containing identical keys '{}' and document IDs '{}'",
                last.key,
                last.id.as_deref().unwrap_or_default()
            )
        })
    }
}

/// Mango queries, global or partitioned.
pub(crate) struct FindRequest {
    pub(crate) options: PostFindOptions,
    pub(crate) partition_key: Option<String>,
}

#[async_trait]
impl PageRequest for FindRequest {
    type Row = Document;

    fn pager_type(&self) -> PagerType {
        if self.partition_key.is_some() {
            PagerType::PostPartitionFind
        } else {
            PagerType::PostFind
        }
    }

    async fn fetch(
        &self,
        service: &dyn CouchService,
        params: PageParams,
    ) -> Result<PageResponse<Document>> {
        let mut options = self.options.clone();
        options.limit = Some(params.limit);
        if !params.first {
            options.skip = None;
        }
        if let Some(NextPage::Bookmark(bookmark)) = params.next {
            options.bookmark = Some(bookmark);
        }

        let result = match &self.partition_key {
            Some(partition_key) => service.post_partition_find(partition_key, &options).await?,
            None => service.post_find(&options).await?,
        };
        Ok(PageResponse {
            rows: result.docs,
            bookmark: result.bookmark,
        })
    }
}

/// Search indexes, global or partitioned.
pub(crate) struct SearchRequest {
    pub(crate) options: PostSearchOptions,
    pub(crate) partition_key: Option<String>,
}

#[async_trait]
impl PageRequest for SearchRequest {
    type Row = SearchResultRow;

    fn pager_type(&self) -> PagerType {
        if self.partition_key.is_some() {
            PagerType::PostPartitionSearch
        } else {
            PagerType::PostSearch
        }
    }

    async fn fetch(
        &self,
        service: &dyn CouchService,
        params: PageParams,
    ) -> Result<PageResponse<SearchResultRow>> {
        let mut options = self.options.clone();
        options.limit = Some(params.limit);
        if let Some(NextPage::Bookmark(bookmark)) = params.next {
            options.bookmark = Some(bookmark);
        }

        let result = match &self.partition_key {
            Some(partition_key) => {
                service
                    .post_partition_search(partition_key, &options)
                    .await?
            }
            None => service.post_search(&options).await?,
        };
        Ok(PageResponse {
            rows: result.rows,
            bookmark: result.bookmark,
        })
    }
}
