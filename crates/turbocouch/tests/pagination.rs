//! Integration tests for pagination against an in-memory service.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use common::{
    Call, Limits, MockService, all_docs_server, api_error, docs_row, document, search_row,
    view_row,
};
use futures::TryStreamExt;
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;
use turbocouch::types::{
    FindResult, PostAllDocsOptions, PostFindOptions, PostSearchOptions, PostViewOptions,
    SearchResult, ViewResult,
};
use turbocouch::{Error, PagerType, Pagination};

fn all_docs_options(limit: u32) -> PostAllDocsOptions {
    PostAllDocsOptions::builder()
        .db("orders")
        .limit(limit)
        .build()
        .unwrap()
}

fn view_options(limit: u32) -> PostViewOptions {
    PostViewOptions::builder()
        .db("orders")
        .ddoc("reports")
        .view("by_status")
        .limit(limit)
        .build()
        .unwrap()
}

fn search_options(limit: u32) -> PostSearchOptions {
    PostSearchOptions::builder()
        .db("orders")
        .ddoc("search")
        .index("by_name")
        .query("name:*")
        .limit(limit)
        .build()
        .unwrap()
}

/// Serves `total` documents, using the decimal offset as bookmark.
fn find_server(total: usize) -> MockService {
    MockService::new().on_find(move |options, _| {
        let offset: usize = options
            .bookmark
            .as_deref()
            .map_or(0, |b| b.parse().unwrap());
        let limit = options.limit.unwrap() as usize;
        let end = (offset + limit).min(total);
        Ok(FindResult {
            docs: (offset..end).map(|n| document(&format!("doc-{n}"))).collect(),
            bookmark: Some(end.to_string()),
            execution_stats: None,
            warning: None,
        })
    })
}

#[tokio::test]
async fn test_all_docs_pages() {
    let service = Arc::new(MockService::new().on_all_docs(all_docs_server(71)));
    let pagination = Pagination::all_docs(service.clone(), all_docs_options(11)).unwrap();

    let pages: Vec<_> = pagination.pages().try_collect().await.unwrap();
    let sizes: Vec<usize> = pages.iter().map(|page| page.len()).collect();
    assert_eq!(sizes, vec![11, 11, 11, 11, 11, 11, 5]);

    let all = pagination.pager().get_all().await.unwrap();
    assert_eq!(all.len(), 71);
    assert_eq!(all.first().unwrap().key, "doc-0000");
    assert_eq!(all.last().unwrap().key, "doc-0070");
}

#[tokio::test]
async fn test_key_range_requests_one_extra_row() {
    let limits = Limits::default();
    let recorded = limits.clone();
    let server = all_docs_server(25);
    let service = Arc::new(MockService::new().on_all_docs(move |options, n| {
        recorded.push(options.limit);
        server(options, n)
    }));

    let mut pager = Pagination::all_docs(service.clone(), all_docs_options(10))
        .unwrap()
        .pager();
    assert!(pager.has_next());
    pager.get_next().await.unwrap();
    pager.get_next().await.unwrap();
    let last = pager.get_next().await.unwrap();

    assert_eq!(last.len(), 5);
    assert!(!pager.has_next());
    assert_eq!(limits.get(), vec![11, 11, 11]);

    // Each page starts on the row held back from the previous one
    let start_keys: Vec<_> = service
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::AllDocs { options, .. } => Some(options.start_key),
            _ => None,
        })
        .collect();
    assert_eq!(
        start_keys,
        vec![None, Some("doc-0010".to_string()), Some("doc-0020".to_string())]
    );
}

#[tokio::test]
async fn test_exact_multiple_of_limit_ends_without_empty_page() {
    let service = Arc::new(MockService::new().on_all_docs(all_docs_server(20)));
    let pages: Vec<_> = Pagination::all_docs(service, all_docs_options(10))
        .unwrap()
        .pages()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(pages.iter().map(|p| p.len()).collect::<Vec<_>>(), vec![10, 10]);
}

#[tokio::test]
async fn test_skip_only_applies_to_first_page() {
    let service = Arc::new(MockService::new().on_all_docs(all_docs_server(30)));
    let options = PostAllDocsOptions::builder()
        .db("orders")
        .limit(10u32)
        .skip(5u64)
        .build()
        .unwrap();

    let rows = Pagination::all_docs(service.clone(), options)
        .unwrap()
        .pager()
        .get_all()
        .await
        .unwrap();
    assert_eq!(rows.len(), 25);
    assert_eq!(rows[0].key, "doc-0005");

    let skips: Vec<_> = service
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::AllDocs { options, .. } => Some(options.skip),
            _ => None,
        })
        .collect();
    assert_eq!(skips, vec![Some(5), None, None]);
}

#[tokio::test]
async fn test_partition_and_design_docs_use_their_endpoints() {
    let service = Arc::new(MockService::new().on_all_docs(all_docs_server(3)));

    let partition = Pagination::partition_all_docs(service.clone(), "sensor-1", all_docs_options(5))
        .unwrap();
    assert_eq!(partition.pager_type(), PagerType::PostPartitionAllDocs);
    partition.pager().get_all().await.unwrap();

    let design = Pagination::design_docs(service.clone(), all_docs_options(5)).unwrap();
    assert_eq!(design.pager_type(), PagerType::PostDesignDocs);
    design.pager().get_all().await.unwrap();

    let calls = service.calls();
    assert_matches!(
        &calls[0],
        Call::AllDocs { partition_key: Some(pk), design: false, .. } if pk == "sensor-1"
    );
    assert_matches!(&calls[1], Call::AllDocs { partition_key: None, design: true, .. });
}

#[tokio::test]
async fn test_view_boundary_with_identical_rows() {
    let service = Arc::new(MockService::new().on_view(|options, _| {
        let rows = vec![view_row(json!("a"), "doc-1"), view_row(json!("a"), "doc-1")];
        Ok(ViewResult {
            total_rows: Some(2),
            update_seq: None,
            rows: rows.into_iter().take(options.limit.unwrap() as usize).collect(),
        })
    }));
    let mut pager = Pagination::view(service, view_options(1)).unwrap().pager();

    let first = pager.get_next().await.unwrap();
    assert_eq!(first.len(), 1);
    assert!(pager.has_next());

    let error = pager.get_next().await.unwrap_err();
    assert_matches!(error, Error::Pagination(msg) if msg.contains("identical keys"));
    assert!(!pager.has_next());
    assert_matches!(pager.get_next().await, Err(Error::IllegalState(_)));
}

#[tokio::test]
async fn test_view_cursor_carries_key_and_doc_id() {
    let rows = vec![
        view_row(json!(["open", 1]), "doc-1"),
        view_row(json!(["open", 1]), "doc-2"),
        view_row(json!(["open", 1]), "doc-3"),
        view_row(json!(["shipped", 2]), "doc-4"),
    ];
    let service = Arc::new(MockService::new().on_view(move |options, _| {
        let start = rows
            .iter()
            .position(|row| {
                options.start_key.as_ref().is_none_or(|key| {
                    &row.key == key && row.id == options.start_key_doc_id
                })
            })
            .unwrap_or(rows.len());
        Ok(ViewResult {
            total_rows: Some(rows.len() as u64),
            update_seq: None,
            rows: rows
                .iter()
                .skip(start)
                .take(options.limit.unwrap() as usize)
                .cloned()
                .collect(),
        })
    }));

    let pagination = Pagination::partition_view(service.clone(), "p1", view_options(2)).unwrap();
    let ids: Vec<_> = pagination
        .rows()
        .map_ok(|row| row.id.unwrap())
        .try_collect()
        .await
        .unwrap();
    assert_eq!(ids, vec!["doc-1", "doc-2", "doc-3", "doc-4"]);

    let second = service
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::View { partition_key, options } => Some((partition_key, options)),
            _ => None,
        })
        .nth(1)
        .unwrap();
    assert_eq!(second.0.as_deref(), Some("p1"));
    assert_eq!(second.1.start_key, Some(json!(["open", 1])));
    assert_eq!(second.1.start_key_doc_id.as_deref(), Some("doc-3"));
    assert_eq!(second.1.limit, Some(3));
}

#[tokio::test]
async fn test_search_bookmark_pages() {
    let limits = Limits::default();
    let recorded = limits.clone();
    let service = Arc::new(MockService::new().on_search(move |options, _| {
        recorded.push(options.limit);
        let rows = match options.bookmark.as_deref() {
            None => (0..14).map(|n| search_row(&format!("doc-{n}"))).collect(),
            Some(_) => Vec::new(),
        };
        Ok(SearchResult {
            total_rows: 14,
            bookmark: Some(format!("g1AAAA-{}", options.bookmark.is_some())),
            rows,
            counts: None,
            ranges: None,
            groups: None,
        })
    }));
    let mut pager = Pagination::search(service, search_options(14)).unwrap().pager();

    let first = pager.get_next().await.unwrap();
    assert_eq!(first.len(), 14);
    assert!(pager.has_next());

    let second = pager.get_next().await.unwrap();
    assert!(second.is_empty());
    assert!(!pager.has_next());
    assert_eq!(limits.get(), vec![14, 14]);
}

#[tokio::test]
async fn test_bookmark_missing_ends_paging() {
    let service = Arc::new(MockService::new().on_search(|_, _| {
        Ok(SearchResult {
            total_rows: 3,
            bookmark: None,
            rows: (0..3).map(|n| search_row(&format!("doc-{n}"))).collect(),
            counts: None,
            ranges: None,
            groups: None,
        })
    }));
    let mut pager = Pagination::partition_search(service, "p1", search_options(3))
        .unwrap()
        .pager();
    assert_eq!(pager.get_next().await.unwrap().len(), 3);
    assert!(!pager.has_next());
}

#[tokio::test]
async fn test_find_rows_match_pages() {
    let service = Arc::new(find_server(23));
    let options = PostFindOptions::builder()
        .db("orders")
        .selector(json!({"type": "order"}))
        .limit(5u32)
        .build()
        .unwrap();
    let pagination = Pagination::find(service.clone(), options).unwrap();

    let pages: Vec<_> = pagination.pages().try_collect().await.unwrap();
    let from_pages: Vec<_> = pages.into_iter().flat_map(|page| page.into_rows()).collect();
    let rows: Vec<_> = pagination.rows().try_collect().await.unwrap();
    let all = pagination.pager().get_all().await.unwrap();

    assert_eq!(from_pages.len(), 23);
    assert_eq!(rows, from_pages);
    assert_eq!(all, from_pages);
    assert_eq!(from_pages[22].id.as_deref(), Some("doc-22"));
}

#[tokio::test]
async fn test_partition_find_sends_bookmark() {
    let service = Arc::new(find_server(7));
    let options = PostFindOptions::builder()
        .db("orders")
        .selector(json!({}))
        .limit(5u32)
        .build()
        .unwrap();
    let all = Pagination::partition_find(service.clone(), "p1", options)
        .unwrap()
        .pager()
        .get_all()
        .await
        .unwrap();
    assert_eq!(all.len(), 7);

    let bookmarks: Vec<_> = service
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Find { options, .. } => Some(options.bookmark),
            _ => None,
        })
        .collect();
    assert_eq!(bookmarks, vec![None, Some("5".to_string())]);
}

#[tokio::test]
async fn test_request_error_is_terminal() {
    let service = Arc::new(MockService::new().on_all_docs(|_, n| match n {
        0 => Ok(turbocouch::types::AllDocsResult {
            total_rows: 10,
            rows: (0..3).map(|n| docs_row(&format!("doc-{n}"))).collect(),
            update_seq: None,
        }),
        _ => Err(api_error(500, "internal_server_error")),
    }));
    let pagination = Pagination::all_docs(service.clone(), all_docs_options(2)).unwrap();
    let mut pager = pagination.pager();

    pager.get_next().await.unwrap();
    assert_matches!(pager.get_next().await, Err(Error::Api { status: 500, .. }));
    assert!(!pager.has_next());
    assert_matches!(pager.get_next().await, Err(Error::IllegalState(_)));

    // Errors are not retried
    assert_eq!(service.calls().len(), 2);
}

#[tokio::test]
async fn test_rows_stream_ends_after_error() {
    let service = Arc::new(MockService::new().on_all_docs(|_, _| Err(api_error(403, "forbidden"))));
    let mut rows = Pagination::all_docs(service, all_docs_options(10)).unwrap().rows();

    assert_matches!(rows.try_next().await, Err(error) if error.code() == Some("forbidden"));
    assert_matches!(rows.try_next().await, Ok(None));
}

#[tokio::test]
async fn test_pagers_are_independent() {
    let service = Arc::new(MockService::new().on_all_docs(all_docs_server(5)));
    let pagination = Pagination::all_docs(service, all_docs_options(2)).unwrap();

    let mut a = pagination.pager();
    let mut b = pagination.pager();
    a.get_next().await.unwrap();
    a.get_next().await.unwrap();
    let first_of_b = b.get_next().await.unwrap();
    assert_eq!(first_of_b[0].key, "doc-0000");
}

#[rstest]
#[case(0)]
#[case(201)]
fn test_limit_out_of_range(#[case] limit: u32) {
    let service = Arc::new(MockService::new());
    assert_matches!(
        Pagination::all_docs(service.clone(), all_docs_options(limit)),
        Err(Error::InvalidRequest(msg)) if msg.contains("out of range")
    );
    assert_matches!(
        Pagination::search(service, search_options(limit)),
        Err(Error::InvalidRequest(_))
    );
}

#[test]
fn test_default_limit() {
    let options = PostAllDocsOptions::builder().db("orders").build().unwrap();
    let pagination = Pagination::all_docs(Arc::new(MockService::new()), options).unwrap();
    assert_eq!(pagination.limit(), 200);
    assert_eq!(pagination.pager_type(), PagerType::PostAllDocs);
}

#[test]
fn test_keys_rejected_for_key_range_families() {
    let service = Arc::new(MockService::new());
    let options = PostAllDocsOptions::builder()
        .db("orders")
        .keys(vec!["a".to_string()])
        .build()
        .unwrap();
    assert_matches!(
        Pagination::all_docs(service.clone(), options.clone()),
        Err(Error::InvalidRequest(msg)) if msg.contains("keys")
    );
    assert_matches!(
        Pagination::design_docs(service.clone(), options),
        Err(Error::InvalidRequest(_))
    );

    let mut view = view_options(10);
    view.keys = Some(vec![json!("a")]);
    assert_matches!(
        Pagination::view(service, view),
        Err(Error::InvalidRequest(msg)) if msg.contains("keys")
    );
}

#[rstest]
#[case::counts(PostSearchOptions { counts: Some(vec!["type".into()]), ..search_options(10) }, "counts")]
#[case::group_field(PostSearchOptions { group_field: Some("type".into()), ..search_options(10) }, "group_field")]
#[case::group_limit(PostSearchOptions { group_limit: Some(2), ..search_options(10) }, "group_limit")]
#[case::group_sort(PostSearchOptions { group_sort: Some(vec!["-date".into()]), ..search_options(10) }, "group_sort")]
#[case::ranges(PostSearchOptions { ranges: Some(serde_json::Map::new()), ..search_options(10) }, "ranges")]
fn test_facets_rejected_for_search(#[case] options: PostSearchOptions, #[case] name: &str) {
    let service = Arc::new(MockService::new());
    assert_matches!(
        Pagination::search(service.clone(), options.clone()),
        Err(Error::InvalidRequest(msg)) if msg.contains(name)
    );
    assert_matches!(
        Pagination::partition_search(service, "p1", options),
        Err(Error::InvalidRequest(_))
    );
}
