//! Shared test utilities: an in-memory `CouchService` with scripted handlers.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Map, Value, json};
use turbocouch::http::HeaderMap;
use turbocouch::types::{
    AllDocsResult, Change, ChangesResult, ChangesResultItem, DatabaseInformation, DocsResultRow,
    DocsResultRowValue, Document, FindResult, PostAllDocsOptions, PostChangesOptions,
    PostFindOptions, PostSearchOptions, PostViewOptions, SearchResult, SearchResultRow,
    ViewResult, ViewResultRow,
};
use turbocouch::{CouchService, Error, Result, async_trait};

/// Answers the `n`-th call (0-based) of one operation.
type Handler<Req, Res> = Box<dyn Fn(&Req, usize) -> Result<Res> + Send + Sync>;

/// A request seen by the mock.
#[derive(Debug, Clone)]
pub enum Call {
    Changes(PostChangesOptions),
    DatabaseInformation(String),
    AllDocs {
        partition_key: Option<String>,
        design: bool,
        options: PostAllDocsOptions,
    },
    View {
        partition_key: Option<String>,
        options: PostViewOptions,
    },
    Find {
        partition_key: Option<String>,
        options: PostFindOptions,
    },
    Search {
        partition_key: Option<String>,
        options: PostSearchOptions,
    },
}

struct Endpoint<Req, Res> {
    handler: Option<Handler<Req, Res>>,
    count: AtomicUsize,
}

impl<Req, Res> Default for Endpoint<Req, Res> {
    fn default() -> Self {
        Self {
            handler: None,
            count: AtomicUsize::new(0),
        }
    }
}

impl<Req, Res> Endpoint<Req, Res> {
    fn call(&self, request: &Req, name: &str) -> Result<Res> {
        let n = self.count.fetch_add(1, Ordering::SeqCst);
        match &self.handler {
            Some(handler) => handler(request, n),
            None => Err(Error::IllegalState(format!("unexpected call to {name}"))),
        }
    }
}

/// In-memory service; every operation without a handler fails.
#[derive(Default)]
pub struct MockService {
    changes: Endpoint<PostChangesOptions, ChangesResult>,
    database_information: Endpoint<String, DatabaseInformation>,
    all_docs: Endpoint<PostAllDocsOptions, AllDocsResult>,
    view: Endpoint<PostViewOptions, ViewResult>,
    find: Endpoint<PostFindOptions, FindResult>,
    search: Endpoint<PostSearchOptions, SearchResult>,
    calls: Mutex<Vec<Call>>,
    call_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_changes(
        mut self,
        handler: impl Fn(&PostChangesOptions, usize) -> Result<ChangesResult> + Send + Sync + 'static,
    ) -> Self {
        self.changes.handler = Some(Box::new(handler));
        self
    }

    pub fn on_database_information(
        mut self,
        handler: impl Fn(&String, usize) -> Result<DatabaseInformation> + Send + Sync + 'static,
    ) -> Self {
        self.database_information.handler = Some(Box::new(handler));
        self
    }

    pub fn on_all_docs(
        mut self,
        handler: impl Fn(&PostAllDocsOptions, usize) -> Result<AllDocsResult> + Send + Sync + 'static,
    ) -> Self {
        self.all_docs.handler = Some(Box::new(handler));
        self
    }

    pub fn on_view(
        mut self,
        handler: impl Fn(&PostViewOptions, usize) -> Result<ViewResult> + Send + Sync + 'static,
    ) -> Self {
        self.view.handler = Some(Box::new(handler));
        self
    }

    pub fn on_find(
        mut self,
        handler: impl Fn(&PostFindOptions, usize) -> Result<FindResult> + Send + Sync + 'static,
    ) -> Self {
        self.find.handler = Some(Box::new(handler));
        self
    }

    pub fn on_search(
        mut self,
        handler: impl Fn(&PostSearchOptions, usize) -> Result<SearchResult> + Send + Sync + 'static,
    ) -> Self {
        self.search.handler = Some(Box::new(handler));
        self
    }

    pub fn with_timeouts(mut self, call: Option<Duration>, read: Option<Duration>) -> Self {
        self.call_timeout = call;
        self.read_timeout = read;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn changes_requests(&self) -> Vec<PostChangesOptions> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Changes(options) => Some(options),
                _ => None,
            })
            .collect()
    }

    pub fn changes_calls(&self) -> usize {
        self.changes.count.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl CouchService for MockService {
    async fn post_changes(&self, options: &PostChangesOptions) -> Result<ChangesResult> {
        self.record(Call::Changes(options.clone()));
        tokio::task::yield_now().await;
        self.changes.call(options, "post_changes")
    }

    async fn get_database_information(&self, db: &str) -> Result<DatabaseInformation> {
        self.record(Call::DatabaseInformation(db.to_string()));
        self.database_information
            .call(&db.to_string(), "get_database_information")
    }

    async fn post_all_docs(&self, options: &PostAllDocsOptions) -> Result<AllDocsResult> {
        self.record(Call::AllDocs {
            partition_key: None,
            design: false,
            options: options.clone(),
        });
        self.all_docs.call(options, "post_all_docs")
    }

    async fn post_partition_all_docs(
        &self,
        partition_key: &str,
        options: &PostAllDocsOptions,
    ) -> Result<AllDocsResult> {
        self.record(Call::AllDocs {
            partition_key: Some(partition_key.to_string()),
            design: false,
            options: options.clone(),
        });
        self.all_docs.call(options, "post_partition_all_docs")
    }

    async fn post_design_docs(&self, options: &PostAllDocsOptions) -> Result<AllDocsResult> {
        self.record(Call::AllDocs {
            partition_key: None,
            design: true,
            options: options.clone(),
        });
        self.all_docs.call(options, "post_design_docs")
    }

    async fn post_view(&self, options: &PostViewOptions) -> Result<ViewResult> {
        self.record(Call::View {
            partition_key: None,
            options: options.clone(),
        });
        self.view.call(options, "post_view")
    }

    async fn post_partition_view(
        &self,
        partition_key: &str,
        options: &PostViewOptions,
    ) -> Result<ViewResult> {
        self.record(Call::View {
            partition_key: Some(partition_key.to_string()),
            options: options.clone(),
        });
        self.view.call(options, "post_partition_view")
    }

    async fn post_find(&self, options: &PostFindOptions) -> Result<FindResult> {
        self.record(Call::Find {
            partition_key: None,
            options: options.clone(),
        });
        self.find.call(options, "post_find")
    }

    async fn post_partition_find(
        &self,
        partition_key: &str,
        options: &PostFindOptions,
    ) -> Result<FindResult> {
        self.record(Call::Find {
            partition_key: Some(partition_key.to_string()),
            options: options.clone(),
        });
        self.find.call(options, "post_partition_find")
    }

    async fn post_search(&self, options: &PostSearchOptions) -> Result<SearchResult> {
        self.record(Call::Search {
            partition_key: None,
            options: options.clone(),
        });
        self.search.call(options, "post_search")
    }

    async fn post_partition_search(
        &self,
        partition_key: &str,
        options: &PostSearchOptions,
    ) -> Result<SearchResult> {
        self.record(Call::Search {
            partition_key: Some(partition_key.to_string()),
            options: options.clone(),
        });
        self.search.call(options, "post_partition_search")
    }

    fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }

    fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }
}

/// Route `tracing` output to the test harness, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// Response fixtures
// ---------------------------------------------------------------------------

/// Load a JSON body from `tests/fixtures/responses/{name}.json`.
pub fn load_response_fixture(name: &str) -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let path = Path::new(manifest_dir)
        .join("tests")
        .join("fixtures")
        .join("responses")
        .join(format!("{name}.json"));

    std::fs::read_to_string(&path).unwrap_or_else(|e| {
        panic!("Failed to load response fixture '{name}' from {path:?}: {e}")
    })
}

/// A server error as the request layer would build it.
pub fn api_error(status: u16, code: &str) -> Error {
    Error::from_response(
        status,
        &json!({"error": code, "reason": format!("{code} from mock")}).to_string(),
        &HeaderMap::new(),
    )
}

pub fn change_item(n: usize) -> ChangesResultItem {
    ChangesResultItem {
        id: format!("doc-{n}"),
        seq: format!("{n}-g1AAAA"),
        changes: vec![Change {
            rev: format!("1-{n:032x}"),
        }],
        deleted: None,
        doc: None,
        extra: Map::new(),
    }
}

/// `count` changes numbered from `first`.
pub fn changes_batch(first: usize, count: usize, pending: u64) -> ChangesResult {
    ChangesResult {
        results: (first..first + count).map(change_item).collect(),
        last_seq: format!("{}-g1AAAA", first + count),
        pending,
    }
}

pub fn database_information(doc_count: u64, external: u64) -> DatabaseInformation {
    serde_json::from_value(json!({
        "db_name": "orders",
        "doc_count": doc_count,
        "doc_del_count": 0,
        "sizes": {"active": external, "external": external, "file": external * 2},
        "update_seq": "99-g1AAAA",
    }))
    .unwrap()
}

pub fn docs_row(id: &str) -> DocsResultRow {
    DocsResultRow {
        id: Some(id.to_string()),
        key: id.to_string(),
        value: Some(DocsResultRowValue {
            rev: "1-abc".to_string(),
            deleted: None,
        }),
        doc: None,
        error: None,
    }
}

pub fn view_row(key: Value, id: &str) -> ViewResultRow {
    ViewResultRow {
        id: Some(id.to_string()),
        key,
        value: Value::Null,
        doc: None,
        error: None,
    }
}

pub fn document(id: &str) -> Document {
    serde_json::from_value(json!({"_id": id, "_rev": "1-abc", "type": "order"})).unwrap()
}

pub fn search_row(id: &str) -> SearchResultRow {
    SearchResultRow {
        id: id.to_string(),
        fields: Map::new(),
        order: vec![json!(1.0), json!(0)],
        doc: None,
        highlights: None,
    }
}

/// `_all_docs` over `total` ids, honouring `start_key`, `skip` and `limit`.
pub fn all_docs_server(
    total: usize,
) -> impl Fn(&PostAllDocsOptions, usize) -> Result<AllDocsResult> + Send + Sync + 'static {
    let ids: Vec<String> = (0..total).map(|n| format!("doc-{n:04}")).collect();
    move |options, _| {
        let start = options.start_key.as_deref().unwrap_or("");
        let skip = options.skip.unwrap_or(0) as usize;
        let limit = options.limit.map_or(usize::MAX, |l| l as usize);
        let rows = ids
            .iter()
            .filter(|id| id.as_str() >= start)
            .skip(skip)
            .take(limit)
            .map(|id| docs_row(id))
            .collect();
        Ok(AllDocsResult {
            total_rows: total as u64,
            rows,
            update_seq: None,
        })
    }
}

/// Shared log of the limits a handler was called with.
#[derive(Clone, Default)]
pub struct Limits(Arc<Mutex<Vec<u32>>>);

impl Limits {
    pub fn push(&self, limit: Option<u32>) {
        self.0.lock().unwrap().push(limit.unwrap_or(0));
    }

    pub fn get(&self) -> Vec<u32> {
        self.0.lock().unwrap().clone()
    }
}
