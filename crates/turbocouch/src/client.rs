//! Main client implementation

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use turbocouch_core::retry::{ExponentialBackoff, Jitter};
use url::Url;

use crate::{
    config::{AuthConfig, ClientConfig, RateLimitConfig},
    error::{Error, Result, request_id},
    http::{
        BasicAuthMiddleware, BearerAuthMiddleware, ErrorAugmentationMiddleware, Middleware,
        MiddlewareStack, RateLimitMiddleware, RequestBuilder, SessionAuthMiddleware,
        TracingMiddleware, endpoint_url,
    },
    observability::{RequestMetadata, RequestTimer, ResponseMetadata},
    service::CouchService,
    types::{
        AllDocsResult, ChangesResult, DatabaseInformation, FindResult, PostAllDocsOptions,
        PostChangesOptions, PostFindOptions, PostSearchOptions, PostViewOptions, SearchResult,
        ViewResult,
    },
};

/// Main client for a CouchDB-compatible server.
///
/// Cloning is cheap; clones share the connection pool, the middleware stack
/// and any cached session cookie.
///
/// # Example
///
/// ```rust,no_run
/// use turbocouch::{AuthConfig, Client};
///
/// # fn example() -> turbocouch::Result<()> {
/// let client = Client::builder()
///     .base_url("http://localhost:5984")
///     .auth(AuthConfig::session("admin", "password"))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    read_timeout: Option<Duration>,
    max_retries: u32,
    backoff: Arc<ExponentialBackoff>,
    middleware: MiddlewareStack,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url.as_str())
            .field("timeout", &self.inner.timeout)
            .field("read_timeout", &self.inner.read_timeout)
            .field("max_retries", &self.inner.max_retries)
            .field("middleware", &self.inner.middleware.len())
            .finish()
    }
}

impl Client {
    /// Create an unauthenticated client for the server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder for advanced configuration.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Create a client from the `COUCH_*` environment variables.
    #[cfg(feature = "env")]
    pub fn from_env() -> Result<Self> {
        Self::from_config(ClientConfig::from_env()?)
    }

    /// Create a client from a configuration object.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let base_url = parse_base_url(&config.base_url)?;

        let mut http_builder = reqwest::Client::builder()
            .user_agent(format!("turbocouch/{}", crate::VERSION))
            .default_headers(config.default_headers.clone());
        if let Some(read_timeout) = config.read_timeout {
            http_builder = http_builder.read_timeout(read_timeout);
        }
        let http_client = http_builder
            .build()
            .map_err(|e| Error::HttpClient(e.to_string()))?;

        let mut middleware = MiddlewareStack::new();
        middleware.push(Box::new(TracingMiddleware));
        if let Some(RateLimitConfig {
            requests_per_second,
            burst_size,
        }) = config.rate_limit
        {
            middleware.push(Box::new(RateLimitMiddleware::new(
                requests_per_second,
                burst_size,
            )));
        }
        match config.auth {
            AuthConfig::NoAuth => {}
            AuthConfig::Basic { username, password } => {
                middleware.push(Box::new(BasicAuthMiddleware::new(&username, &password)?));
            }
            AuthConfig::Bearer { token } => {
                middleware.push(Box::new(BearerAuthMiddleware::new(&token)?));
            }
            AuthConfig::Session { username, password } => {
                middleware.push(Box::new(SessionAuthMiddleware::new(
                    http_client.clone(),
                    &base_url,
                    username,
                    password,
                    config.timeout,
                )?));
            }
        }
        if config.augment_errors {
            middleware.push(Box::new(ErrorAugmentationMiddleware));
        }

        let backoff = ExponentialBackoff::builder()
            .max_retries(config.max_retries)
            .initial_delay(Duration::from_millis(500))
            .max_delay(Duration::from_secs(8))
            .jitter(Jitter::Proportional(0.25))
            .build();

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                timeout: config.timeout,
                read_timeout: config.read_timeout,
                max_retries: config.max_retries,
                backoff: Arc::new(backoff),
                middleware,
            }),
        })
    }

    /// Get the base URL of the server.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Create a request builder for `segments` below the base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot carry a path.
    pub fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = endpoint_url(&self.inner.base_url, segments)?;
        Ok(RequestBuilder::new(method, url)
            .with_client(self.inner.http_client.clone())
            .with_backoff(self.inner.backoff.clone())
            .timeout(self.inner.timeout)
            .max_retries(self.inner.max_retries))
    }

    /// Run a request through the middleware stack and decode the JSON result.
    pub async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let timer = RequestTimer::start();
        let request = self.inner.middleware.process_request(request).await?;

        let mut metadata = RequestMetadata::new(request.method().as_str(), request.url().path());
        if let Some(body) = request.body_bytes() {
            metadata = metadata.with_body_size(body.len());
        }
        metadata.log_request();

        let response = request.send().await.inspect_err(|e| {
            tracing::debug!(path = %metadata.path, error = %e, "HTTP request did not complete");
        })?;
        let response = self.inner.middleware.process_response(response).await?;

        ResponseMetadata::new(response.status().as_u16(), timer.elapsed())
            .with_body_size(response.body().len())
            .with_retries(response.retries_taken)
            .with_trace(request_id(response.headers()))
            .log(&metadata);

        response.parse_result()
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidUrl("Base URL is empty".to_string()));
    }
    let url = Url::parse(trimmed).map_err(|e| Error::InvalidUrl(format!("{trimmed}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::InvalidUrl(format!(
            "Unsupported scheme `{other}`; expected http or https"
        ))),
    }
}

/// Members of a `_changes` request that travel in the body.
#[derive(Serialize)]
struct ChangesBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    doc_ids: Option<&'a Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selector: Option<&'a Value>,
}

#[async_trait]
impl CouchService for Client {
    async fn post_changes(&self, options: &PostChangesOptions) -> Result<ChangesResult> {
        // An unset filter follows the body members that were supplied
        let filter = options.filter.as_deref().or(if options.doc_ids.is_some() {
            Some("_doc_ids")
        } else if options.selector.is_some() {
            Some("_selector")
        } else {
            None
        });

        let mut request = self
            .request(Method::POST, &[&options.db, "_changes"])?
            .query_opt("att_encoding_info", options.att_encoding_info)
            .query_opt("attachments", options.attachments)
            .query_opt("conflicts", options.conflicts)
            .query_opt("descending", options.descending)
            .query_opt("feed", options.feed.map(|f| f.as_str()))
            .query_opt("filter", filter)
            .query_opt("heartbeat", options.heartbeat)
            .query_opt("include_docs", options.include_docs)
            .query_opt("limit", options.limit)
            .query_opt("since", options.since.as_deref())
            .query_opt("timeout", options.timeout);
        if let Some(last_event_id) = &options.last_event_id {
            request = request.header("Last-Event-ID", last_event_id)?;
        }
        let request = request.json(&ChangesBody {
            doc_ids: options.doc_ids.as_ref(),
            fields: options.fields.as_ref(),
            selector: options.selector.as_ref(),
        })?;

        self.execute(request).await
    }

    async fn get_database_information(&self, db: &str) -> Result<DatabaseInformation> {
        self.execute(self.request(Method::GET, &[db])?).await
    }

    async fn post_all_docs(&self, options: &PostAllDocsOptions) -> Result<AllDocsResult> {
        let request = self.request(Method::POST, &[&options.db, "_all_docs"])?;
        self.execute(request.json(options)?).await
    }

    async fn post_partition_all_docs(
        &self,
        partition_key: &str,
        options: &PostAllDocsOptions,
    ) -> Result<AllDocsResult> {
        let request = self.request(
            Method::POST,
            &[&options.db, "_partition", partition_key, "_all_docs"],
        )?;
        self.execute(request.json(options)?).await
    }

    async fn post_design_docs(&self, options: &PostAllDocsOptions) -> Result<AllDocsResult> {
        let request = self.request(Method::POST, &[&options.db, "_design_docs"])?;
        self.execute(request.json(options)?).await
    }

    async fn post_view(&self, options: &PostViewOptions) -> Result<ViewResult> {
        let request = self.request(
            Method::POST,
            &[&options.db, "_design", &options.ddoc, "_view", &options.view],
        )?;
        self.execute(request.json(options)?).await
    }

    async fn post_partition_view(
        &self,
        partition_key: &str,
        options: &PostViewOptions,
    ) -> Result<ViewResult> {
        let request = self.request(
            Method::POST,
            &[
                &options.db,
                "_partition",
                partition_key,
                "_design",
                &options.ddoc,
                "_view",
                &options.view,
            ],
        )?;
        self.execute(request.json(options)?).await
    }

    async fn post_find(&self, options: &PostFindOptions) -> Result<FindResult> {
        let request = self.request(Method::POST, &[&options.db, "_find"])?;
        self.execute(request.json(options)?).await
    }

    async fn post_partition_find(
        &self,
        partition_key: &str,
        options: &PostFindOptions,
    ) -> Result<FindResult> {
        let request = self.request(
            Method::POST,
            &[&options.db, "_partition", partition_key, "_find"],
        )?;
        self.execute(request.json(options)?).await
    }

    async fn post_search(&self, options: &PostSearchOptions) -> Result<SearchResult> {
        let request = self.request(
            Method::POST,
            &[&options.db, "_design", &options.ddoc, "_search", &options.index],
        )?;
        self.execute(request.json(options)?).await
    }

    async fn post_partition_search(
        &self,
        partition_key: &str,
        options: &PostSearchOptions,
    ) -> Result<SearchResult> {
        let request = self.request(
            Method::POST,
            &[
                &options.db,
                "_partition",
                partition_key,
                "_design",
                &options.ddoc,
                "_search",
                &options.index,
            ],
        )?;
        self.execute(request.json(options)?).await
    }

    fn call_timeout(&self) -> Option<Duration> {
        Some(self.inner.timeout)
    }

    fn read_timeout(&self) -> Option<Duration> {
        self.inner.read_timeout
    }
}

/// Builder for creating a configured Client.
#[derive(Debug, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Set the base URL of the server.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    /// Set the authentication scheme.
    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.config.auth = auth;
        self
    }

    /// Set the timeout for a whole request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the timeout between reads of a response.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = Some(timeout);
        self
    }

    /// Set the maximum number of retries.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Limit the request rate.
    pub fn rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.config.rate_limit = Some(rate_limit);
        self
    }

    /// Enable or disable error body augmentation.
    pub fn augment_errors(mut self, enabled: bool) -> Self {
        self.config.augment_errors = enabled;
        self
    }

    /// Add a custom default header.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid according to HTTP specifications.
    pub fn default_header(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self> {
        let key_str = key.into();
        let value_str = value.into();

        let key: http::HeaderName = key_str
            .parse()
            .map_err(|_| Error::InvalidHeaderName(key_str.clone()))?;
        let value: http::HeaderValue = value_str
            .parse()
            .map_err(|_| Error::InvalidHeaderValue(value_str.clone()))?;

        self.config.default_headers.insert(key, value);
        Ok(self)
    }

    /// Build the client with the configured options.
    pub fn build(self) -> Result<Client> {
        Client::from_config(self.config)
    }
}
