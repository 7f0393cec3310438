//! HTTP request builder

use super::Response;
use crate::error::{Error, Result};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use turbocouch_core::retry::{BackoffStrategy, ExponentialBackoff};
use url::Url;

/// Builder for HTTP requests.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
    timeout: Duration,
    pub(crate) max_retries: u32,
    pub(crate) backoff: Option<Arc<ExponentialBackoff>>,
    pub(crate) http_client: Option<reqwest::Client>,
}

impl RequestBuilder {
    /// Create a new request builder.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            timeout: Duration::from_secs(600),
            max_retries: 0,
            backoff: None,
            http_client: None,
        }
    }

    /// Set the HTTP client to use
    pub(crate) fn with_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Set the backoff used between retries
    pub(crate) fn with_backoff(mut self, backoff: Arc<ExponentialBackoff>) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Set a header, returning an error if the name or value is invalid.
    pub fn header(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = key
            .as_ref()
            .parse::<HeaderName>()
            .map_err(|_| Error::InvalidHeaderName(key.as_ref().to_string()))?;
        let value = value
            .as_ref()
            .parse::<HeaderValue>()
            .map_err(|_| Error::InvalidHeaderValue(format!("value of `{}`", name.as_str())))?;

        self.headers.insert(name, value);
        Ok(self)
    }

    /// Set a header from already validated parts.
    pub fn typed_header(mut self, key: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Append a query parameter.
    pub fn query(mut self, key: &str, value: impl std::fmt::Display) -> Self {
        self.url
            .query_pairs_mut()
            .append_pair(key, &value.to_string());
        self
    }

    /// Append a query parameter when `value` is set.
    pub fn query_opt<T: std::fmt::Display>(self, key: &str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    /// Set a JSON request body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_vec(body)?);
        self.headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(self)
    }

    /// Set the raw request body.
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set max retries.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Send the request and get a response.
    ///
    /// Retryable failures (connection errors, timeouts, 408, 429 and 5xx)
    /// are retried up to `max_retries` times, or fewer if the backoff allows
    /// fewer. A `Retry-After` header takes precedence over the backoff delay.
    pub async fn send(self) -> Result<Response> {
        let client = self
            .http_client
            .clone()
            .ok_or_else(|| Error::HttpClient("No HTTP client configured".to_string()))?;

        let mut req = client
            .request(self.method.clone(), self.url.as_str())
            .timeout(self.timeout)
            .headers(self.headers.clone());

        if let Some(body) = &self.body {
            req = req.body(body.clone());
        }

        let max_retries = self.retry_budget();
        let started = Instant::now();
        let mut attempt = 0;
        loop {
            let outcome = match req
                .try_clone()
                .ok_or_else(|| Error::HttpClient("Could not clone request".to_string()))?
                .send()
                .await
            {
                Ok(resp) => {
                    let status = resp.status();
                    let headers = resp.headers().clone();
                    let body = resp
                        .bytes()
                        .await
                        .map_err(|e| Error::Connection(e.to_string()))?;

                    let mut response = Response::new(status, headers, body);
                    response.retries_taken = attempt;
                    response.elapsed = started.elapsed();

                    if !response.is_error() || attempt >= max_retries {
                        return Ok(response);
                    }
                    let error = Error::from_response(
                        status.as_u16(),
                        &String::from_utf8_lossy(response.body()),
                        response.headers(),
                    );
                    if !error.is_retryable() {
                        return Ok(response);
                    }
                    error
                }
                Err(e) if e.is_timeout() => Error::Timeout(self.timeout),
                Err(e) => Error::from(e),
            };

            if attempt >= max_retries || !outcome.is_retryable() {
                return Err(outcome);
            }

            let delay = outcome
                .retry_after()
                .or_else(|| self.backoff.as_ref().and_then(|b| b.next_delay(attempt)))
                .unwrap_or_else(|| Duration::from_secs(2u64.saturating_pow(attempt)));
            attempt += 1;
            tracing::debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %outcome,
                "Retrying request"
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn retry_budget(&self) -> u32 {
        match &self.backoff {
            Some(backoff) => self.max_retries.min(backoff.max_retries()),
            None => self.max_retries,
        }
    }

    /// Get the method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Get the URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Get the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the body, if any.
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Get the timeout.
    pub fn timeout_duration(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> RequestBuilder {
        RequestBuilder::new(
            Method::POST,
            Url::parse("http://localhost:5984/orders/_changes").unwrap(),
        )
    }

    #[test]
    fn test_query_parameters_are_encoded() {
        let request = builder()
            .query("feed", "longpoll")
            .query("since", "12-g1AAAA+/=")
            .query_opt("limit", Some(10))
            .query_opt::<u64>("heartbeat", None);

        assert_eq!(
            request.url().query(),
            Some("feed=longpoll&since=12-g1AAAA%2B%2F%3D&limit=10")
        );
    }

    #[test]
    fn test_json_body_sets_content_type() {
        let request = builder()
            .json(&serde_json::json!({"doc_ids": ["a"]}))
            .unwrap();

        assert_eq!(
            request.headers().get("content-type").unwrap(),
            "application/json"
        );
        assert_eq!(request.body_bytes(), Some(&br#"{"doc_ids":["a"]}"#[..]));
    }

    #[test]
    fn test_invalid_header_name() {
        let result = builder().header("bad header", "x");
        assert!(matches!(result, Err(Error::InvalidHeaderName(_))));
    }

    #[tokio::test]
    async fn test_send_without_client_fails() {
        let result = builder().send().await;
        assert!(matches!(result, Err(Error::HttpClient(_))));
    }

    #[tokio::test]
    async fn test_backoff_caps_retries() {
        use turbocouch_core::retry::Jitter;
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).insert_header("retry-after", "0"))
            .expect(2)
            .mount(&server)
            .await;

        let backoff = ExponentialBackoff::builder()
            .max_retries(1)
            .initial_delay(Duration::from_millis(1))
            .jitter(Jitter::None)
            .build();
        let url = Url::parse(&format!("{}/orders", server.uri())).unwrap();
        let response = RequestBuilder::new(Method::GET, url)
            .with_client(reqwest::Client::new())
            .with_backoff(Arc::new(backoff))
            .max_retries(5)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), http::StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.retries_taken, 1);
    }
}
