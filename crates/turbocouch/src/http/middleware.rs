//! HTTP middleware for request/response processing
//!
//! Every request issued by [`Client`](crate::Client) passes through a
//! [`MiddlewareStack`]: requests in insertion order, responses in reverse.
//! Authentication lives in [`auth`](super::auth); this module holds the
//! generic stages.

use super::{RequestBuilder, Response};
use crate::error::{Error, request_id};
use async_trait::async_trait;
use serde_json::{Value, json};

/// Trait for HTTP middleware.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Process a request before sending.
    async fn process_request(&self, request: RequestBuilder) -> Result<RequestBuilder, Error> {
        Ok(request)
    }

    /// Process a response after receiving.
    async fn process_response(&self, response: Response) -> Result<Response, Error> {
        Ok(response)
    }
}

/// Middleware that adds logging/tracing.
pub struct TracingMiddleware;

#[async_trait]
impl Middleware for TracingMiddleware {
    async fn process_request(&self, request: RequestBuilder) -> Result<RequestBuilder, Error> {
        tracing::trace!("Sending {} request to {}", request.method(), request.url());
        Ok(request)
    }

    async fn process_response(&self, response: Response) -> Result<Response, Error> {
        tracing::trace!("Received response with status: {}", response.status());
        Ok(response)
    }
}

/// Middleware that adds rate limiting.
pub struct RateLimitMiddleware {
    governor: std::sync::Arc<governor::DefaultDirectRateLimiter>,
}

impl RateLimitMiddleware {
    /// Create a new rate limit middleware.
    ///
    /// Rates below one request per second are raised to one; a zero burst
    /// is raised to one.
    pub fn new(requests_per_second: f64, burst_size: u32) -> Self {
        use governor::{Quota, RateLimiter};
        use std::num::NonZeroU32;

        let rate = if requests_per_second < 1.0 {
            NonZeroU32::MIN
        } else {
            NonZeroU32::new(requests_per_second as u32).unwrap_or(NonZeroU32::MIN)
        };
        let burst = NonZeroU32::new(burst_size).unwrap_or(NonZeroU32::MIN);

        let quota = Quota::per_second(rate).allow_burst(burst);

        Self {
            governor: std::sync::Arc::new(RateLimiter::direct(quota)),
        }
    }
}

#[async_trait]
impl Middleware for RateLimitMiddleware {
    async fn process_request(&self, request: RequestBuilder) -> Result<RequestBuilder, Error> {
        self.governor.until_ready().await;
        Ok(request)
    }
}

/// Middleware that normalises error bodies.
///
/// For 4xx/5xx JSON bodies that carry an `error` member it adds
/// - `trace`: the lower-cased `x-request-id` / `x-couch-request-id` header,
/// - `errors`: `[{"code": error, "message": "error: reason"}]`,
///
/// leaving members the server already sent untouched.
pub struct ErrorAugmentationMiddleware;

impl ErrorAugmentationMiddleware {
    fn augment(response: &Response) -> Option<Vec<u8>> {
        let Ok(Value::Object(mut body)) = serde_json::from_slice::<Value>(response.body()) else {
            return None;
        };
        let code = body.get("error")?.as_str()?.to_string();

        let mut changed = false;
        if !body.contains_key("trace")
            && let Some(trace) = request_id(response.headers())
        {
            body.insert("trace".to_string(), Value::String(trace));
            changed = true;
        }
        if !body.contains_key("errors") {
            let message = match body.get("reason").and_then(Value::as_str) {
                Some(reason) => format!("{code}: {reason}"),
                None => code.clone(),
            };
            body.insert(
                "errors".to_string(),
                json!([{"code": code, "message": message}]),
            );
            changed = true;
        }

        if changed {
            serde_json::to_vec(&body).ok()
        } else {
            None
        }
    }
}

#[async_trait]
impl Middleware for ErrorAugmentationMiddleware {
    async fn process_response(&self, response: Response) -> Result<Response, Error> {
        if !response.is_error() {
            return Ok(response);
        }
        match Self::augment(&response) {
            Some(body) => Ok(response.with_body(body)),
            None => Ok(response),
        }
    }
}

/// Composite middleware that chains multiple middleware.
pub struct MiddlewareStack {
    middlewares: Vec<Box<dyn Middleware>>,
}

impl Default for MiddlewareStack {
    fn default() -> Self {
        Self::new()
    }
}

impl MiddlewareStack {
    /// Create a new middleware stack.
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    /// Add a middleware to the stack.
    pub fn push(&mut self, middleware: Box<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Whether the stack has no stages.
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

#[async_trait]
impl Middleware for MiddlewareStack {
    async fn process_request(&self, mut request: RequestBuilder) -> Result<RequestBuilder, Error> {
        for middleware in &self.middlewares {
            request = middleware.process_request(request).await?;
        }
        Ok(request)
    }

    async fn process_response(&self, mut response: Response) -> Result<Response, Error> {
        // Process in reverse order for responses
        for middleware in self.middlewares.iter().rev() {
            response = middleware.process_response(response).await?;
        }
        Ok(response)
    }
}
