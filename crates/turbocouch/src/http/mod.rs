//! HTTP client abstraction and middleware
//!
//! This module provides the HTTP layer of the client: a request builder with
//! retry support, the response wrapper and the middleware pipeline that
//! carries authentication, rate limiting and error augmentation.

pub use auth::{BasicAuthMiddleware, BearerAuthMiddleware, SessionAuthMiddleware};
pub use middleware::{
    ErrorAugmentationMiddleware, Middleware, MiddlewareStack, RateLimitMiddleware,
    TracingMiddleware,
};
pub use request::RequestBuilder;
pub use response::Response;

pub mod auth;
pub mod middleware;
mod request;
mod response;

// Re-export HTTP types from the http crate for convenience
pub use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};

use crate::error::{Error, Result};
use url::Url;

/// Append percent-encoded path segments to `base`.
///
/// `["db", "_design", "app"]` on `http://host:5984/` gives
/// `http://host:5984/db/_design/app`; a `/` inside a segment is encoded.
pub(crate) fn endpoint_url(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| Error::InvalidUrl(format!("{base} cannot be used as a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
