//! Authentication middleware
//!
//! Credentials are attached to outgoing requests by a [`Middleware`] stage so
//! the request layer itself never sees them. Three schemes are supported:
//! HTTP basic, bearer token and cookie session (`POST /_session`).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use http::{HeaderValue, StatusCode, header};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use url::Url;

use super::{Middleware, RequestBuilder, Response, endpoint_url};
use crate::error::{Error, Result};

/// Cookie lifetime assumed when the server sends no `Max-Age`.
pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::from_secs(600);

/// Sends `Authorization: Basic ...` with every request.
pub struct BasicAuthMiddleware {
    header: HeaderValue,
}

impl BasicAuthMiddleware {
    /// Create the middleware from a username and password.
    pub fn new(username: &str, password: &SecretString) -> Result<Self> {
        let credentials = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", username, password.expose_secret()));
        Ok(Self {
            header: sensitive_header(&format!("Basic {credentials}"))?,
        })
    }
}

#[async_trait]
impl Middleware for BasicAuthMiddleware {
    async fn process_request(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(request.typed_header(header::AUTHORIZATION, self.header.clone()))
    }
}

/// Sends `Authorization: Bearer ...` with every request.
pub struct BearerAuthMiddleware {
    header: HeaderValue,
}

impl BearerAuthMiddleware {
    /// Create the middleware from a token.
    pub fn new(token: &SecretString) -> Result<Self> {
        Ok(Self {
            header: sensitive_header(&format!("Bearer {}", token.expose_secret()))?,
        })
    }
}

#[async_trait]
impl Middleware for BearerAuthMiddleware {
    async fn process_request(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(request.typed_header(header::AUTHORIZATION, self.header.clone()))
    }
}

#[derive(Debug, Clone)]
struct SessionCookie {
    value: HeaderValue,
    refresh_at: Instant,
}

/// Cookie session authentication.
///
/// Logs in with `POST /_session` on first use, caches the `AuthSession`
/// cookie and logs in again once 80% of the cookie's `Max-Age` has passed.
/// A 401 response drops the cached cookie so the next request logs in anew.
pub struct SessionAuthMiddleware {
    http_client: reqwest::Client,
    session_url: Url,
    username: String,
    password: SecretString,
    timeout: Duration,
    cookie: Mutex<Option<SessionCookie>>,
}

impl SessionAuthMiddleware {
    /// Create the middleware for the server at `base_url`.
    pub fn new(
        http_client: reqwest::Client,
        base_url: &Url,
        username: impl Into<String>,
        password: SecretString,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            http_client,
            session_url: endpoint_url(base_url, &["_session"])?,
            username: username.into(),
            password,
            timeout,
            cookie: Mutex::new(None),
        })
    }

    async fn login(&self) -> Result<SessionCookie> {
        tracing::debug!(url = %self.session_url, user = %self.username, "Requesting session cookie");

        let resp = self
            .http_client
            .post(self.session_url.clone())
            .timeout(self.timeout)
            .json(&serde_json::json!({
                "name": self.username,
                "password": self.password.expose_secret(),
            }))
            .send()
            .await?;

        let status = resp.status();
        let headers = resp.headers().clone();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::from_response(status.as_u16(), &body, &headers)
                .context("Session login failed"));
        }

        headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(parse_session_cookie)
            .ok_or_else(|| {
                Error::ResponseValidation(
                    "Session response did not set an AuthSession cookie".to_string(),
                )
            })
    }
}

#[async_trait]
impl Middleware for SessionAuthMiddleware {
    async fn process_request(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let mut cookie = self.cookie.lock().await;
        let current = match cookie.as_ref() {
            Some(c) if Instant::now() < c.refresh_at => c.clone(),
            _ => {
                let fresh = self.login().await?;
                *cookie = Some(fresh.clone());
                fresh
            }
        };
        drop(cookie);

        Ok(request.typed_header(header::COOKIE, current.value))
    }

    async fn process_response(&self, response: Response) -> Result<Response> {
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::debug!("Session cookie rejected, clearing it");
            *self.cookie.lock().await = None;
        }
        Ok(response)
    }
}

/// Parses `AuthSession=...; Max-Age=600; Path=/; HttpOnly`.
fn parse_session_cookie(set_cookie: &str) -> Option<SessionCookie> {
    let mut parts = set_cookie.split(';').map(str::trim);
    let pair = parts.next()?;
    if !pair.starts_with("AuthSession=") {
        return None;
    }

    let lifetime = parts
        .filter_map(|attr| attr.split_once('='))
        .find(|(name, _)| name.eq_ignore_ascii_case("max-age"))
        .and_then(|(_, value)| value.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_SESSION_LIFETIME);

    let mut value = HeaderValue::from_str(pair).ok()?;
    value.set_sensitive(true);
    Some(SessionCookie {
        value,
        refresh_at: Instant::now() + lifetime.mul_f64(0.8),
    })
}

fn sensitive_header(value: &str) -> Result<HeaderValue> {
    let mut header = HeaderValue::from_str(value)
        .map_err(|_| Error::InvalidHeaderValue("authorization".to_string()))?;
    header.set_sensitive(true);
    Ok(header)
}
