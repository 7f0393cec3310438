//! HTTP response handling

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::{Error, Result};

/// HTTP response wrapper.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    /// Number of retries the request layer needed
    pub retries_taken: u32,
    /// Time from the first attempt to the final response
    pub elapsed: Duration,
}

impl Response {
    /// Create a new response.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
            retries_taken: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the raw body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Replace the body, keeping status and headers.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Get the body as a string.
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(|e| Error::ResponseValidation(e.to_string()))
    }

    /// Parse the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            Error::ResponseValidation(format!("{} (status {})", e, self.status.as_u16()))
        })
    }

    /// Check if the response is successful (2xx status).
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Check if the response is an error (4xx or 5xx status).
    pub fn is_error(&self) -> bool {
        self.status.is_client_error() || self.status.is_server_error()
    }

    /// Convert an error status into [`Error::Api`].
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_error() {
            return Err(Error::from_response(
                self.status.as_u16(),
                &String::from_utf8_lossy(&self.body),
                &self.headers,
            ));
        }
        Ok(self)
    }

    /// Parse a successful response, converting HTTP errors to client errors.
    pub fn parse_result<T: DeserializeOwned>(self) -> Result<T> {
        self.error_for_status()?.json()
    }
}
