//! Error types for the turbocouch client
//!
//! A single [`Error`] enum covers transport failures, server responses,
//! invalid caller input and misuse of the streaming utilities. Server
//! responses keep the HTTP status and the `error`/`reason` pair from the
//! CouchDB error body so callers can branch on either.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for operations that can fail with a turbocouch error.
pub type Result<T> = std::result::Result<T, Error>;

/// Status codes for which retrying a request cannot succeed.
pub const TERMINAL_STATUS_CODES: [u16; 4] = [400, 401, 403, 404];

/// Main error type for the turbocouch client.
#[derive(Debug, Error)]
pub enum Error {
    /// The server answered with a non-2xx status.
    #[error("API error (status {status}): {code}: {reason}")]
    Api {
        /// HTTP status code
        status: u16,
        /// CouchDB error code, e.g. `not_found` or `unauthorized`
        code: String,
        /// Human readable reason
        reason: String,
        /// Request trace identifier, when the server supplied one
        trace: Option<String>,
        /// Time to wait before retrying, from the `Retry-After` header
        retry_after: Option<Duration>,
    },

    /// Failed to deserialize an API response.
    #[error("Failed to parse API response: {0}")]
    ResponseValidation(String),

    /// Network or connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Request timeout.
    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    /// Invalid options or configuration supplied by the caller.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// An operation was called in a state that does not allow it.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// A page boundary could not be crossed.
    #[error("Pagination error: {0}")]
    Pagination(String),

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// HTTP client configuration or initialization error.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Missing required configuration.
    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    /// Invalid HTTP header name.
    #[error("Invalid HTTP header name: {0}")]
    InvalidHeaderName(String),

    /// Invalid HTTP header value.
    #[error("Invalid HTTP header value: {0}")]
    InvalidHeaderValue(String),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        /// Context description
        context: String,
        /// Underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    /// Create an API error from an HTTP response status, body and headers.
    ///
    /// CouchDB error bodies look like `{"error": "not_found", "reason": "missing"}`.
    /// Bodies that are not in that shape fall back to a code derived from the
    /// status line and the raw body text as reason.
    pub fn from_response(status: u16, body: &str, headers: &http::HeaderMap) -> Self {
        let parsed = serde_json::from_str::<ApiErrorBody>(body).ok();

        let code = parsed
            .as_ref()
            .and_then(|b| b.error.clone())
            .unwrap_or_else(|| status_code_name(status));
        let reason = match parsed.as_ref().and_then(|b| b.reason.clone()) {
            Some(reason) => reason,
            None if body.trim().is_empty() => http::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Unknown error")
                .to_string(),
            None => body.to_string(),
        };
        let trace = parsed
            .and_then(|b| b.trace)
            .or_else(|| request_id(headers));
        let retry_after = headers
            .get(http::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        Error::Api {
            status,
            code,
            reason,
            trace,
            retry_after,
        }
    }

    /// HTTP status code of an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::WithContext { source, .. } => source
                .downcast_ref::<Error>()
                .and_then(|inner| inner.status_code()),
            _ => None,
        }
    }

    /// CouchDB error code of an API error.
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Api { code, .. } => Some(code),
            Error::WithContext { source, .. } => {
                source.downcast_ref::<Error>().and_then(|inner| inner.code())
            }
            _ => None,
        }
    }

    /// Whether this error comes from a status that retrying cannot fix
    /// (400, 401, 403 or 404).
    pub fn is_terminal(&self) -> bool {
        self.status_code()
            .is_some_and(|status| TERMINAL_STATUS_CODES.contains(&status))
    }

    /// Check if this error is retryable at the request layer.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Connection(_) | Error::Timeout(_) => true,
            Error::Api { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }

    /// Get retry delay if the server sent a `Retry-After` header.
    pub fn retry_after(&self) -> Option<Duration> {
        if let Error::Api { retry_after, .. } = self {
            *retry_after
        } else {
            None
        }
    }

    /// Add context to an error.
    pub fn context<C>(self, context: C) -> Self
    where
        C: std::fmt::Display + Send + Sync + 'static,
    {
        Error::WithContext {
            context: context.to_string(),
            source: Box::new(self),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        if error.is_builder() {
            Error::HttpClient(error.to_string())
        } else if error.is_decode() {
            Error::ResponseValidation(error.to_string())
        } else {
            Error::Connection(error.to_string())
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    reason: Option<String>,
    trace: Option<String>,
}

/// `404 Not Found` becomes `not_found`.
fn status_code_name(status: u16) -> String {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(|reason| reason.to_ascii_lowercase().replace([' ', '-'], "_"))
        .unwrap_or_else(|| format!("http_{status}"))
}

pub(crate) fn request_id(headers: &http::HeaderMap) -> Option<String> {
    ["x-request-id", "x-couch-request-id"]
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[test]
    fn test_couch_error_body_parsing() {
        let body = r#"{"error":"unauthorized","reason":"Name or password is incorrect."}"#;
        let error = Error::from_response(401, body, &http::HeaderMap::new());

        assert_matches!(
            &error,
            Error::Api { status: 401, code, reason, trace: None, .. }
                if code == "unauthorized" && reason == "Name or password is incorrect."
        );
        assert_eq!(error.code(), Some("unauthorized"));
        assert!(error.is_terminal());
    }

    #[test]
    fn test_trace_from_body_wins_over_header() {
        let mut headers = http::HeaderMap::new();
        headers.insert("x-couch-request-id", "ABC123".parse().unwrap());

        let error = Error::from_response(
            404,
            r#"{"error":"not_found","reason":"missing","trace":"from-body"}"#,
            &headers,
        );
        assert_matches!(error, Error::Api { trace: Some(t), .. } if t == "from-body");

        let error = Error::from_response(404, r#"{"error":"not_found"}"#, &headers);
        assert_matches!(error, Error::Api { trace: Some(t), .. } if t == "abc123");
    }

    #[test]
    fn test_plain_text_fallback() {
        let error = Error::from_response(503, "Service Unavailable", &http::HeaderMap::new());
        assert_matches!(
            &error,
            Error::Api { code, reason, .. }
                if code == "service_unavailable" && reason == "Service Unavailable"
        );
        assert!(error.is_retryable());
        assert!(!error.is_terminal());
    }

    #[test]
    fn test_empty_body_uses_status_reason() {
        let error = Error::from_response(429, "", &http::HeaderMap::new());
        assert_matches!(
            error,
            Error::Api { code, reason, .. }
                if code == "too_many_requests" && reason == "Too Many Requests"
        );
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = http::HeaderMap::new();
        headers.insert("retry-after", "7".parse().unwrap());

        let error = Error::from_response(429, "{}", &headers);
        assert_eq!(error.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(Error::Connection("reset".into()).retry_after(), None);
    }

    #[rstest]
    #[case(400, true)]
    #[case(401, true)]
    #[case(403, true)]
    #[case(404, true)]
    #[case(409, false)]
    #[case(429, false)]
    #[case(500, false)]
    #[case(502, false)]
    fn test_terminal_status_codes(#[case] status: u16, #[case] terminal: bool) {
        let error = Error::from_response(status, "", &http::HeaderMap::new());
        assert_eq!(error.is_terminal(), terminal);
    }

    #[test]
    fn test_transport_errors_are_not_terminal() {
        assert!(!Error::Connection("refused".into()).is_terminal());
        assert!(!Error::ResponseValidation("eof".into()).is_terminal());
        assert!(Error::Timeout(Duration::from_secs(60)).is_retryable());
        assert!(!Error::InvalidRequest("bad".into()).is_retryable());
    }

    #[test]
    fn test_json_errors_convert_to_serialization() {
        fn decode(body: &str) -> Result<serde_json::Value> {
            Ok(serde_json::from_str(body)?)
        }

        let error = decode("{not json").unwrap_err();
        assert_matches!(error, Error::Serialization(_));
        assert!(!error.is_retryable());
        assert!(!error.is_terminal());
    }

    #[test]
    fn test_context_keeps_status() {
        let error = Error::from_response(403, r#"{"error":"forbidden"}"#, &http::HeaderMap::new())
            .context("Failed to read changes");

        assert!(error.to_string().starts_with("Failed to read changes"));
        assert_eq!(error.status_code(), Some(403));
        assert_eq!(error.code(), Some("forbidden"));
        assert!(error.is_terminal());
    }
}
