//! Configuration for the turbocouch client

use http::HeaderMap;
use secrecy::SecretString;
use std::time::Duration;

#[cfg(feature = "env")]
use crate::error::{Error, Result};

/// Default server URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:5984";

/// How the client authenticates.
#[derive(Debug, Clone, Default)]
pub enum AuthConfig {
    /// No credentials
    #[default]
    NoAuth,
    /// HTTP basic authentication
    Basic {
        /// Username
        username: String,
        /// Password
        password: SecretString,
    },
    /// Bearer token
    Bearer {
        /// Token
        token: SecretString,
    },
    /// Cookie session obtained from `POST /_session`
    Session {
        /// Username
        username: String,
        /// Password
        password: SecretString,
    },
}

impl AuthConfig {
    /// HTTP basic credentials.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        AuthConfig::Basic {
            username: username.into(),
            password: secret(password.into()),
        }
    }

    /// Bearer token.
    pub fn bearer(token: impl Into<String>) -> Self {
        AuthConfig::Bearer {
            token: secret(token.into()),
        }
    }

    /// Cookie session credentials.
    pub fn session(username: impl Into<String>, password: impl Into<String>) -> Self {
        AuthConfig::Session {
            username: username.into(),
            password: secret(password.into()),
        }
    }

    /// Name used in logs and `COUCH_AUTH_TYPE`.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthConfig::NoAuth => "noauth",
            AuthConfig::Basic { .. } => "basic",
            AuthConfig::Bearer { .. } => "bearer",
            AuthConfig::Session { .. } => "session",
        }
    }
}

/// Configuration for the turbocouch client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the server
    pub base_url: String,

    /// Authentication
    pub auth: AuthConfig,

    /// Timeout for a whole request
    pub timeout: Duration,

    /// Timeout between two reads of the response body
    pub read_timeout: Option<Duration>,

    /// Maximum number of retries for failed requests
    pub max_retries: u32,

    /// Custom headers to include with every request
    pub default_headers: HeaderMap,

    /// Rate limiting configuration
    pub rate_limit: Option<RateLimitConfig>,

    /// Add `trace` and `errors` members to error bodies
    pub augment_errors: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auth: AuthConfig::NoAuth,
            timeout: Duration::from_secs(600),
            read_timeout: None,
            max_retries: 0,
            default_headers: HeaderMap::new(),
            rate_limit: None,
            augment_errors: true,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration for the server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is read first. Recognised
    /// variables:
    /// - `COUCH_URL` for the server URL
    /// - `COUCH_AUTH_TYPE`: `noauth`, `basic`, `bearer` or `session`
    ///   (defaults to `basic` when a username is set, `bearer` when a token is set)
    /// - `COUCH_USERNAME` / `COUCH_PASSWORD` for basic and session auth
    /// - `COUCH_BEARER_TOKEN` for bearer auth
    /// - `COUCH_TIMEOUT` / `COUCH_READ_TIMEOUT` in seconds
    /// - `COUCH_MAX_RETRIES` for maximum retry attempts
    #[cfg(feature = "env")]
    pub fn from_env() -> Result<Self> {
        use std::env;

        let _ = dotenvy::dotenv();

        let mut config = Self::default();

        if let Ok(base_url) = env::var("COUCH_URL") {
            config.base_url = base_url;
        }

        let username = env::var("COUCH_USERNAME").ok();
        let token = env::var("COUCH_BEARER_TOKEN").ok();
        let auth_type = env::var("COUCH_AUTH_TYPE").ok().unwrap_or_else(|| {
            if username.is_some() {
                "basic".to_string()
            } else if token.is_some() {
                "bearer".to_string()
            } else {
                "noauth".to_string()
            }
        });

        config.auth = match auth_type.to_ascii_lowercase().as_str() {
            "noauth" => AuthConfig::NoAuth,
            "basic" | "session" => {
                let username = username.ok_or_else(|| {
                    Error::MissingConfig(format!("COUCH_USERNAME is required for {auth_type} auth"))
                })?;
                let password = env::var("COUCH_PASSWORD").map_err(|_| {
                    Error::MissingConfig(format!("COUCH_PASSWORD is required for {auth_type} auth"))
                })?;
                if auth_type.eq_ignore_ascii_case("session") {
                    AuthConfig::session(username, password)
                } else {
                    AuthConfig::basic(username, password)
                }
            }
            "bearer" => AuthConfig::bearer(token.ok_or_else(|| {
                Error::MissingConfig("COUCH_BEARER_TOKEN is required for bearer auth".to_string())
            })?),
            other => {
                return Err(Error::InvalidRequest(format!(
                    "Unknown COUCH_AUTH_TYPE `{other}`"
                )));
            }
        };

        if let Ok(timeout_str) = env::var("COUCH_TIMEOUT")
            && let Ok(timeout_secs) = timeout_str.parse::<u64>()
        {
            config.timeout = Duration::from_secs(timeout_secs);
        }

        if let Ok(timeout_str) = env::var("COUCH_READ_TIMEOUT")
            && let Ok(timeout_secs) = timeout_str.parse::<u64>()
        {
            config.read_timeout = Some(Duration::from_secs(timeout_secs));
        }

        if let Ok(max_retries_str) = env::var("COUCH_MAX_RETRIES")
            && let Ok(max_retries) = max_retries_str.parse::<u32>()
        {
            config.max_retries = max_retries;
        }

        Ok(config)
    }
}

/// Configuration for rate limiting.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per second
    pub requests_per_second: f64,

    /// Burst size for token bucket
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10.0,
            burst_size: 20,
        }
    }
}

fn secret(value: String) -> SecretString {
    SecretString::new(value.into_boxed_str())
}
