//! Configuration types.
//!
//! Everything is read from the environment. Unset variables fall back to the
//! defaults below; set-but-malformed values are a `ConfigError`.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default address of the external backend.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Default address of the same-origin proxy (as seen by the client).
pub const DEFAULT_PROXY_URL: &str = "http://localhost:3000";

/// Default bound on every outbound HTTP call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Proxy server configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Port the proxy listens on (all interfaces).
    pub port: u16,
    /// Base URL of the external backend, without trailing slash.
    pub backend_url: String,
    /// Timeout applied to each backend call.
    pub request_timeout: Duration,
    /// Origins allowed by CORS. Empty means same-origin only (no CORS layer).
    pub cors_origins: Vec<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cors_origins: Vec::new(),
        }
    }
}

impl ProxyConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            port: parse_env("ANTON_PORT")?.unwrap_or(defaults.port),
            backend_url: std::env::var("ANTON_BACKEND_URL")
                .map(|url| normalize_base_url(&url))
                .unwrap_or(defaults.backend_url),
            request_timeout: parse_env("ANTON_REQUEST_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            cors_origins: std::env::var("ANTON_CORS_ORIGINS")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
        })
    }
}

/// Client (terminal front-end) configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the proxy.
    pub proxy_url: String,
    /// Bearer credential forwarded to the proxy, if any.
    pub auth_token: Option<SecretString>,
    /// Timeout applied to each proxy call.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            proxy_url: DEFAULT_PROXY_URL.to_string(),
            auth_token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            proxy_url: std::env::var("ANTON_PROXY_URL")
                .map(|url| normalize_base_url(&url))
                .unwrap_or(defaults.proxy_url),
            auth_token: std::env::var("ANTON_AUTH_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty())
                .map(SecretString::from),
            request_timeout: parse_env("ANTON_REQUEST_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        })
    }
}

fn parse_env<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

pub(crate) fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
