//! Client configuration
//!
//! YAML configuration for reaching the Entity Store: base URL, credentials,
//! transport policy and paging defaults.
//!
//! ```yaml
//! base_url: https://api.example.com/v3
//! access_token_env: ENTITY_API_TOKEN
//! http:
//!   timeout_secs: 30
//!   max_retries: 3
//!   backoff: exponential
//! paging:
//!   page_size: 100
//!   implicit_order_key: ID
//! ```

use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, RateLimit};
use crate::store::ID_FIELD;
use crate::types::BackoffType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Environment variable consulted for the access token by default
pub const DEFAULT_TOKEN_ENV: &str = "ENTITY_API_TOKEN";

/// Complete client configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL for API requests
    pub base_url: String,

    /// Access token (takes precedence over `access_token_env`)
    #[serde(default)]
    pub access_token: Option<String>,

    /// Environment variable holding the access token
    #[serde(default = "default_token_env")]
    pub access_token_env: String,

    /// HTTP transport settings
    #[serde(default)]
    pub http: HttpSettings,

    /// Paging defaults
    #[serde(default)]
    pub paging: PagingSettings,
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

/// HTTP transport settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff: BackoffType,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// 0 disables throttling
    pub requests_per_second: u32,
    pub burst_size: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            backoff: BackoffType::Exponential,
            initial_backoff_ms: 100,
            max_backoff_ms: 60_000,
            requests_per_second: 10,
            burst_size: 10,
        }
    }
}

/// Paging defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PagingSettings {
    /// `limit` used when a listing does not set one
    pub page_size: i64,

    /// Field the store orders by implicitly and that holds unique values.
    /// `null` means the store has no such key.
    pub implicit_order_key: Option<String>,
}

impl Default for PagingSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            implicit_order_key: Some(ID_FIELD.to_string()),
        }
    }
}

impl ClientConfig {
    /// Create a config with defaults for everything but the base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: None,
            access_token_env: default_token_env(),
            http: HttpSettings::default(),
            paging: PagingSettings::default(),
        }
    }

    /// Access token from the config or, failing that, the environment
    pub fn resolve_access_token(&self) -> Option<String> {
        self.access_token
            .clone()
            .or_else(|| std::env::var(&self.access_token_env).ok())
            .filter(|token| !token.is_empty())
    }

    /// Transport configuration derived from these settings
    pub fn http_client_config(&self) -> Result<HttpClientConfig> {
        validate_config(self)?;
        let mut builder = HttpClientConfig::builder()
            .base_url(&self.base_url)
            .timeout(Duration::from_secs(self.http.timeout_secs))
            .max_retries(self.http.max_retries)
            .backoff(
                self.http.backoff,
                Duration::from_millis(self.http.initial_backoff_ms),
                Duration::from_millis(self.http.max_backoff_ms),
            );
        builder = match self.rate_limit() {
            Some(limit) => builder.rate_limit(limit.requests_per_second, limit.burst_size),
            None => builder.no_rate_limit(),
        };
        if let Some(token) = self.resolve_access_token() {
            builder = builder.access_token(token);
        }
        Ok(builder.build())
    }

    /// Token bucket settings, if throttling is enabled
    pub fn rate_limit(&self) -> Option<RateLimit> {
        (self.http.requests_per_second > 0).then_some(RateLimit {
            requests_per_second: self.http.requests_per_second,
            burst_size: self.http.burst_size,
        })
    }
}

/// Load a client configuration from a YAML file
pub fn load_config(path: impl AsRef<Path>) -> Result<ClientConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;
    load_config_from_str(&content)
}

/// Load a client configuration from a YAML string
pub fn load_config_from_str(yaml: &str) -> Result<ClientConfig> {
    let config: ClientConfig = serde_yaml::from_str(yaml)
        .map_err(|e| Error::config(format!("Failed to parse config YAML: {e}")))?;

    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &ClientConfig) -> Result<()> {
    if config.base_url.trim().is_empty() {
        return Err(Error::missing_field("base_url"));
    }
    let url = Url::parse(&config.base_url)?;
    if url.cannot_be_a_base() {
        return Err(Error::config(format!(
            "base_url '{}' is not an absolute http(s) URL",
            config.base_url
        )));
    }
    if config.paging.page_size <= 0 {
        return Err(Error::config("paging.page_size must be positive"));
    }
    if config
        .paging
        .implicit_order_key
        .as_deref()
        .is_some_and(|key| key.trim().is_empty())
    {
        return Err(Error::config(
            "paging.implicit_order_key must not be empty (use null to disable it)",
        ));
    }
    Ok(())
}
