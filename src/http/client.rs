//! HTTP client with retry and rate limiting
//!
//! The REST transport under [`RestEntityStore`](crate::store::RestEntityStore).
//! It owns the timeout, retry and throttling policy; the pager above it never
//! retries and sees only the final outcome of a request.

use crate::error::{Error, Result};
use crate::types::{BackoffType, JsonValue};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, Response, StatusCode};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Token bucket settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Sustained requests per second
    pub requests_per_second: u32,
    /// Maximum burst
    pub burst_size: u32,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_second: 10,
            burst_size: 10,
        }
    }
}

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL all resource paths are resolved against
    pub base_url: Option<String>,
    /// Access token sent as the `access_token` query parameter
    pub access_token: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Maximum number of retries
    pub max_retries: u32,
    /// Initial delay for backoff
    pub initial_backoff: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    /// Type of backoff strategy
    pub backoff_type: BackoffType,
    /// Throttling; `None` disables it
    pub rate_limit: Option<RateLimit>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            access_token: None,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(60),
            backoff_type: BackoffType::Exponential,
            rate_limit: Some(RateLimit::default()),
            user_agent: format!("entity-pager/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the access token
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.config.access_token = Some(token.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Set throttling
    pub fn rate_limit(mut self, requests_per_second: u32, burst_size: u32) -> Self {
        self.config.rate_limit = Some(RateLimit {
            requests_per_second,
            burst_size,
        });
        self
    }

    /// Disable throttling
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// Outcome of a single attempt
enum Attempt {
    Done(JsonValue),
    Retry { error: Error, delay: Duration },
    Fail(Error),
}

/// HTTP client with retry and rate limiting
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl HttpClient {
    /// Create a client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let limiter = config.rate_limit.map(|limit| {
            let per_second = NonZeroU32::new(limit.requests_per_second).unwrap_or(NonZeroU32::MIN);
            let burst = NonZeroU32::new(limit.burst_size).unwrap_or(NonZeroU32::MIN);
            Arc::new(RateLimiter::direct(
                Quota::per_second(per_second).allow_burst(burst),
            ))
        });

        Ok(Self {
            client,
            config,
            limiter,
        })
    }

    /// Client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Check if throttling is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.limiter.is_some()
    }

    /// GET a resource and decode the JSON body, retrying transient failures.
    ///
    /// `query` may repeat keys (e.g. `fields[]`).
    pub async fn get_json(&self, path: &str, query: &[(String, String)]) -> Result<JsonValue> {
        let url = self.build_url(path)?;
        let max_retries = self.config.max_retries;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            if let Some(limiter) = &self.limiter {
                limiter.until_ready().await;
            }

            match self.attempt(&url, query, attempt).await {
                Attempt::Done(body) => {
                    debug!(%url, attempt, "Request succeeded");
                    return Ok(body);
                }
                Attempt::Fail(error) => return Err(error),
                Attempt::Retry { error, delay } => {
                    warn!(
                        "{error}, attempt {}/{}, retrying in {:?}",
                        attempt + 1,
                        max_retries + 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or(Error::MaxRetriesExceeded { max_retries }))
    }

    async fn attempt(&self, url: &Url, query: &[(String, String)], attempt: u32) -> Attempt {
        let can_retry = attempt < self.config.max_retries;

        let mut request = self.client.get(url.clone()).query(query);
        if let Some(token) = &self.config.access_token {
            request = request.query(&[("access_token", token.as_str())]);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                let error = Error::Timeout {
                    timeout_ms: self.config.timeout.as_millis() as u64,
                };
                return self.retry_or_fail(error, can_retry, attempt);
            }
            Err(e) if e.is_connect() => return self.retry_or_fail(Error::Http(e), can_retry, attempt),
            Err(e) => return Attempt::Fail(Error::Http(e)),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = extract_retry_after(&response);
            let error = Error::RateLimited {
                retry_after_seconds: retry_after,
            };
            return if can_retry {
                Attempt::Retry {
                    error,
                    delay: Duration::from_secs(retry_after),
                }
            } else {
                Attempt::Fail(error)
            };
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = Error::http_status(status.as_u16(), body);
            return if is_retryable_status(status) {
                self.retry_or_fail(error, can_retry, attempt)
            } else {
                Attempt::Fail(error)
            };
        }

        match response.json::<JsonValue>().await {
            Ok(body) => Attempt::Done(body),
            Err(e) => Attempt::Fail(Error::decode(format!("response body is not JSON: {e}"))),
        }
    }

    fn retry_or_fail(&self, error: Error, can_retry: bool, attempt: u32) -> Attempt {
        if can_retry {
            Attempt::Retry {
                error,
                delay: self.calculate_backoff(attempt),
            }
        } else {
            Attempt::Fail(error)
        }
    }

    /// Resolve a resource path against the base URL
    fn build_url(&self, path: &str) -> Result<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(Url::parse(path)?);
        }

        let full = match &self.config.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                path.trim_start_matches('/')
            ),
            None => path.to_string(),
        };
        Ok(Url::parse(&full)?)
    }

    /// Calculate backoff delay for a given attempt
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let delay = match self.config.backoff_type {
            BackoffType::Constant => self.config.initial_backoff,
            BackoffType::Linear => self.config.initial_backoff.saturating_mul(attempt + 1),
            BackoffType::Exponential => self
                .config
                .initial_backoff
                .saturating_mul(2u32.saturating_pow(attempt)),
        };

        std::cmp::min(delay, self.config.max_backoff)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.config.base_url)
            .field("has_access_token", &self.config.access_token.is_some())
            .field("has_rate_limiter", &self.limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Check if an HTTP status is retryable
fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status.as_u16(),
        500 | 502 | 503 | 504 | 520 | 521 | 522 | 523 | 524
    )
}

/// Extract retry-after header value
fn extract_retry_after(response: &Response) -> u64 {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(60)
}
