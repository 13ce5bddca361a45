//! Error types for entity-pager
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Pagination errors are distinguishable from store/transport errors so that
//! callers never confuse "no more data" (an empty page) with a failure.

use thiserror::Error;

/// The main error type for entity-pager
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Pagination Errors
    // ============================================================================
    /// A continuation call tried to change `start`, `fields`, `orderby` or `order`
    #[error("Invalid parameters passed.")]
    InvalidParameters {
        /// The offending parameter names
        parameters: Vec<String>,
    },

    #[error("Resource, query or configuration unsuitable for ordered fetching: {reason}")]
    UnsuitableForOrderedFetch { reason: String },

    #[error("All entities in the previous batch had the same value for '{field}'; further ordered fetching cannot proceed")]
    AmbiguousBoundary { field: String },

    #[error("Pagination state cannot serve this request: {message}")]
    StructuralStateMismatch { message: String },

    #[error("Invalid pagination state: {message}")]
    InvalidStateBlob { message: String },

    #[error("No listing has been started; call start_listing first")]
    NotStarted,

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Max retries ({max_retries}) exceeded")]
    MaxRetriesExceeded { max_retries: u32 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Store Errors
    // ============================================================================
    #[error("Failed to decode store response: {message}")]
    Decode { message: String },

    /// Raised by the in-memory store when it cannot parse a `fields` entry;
    /// a REST store passes filters through and reports rejections as `HttpStatus`.
    #[error("Invalid filter expression '{expression}'")]
    InvalidFilter { expression: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State error: {message}")]
    State { message: String },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an invalid parameters error
    pub fn invalid_parameters<I, S>(parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::InvalidParameters {
            parameters: parameters.into_iter().map(Into::into).collect(),
        }
    }

    /// Create an unsuitable-for-ordered-fetch error
    pub fn unsuitable(reason: impl Into<String>) -> Self {
        Self::UnsuitableForOrderedFetch {
            reason: reason.into(),
        }
    }

    /// Create a structural state mismatch error
    pub fn state_mismatch(message: impl Into<String>) -> Self {
        Self::StructuralStateMismatch {
            message: message.into(),
        }
    }

    /// Create an invalid state blob error
    pub fn invalid_blob(message: impl Into<String>) -> Self {
        Self::InvalidStateBlob {
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a state persistence error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Check if this error is retryable by the transport
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::RateLimited { .. } | Error::Timeout { .. } => true,
            Error::HttpStatus { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// Check if this error was raised by the pagination engine itself
    /// (as opposed to the store or transport)
    pub fn is_pagination_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidParameters { .. }
                | Error::UnsuitableForOrderedFetch { .. }
                | Error::AmbiguousBoundary { .. }
                | Error::StructuralStateMismatch { .. }
                | Error::InvalidStateBlob { .. }
                | Error::NotStarted
        )
    }
}

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Result type alias for entity-pager
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_parameters(["start"]);
        assert_eq!(err.to_string(), "Invalid parameters passed.");

        let err = Error::AmbiguousBoundary {
            field: "score".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "All entities in the previous batch had the same value for 'score'; further ordered fetching cannot proceed"
        );

        let err = Error::http_status(404, "Not found");
        assert_eq!(err.to_string(), "HTTP 404: Not found");
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::RateLimited {
            retry_after_seconds: 60
        }
        .is_retryable());
        assert!(Error::Timeout { timeout_ms: 1000 }.is_retryable());
        assert!(Error::http_status(429, "").is_retryable());
        assert!(Error::http_status(503, "").is_retryable());

        assert!(!Error::http_status(400, "").is_retryable());
        assert!(!Error::http_status(404, "").is_retryable());
        assert!(!Error::invalid_parameters(["fields"]).is_retryable());
        assert!(!Error::AmbiguousBoundary {
            field: "x".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_pagination_errors_are_distinguishable() {
        assert!(Error::NotStarted.is_pagination_error());
        assert!(Error::unsuitable("no pivot").is_pagination_error());
        assert!(Error::state_mismatch("redacted").is_pagination_error());
        assert!(Error::invalid_blob("bad version").is_pagination_error());
        assert!(!Error::decode("missing data").is_pagination_error());
        assert!(!Error::http_status(500, "").is_pagination_error());
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
