//! HTTP transport module
//!
//! Provides the REST transport with retry, rate limiting and backoff.
//!
//! # Features
//!
//! - **Automatic Retries**: 429, 5xx, timeouts and connect errors
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Backoff Strategies**: Constant, linear, and exponential backoff
//! - **Access Token**: Sent as the `access_token` query parameter

mod client;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, RateLimit};
