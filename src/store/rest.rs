//! REST-backed Entity Store
//!
//! Maps `list(resource, parameters)` onto `GET {base_url}/{resource}` through
//! the retrying [`HttpClient`].

use super::types::{EntityStore, ListResponse, ID_FIELD};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::http::HttpClient;
use crate::query::ListParameters;
use async_trait::async_trait;
use tracing::debug;

/// Entity Store reached over HTTP
#[derive(Debug)]
pub struct RestEntityStore {
    client: HttpClient,
    implicit_order_key: Option<String>,
}

impl RestEntityStore {
    /// Create a store on top of an HTTP client
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            implicit_order_key: Some(ID_FIELD.to_string()),
        }
    }

    /// Create a store from client configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let client = HttpClient::with_config(config.http_client_config()?)?;
        Ok(Self {
            client,
            implicit_order_key: config.paging.implicit_order_key.clone(),
        })
    }

    /// Override the implicit order key
    #[must_use]
    pub fn with_implicit_order_key(mut self, key: Option<String>) -> Self {
        self.implicit_order_key = key;
        self
    }

    /// Underlying HTTP client
    pub fn client(&self) -> &HttpClient {
        &self.client
    }
}

#[async_trait]
impl EntityStore for RestEntityStore {
    async fn list(&self, resource: &str, parameters: &ListParameters) -> Result<ListResponse> {
        let query = parameters.to_query_pairs();
        debug!(resource, ?query, "Listing entities");
        let body = self.client.get_json(resource, &query).await?;
        ListResponse::from_json(body)
    }

    fn implicit_order_key(&self) -> Option<&str> {
        self.implicit_order_key.as_deref()
    }
}
