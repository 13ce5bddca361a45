//! Page fetcher
//!
//! Wraps the Entity Store and normalizes responses into [`Page`]s. Errors are
//! passed through untouched; retrying is the transport's business.

use super::types::Page;
use crate::error::Result;
use crate::query::ListParameters;
use crate::store::EntityStore;
use tracing::{debug, warn};

/// Issues listing calls against a store
#[derive(Debug, Clone)]
pub struct PageFetcher<S> {
    store: S,
}

impl<S: EntityStore> PageFetcher<S> {
    /// Create a fetcher over a store
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The store's implicit unique order key
    pub fn implicit_order_key(&self) -> Option<String> {
        self.store.implicit_order_key().map(ToString::to_string)
    }

    /// Fetch one page
    pub async fn fetch(&self, resource: &str, parameters: &ListParameters) -> Result<Page> {
        let response = self.store.list(resource, parameters).await?;

        if response.count != response.data.len() as i64 {
            warn!(
                resource,
                declared = response.count,
                actual = response.data.len(),
                "Listing count does not match the number of entities returned"
            );
        }
        debug!(
            resource,
            start = response.start,
            limit = response.limit,
            count = response.data.len(),
            "Fetched page"
        );

        Ok(Page {
            entities: response.data,
            applied_limit: response.limit,
            declared_total: response.total,
        })
    }
}
