//! Pagination engine module
//!
//! The caller-facing facade over the pagers.
//!
//! # Overview
//!
//! - `EntityPager` - start a listing, continue it by offset or by order field,
//!   export and import its state
//! - `PagerStats` - call statistics
//!
//! ```rust,ignore
//! let mut pager = EntityPager::new(store);
//! let first = pager
//!     .start_listing("database/12/profiles", ListParameters::new().limit(100).orderby("created"))
//!     .await?;
//! while !pager.is_exhausted() {
//!     let page = pager.fetch_next_ordered(None, OrderedFetchOptions::new()).await?;
//! }
//! ```

mod types;

pub use crate::pager::OrderedFetchOptions;
pub use types::PagerStats;

use crate::error::{Error, Result};
use crate::pager::{offset, ordered, PageFetcher};
use crate::query::{ListParameters, QueryDescriptor};
use crate::state::{PaginationState, StateBlob};
use crate::store::{Entity, EntityStore};
use tracing::debug;

/// Batched, resumable walk over one listing of an Entity Store
#[derive(Debug)]
pub struct EntityPager<S> {
    fetcher: PageFetcher<S>,
    state: Option<PaginationState>,
    stats: PagerStats,
}

impl<S: EntityStore> EntityPager<S> {
    /// Create a pager over a store
    pub fn new(store: S) -> Self {
        Self {
            fetcher: PageFetcher::new(store),
            state: None,
            stats: PagerStats::default(),
        }
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        self.fetcher.store()
    }

    /// Current pagination state, if a listing was started or imported
    pub fn state(&self) -> Option<&PaginationState> {
        self.state.as_ref()
    }

    /// Call statistics
    pub fn stats(&self) -> &PagerStats {
        &self.stats
    }

    /// Issue the initial listing call, replacing any previous walk.
    ///
    /// The previous walk is kept if the call fails.
    pub async fn start_listing(
        &mut self,
        resource: impl Into<String>,
        parameters: ListParameters,
    ) -> Result<Vec<Entity>> {
        let descriptor = QueryDescriptor::new(resource, parameters)?;
        debug!(resource = %descriptor.resource, "Starting listing");

        match offset::start(&self.fetcher, descriptor).await {
            Ok((state, entities)) => {
                self.stats.add_page(entities.len());
                self.state = Some(state);
                Ok(entities)
            }
            Err(e) => {
                self.stats.add_error();
                Err(e)
            }
        }
    }

    /// Fetch the next page by offset.
    ///
    /// `extra` may change `limit`, `total` and passthrough options; the change
    /// persists for later calls.
    pub async fn fetch_next(&mut self, extra: Option<ListParameters>) -> Result<Vec<Entity>> {
        let state = self.state.as_mut().ok_or(Error::NotStarted)?;
        let result = offset::more(&self.fetcher, state, extra.as_ref()).await;
        self.track(result)
    }

    /// Fetch the next page by order-field value.
    ///
    /// Entities inserted or removed elsewhere in the collection between calls
    /// do not cause skips. The first page after an all-tied full page is
    /// refused with [`Error::AmbiguousBoundary`] unless `options` allows the
    /// fallback to offset paging or asserts the order field is unique.
    ///
    /// A call that finishes a run of entities tied on the last order value
    /// returns every remaining member of that run, so such a page can be
    /// longer than `limit`.
    pub async fn fetch_next_ordered(
        &mut self,
        extra: Option<ListParameters>,
        options: OrderedFetchOptions,
    ) -> Result<Vec<Entity>> {
        let state = self.state.as_mut().ok_or_else(|| {
            Error::unsuitable("no listing has been started, so there is no order field to pivot on")
        })?;
        let result = ordered::more(&self.fetcher, state, extra.as_ref(), options).await;
        self.track(result)
    }

    /// Conservative exhaustion flag; `false` before any listing call
    pub fn is_exhausted(&self) -> bool {
        self.state
            .as_ref()
            .is_some_and(PaginationState::is_exhausted)
    }

    /// Distinct entities delivered so far
    pub fn distinct_fetched_count(&self) -> u64 {
        self.state
            .as_ref()
            .map_or(0, PaginationState::distinct_fetched_count)
    }

    /// Export the current state
    pub fn export_state(
        &self,
        include_fetched_entities: bool,
        include_filter_values: bool,
    ) -> Result<StateBlob> {
        self.state
            .as_ref()
            .ok_or(Error::NotStarted)?
            .export(include_fetched_entities, include_filter_values)
    }

    /// Replace the current state with an exported one
    pub fn import_state(&mut self, blob: &StateBlob) -> Result<()> {
        let state = PaginationState::import(blob)?;
        debug!(
            resource = %state.descriptor.resource,
            mode = %state.mode(),
            "Imported pagination state"
        );
        self.state = Some(state);
        Ok(())
    }

    /// Supply the filter expressions left out of a redacted export
    pub fn restore_filters(&mut self, fields: Vec<String>) -> Result<()> {
        self.state
            .as_mut()
            .ok_or(Error::NotStarted)?
            .restore_filters(fields)
    }

    /// Forget the current walk
    pub fn reset(&mut self) {
        self.state = None;
        self.stats = PagerStats::default();
    }

    fn track(&mut self, result: Result<Vec<Entity>>) -> Result<Vec<Entity>> {
        match &result {
            Ok(entities) => self.stats.add_page(entities.len()),
            Err(_) => self.stats.add_error(),
        }
        result
    }
}

#[cfg(test)]
mod tests;
