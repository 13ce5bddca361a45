//! Offset pager
//!
//! Walks a listing by advancing `start` by the page size. Fast and simple,
//! but entities inserted or removed before the current position shift the
//! window, which the ordered pager exists to avoid.

use super::continued_parameters;
use super::fetcher::PageFetcher;
use super::types::{is_ambiguous, Page};
use crate::error::Result;
use crate::query::{ListParameters, QueryDescriptor};
use crate::state::{OffsetCursor, PagerCursor, PaginationState, PendingError};
use crate::store::{Entity, EntityStore};
use tracing::{debug, info, warn};

/// Issue the initial listing call and build a fresh state from it
pub async fn start<S: EntityStore>(
    fetcher: &PageFetcher<S>,
    descriptor: QueryDescriptor,
) -> Result<(PaginationState, Vec<Entity>)> {
    let page = fetcher
        .fetch(&descriptor.resource, &descriptor.parameters)
        .await?;

    // Without an explicit limit the store's default applies; if the store does
    // not report it, the first page's size is the best estimate.
    let page_size = descriptor.parameters.limit.unwrap_or_else(|| {
        if page.applied_limit > 0 {
            page.applied_limit
        } else {
            (page.len() as i64).max(1)
        }
    });

    let mut state = PaginationState::new(descriptor, fetcher.implicit_order_key(), page_size);
    let entities = absorb(&mut state, page);
    Ok((state, entities))
}

/// Fetch the next page by offset
pub async fn more<S: EntityStore>(
    fetcher: &PageFetcher<S>,
    state: &mut PaginationState,
    extra: Option<&ListParameters>,
) -> Result<Vec<Entity>> {
    if state.all_fetched {
        debug!(resource = %state.descriptor.resource, "Listing exhausted; returning empty page");
        return Ok(Vec::new());
    }

    let live = continued_parameters(state, extra)?;
    let base = state.base_filters()?;
    let cursor = match &state.cursor {
        PagerCursor::Offset(cursor) => cursor.clone(),
        PagerCursor::Ordered(cursor) => {
            info!(
                resource = %state.descriptor.resource,
                pivot = %cursor.pivot,
                "Switching from ordered to offset paging"
            );
            cursor.to_offset(state.pending_error.is_some())
        }
    };

    fetch_page(fetcher, state, live, &base, cursor).await
}

/// Fetch at an offset position and commit it to the state.
///
/// Nothing in `state` changes unless the store call succeeds.
pub(crate) async fn fetch_page<S: EntityStore>(
    fetcher: &PageFetcher<S>,
    state: &mut PaginationState,
    live: ListParameters,
    base: &[String],
    cursor: OffsetCursor,
) -> Result<Vec<Entity>> {
    let mut parameters = live.clone();
    parameters.start = Some(cursor.start);
    let fields: Vec<String> = base.iter().chain(&cursor.boundary).cloned().collect();
    parameters.fields = (!fields.is_empty()).then_some(fields);

    let page = fetcher
        .fetch(&state.descriptor.resource, &parameters)
        .await?;

    state.live = live;
    state.cursor = PagerCursor::Offset(cursor);
    Ok(absorb(state, page))
}

/// Fold an offset page into the state
fn absorb(state: &mut PaginationState, page: Page) -> Vec<Entity> {
    let limit = state.limit();
    let entities = page.entities;
    let received = entities.len() as i64;

    if let PagerCursor::Offset(cursor) = &mut state.cursor {
        cursor.start += limit;
    }
    // A page size of zero or less can never make progress
    state.all_fetched = limit <= 0 || received < limit;
    let fresh = state.tracker.record(&entities);

    state.pending_error = None;
    if !state.all_fetched {
        if let Some(pivot) = state.pivot() {
            let unique = state.assumes_unique(&pivot, None);
            if is_ambiguous(&entities, limit, &pivot.field, unique) {
                warn!(
                    field = %pivot.field,
                    "Every entity on a full page has the same order value; ordered continuation will be refused"
                );
                state.pending_error = Some(PendingError::AmbiguousBoundary { field: pivot.field });
            }
        }
    }

    if state.all_fetched {
        info!(
            resource = %state.descriptor.resource,
            distinct = state.tracker.distinct_count(),
            "Listing exhausted"
        );
    }
    debug!(received, fresh, limit, "Absorbed offset page");

    state.last_batch = Some(entities.clone());
    entities
}
