//! Ordered pager
//!
//! Walks a listing by value instead of position: each request asks for
//! entities whose order field lies beyond the last value delivered (the
//! watermark). Inserts and deletes elsewhere in the collection cannot shift
//! the window, so nothing is skipped.
//!
//! When the order field is not unique, the entities sharing the watermark
//! value may straddle two pages. The trailing run of such entities is kept
//! open and the rest of it is fetched by equality on the watermark, excluding
//! the IDs already delivered, before moving past the watermark.

use super::continued_parameters;
use super::fetcher::PageFetcher;
use super::offset;
use super::types::{is_ambiguous, trailing_run, OrderedFetchOptions};
use crate::error::{Error, Result};
use crate::query::ListParameters;
use crate::state::{OrderedCursor, PagerCursor, PaginationState, PendingError, RunBoundary};
use crate::store::{Entity, EntityStore};
use tracing::{debug, info, warn};

/// Fetch the next page by order-field value
pub async fn more<S: EntityStore>(
    fetcher: &PageFetcher<S>,
    state: &mut PaginationState,
    extra: Option<&ListParameters>,
    options: OrderedFetchOptions,
) -> Result<Vec<Entity>> {
    if state.all_fetched {
        debug!(resource = %state.descriptor.resource, "Listing exhausted; returning empty page");
        return Ok(Vec::new());
    }

    let live = continued_parameters(state, extra)?;
    let base = state.base_filters()?;
    let pivot = state.pivot().ok_or_else(|| {
        Error::unsuitable("the listing has no order field and the store has no implicit unique key")
    })?;
    if state.last_batch.is_none() {
        return Err(Error::state_mismatch(
            "the last batch was not included in the exported state, so no watermark can be derived",
        ));
    }
    let unique = state.assumes_unique(&pivot, options.ordered_field_has_unique_values);
    let limit = live.effective_limit(state.page_size);

    if let Some(pending) = &state.pending_error {
        if !unique {
            if !options.fall_back_to_unordered {
                warn!(field = %pivot.field, "Refusing ordered fetch across an ambiguous boundary");
                return Err(pending.to_error());
            }
            info!(
                resource = %state.descriptor.resource,
                field = %pivot.field,
                "Ambiguous boundary; falling back to offset paging"
            );
            let cursor = match &state.cursor {
                PagerCursor::Offset(cursor) => cursor.clone(),
                PagerCursor::Ordered(cursor) => cursor.to_offset(true),
            };
            let entities = offset::fetch_page(fetcher, state, live, &base, cursor).await?;
            remember_uniqueness(state, options);
            return Ok(entities);
        }
        debug!(field = %pivot.field, "Order field asserted unique; ignoring ambiguous boundary");
    }

    let mut cursor = match &state.cursor {
        PagerCursor::Ordered(cursor) => cursor.clone(),
        PagerCursor::Offset(_) => {
            info!(
                resource = %state.descriptor.resource,
                pivot = %pivot.field,
                "Switching to ordered paging"
            );
            OrderedCursor::derive(&pivot, state.last_batch.as_deref().unwrap_or_default())?
        }
    };
    if unique {
        cursor.run = RunBoundary::Closed;
    }
    let resource = state.descriptor.resource.clone();

    if let RunBoundary::Open { tied_ids } = &cursor.run {
        let filter = cursor.remainder_filter(tied_ids);
        let remainder =
            fetch_remainder(fetcher, &resource, &live, &base, &cursor, &filter, limit).await?;
        cursor.run = RunBoundary::Closed;
        if !remainder.is_empty() {
            debug!(
                count = remainder.len(),
                field = %cursor.pivot,
                "Delivering the rest of the tied run"
            );
            cursor.query_filter = filter;
            cursor.query_offset = remainder.len() as i64;
            commit(state, live, cursor, &remainder, options, None);
            return Ok(remainder);
        }
    }

    let filter = vec![cursor.beyond()];
    let parameters = ordered_parameters(&live, &base, &cursor, &filter);
    let page = fetcher.fetch(&resource, &parameters).await?;
    let entities = page.entities;
    let received = entities.len() as i64;
    let exhausted = limit <= 0 || received < limit;

    cursor.query_filter = filter;
    cursor.query_offset = received;
    if let Some((watermark, tied_ids)) = trailing_run(&entities, &pivot.field) {
        cursor.watermark = watermark;
        cursor.run = if unique || exhausted {
            RunBoundary::Closed
        } else {
            RunBoundary::Open { tied_ids }
        };
    }

    let pending = is_ambiguous(&entities, limit, &pivot.field, unique).then(|| {
        warn!(
            field = %pivot.field,
            "Every entity on a full page has the same order value; next ordered call will be refused"
        );
        PendingError::AmbiguousBoundary {
            field: pivot.field.clone(),
        }
    });

    commit(state, live, cursor, &entities, options, pending);
    if exhausted {
        state.all_fetched = true;
        info!(
            resource = %state.descriptor.resource,
            distinct = state.tracker.distinct_count(),
            "Listing exhausted"
        );
    }
    Ok(entities)
}

/// Every not-yet-delivered entity tied on the watermark, page by page
async fn fetch_remainder<S: EntityStore>(
    fetcher: &PageFetcher<S>,
    resource: &str,
    live: &ListParameters,
    base: &[String],
    cursor: &OrderedCursor,
    filter: &[String],
    limit: i64,
) -> Result<Vec<Entity>> {
    let mut parameters = ordered_parameters(live, base, cursor, filter);
    let mut collected: Vec<Entity> = Vec::new();
    let mut start = 0;

    loop {
        parameters.start = Some(start);
        let page = fetcher.fetch(resource, &parameters).await?;
        let received = page.len() as i64;
        let before = collected.len();
        for entity in page.entities {
            if !collected.iter().any(|e| e.id == entity.id) {
                collected.push(entity);
            }
        }
        if limit <= 0 || received < limit || collected.len() == before {
            break;
        }
        start += limit;
    }

    Ok(collected)
}

fn ordered_parameters(
    live: &ListParameters,
    base: &[String],
    cursor: &OrderedCursor,
    filter: &[String],
) -> ListParameters {
    let mut parameters = live.clone();
    parameters.start = Some(0);
    parameters.fields = Some(base.iter().chain(filter).cloned().collect());
    parameters.orderby = Some(cursor.pivot.clone());
    parameters.order = Some(cursor.order);
    parameters.total = None;
    parameters
}

fn commit(
    state: &mut PaginationState,
    live: ListParameters,
    cursor: OrderedCursor,
    entities: &[Entity],
    options: OrderedFetchOptions,
    pending: Option<PendingError>,
) {
    let fresh = state.tracker.record(entities);
    debug!(received = entities.len(), fresh, "Absorbed ordered page");

    state.live = live;
    state.cursor = PagerCursor::Ordered(cursor);
    state.last_batch = Some(entities.to_vec());
    state.pending_error = pending;
    remember_uniqueness(state, options);
}

fn remember_uniqueness(state: &mut PaginationState, options: OrderedFetchOptions) {
    if let Some(unique) = options.ordered_field_has_unique_values {
        state.unique_guess = Some(unique);
    }
}
