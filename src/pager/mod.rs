//! Pager module
//!
//! Supports: Offset, Ordered (keyset) with boundary reconciliation
//!
//! # Overview
//!
//! Both pagers operate on a caller-owned [`PaginationState`] and a
//! [`PageFetcher`]. The offset pager advances `start`; the ordered pager
//! advances a watermark on the order field. A walk may switch between them
//! at any call.

mod fetcher;
pub mod offset;
pub mod ordered;
mod types;

pub use fetcher::PageFetcher;
pub use types::{
    all_tied, is_ambiguous, trailing_run, FetchTracker, OrderedFetchOptions, Page, Pivot,
};

use crate::error::Result;
use crate::query::ListParameters;
use crate::state::PaginationState;

/// Live parameters for a continuation call, with `extra` validated and merged
fn continued_parameters(
    state: &PaginationState,
    extra: Option<&ListParameters>,
) -> Result<ListParameters> {
    let mut live = state.live.clone();
    if let Some(extra) = extra {
        live.validate_continuation(extra)?;
        live.apply_continuation(extra);
    }
    Ok(live)
}

#[cfg(test)]
mod tests;
