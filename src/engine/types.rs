//! Engine types
//!
//! Call statistics kept by [`EntityPager`](super::EntityPager).

use serde::Serialize;

/// Per-pager call statistics
///
/// Not part of the exported state. `entities_returned` sums page sizes, so
/// it counts an entity again each time boundary reconciliation re-delivers
/// it; use the distinct count for progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PagerStats {
    /// Successful listing and continuation calls
    pub calls: usize,
    /// Sum of returned page sizes
    pub entities_returned: usize,
    /// Calls that returned an empty page
    pub empty_pages: usize,
    /// Calls that failed
    pub errors: usize,
}

impl PagerStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a returned page
    pub fn add_page(&mut self, len: usize) {
        self.calls += 1;
        self.entities_returned += len;
        if len == 0 {
            self.empty_pages += 1;
        }
    }

    /// Record a failed call
    pub fn add_error(&mut self) {
        self.errors += 1;
    }
}
