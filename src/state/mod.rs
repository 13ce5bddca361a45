//! State management module
//!
//! Holds the pagination state of a walk, its exported form and named
//! checkpoints.
//!
//! # Overview
//!
//! - `PaginationState` - progress of a walk, owned by the caller
//! - `PagerCursor` - offset or ordered position
//! - `StateBlob` - versioned export of a state
//! - `StateManager` - file-based checkpoint persistence

mod blob;
mod manager;
mod types;

pub use blob::{StateBlob, STATE_VERSION};
pub use manager::{Checkpoints, StateManager};
pub use types::{
    OffsetCursor, OrderedCursor, PagerCursor, PagerMode, PaginationState, PendingError,
    RunBoundary,
};
