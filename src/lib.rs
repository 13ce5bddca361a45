// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Entity Pager
//!
//! Batched, resumable fetching of entities from a REST collection API that
//! only offers `start`/`limit` offsets and an `orderby` field.
//!
//! ## Features
//!
//! - **Offset Paging**: Advance `start` by the page size
//! - **Ordered Paging**: Continue from the last value of the order field so
//!   inserts and deletes between calls neither skip nor repeat entities
//! - **Boundary Reconciliation**: Runs of equal order values spanning a
//!   page boundary are finished before moving past them
//! - **Resumable State**: Export a walk as a versioned blob, optionally
//!   without entities or filter values, and import it elsewhere
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use entity_pager::{EntityPager, ListParameters, OrderedFetchOptions, RestEntityStore, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = entity_pager::load_config("client.yaml")?;
//!     let mut pager = EntityPager::new(RestEntityStore::from_config(&config)?);
//!
//!     let parameters = ListParameters::new().limit(100).orderby("created");
//!     let mut page = pager.start_listing("database/12/profiles", parameters).await?;
//!     while !pager.is_exhausted() {
//!         page = pager.fetch_next_ordered(None, OrderedFetchOptions::new()).await?;
//!     }
//!
//!     let blob = pager.export_state(false, true)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        EntityPager                          │
//! │  start_listing()  fetch_next()  fetch_next_ordered()        │
//! │  export_state()   import_state()                            │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//! ┌──────────────┬──────────────┴──────────────┬────────────────┐
//! │    Pager     │            State            │     Store      │
//! ├──────────────┼─────────────────────────────┼────────────────┤
//! │ Offset       │ Cursor                      │ REST (reqwest) │
//! │ Ordered      │ Blob export/import          │ In-memory      │
//! │ Tracker      │ Checkpoint file             │                │
//! └──────────────┴─────────────────────────────┴────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and value ordering
pub mod types;

/// Listing parameters and query descriptors
pub mod query;

/// Entity Store contract and backends
pub mod store;

/// HTTP transport with retry and rate limiting
pub mod http;

/// Offset and ordered pagers
pub mod pager;

/// Pagination state, blobs and checkpoints
pub mod state;

/// Pager facade
pub mod engine;

/// Client configuration
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use config::{load_config, load_config_from_str, ClientConfig};
pub use engine::{EntityPager, OrderedFetchOptions, PagerStats};
pub use query::{ListParameters, QueryDescriptor, SortOrder};
pub use state::{PaginationState, StateBlob, StateManager};
pub use store::{Entity, EntityId, EntityStore, InMemoryEntityStore, RestEntityStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
