//! Entity Store module
//!
//! The collaborator the pager reads from. The pager only ever calls
//! [`EntityStore::list`]; which backend answers is up to the caller.
//!
//! # Overview
//!
//! - `Entity` / `EntityId` - records as returned by a listing call
//! - `EntityStore` - the listing contract
//! - `RestEntityStore` - the remote API over HTTP
//! - `InMemoryEntityStore` - a fake backend with the same semantics

mod memory;
mod rest;
mod types;

pub use memory::{
    FilterExpression, FilterOp, InMemoryEntityStore, RecordedRequest, DEFAULT_PAGE_SIZE,
};
pub use rest::RestEntityStore;
pub use types::{Entity, EntityId, EntityStore, ListResponse, ID_FIELD};
