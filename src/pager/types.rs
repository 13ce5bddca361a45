//! Pager types
//!
//! Shared by the offset and ordered pagers.

use crate::store::{Entity, EntityId};
use crate::query::SortOrder;
use crate::types::{compare_values, JsonValue};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

// ============================================================================
// Page
// ============================================================================

/// A normalized listing result
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Entities in store order
    pub entities: Vec<Entity>,
    /// Page size the store applied
    pub applied_limit: i64,
    /// Total matching entities, when requested
    pub declared_total: Option<i64>,
}

impl Page {
    /// Number of entities on this page
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if the page is empty
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

// ============================================================================
// Fetch Tracker
// ============================================================================

/// Distinct-entity accounting across a walk
///
/// Boundary reconciliation can deliver an entity twice; the tracker counts
/// each ID once. After an export without entities only the count survives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchTracker {
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    seen: BTreeSet<EntityId>,
    /// Distinct entities counted before the IDs were dropped
    #[serde(default)]
    carried: u64,
}

impl FetchTracker {
    /// Record a batch, returning how many entities were not seen before
    pub fn record(&mut self, entities: &[Entity]) -> usize {
        entities
            .iter()
            .filter(|entity| self.seen.insert(entity.id.clone()))
            .count()
    }

    /// Check whether an ID was delivered earlier
    pub fn contains(&self, id: &EntityId) -> bool {
        self.seen.contains(id)
    }

    /// Number of distinct entities delivered
    pub fn distinct_count(&self) -> u64 {
        self.carried + self.seen.len() as u64
    }

    /// Same count, without the ID set
    #[must_use]
    pub fn without_ids(&self) -> Self {
        Self {
            seen: BTreeSet::new(),
            carried: self.distinct_count(),
        }
    }
}

// ============================================================================
// Pivot
// ============================================================================

/// The field ordered fetching walks along
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pivot {
    pub field: String,
    pub order: SortOrder,
    /// The field is the store's implicit unique key
    pub implicit_unique: bool,
}

/// Value of `field` on the last entity, and the IDs of the trailing run of
/// entities sharing it. `None` for an empty batch.
pub fn trailing_run(batch: &[Entity], field: &str) -> Option<(JsonValue, Vec<EntityId>)> {
    let last = batch.last()?;
    let value = field_value(last, field);
    let mut ids: Vec<EntityId> = batch
        .iter()
        .rev()
        .take_while(|entity| same_value(&field_value(entity, field), &value))
        .map(|entity| entity.id.clone())
        .collect();
    ids.reverse();
    Some((value, ids))
}

/// Check whether every entity of a non-empty batch has the same value
pub fn all_tied(batch: &[Entity], field: &str) -> bool {
    let Some(first) = batch.first() else {
        return false;
    };
    let value = field_value(first, field);
    batch
        .iter()
        .all(|entity| same_value(&field_value(entity, field), &value))
}

/// Check whether a full page makes the next ordered boundary undecidable
pub fn is_ambiguous(batch: &[Entity], limit: i64, field: &str, unique: bool) -> bool {
    !unique && limit > 0 && batch.len() as i64 >= limit && all_tied(batch, field)
}

fn field_value(entity: &Entity, field: &str) -> JsonValue {
    entity.value(field).unwrap_or(JsonValue::Null)
}

fn same_value(a: &JsonValue, b: &JsonValue) -> bool {
    compare_values(a, b) == Ordering::Equal
}

// ============================================================================
// Ordered Fetch Options
// ============================================================================

/// Options of an ordered continuation call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderedFetchOptions {
    /// Whether the order field holds unique values. Unset: use the last
    /// assertion, or whether the field is the store's implicit unique key.
    pub ordered_field_has_unique_values: Option<bool>,

    /// Switch to offset paging instead of failing on an ambiguous boundary
    pub fall_back_to_unordered: bool,
}

impl OrderedFetchOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Assert whether the order field holds unique values
    #[must_use]
    pub fn unique(mut self, unique: bool) -> Self {
        self.ordered_field_has_unique_values = Some(unique);
        self
    }

    /// Allow falling back to offset paging
    #[must_use]
    pub fn fall_back_to_unordered(mut self, fall_back: bool) -> Self {
        self.fall_back_to_unordered = fall_back;
        self
    }
}
