//! Pagination state types
//!
//! A [`PaginationState`] is a caller-owned value object: created by the first
//! listing call, mutated by each continuation, and exportable at any point.
//! Which bookkeeping is valid depends on the pager that ran last, so the
//! position itself is the tagged union [`PagerCursor`].

use crate::error::{Error, Result};
use crate::pager::{FetchTracker, Pivot};
use crate::query::{ListParameters, QueryDescriptor, SortOrder};
use crate::store::{Entity, EntityId, ID_FIELD};
use crate::types::{value_literal, JsonValue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which pager produced the current position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PagerMode {
    Offset,
    Ordered,
}

impl fmt::Display for PagerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offset => f.write_str("offset"),
            Self::Ordered => f.write_str("ordered"),
        }
    }
}

/// Position of a walk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PagerCursor {
    Offset(OffsetCursor),
    Ordered(OrderedCursor),
}

impl PagerCursor {
    /// The pager this cursor belongs to
    pub fn mode(&self) -> PagerMode {
        match self {
            Self::Offset(_) => PagerMode::Offset,
            Self::Ordered(_) => PagerMode::Ordered,
        }
    }
}

/// Offset pager position: `start` of the next request, plus any boundary
/// predicates inherited from an ordered walk that fell back to offsets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OffsetCursor {
    pub start: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub boundary: Vec<String>,
}

impl OffsetCursor {
    /// Cursor at a plain offset
    pub fn at(start: i64) -> Self {
        Self {
            start,
            boundary: Vec::new(),
        }
    }
}

/// Whether every entity sharing the watermark value has been delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case", deny_unknown_fields)]
pub enum RunBoundary {
    /// Everything up to and including the watermark value was delivered
    Closed,
    /// Only these entities with the watermark value were delivered so far
    Open { tied_ids: Vec<EntityId> },
}

/// Ordered pager position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderedCursor {
    /// Order field the watermark refers to
    pub pivot: String,
    pub order: SortOrder,
    /// Last order-field value delivered
    pub watermark: JsonValue,
    pub run: RunBoundary,
    /// Boundary predicates of the most recent request
    #[serde(default)]
    pub query_filter: Vec<String>,
    /// Entities delivered by the most recent request
    #[serde(default)]
    pub query_offset: i64,
}

impl OrderedCursor {
    /// Take a watermark from the last entity of a batch, treating its trailing
    /// run of equal values as not yet complete
    pub fn derive(pivot: &Pivot, batch: &[Entity]) -> Result<Self> {
        let (watermark, tied_ids) = crate::pager::trailing_run(batch, &pivot.field)
            .ok_or_else(|| {
                Error::unsuitable("the previous batch holds no entity to take a watermark from")
            })?;
        Ok(Self {
            pivot: pivot.field.clone(),
            order: pivot.order,
            watermark,
            run: RunBoundary::Open { tied_ids },
            query_filter: Vec::new(),
            query_offset: batch.len() as i64,
        })
    }

    /// `pivot > watermark` (or `<` when descending)
    pub fn beyond(&self) -> String {
        let op = if self.order.is_descending() { "<" } else { ">" };
        self.predicate(op)
    }

    /// `pivot >= watermark` (or `<=` when descending)
    pub fn at_or_beyond(&self) -> String {
        let op = if self.order.is_descending() { "<=" } else { ">=" };
        self.predicate(op)
    }

    /// Entities tied on the watermark that were not delivered yet
    pub fn remainder_filter(&self, tied_ids: &[EntityId]) -> Vec<String> {
        let mut filter = vec![self.predicate("==")];
        filter.extend(tied_ids.iter().map(|id| format!("{ID_FIELD}!={id}")));
        filter
    }

    /// Equivalent offset position, used when switching to the offset pager.
    ///
    /// With an unresolved ambiguous boundary the most recent request is
    /// continued by offset; otherwise the walk restarts at the watermark.
    pub fn to_offset(&self, ambiguous: bool) -> OffsetCursor {
        if ambiguous {
            return OffsetCursor {
                start: self.query_offset,
                boundary: self.query_filter.clone(),
            };
        }
        match &self.run {
            RunBoundary::Closed => OffsetCursor {
                start: 0,
                boundary: vec![self.beyond()],
            },
            RunBoundary::Open { tied_ids } => OffsetCursor {
                start: tied_ids.len() as i64,
                boundary: vec![self.at_or_beyond()],
            },
        }
    }

    fn predicate(&self, op: &str) -> String {
        format!("{}{}{}", self.pivot, op, value_literal(&self.watermark))
    }
}

/// An error detected while absorbing a batch, raised on the next ordered call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum PendingError {
    AmbiguousBoundary { field: String },
}

impl PendingError {
    /// The error to raise
    pub fn to_error(&self) -> Error {
        match self {
            Self::AmbiguousBoundary { field } => Error::AmbiguousBoundary {
                field: field.clone(),
            },
        }
    }
}

/// Serializable progress of a multi-page walk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaginationState {
    /// The listing as the caller started it
    pub descriptor: QueryDescriptor,

    /// Parameters in effect, including continuation overrides
    pub live: ListParameters,

    /// Page size used when `live.limit` is unset
    pub page_size: i64,

    /// The store's implicit unique order key at the time of listing
    #[serde(default)]
    pub implicit_order_key: Option<String>,

    pub cursor: PagerCursor,

    /// Entities of the most recent page; `None` when redacted on export
    #[serde(default)]
    pub last_batch: Option<Vec<Entity>>,

    /// Last explicit uniqueness assertion for the order field
    #[serde(default)]
    pub unique_guess: Option<bool>,

    #[serde(default)]
    pub pending_error: Option<PendingError>,

    #[serde(default)]
    pub tracker: FetchTracker,

    #[serde(default)]
    pub all_fetched: bool,

    /// Caller filter expressions were left out on export
    #[serde(default)]
    pub filters_redacted: bool,
}

impl PaginationState {
    /// Fresh state for a listing whose first page has not been absorbed yet
    pub fn new(
        descriptor: QueryDescriptor,
        implicit_order_key: Option<String>,
        page_size: i64,
    ) -> Self {
        let start = descriptor.parameters.start.unwrap_or(0);
        Self {
            live: descriptor.parameters.clone(),
            descriptor,
            page_size,
            implicit_order_key,
            cursor: PagerCursor::Offset(OffsetCursor::at(start)),
            last_batch: Some(Vec::new()),
            unique_guess: None,
            pending_error: None,
            tracker: FetchTracker::default(),
            all_fetched: false,
            filters_redacted: false,
        }
    }

    /// Pager that ran last
    pub fn mode(&self) -> PagerMode {
        self.cursor.mode()
    }

    /// Effective page size
    pub fn limit(&self) -> i64 {
        self.live.effective_limit(self.page_size)
    }

    /// Conservative exhaustion flag
    pub fn is_exhausted(&self) -> bool {
        self.all_fetched
    }

    /// Distinct entities delivered so far
    pub fn distinct_fetched_count(&self) -> u64 {
        self.tracker.distinct_count()
    }

    /// Caller filter expressions, unless they were redacted
    pub fn base_filters(&self) -> Result<Vec<String>> {
        if self.filters_redacted {
            return Err(Error::state_mismatch(
                "filter values were not included in the exported state; restore them before continuing",
            ));
        }
        Ok(self.live.filters().to_vec())
    }

    /// Order field ordered fetching pivots on, if one can be derived
    pub fn pivot(&self) -> Option<Pivot> {
        let order = self.live.sort_order();
        match (&self.live.orderby, &self.implicit_order_key) {
            (Some(field), key) => Some(Pivot {
                field: field.clone(),
                order,
                implicit_unique: key
                    .as_deref()
                    .is_some_and(|key| key.eq_ignore_ascii_case(field)),
            }),
            (None, Some(key)) => Some(Pivot {
                field: key.clone(),
                order,
                implicit_unique: true,
            }),
            (None, None) => None,
        }
    }

    /// Whether the order field is treated as holding unique values
    pub fn assumes_unique(&self, pivot: &Pivot, asserted: Option<bool>) -> bool {
        asserted
            .or(self.unique_guess)
            .unwrap_or(pivot.implicit_unique)
    }

    /// Check the structural invariants of a state
    pub fn validate(&self) -> Result<()> {
        if self.descriptor.resource.trim().is_empty() {
            return Err(Error::invalid_blob("resource path is empty"));
        }
        if self.filters_redacted
            && (self.descriptor.parameters.fields.is_some() || self.live.fields.is_some())
        {
            return Err(Error::invalid_blob(
                "state is marked as filter-redacted but carries filter expressions",
            ));
        }
        if self.live.orderby != self.descriptor.parameters.orderby {
            return Err(Error::invalid_blob(
                "live order field differs from the listing's order field",
            ));
        }
        if self.all_fetched && self.pending_error.is_some() {
            return Err(Error::invalid_blob(
                "an exhausted walk cannot carry a pending error",
            ));
        }
        if let PagerCursor::Ordered(cursor) = &self.cursor {
            let pivot = self.pivot().ok_or_else(|| {
                Error::invalid_blob("ordered cursor on a query without an order field")
            })?;
            if !pivot.field.eq_ignore_ascii_case(&cursor.pivot) {
                return Err(Error::invalid_blob(format!(
                    "ordered cursor pivots on '{}' but the query orders by '{}'",
                    cursor.pivot, pivot.field
                )));
            }
            if matches!(&cursor.run, RunBoundary::Open { tied_ids } if tied_ids.is_empty()) {
                return Err(Error::invalid_blob("open boundary run without entities"));
            }
        }
        Ok(())
    }

    /// Replace caller filter expressions after importing a redacted state
    pub fn restore_filters(&mut self, fields: Vec<String>) -> Result<()> {
        if !self.filters_redacted {
            return Err(Error::state_mismatch(
                "filter values are present; only a redacted state can have them restored",
            ));
        }
        let fields = (!fields.is_empty()).then_some(fields);
        self.descriptor.parameters.fields.clone_from(&fields);
        self.live.fields = fields;
        self.filters_redacted = false;
        Ok(())
    }
}
