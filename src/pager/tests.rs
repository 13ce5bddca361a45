//! Tests for pager module

use super::*;
use crate::error::Error;
use crate::query::{ListParameters, QueryDescriptor, SortOrder};
use crate::state::{PagerCursor, PagerMode, RunBoundary};
use crate::store::{Entity, EntityId, EntityStore, InMemoryEntityStore, ListResponse};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use test_case::test_case;

const RESOURCE: &str = "profiles";

fn scored(id: &str, score: i64) -> Entity {
    Entity::new(id).with("score", score)
}

fn ids(entities: &[Entity]) -> Vec<String> {
    entities.iter().map(|e| e.id.to_string()).collect()
}

fn descriptor(parameters: ListParameters) -> QueryDescriptor {
    QueryDescriptor::new(RESOURCE, parameters).unwrap()
}

/// Store that fails every call while `failing` is set
struct FlakyStore {
    inner: InMemoryEntityStore,
    failing: AtomicBool,
}

#[async_trait]
impl EntityStore for FlakyStore {
    async fn list(
        &self,
        resource: &str,
        parameters: &ListParameters,
    ) -> crate::error::Result<ListResponse> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::http_status(503, "unavailable"));
        }
        self.inner.list(resource, parameters).await
    }
}

// ============================================================================
// Boundary Helper Tests
// ============================================================================

#[test]
fn test_trailing_run() {
    let batch = vec![scored("a", 1), scored("b", 5), scored("c", 5)];
    let (value, tied) = trailing_run(&batch, "score").unwrap();
    assert_eq!(value, json!(5));
    assert_eq!(tied, vec![EntityId::from("b"), EntityId::from("c")]);

    assert!(trailing_run(&[], "score").is_none());
}

#[test]
fn test_trailing_run_treats_missing_field_as_null() {
    let batch = vec![Entity::new("a"), Entity::new("b")];
    let (value, tied) = trailing_run(&batch, "score").unwrap();
    assert!(value.is_null());
    assert_eq!(tied.len(), 2);
}

#[test_case(&[1, 1, 1], 3, false, true ; "full and tied")]
#[test_case(&[1, 1, 1], 3, true, false ; "unique field")]
#[test_case(&[1, 1], 3, false, false ; "short page")]
#[test_case(&[1, 2, 2], 3, false, false ; "mixed values")]
#[test_case(&[], 3, false, false ; "empty page")]
#[test_case(&[7], 1, false, true ; "single entity pages")]
fn test_is_ambiguous(scores: &[i64], limit: i64, unique: bool, expected: bool) {
    let batch: Vec<Entity> = scores
        .iter()
        .enumerate()
        .map(|(i, score)| scored(&i.to_string(), *score))
        .collect();
    assert_eq!(is_ambiguous(&batch, limit, "score", unique), expected);
}

#[test]
fn test_all_tied_numeric_equivalence() {
    let batch = vec![
        Entity::new("a").with("score", 5),
        Entity::new("b").with("score", "5"),
    ];
    assert!(all_tied(&batch, "score"));
    assert!(!all_tied(&[], "score"));
}

// ============================================================================
// Fetch Tracker Tests
// ============================================================================

#[test]
fn test_tracker_counts_distinct_ids() {
    let mut tracker = FetchTracker::default();
    assert_eq!(tracker.record(&[scored("a", 1), scored("b", 1)]), 2);
    assert_eq!(tracker.record(&[scored("b", 1), scored("c", 1)]), 1);
    assert_eq!(tracker.distinct_count(), 3);
    assert!(tracker.contains(&EntityId::from("b")));

    let reduced = tracker.without_ids();
    assert_eq!(reduced.distinct_count(), 3);
    assert!(!reduced.contains(&EntityId::from("b")));
}

#[test]
fn test_ordered_fetch_options_builder() {
    let options = OrderedFetchOptions::new()
        .unique(true)
        .fall_back_to_unordered(true);
    assert_eq!(options.ordered_field_has_unique_values, Some(true));
    assert!(options.fall_back_to_unordered);
    assert_eq!(OrderedFetchOptions::default().ordered_field_has_unique_values, None);
}

// ============================================================================
// Page Fetcher Tests
// ============================================================================

#[tokio::test]
async fn test_fetcher_normalizes_response() {
    let store = InMemoryEntityStore::with_entities(RESOURCE, vec![scored("1", 1)]);
    let fetcher = PageFetcher::new(store);

    let page = fetcher
        .fetch(RESOURCE, &ListParameters::new().limit(5).total(true))
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page.applied_limit, 5);
    assert_eq!(page.declared_total, Some(1));
    assert_eq!(fetcher.implicit_order_key().as_deref(), Some("ID"));
}

// ============================================================================
// Offset Pager Tests
// ============================================================================

#[tokio::test]
async fn test_offset_start_uses_store_default_limit() {
    let entities = (1..=5).map(|i| scored(&i.to_string(), i)).collect();
    let store = InMemoryEntityStore::with_entities(RESOURCE, entities).with_default_limit(2);
    let fetcher = PageFetcher::new(store);

    let (mut state, first) = offset::start(&fetcher, descriptor(ListParameters::new()))
        .await
        .unwrap();
    assert_eq!(ids(&first), ["1", "2"]);
    assert_eq!(state.page_size, 2);
    assert_eq!(state.limit(), 2);
    assert_eq!(state.cursor, PagerCursor::Offset(crate::state::OffsetCursor::at(2)));

    let second = offset::more(&fetcher, &mut state, None).await.unwrap();
    assert_eq!(ids(&second), ["3", "4"]);
    let third = offset::more(&fetcher, &mut state, None).await.unwrap();
    assert_eq!(ids(&third), ["5"]);
    assert!(state.is_exhausted());
}

#[tokio::test]
async fn test_offset_continuation_changes_limit() {
    let entities = (1..=6).map(|i| scored(&i.to_string(), i)).collect();
    let fetcher = PageFetcher::new(InMemoryEntityStore::with_entities(RESOURCE, entities));

    let (mut state, _) = offset::start(&fetcher, descriptor(ListParameters::new().limit(2)))
        .await
        .unwrap();
    let page = offset::more(&fetcher, &mut state, Some(&ListParameters::new().limit(3)))
        .await
        .unwrap();
    assert_eq!(ids(&page), ["3", "4", "5"]);
    assert_eq!(state.live.limit, Some(3));

    let rest = offset::more(&fetcher, &mut state, None).await.unwrap();
    assert_eq!(ids(&rest), ["6"]);
}

#[tokio::test]
async fn test_offset_rejects_structural_changes() {
    let fetcher = PageFetcher::new(InMemoryEntityStore::with_entities(
        RESOURCE,
        vec![scored("1", 1), scored("2", 2)],
    ));
    let (mut state, _) = offset::start(&fetcher, descriptor(ListParameters::new().limit(1)))
        .await
        .unwrap();
    let before = state.clone();

    for extra in [
        ListParameters::new().start(5),
        ListParameters::new().field("score>1"),
        ListParameters::new().orderby("score"),
        ListParameters::new().order(SortOrder::Desc),
    ] {
        let err = offset::more(&fetcher, &mut state, Some(&extra)).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid parameters passed.");
    }
    assert_eq!(state, before);
}

#[tokio::test]
async fn test_store_errors_pass_through_and_leave_state_untouched() {
    let store = FlakyStore {
        inner: InMemoryEntityStore::with_entities(
            RESOURCE,
            (1..=4).map(|i| scored(&i.to_string(), i)).collect(),
        ),
        failing: AtomicBool::new(false),
    };
    let fetcher = PageFetcher::new(store);
    let (mut state, _) = offset::start(&fetcher, descriptor(ListParameters::new().limit(2)))
        .await
        .unwrap();
    let before = state.clone();

    fetcher.store().failing.store(true, Ordering::SeqCst);
    let err = offset::more(&fetcher, &mut state, Some(&ListParameters::new().limit(3)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::HttpStatus { status: 503, .. }));
    let err = ordered::more(&fetcher, &mut state, None, OrderedFetchOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::HttpStatus { status: 503, .. }));
    assert_eq!(state, before);

    fetcher.store().failing.store(false, Ordering::SeqCst);
    let page = offset::more(&fetcher, &mut state, None).await.unwrap();
    assert_eq!(ids(&page), ["3", "4"]);
}

// ============================================================================
// Ordered Pager Tests
// ============================================================================

#[tokio::test]
async fn test_ordered_requests_carry_boundary_predicates() {
    let store = InMemoryEntityStore::with_entities(
        RESOURCE,
        vec![
            scored("a", 1),
            scored("b", 2),
            scored("c", 2),
            scored("d", 3),
            scored("e", 4),
        ],
    );
    let fetcher = PageFetcher::new(store.clone());
    let (mut state, first) = offset::start(
        &fetcher,
        descriptor(ListParameters::new().limit(2).orderby("score").total(true)),
    )
    .await
    .unwrap();
    assert_eq!(ids(&first), ["a", "b"]);

    let remainder = ordered::more(&fetcher, &mut state, None, OrderedFetchOptions::new())
        .await
        .unwrap();
    assert_eq!(ids(&remainder), ["c"]);
    let request = store.last_request().await.unwrap();
    assert_eq!(request.parameters.filters(), ["score==2", "ID!=b"]);
    assert_eq!(request.parameters.start, Some(0));
    assert_eq!(request.parameters.total, None);
    assert_eq!(state.mode(), PagerMode::Ordered);

    let next = ordered::more(&fetcher, &mut state, None, OrderedFetchOptions::new())
        .await
        .unwrap();
    assert_eq!(ids(&next), ["d", "e"]);
    let request = store.last_request().await.unwrap();
    assert_eq!(request.parameters.filters(), ["score>2"]);
    assert_eq!(request.parameters.orderby.as_deref(), Some("score"));

    let last = ordered::more(&fetcher, &mut state, None, OrderedFetchOptions::new())
        .await
        .unwrap();
    assert!(last.is_empty());
    assert!(state.is_exhausted());
    assert_eq!(state.distinct_fetched_count(), 5);
}

#[tokio::test]
async fn test_ordered_keeps_caller_filters() {
    let store = InMemoryEntityStore::with_entities(
        RESOURCE,
        vec![
            scored("a", 1).with("team", "red"),
            scored("b", 2).with("team", "blue"),
            scored("c", 3).with("team", "red"),
            scored("d", 4).with("team", "red"),
        ],
    );
    let fetcher = PageFetcher::new(store.clone());
    let (mut state, first) = offset::start(
        &fetcher,
        descriptor(ListParameters::new().limit(1).field("team==red")),
    )
    .await
    .unwrap();
    assert_eq!(ids(&first), ["a"]);

    let next = ordered::more(&fetcher, &mut state, None, OrderedFetchOptions::new())
        .await
        .unwrap();
    assert_eq!(ids(&next), ["c"]);
    let request = store.last_request().await.unwrap();
    assert_eq!(request.parameters.filters(), ["team==red", "ID>a"]);
    assert_eq!(request.parameters.orderby.as_deref(), Some("ID"));
}

#[tokio::test]
async fn test_ordered_descending() {
    let store = InMemoryEntityStore::with_entities(
        RESOURCE,
        (1..=5).map(|i| scored(&format!("e{i}"), i)).collect(),
    );
    let fetcher = PageFetcher::new(store);
    let (mut state, first) = offset::start(
        &fetcher,
        descriptor(
            ListParameters::new()
                .limit(2)
                .orderby("score")
                .order(SortOrder::Desc),
        ),
    )
    .await
    .unwrap();
    assert_eq!(ids(&first), ["e5", "e4"]);

    let options = OrderedFetchOptions::new().unique(true);
    let second = ordered::more(&fetcher, &mut state, None, options).await.unwrap();
    assert_eq!(ids(&second), ["e3", "e2"]);
    let third = ordered::more(&fetcher, &mut state, None, options).await.unwrap();
    assert_eq!(ids(&third), ["e1"]);
    assert!(state.is_exhausted());
}

#[tokio::test]
async fn test_ordered_without_pivot_is_unsuitable() {
    let store = InMemoryEntityStore::with_entities(RESOURCE, vec![scored("a", 1), scored("b", 2)])
        .with_implicit_order_key(None);
    let fetcher = PageFetcher::new(store);
    let (mut state, _) = offset::start(&fetcher, descriptor(ListParameters::new().limit(1)))
        .await
        .unwrap();

    let err = ordered::more(&fetcher, &mut state, None, OrderedFetchOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnsuitableForOrderedFetch { .. }));

    // Offset paging still works
    let page = offset::more(&fetcher, &mut state, None).await.unwrap();
    assert_eq!(page.len(), 1);
}

#[tokio::test]
async fn test_ordered_fetches_long_tied_run_across_pages() {
    let store = InMemoryEntityStore::with_entities(
        RESOURCE,
        vec![
            scored("a", 1),
            scored("b", 2),
            scored("c", 2),
            scored("d", 2),
            scored("e", 2),
            scored("f", 3),
        ],
    );
    let fetcher = PageFetcher::new(store.clone());
    let (mut state, first) = offset::start(
        &fetcher,
        descriptor(ListParameters::new().limit(2).orderby("score")),
    )
    .await
    .unwrap();
    assert_eq!(ids(&first), ["a", "b"]);

    // Rest of the run of 2s: c, d, e
    let run = ordered::more(&fetcher, &mut state, None, OrderedFetchOptions::new())
        .await
        .unwrap();
    assert_eq!(ids(&run), ["c", "d", "e"]);

    // Next page beyond 2
    let next = ordered::more(&fetcher, &mut state, None, OrderedFetchOptions::new())
        .await
        .unwrap();
    assert_eq!(ids(&next), ["f"]);
    assert!(state.is_exhausted());

    let PagerCursor::Ordered(cursor) = &state.cursor else {
        panic!("Expected ordered cursor");
    };
    assert_eq!(cursor.watermark, json!(3));
    assert_eq!(cursor.run, RunBoundary::Closed);
}

#[tokio::test]
async fn test_ordered_all_tied_page_defers_error_then_falls_back() {
    let store = InMemoryEntityStore::with_entities(
        RESOURCE,
        vec![
            scored("a", 1),
            scored("b", 1),
            scored("c", 2),
            scored("d", 2),
            scored("e", 2),
        ],
    );
    let fetcher = PageFetcher::new(store.clone());
    let (mut state, first) = offset::start(
        &fetcher,
        descriptor(ListParameters::new().limit(2).orderby("score")),
    )
    .await
    .unwrap();
    // First page is itself all tied on 1
    assert_eq!(ids(&first), ["a", "b"]);
    assert!(state.pending_error.is_some());

    let strict = OrderedFetchOptions::new();
    for _ in 0..2 {
        let err = ordered::more(&fetcher, &mut state, None, strict)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AmbiguousBoundary { ref field } if field == "score"));
    }

    let lenient = OrderedFetchOptions::new().fall_back_to_unordered(true);
    let page = ordered::more(&fetcher, &mut state, None, lenient).await.unwrap();
    assert_eq!(ids(&page), ["c", "d"]);
    assert_eq!(state.mode(), PagerMode::Offset);
    let request = store.last_request().await.unwrap();
    assert_eq!(request.parameters.start, Some(2));

    // c and d are tied on 2 as well
    assert!(state.pending_error.is_some());
    let page = ordered::more(&fetcher, &mut state, None, lenient).await.unwrap();
    assert_eq!(ids(&page), ["e"]);
    assert!(state.is_exhausted());
    assert_eq!(state.distinct_fetched_count(), 5);
}

#[tokio::test]
async fn test_unique_assertion_clears_pending_error() {
    let store = InMemoryEntityStore::with_entities(
        RESOURCE,
        vec![scored("a", 1), scored("b", 1), scored("c", 2)],
    );
    let fetcher = PageFetcher::new(store);
    let (mut state, _) = offset::start(
        &fetcher,
        descriptor(ListParameters::new().limit(2).orderby("score")),
    )
    .await
    .unwrap();
    assert!(state.pending_error.is_some());

    let page = ordered::more(&fetcher, &mut state, None, OrderedFetchOptions::new().unique(true))
        .await
        .unwrap();
    assert_eq!(ids(&page), ["c"]);
    assert!(state.pending_error.is_none());
    assert_eq!(state.unique_guess, Some(true));
}

#[tokio::test]
async fn test_ordered_requires_last_batch() {
    let store = InMemoryEntityStore::with_entities(RESOURCE, vec![scored("a", 1), scored("b", 2)]);
    let fetcher = PageFetcher::new(store);
    let (mut state, _) = offset::start(&fetcher, descriptor(ListParameters::new().limit(1)))
        .await
        .unwrap();
    state.last_batch = None;

    let err = ordered::more(&fetcher, &mut state, None, OrderedFetchOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::StructuralStateMismatch { .. }));

    let page = offset::more(&fetcher, &mut state, None).await.unwrap();
    assert_eq!(ids(&page), ["b"]);
}
