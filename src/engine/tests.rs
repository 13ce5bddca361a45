//! Tests for engine module

use super::*;
use crate::state::PagerMode;
use crate::store::InMemoryEntityStore;
use pretty_assertions::assert_eq;

const RESOURCE: &str = "database/1/profiles";

fn store_with(count: u64) -> InMemoryEntityStore {
    let entities = (1..=count)
        .map(|i| Entity::new(i).with("rank", i))
        .collect();
    InMemoryEntityStore::with_entities(RESOURCE, entities)
}

fn ids(entities: &[Entity]) -> Vec<String> {
    entities.iter().map(|e| e.id.to_string()).collect()
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_defaults_before_listing() {
    let mut pager = EntityPager::new(store_with(3));
    assert!(!pager.is_exhausted());
    assert_eq!(pager.distinct_fetched_count(), 0);
    assert!(pager.state().is_none());

    assert!(matches!(pager.fetch_next(None).await, Err(Error::NotStarted)));
    assert!(matches!(
        pager
            .fetch_next_ordered(None, OrderedFetchOptions::new())
            .await,
        Err(Error::UnsuitableForOrderedFetch { .. })
    ));
    assert!(matches!(pager.export_state(true, true), Err(Error::NotStarted)));
    assert!(pager.restore_filters(Vec::new()).is_err());
}

#[tokio::test]
async fn test_start_listing_rejects_empty_resource() {
    let mut pager = EntityPager::new(store_with(1));
    assert!(pager.start_listing("  ", ListParameters::new()).await.is_err());
    assert!(pager.state().is_none());
}

#[tokio::test]
async fn test_failed_start_keeps_previous_walk() {
    let mut pager = EntityPager::new(store_with(3));
    pager
        .start_listing(RESOURCE, ListParameters::new().limit(2))
        .await
        .unwrap();

    let err = pager
        .start_listing("unknown", ListParameters::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::HttpStatus { status: 404, .. }));
    assert_eq!(pager.state().unwrap().descriptor.resource, RESOURCE);
    assert_eq!(pager.stats().errors, 1);
}

#[tokio::test]
async fn test_offset_walk_and_stats() {
    let mut pager = EntityPager::new(store_with(7));
    let first = pager
        .start_listing(RESOURCE, ListParameters::new().limit(3))
        .await
        .unwrap();
    let second = pager.fetch_next(None).await.unwrap();
    let third = pager.fetch_next(None).await.unwrap();

    assert_eq!(ids(&first), ["1", "2", "3"]);
    assert_eq!(ids(&second), ["4", "5", "6"]);
    assert_eq!(ids(&third), ["7"]);
    assert!(pager.is_exhausted());
    assert_eq!(pager.distinct_fetched_count(), 7);

    assert!(pager.fetch_next(None).await.unwrap().is_empty());
    let stats = pager.stats();
    assert_eq!(stats.calls, 4);
    assert_eq!(stats.entities_returned, 7);
    assert_eq!(stats.empty_pages, 1);
}

#[tokio::test]
async fn test_exhausted_walk_ignores_bad_parameters() {
    let mut pager = EntityPager::new(store_with(2));
    pager
        .start_listing(RESOURCE, ListParameters::new().limit(5))
        .await
        .unwrap();
    assert!(pager.is_exhausted());

    let page = pager
        .fetch_next(Some(ListParameters::new().start(0)))
        .await
        .unwrap();
    assert!(page.is_empty());
}

#[tokio::test]
async fn test_zero_limit_ends_walk() {
    let store = store_with(3);
    let mut pager = EntityPager::new(store.clone());
    let page = pager
        .start_listing(RESOURCE, ListParameters::new().limit(0))
        .await
        .unwrap();
    assert!(page.is_empty());
    assert!(pager.is_exhausted());

    assert!(pager.fetch_next(None).await.unwrap().is_empty());
    assert!(pager
        .fetch_next_ordered(None, OrderedFetchOptions::new())
        .await
        .unwrap()
        .is_empty());
    assert_eq!(store.requests().await.len(), 1);
}

#[tokio::test]
async fn test_zero_limit_continuation_ends_walk() {
    let store = store_with(6);
    let mut pager = EntityPager::new(store.clone());
    pager
        .start_listing(RESOURCE, ListParameters::new().limit(2))
        .await
        .unwrap();
    let page = pager
        .fetch_next(Some(ListParameters::new().limit(0)))
        .await
        .unwrap();
    assert!(page.is_empty());
    assert!(pager.is_exhausted());
    assert!(pager.fetch_next(None).await.unwrap().is_empty());
    assert_eq!(store.requests().await.len(), 2);

    let mut pager = EntityPager::new(store.clone());
    pager
        .start_listing(RESOURCE, ListParameters::new().limit(2).orderby("rank"))
        .await
        .unwrap();
    let page = pager
        .fetch_next_ordered(
            Some(ListParameters::new().limit(0)),
            OrderedFetchOptions::new(),
        )
        .await
        .unwrap();
    assert!(page.is_empty());
    assert!(pager.is_exhausted());

    let requests = store.requests().await.len();
    assert!(pager
        .fetch_next_ordered(None, OrderedFetchOptions::new())
        .await
        .unwrap()
        .is_empty());
    assert_eq!(store.requests().await.len(), requests);
}

#[tokio::test]
async fn test_reset_forgets_walk() {
    let mut pager = EntityPager::new(store_with(2));
    pager
        .start_listing(RESOURCE, ListParameters::new().limit(5))
        .await
        .unwrap();
    pager.reset();
    assert!(pager.state().is_none());
    assert!(!pager.is_exhausted());
    assert_eq!(pager.stats(), &PagerStats::default());
}

#[tokio::test]
async fn test_switching_modes_mid_walk() {
    let mut pager = EntityPager::new(store_with(9));
    pager
        .start_listing(RESOURCE, ListParameters::new().limit(3).orderby("rank"))
        .await
        .unwrap();

    let ordered = pager
        .fetch_next_ordered(None, OrderedFetchOptions::new())
        .await
        .unwrap();
    assert_eq!(ids(&ordered), ["4", "5", "6"]);
    assert_eq!(pager.state().unwrap().mode(), PagerMode::Ordered);

    let by_offset = pager.fetch_next(None).await.unwrap();
    assert_eq!(ids(&by_offset), ["7", "8", "9"]);
    assert_eq!(pager.state().unwrap().mode(), PagerMode::Offset);
    assert_eq!(pager.distinct_fetched_count(), 9);
}

// ============================================================================
// Export / Import Tests
// ============================================================================

#[tokio::test]
async fn test_export_import_across_pagers() {
    let store = store_with(5);
    let mut pager = EntityPager::new(store.clone());
    pager
        .start_listing(RESOURCE, ListParameters::new().limit(2))
        .await
        .unwrap();
    let blob = pager.export_state(true, true).unwrap();

    let mut resumed = EntityPager::new(store);
    resumed.import_state(&blob).unwrap();
    assert_eq!(resumed.distinct_fetched_count(), 2);

    let page = resumed
        .fetch_next_ordered(None, OrderedFetchOptions::new())
        .await
        .unwrap();
    assert_eq!(ids(&page), ["3", "4"]);
}

#[tokio::test]
async fn test_redacted_export_round_trip() {
    let store = store_with(6);
    let mut pager = EntityPager::new(store.clone());
    pager
        .start_listing(RESOURCE, ListParameters::new().limit(2).field("rank>1"))
        .await
        .unwrap();
    let blob = pager.export_state(false, false).unwrap();

    let mut resumed = EntityPager::new(store);
    resumed.import_state(&blob).unwrap();

    let err = resumed.fetch_next(None).await.unwrap_err();
    assert!(matches!(err, Error::StructuralStateMismatch { .. }));

    resumed.restore_filters(vec!["rank>1".to_string()]).unwrap();
    let err = resumed
        .fetch_next_ordered(None, OrderedFetchOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::StructuralStateMismatch { .. }));

    let page = resumed.fetch_next(None).await.unwrap();
    assert_eq!(ids(&page), ["4", "5"]);
    assert_eq!(resumed.distinct_fetched_count(), 4);
}

#[tokio::test]
async fn test_unfiltered_export_without_filter_values_stays_continuable() {
    let store = store_with(6);
    let mut pager = EntityPager::new(store.clone());
    pager
        .start_listing(RESOURCE, ListParameters::new().limit(3))
        .await
        .unwrap();
    let blob = pager.export_state(false, false).unwrap();

    let mut resumed = EntityPager::new(store);
    resumed.import_state(&blob).unwrap();
    assert!(!resumed.state().unwrap().filters_redacted);
    assert!(resumed.restore_filters(Vec::new()).is_err());

    let err = resumed
        .fetch_next_ordered(None, OrderedFetchOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::StructuralStateMismatch { .. }));

    let page = resumed.fetch_next(None).await.unwrap();
    assert_eq!(ids(&page), ["4", "5", "6"]);
    assert_eq!(resumed.distinct_fetched_count(), 6);
}
