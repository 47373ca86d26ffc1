//! Tests for the per-project sequence counter
//!
//! Covers concurrent uniqueness, batch reservation, counter healing and the
//! failure paths of the atomic increment.

#[cfg(test)]
mod sequence_tests {
    use crate::db::{Collection, DocumentStore, Filter, MemoryStore};
    use crate::services::error::{ErrorKind, ServiceError};
    use crate::services::sequence_counter::SequenceCounter;
    use crate::services::test_support::{issue_doc, project_doc, FaultyStore};
    use futures::future::join_all;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    async fn store_with_project(sequence: Option<i64>) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .insert(Collection::Projects, project_doc("p1", "API", sequence))
            .await
            .unwrap();
        store
    }

    async fn stored_sequence(store: &MemoryStore) -> Option<i64> {
        store
            .find_one(Collection::Projects, &Filter::by_id("p1"))
            .await
            .unwrap()
            .and_then(|doc| doc.get("sequence").and_then(|v| v.as_i64()))
    }

    #[tokio::test]
    async fn test_next_starts_at_one_and_increments() {
        let store = store_with_project(Some(0)).await;
        let counter = SequenceCounter::new(store.clone());

        assert_eq!(counter.next("p1").await.unwrap(), 1);
        assert_eq!(counter.next("p1").await.unwrap(), 2);
        assert_eq!(counter.next("p1").await.unwrap(), 3);
        assert_eq!(stored_sequence(&store).await, Some(3));
    }

    #[tokio::test]
    async fn test_concurrent_next_is_distinct_and_gapless() {
        let store = store_with_project(Some(0)).await;
        let counter = SequenceCounter::new(store);

        let results = join_all((0..50).map(|_| counter.next("p1"))).await;
        let numbers: Vec<i64> = results.into_iter().map(|r| r.unwrap()).collect();

        let unique: HashSet<i64> = numbers.iter().copied().collect();
        assert_eq!(unique.len(), 50);
        assert_eq!(unique, (1..=50).collect::<HashSet<i64>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_next_across_counters() {
        // Two counters model two processes sharing one store; only the
        // store's atomic increment keeps them apart.
        let store = store_with_project(Some(0)).await;
        let first = Arc::new(SequenceCounter::new(store.clone()));
        let second = Arc::new(SequenceCounter::new(store));

        let mut handles = Vec::new();
        for i in 0..40 {
            let counter = if i % 2 == 0 { first.clone() } else { second.clone() };
            handles.push(tokio::spawn(async move { counter.next("p1").await }));
        }

        let mut numbers = HashSet::new();
        for handle in handles {
            assert!(numbers.insert(handle.await.unwrap().unwrap()));
        }
        assert_eq!(numbers, (1..=40).collect::<HashSet<i64>>());
    }

    #[tokio::test]
    async fn test_reserve_batch_then_next() {
        let store = store_with_project(Some(0)).await;
        let counter = SequenceCounter::new(store);

        let reserved = counter.reserve_batch("p1", 5).await.unwrap();
        assert_eq!(reserved, vec![1, 2, 3, 4, 5]);
        assert_eq!(counter.next("p1").await.unwrap(), 6);

        let reserved = counter.reserve_batch("p1", 3).await.unwrap();
        assert_eq!(reserved, vec![7, 8, 9]);
    }

    #[tokio::test]
    async fn test_concurrent_reservations_are_disjoint() {
        let store = store_with_project(Some(0)).await;
        let counter = SequenceCounter::new(store);

        let ranges = join_all((0..10).map(|_| counter.reserve_batch("p1", 4))).await;
        let mut all = HashSet::new();
        for range in ranges {
            let range = range.unwrap();
            assert_eq!(range.len(), 4);
            assert!(range.windows(2).all(|w| w[1] == w[0] + 1));
            for n in range {
                assert!(all.insert(n), "number {} handed out twice", n);
            }
        }
        assert_eq!(all.len(), 40);
    }

    #[tokio::test]
    async fn test_reserve_zero_is_rejected() {
        let store = store_with_project(Some(0)).await;
        let counter = SequenceCounter::new(store.clone());

        let err = counter.reserve_batch("p1", 0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(store.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_heals_missing_counter_from_existing_issues() {
        let store = store_with_project(None).await;
        for n in [3, 7, 5] {
            let identifier = format!("API-{}", n);
            store
                .insert(
                    Collection::Issues,
                    issue_doc(&format!("i{}", n), "p1", &identifier, n, None, 0),
                )
                .await
                .unwrap();
        }

        let counter = SequenceCounter::new(store.clone());
        assert_eq!(counter.next("p1").await.unwrap(), 8);
        assert_eq!(stored_sequence(&store).await, Some(8));
    }

    #[tokio::test]
    async fn test_heals_counter_behind_existing_issues() {
        let store = store_with_project(Some(2)).await;
        store
            .insert(
                Collection::Issues,
                issue_doc("i9", "p1", "API-9", 9, None, 0),
            )
            .await
            .unwrap();

        let counter = SequenceCounter::new(store);
        assert_eq!(counter.reserve_batch("p1", 2).await.unwrap(), vec![10, 11]);
    }

    #[tokio::test]
    async fn test_healing_never_lowers_counter() {
        let store = store_with_project(Some(20)).await;
        store
            .insert(
                Collection::Issues,
                issue_doc("i4", "p1", "API-4", 4, None, 0),
            )
            .await
            .unwrap();

        let counter = SequenceCounter::new(store);
        assert_eq!(counter.next("p1").await.unwrap(), 21);
    }

    #[tokio::test]
    async fn test_concurrent_healing_stays_unique() {
        let store = store_with_project(None).await;
        store
            .insert(
                Collection::Issues,
                issue_doc("i6", "p1", "API-6", 6, None, 0),
            )
            .await
            .unwrap();

        let counter = SequenceCounter::with_ttl(store, Duration::ZERO);
        let results = join_all((0..20).map(|_| counter.next("p1"))).await;
        let numbers: HashSet<i64> = results.into_iter().map(|r| r.unwrap()).collect();

        assert_eq!(numbers, (7..=26).collect::<HashSet<i64>>());
    }

    #[tokio::test]
    async fn test_missing_project_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let counter = SequenceCounter::new(store);

        let err = counter.next("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_non_numeric_increment_is_sequence_error() {
        let store = FaultyStore::new();
        store
            .insert(Collection::Projects, project_doc("p1", "API", Some(0)))
            .await
            .unwrap();
        store.override_increment(json!("seven"));

        let counter = SequenceCounter::new(store.clone());
        let err = counter.next("p1").await.unwrap_err();
        assert!(matches!(err, ServiceError::Sequence { .. }));

        store.override_increment(json!(null));
        let err = counter.reserve_batch("p1", 3).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Sequence);
    }

    #[tokio::test]
    async fn test_cache_tracks_last_value_and_invalidates() {
        let store = store_with_project(Some(0)).await;
        let counter = SequenceCounter::new(store);

        assert_eq!(counter.cached_value("p1").await, None);
        counter.next("p1").await.unwrap();
        counter.next("p1").await.unwrap();
        assert_eq!(counter.cached_value("p1").await, Some(2));

        counter.invalidate("p1").await;
        assert_eq!(counter.cached_value("p1").await, None);
    }

    #[tokio::test]
    async fn test_zero_ttl_disables_cache() {
        let store = store_with_project(Some(0)).await;
        let counter = SequenceCounter::with_ttl(store, Duration::ZERO);

        counter.next("p1").await.unwrap();
        assert_eq!(counter.cached_value("p1").await, None);
    }

    #[tokio::test]
    async fn test_deleted_project_drops_cache_entry() {
        let store = store_with_project(Some(0)).await;
        let counter = SequenceCounter::new(store.clone());
        counter.next("p1").await.unwrap();

        store.remove(Collection::Projects, "p1").await.unwrap();
        let err = counter.next("p1").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(counter.cached_value("p1").await, None);
    }

    #[tokio::test]
    async fn test_expired_entries_are_pruned() {
        let store = store_with_project(Some(0)).await;
        store
            .insert(Collection::Projects, project_doc("p2", "WEB", Some(0)))
            .await
            .unwrap();
        let counter = SequenceCounter::with_ttl(store, Duration::from_millis(50));

        counter.next("p1").await.unwrap();
        counter.next("p2").await.unwrap();
        assert_eq!(counter.cache_len().await, 2);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(counter.cached_value("p2").await, None);

        // Re-verifying p1 drops the stale p2 entry
        assert_eq!(counter.next("p1").await.unwrap(), 2);
        assert_eq!(counter.cache_len().await, 1);
        assert_eq!(counter.cached_value("p1").await, Some(2));
    }
}
