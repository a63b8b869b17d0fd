//! Property-based tests for the offline queue

use dieselsync::client::local_cache::CacheStore;
use dieselsync::client::offline::{MutationKind, OfflineQueue, RetryPolicy};
use proptest::prelude::*;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn kind() -> impl Strategy<Value = MutationKind> {
    prop::sample::select(MutationKind::ALL.to_vec())
}

fn queue(runtime: &tokio::runtime::Runtime) -> OfflineQueue {
    runtime.block_on(async {
        let cache = Arc::new(CacheStore::in_memory().await.unwrap());
        OfflineQueue::load(cache, RetryPolicy::default(), Duration::ZERO).await.unwrap()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_snapshot_is_in_replay_order(kinds in prop::collection::vec(kind(), 1..40)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let queue = queue(&runtime);
        let items = runtime.block_on(async {
            for (i, kind) in kinds.iter().enumerate() {
                queue.enqueue(*kind, json!({"n": i})).await.unwrap();
            }
            queue.snapshot().await
        });

        prop_assert_eq!(items.len(), kinds.len());
        for pair in items.windows(2) {
            prop_assert!(pair[0].priority >= pair[1].priority);
            if pair[0].priority == pair[1].priority {
                prop_assert!(pair[0].enqueued_at <= pair[1].enqueued_at);
            }
        }
    }

    #[test]
    fn test_ids_are_unique(kinds in prop::collection::vec(kind(), 1..200)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let queue = queue(&runtime);
        let ids: HashSet<String> = kinds.iter().map(|kind| queue.generate_id(*kind)).collect();
        prop_assert_eq!(ids.len(), kinds.len());
        for kind in &kinds {
            let prefix = format!("{}_", kind.as_str());
            prop_assert!(ids.iter().any(|id| id.starts_with(&prefix)));
        }
    }
}
