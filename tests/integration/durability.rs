//! Queued writes survive a restart of the process

use crate::common::*;
use dieselsync::client::local_cache::CacheStore;
use dieselsync::client::sync::NetworkInfo;
use dieselsync::shared::models::NewEntry;
use dieselsync::shared::response::DataSource;
use std::sync::Arc;

#[tokio::test]
async fn test_queue_and_cache_survive_reopen() {
    let backend = TestBackend::start().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("cache.db");

    let mutation_id = {
        let cache = Arc::new(CacheStore::open(&path).await.unwrap());
        let h = harness_with_cache(test_config(&backend.endpoint()), cache, NetworkInfo::offline()).await;
        let response = h
            .engine
            .submit_entry(NewEntry {
                machine_name: "EX-200".into(),
                start_reading: 10.0,
                end_reading: 18.0,
                diesel_filled: 40.0,
                ..Default::default()
            })
            .await;
        assert!(response.queued);
        response.mutation_id.unwrap()
    };

    let cache = Arc::new(CacheStore::open(&path).await.unwrap());
    let h = harness_with_cache(test_config(&backend.endpoint()), cache, NetworkInfo::offline()).await;

    let status = h.engine.offline_queue_status().await;
    assert_eq!(status.count, 1);
    assert_eq!(status.items[0].id, mutation_id);

    let logs = h.engine.get_logs(None).await;
    assert_eq!(logs.source, DataSource::Cache);
    assert_eq!(logs.data.len(), 1);
    assert_eq!(logs.data[0].rate, 5.0);

    // restored writes have no in-memory lifecycle, but still replay
    backend.healthy().await;
    backend.accept_writes().await;
    h.engine.start();
    h.network.publish(NetworkInfo::online("wifi"));

    let engine = h.engine.clone();
    let drained = eventually(|| {
        let engine = engine.clone();
        async move { engine.offline_queue_status().await.count == 0 }
    })
    .await;
    assert!(drained);
    assert_eq!(backend.posted_actions().await, vec!["submitEntryEnhanced"]);
}
