//! Queue replay once the backend comes back

use crate::common::*;
use dieselsync::client::local_cache::CacheStore;
use dieselsync::client::offline::DrainSkip;
use dieselsync::client::sync::{DeleteOptions, NetworkInfo};
use dieselsync::shared::config::BackoffStrategy;
use dieselsync::shared::models::{MachineUpdate, NewEntry};
use std::sync::Arc;
use std::time::Duration;
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

fn entry(start: f64) -> NewEntry {
    NewEntry {
        machine_name: "EX-200".into(),
        start_reading: start,
        end_reading: start + 4.0,
        diesel_filled: 20.0,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_drain_replays_by_priority_then_age() {
    let backend = TestBackend::start().await;
    let h = harness(&backend, NetworkInfo::offline()).await;

    // enqueued lowest priority first
    h.engine.delete_machine("Old Roller", DeleteOptions::default()).await;
    h.engine.update_alert_status("alert-1", "resolved").await;
    h.engine
        .update_machine(
            "EX-200",
            MachineUpdate {
                standard_avg: Some(6.0),
                ..Default::default()
            },
        )
        .await;
    h.engine.submit_entry(entry(1.0)).await;
    h.engine.submit_entry(entry(5.0)).await;
    assert_eq!(h.engine.offline_queue_status().await.count, 5);

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

    assert_eq!(
        backend.posted_actions().await,
        vec![
            "submitEntryEnhanced",
            "submitEntryEnhanced",
            "editMachine",
            "updateAlertStatus",
            "deleteMachine"
        ]
    );
    assert!(h.engine.pending_writes().await.is_empty());
    h.engine.shutdown();
}

#[tokio::test]
async fn test_reconnect_replays_items_still_backing_off() {
    let backend = TestBackend::start().await;
    backend.healthy().await;
    backend.fail_writes().await;
    let config = test_config_builder(&backend.endpoint())
        .backoff(BackoffStrategy::Fixed {
            interval: Duration::from_secs(3600),
        })
        .build()
        .unwrap();
    let cache = Arc::new(CacheStore::in_memory().await.unwrap());
    let h = harness_with_cache(config, cache, NetworkInfo::online("wifi")).await;

    assert!(h.engine.check_connection().await);
    assert!(h.engine.submit_entry(entry(1.0)).await.queued);
    assert!(h.engine.check_connection().await);
    assert_eq!(h.engine.drain_queue().await.retrying, 1);

    let status = h.engine.offline_queue_status().await;
    assert_eq!(status.items[0].retry_count, 1);
    assert!(status.items[0].next_attempt_at.is_some());
    assert!(!h.engine.connection_status().await.is_connected);

    backend.reset().await;
    backend.healthy().await;
    backend.accept_writes().await;
    h.engine.start();

    h.network.publish(NetworkInfo::offline());
    let engine = h.engine.clone();
    let offline = eventually(|| {
        let engine = engine.clone();
        async move { !engine.connection_status().await.is_internet_reachable }
    })
    .await;
    assert!(offline);

    h.network.publish(NetworkInfo::online("wifi"));
    let engine = h.engine.clone();
    let drained = eventually(|| {
        let engine = engine.clone();
        async move { engine.offline_queue_status().await.count == 0 }
    })
    .await;
    assert!(drained);
    assert_eq!(backend.posted_actions().await, vec!["submitEntryEnhanced"]);
    h.engine.shutdown();
}

#[tokio::test]
async fn test_network_lost_during_debounce_skips_the_liveness_check() {
    let backend = TestBackend::start().await;
    backend.healthy().await;
    let config = test_config_builder(&backend.endpoint())
        .reconnect_debounce(Duration::from_millis(300))
        .build()
        .unwrap();
    let cache = Arc::new(CacheStore::in_memory().await.unwrap());
    let h = harness_with_cache(config, cache, NetworkInfo::offline()).await;
    h.engine.start();
    tokio::time::sleep(Duration::from_millis(20)).await;

    h.network.publish(NetworkInfo::online("wifi"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.network.publish(NetworkInfo::offline());

    let engine = h.engine.clone();
    let applied = eventually(|| {
        let engine = engine.clone();
        async move { !engine.connection_status().await.is_internet_reachable }
    })
    .await;
    assert!(applied);

    tokio::time::sleep(Duration::from_millis(400)).await;
    let requests = backend.server.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty(), "unexpected calls: {}", requests.len());
    assert!(!h.engine.connection_status().await.is_connected);
    h.engine.shutdown();
}

#[tokio::test]
async fn test_drain_is_a_noop_offline_or_empty() {
    let backend = TestBackend::start().await;
    let h = harness(&backend, NetworkInfo::offline()).await;

    let report = h.engine.drain_queue().await;
    assert_matches!(report.skipped, Some(DrainSkip::Empty));

    h.engine.submit_entry(entry(1.0)).await;
    let report = h.engine.drain_queue().await;
    assert_matches!(report.skipped, Some(DrainSkip::Offline));
    assert_eq!(report.remaining, 1);
    assert!(backend.posted_actions().await.is_empty());
}

#[tokio::test]
async fn test_exhausted_mutation_moves_to_failed_and_can_be_retried() {
    let backend = TestBackend::start().await;
    backend.healthy().await;
    backend.reject_writes("Row locked").await;
    let h = harness(&backend, NetworkInfo::online("wifi")).await;
    assert!(h.engine.check_connection().await);

    let response = h.engine.submit_entry(entry(1.0)).await;
    assert!(response.queued);

    for _ in 0..4 {
        let report = h.engine.drain_queue().await;
        assert_eq!(report.retrying, 1);
    }
    let status = h.engine.offline_queue_status().await;
    assert_eq!(status.count, 1);
    assert_eq!(status.items[0].retry_count, 4);
    assert_eq!(status.items[0].last_error.as_deref(), Some("Row locked"));

    let report = h.engine.drain_queue().await;
    assert_eq!(report.exhausted.len(), 1);
    let status = h.engine.offline_queue_status().await;
    assert_eq!(status.count, 0);
    assert_eq!(status.failed, 1);
    assert!(h.engine.pending_writes().await.is_empty());

    backend.reset().await;
    backend.healthy().await;
    backend.accept_writes().await;

    let report = h.engine.retry_failed_items().await;
    assert_eq!(report.replayed.len(), 1);
    let status = h.engine.offline_queue_status().await;
    assert_eq!((status.count, status.failed), (0, 0));
    assert_eq!(status.metrics.exhausted, 1);
}

#[tokio::test]
async fn test_deletes_have_a_smaller_budget() {
    let backend = TestBackend::start().await;
    backend.healthy().await;
    backend.reject_writes("Machine in use").await;
    let h = harness(&backend, NetworkInfo::online("wifi")).await;
    assert!(h.engine.check_connection().await);

    h.engine.delete_machine("Old Roller", DeleteOptions::forced()).await;
    for _ in 0..3 {
        h.engine.drain_queue().await;
    }
    let status = h.engine.offline_queue_status().await;
    assert_eq!((status.count, status.failed), (0, 1));
}

#[tokio::test]
async fn test_clear_queue_drops_pending_and_failed() {
    let backend = TestBackend::start().await;
    let h = harness(&backend, NetworkInfo::offline()).await;
    h.engine.submit_entry(entry(1.0)).await;
    h.engine.submit_entry(entry(5.0)).await;

    let response = h.engine.clear_offline_queue().await;
    assert!(response.success);
    assert_eq!(response.message, "Cleared 2 pending and 0 failed changes");
    assert_eq!(h.engine.offline_queue_status().await.count, 0);
    assert!(h.engine.pending_writes().await.is_empty());
}

#[tokio::test]
async fn test_connection_listeners_see_reconnect() {
    let backend = TestBackend::start().await;
    backend.healthy().await;
    let h = harness(&backend, NetworkInfo::offline()).await;

    let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = seen.clone();
    let handle = h.engine.add_connection_listener(move |state| {
        sink.lock().unwrap().push(state.is_connected);
    });

    h.engine.start();
    h.network.publish(NetworkInfo::online("cellular"));

    let engine = h.engine.clone();
    let connected = eventually(|| {
        let engine = engine.clone();
        async move { engine.connection_status().await.is_connected }
    })
    .await;
    assert!(connected);
    assert!(seen.lock().unwrap().contains(&true));
    assert_eq!(h.engine.connection_status().await.network_type.as_deref(), Some("cellular"));

    handle.unsubscribe();
    h.engine.shutdown();
}
