//! Writes made without a reachable backend

use crate::common::*;
use dieselsync::client::local_cache::CacheKey;
use dieselsync::client::offline::WriteStage;
use dieselsync::client::sync::NetworkInfo;
use dieselsync::shared::models::{
    AlertsData, DieselEntry, InventoryKind, InventorySnapshot, Machine, NewEntry, NewInventory, UsageUnit,
};
use dieselsync::shared::response::DataSource;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn fill(machine: &str, start: f64, end: f64, diesel: f64) -> NewEntry {
    NewEntry {
        machine_name: machine.to_string(),
        start_reading: start,
        end_reading: end,
        diesel_filled: diesel,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_offline_entry_is_cached_and_queued() {
    let backend = TestBackend::start().await;
    let h = harness(&backend, NetworkInfo::offline()).await;
    seed_machines(&h.engine, &[machine("EX-200", "KA01", UsageUnit::Hours, None)]).await;

    let response = h.engine.submit_entry(fill("ex-200", 100.0, 110.0, 80.0)).await;
    assert!(response.success, "{}", response.message);
    assert!(response.queued);
    let mutation_id = response.mutation_id.clone().unwrap();
    assert!(mutation_id.starts_with("entry_"));

    let record: DieselEntry = serde_json::from_value(response.record.unwrap()).unwrap();
    assert_eq!(record.machine_name, "EX-200");
    assert_eq!(record.usage, 10.0);
    assert_eq!(record.rate, 8.0);

    let logs = h.engine.get_logs(None).await;
    assert_eq!(logs.source, DataSource::Cache);
    assert_eq!(logs.data.len(), 1);
    assert_eq!(logs.data[0].id, record.id);

    let machines: Vec<Machine> = h.engine.cache().get(CacheKey::Machines).await.unwrap().unwrap();
    assert_eq!(machines[0].last_reading, Some(110.0));
    assert!(machines[0].updated_at.is_some());

    let status = h.engine.offline_queue_status().await;
    assert_eq!(status.count, 1);
    assert_eq!(status.items[0].id, mutation_id);

    let pending = h.engine.pending_writes().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].stage, WriteStage::Queued);
    assert_eq!(
        pending[0].history,
        vec![WriteStage::Validated, WriteStage::AppliedLocally, WriteStage::Queued]
    );
}

#[tokio::test]
async fn test_invalid_entry_touches_nothing() {
    let backend = TestBackend::start().await;
    let h = harness(&backend, NetworkInfo::offline()).await;

    let response = h.engine.submit_entry(fill("EX-200", 110.0, 110.0, 20.0)).await;
    assert!(!response.success);
    assert_eq!(response.field.as_deref(), Some("end_reading"));

    assert_eq!(h.engine.offline_queue_status().await.count, 0);
    let logs: Option<Vec<DieselEntry>> = h.engine.cache().get(CacheKey::Logs).await.unwrap();
    assert!(logs.is_none());
}

#[tokio::test]
async fn test_unknown_machine_rejected_when_list_cached() {
    let backend = TestBackend::start().await;
    let h = harness(&backend, NetworkInfo::offline()).await;
    seed_machines(&h.engine, &[machine("EX-200", "KA01", UsageUnit::Hours, None)]).await;

    let response = h.engine.submit_entry(fill("Grader 9", 1.0, 2.0, 3.0)).await;
    assert!(!response.success);
    assert_eq!(response.field.as_deref(), Some("machine_name"));
}

#[tokio::test]
async fn test_anomalous_rate_raises_local_alert() {
    let backend = TestBackend::start().await;
    let h = harness(&backend, NetworkInfo::offline()).await;
    seed_machines(&h.engine, &[machine("EX-200", "KA01", UsageUnit::Hours, Some(5.0))]).await;

    // 80 L over 10 hr is 8 L/hr against an expected 5 L/hr
    let response = h.engine.submit_entry(fill("EX-200", 100.0, 110.0, 80.0)).await;
    assert!(response.success);

    let alerts: AlertsData = h.engine.cache().get(CacheKey::Alerts).await.unwrap().unwrap();
    assert_eq!(alerts.alerts.len(), 1);
    assert_eq!(alerts.alerts[0].alert_type, "consumption_anomaly");
    assert_eq!(alerts.alerts[0].status, "open");

    // 52 L over 10 hr is within tolerance
    h.engine.submit_entry(fill("EX-200", 110.0, 120.0, 52.0)).await;
    let alerts: AlertsData = h.engine.cache().get(CacheKey::Alerts).await.unwrap().unwrap();
    assert_eq!(alerts.alerts.len(), 1);
}

#[tokio::test]
async fn test_distance_machines_rate_is_km_per_litre() {
    let backend = TestBackend::start().await;
    let h = harness(&backend, NetworkInfo::offline()).await;
    seed_machines(&h.engine, &[machine("Tipper 4", "KA02", UsageUnit::Kilometers, None)]).await;

    let response = h.engine.submit_entry(fill("Tipper 4", 48000.0, 48140.0, 40.0)).await;
    let record: DieselEntry = serde_json::from_value(response.record.unwrap()).unwrap();
    assert_eq!(record.usage, 140.0);
    assert_eq!(record.rate, 3.5);
}

#[tokio::test]
async fn test_stock_guard_uses_cached_balance() {
    let backend = TestBackend::start().await;
    let h = harness(&backend, NetworkInfo::offline()).await;

    let receipt = h
        .engine
        .add_inventory(NewInventory {
            kind: InventoryKind::In,
            litres: 500.0,
            note: None,
            receipt_number: Some("R-1".into()),
        })
        .await;
    assert!(receipt.success);

    let issue = NewInventory {
        kind: InventoryKind::Out,
        litres: 600.0,
        note: None,
        receipt_number: None,
    };
    let refused = h.engine.add_inventory(issue.clone()).await;
    assert!(!refused.success);
    assert_eq!(refused.field.as_deref(), Some("litres"));

    let issued = h.engine.add_inventory(NewInventory { litres: 200.0, ..issue }).await;
    assert!(issued.success);

    let snapshot: InventorySnapshot = h.engine.cache().get(CacheKey::Inventory).await.unwrap().unwrap();
    assert_eq!(snapshot.current_stock, 300.0);
    assert_eq!(snapshot.transactions.len(), 2);
    assert_eq!(h.engine.offline_queue_status().await.count, 2);
}

#[tokio::test]
async fn test_connected_write_is_sent_immediately() {
    let backend = TestBackend::start().await;
    backend.healthy().await;
    backend.accept_writes().await;
    let h = harness(&backend, NetworkInfo::online("wifi")).await;
    assert!(h.engine.check_connection().await);

    let response = h.engine.submit_entry(fill("EX-200", 1.0, 5.0, 12.0)).await;
    assert!(response.success);
    assert!(!response.queued);
    assert!(response.mutation_id.is_some());

    assert_eq!(backend.posted_actions().await, vec!["submitEntryEnhanced"]);
    assert_eq!(h.engine.offline_queue_status().await.count, 0);
    assert!(h.engine.pending_writes().await.is_empty());
}

#[tokio::test]
async fn test_refused_immediate_write_is_queued_without_going_offline() {
    let backend = TestBackend::start().await;
    backend.healthy().await;
    backend.reject_writes("Sheet is locked").await;
    let h = harness(&backend, NetworkInfo::online("wifi")).await;
    assert!(h.engine.check_connection().await);

    let response = h.engine.submit_entry(fill("EX-200", 1.0, 5.0, 12.0)).await;
    assert!(response.success);
    assert!(response.queued);

    assert!(h.engine.connection_status().await.is_connected);
    assert_eq!(h.engine.offline_queue_status().await.count, 1);
}

#[tokio::test]
async fn test_server_error_on_immediate_write_marks_disconnected() {
    let backend = TestBackend::start().await;
    backend.healthy().await;
    backend.fail_writes().await;
    let h = harness(&backend, NetworkInfo::online("wifi")).await;
    assert!(h.engine.check_connection().await);

    let response = h.engine.submit_entry(fill("EX-200", 1.0, 5.0, 12.0)).await;
    assert!(response.queued);

    let state = h.engine.connection_status().await;
    assert!(!state.is_connected);
    assert!(state.is_internet_reachable);
    assert!(state.error.unwrap().contains("500"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_write_confirmed_by_a_concurrent_drain_leaves_no_pending_record() {
    let backend = TestBackend::start().await;
    backend.healthy().await;
    backend.reject_next_write("Sheet is locked").await;
    backend.accept_writes().await;
    let h = harness(&backend, NetworkInfo::online("wifi")).await;
    assert!(h.engine.check_connection().await);

    let done = Arc::new(AtomicBool::new(false));
    let drainer = {
        let engine = h.engine.clone();
        let done = done.clone();
        tokio::spawn(async move {
            while !done.load(Ordering::SeqCst) {
                engine.drain_queue().await;
                tokio::task::yield_now().await;
            }
        })
    };

    let response = h.engine.submit_entry(fill("EX-200", 1.0, 5.0, 12.0)).await;
    assert!(response.queued);
    done.store(true, Ordering::SeqCst);
    drainer.await.unwrap();

    h.engine.drain_queue().await;
    assert_eq!(h.engine.offline_queue_status().await.count, 0);
    assert!(h.engine.pending_writes().await.is_empty());
}
