//! Read-through caching and its fallbacks

use crate::common::*;
use dieselsync::client::local_cache::CacheKey;
use dieselsync::client::sync::{ConnectionState, NetworkInfo};
use dieselsync::shared::models::{LogFilter, NewEntry};
use dieselsync::shared::response::DataSource;
use pretty_assertions::assert_eq;
use serde_json::json;

fn machines_body() -> serde_json::Value {
    json!({
        "success": true,
        "machines": [
            {"id": "m1", "name": "EX-200", "plate": "KA01", "unit": "hr", "standardAvg": 6.5, "site": "North"},
            {"id": "m2", "name": "Tipper 4", "plate": "KA02", "unitType": "km"}
        ]
    })
}

#[tokio::test]
async fn test_html_response_is_not_connected() {
    let backend = TestBackend::start().await;
    backend.serving_html().await;
    let h = harness(&backend, NetworkInfo::online("wifi")).await;

    assert!(!h.engine.check_connection().await);
    let state = h.engine.connection_status().await;
    assert!(state.is_internet_reachable);
    assert!(!state.is_connected);
    assert!(state.error.unwrap().contains("text/html"));

    // never seen real data: demo data, clearly labelled
    let machines = h.engine.get_machines().await;
    assert_eq!(machines.source, DataSource::Demo);
    assert!(!machines.data.is_empty());
}

#[tokio::test]
async fn test_remote_read_is_cached_then_served_offline() {
    let backend = TestBackend::start().await;
    backend.healthy().await;
    backend.on_get("getMachines", machines_body()).await;
    let h = harness(&backend, NetworkInfo::online("wifi")).await;
    assert!(h.engine.check_connection().await);

    let machines = h.engine.get_machines().await;
    assert_eq!(machines.source, DataSource::Remote);
    assert_eq!(machines.data.len(), 2);
    assert_eq!(machines.data[0].extra.get("site"), Some(&json!("North")));
    assert!(h.engine.connection_status().await.has_real_data);

    // backend gone: every call now 404s
    backend.reset().await;
    assert!(!h.engine.check_connection().await);

    let cached = h.engine.get_machines().await;
    assert_eq!(cached.source, DataSource::Cache);
    assert_eq!(cached.data, machines.data);

    // real data was seen once: an empty cache never falls back to demo data
    h.engine.cache().remove(CacheKey::Machines).await.unwrap();
    let empty = h.engine.get_machines().await;
    assert_eq!(empty.source, DataSource::Empty);
    assert!(empty.data.is_empty());

    h.engine.reset_real_data_flag().await;
    assert_eq!(h.engine.get_machines().await.source, DataSource::Demo);
}

#[tokio::test]
async fn test_failed_fetch_falls_back_to_cache() {
    let backend = TestBackend::start().await;
    backend.healthy().await;
    backend.on_get("getMachines", machines_body()).await;
    let h = harness(&backend, NetworkInfo::online("wifi")).await;
    assert!(h.engine.check_connection().await);
    h.engine.get_machines().await;

    backend.reset().await;
    backend.healthy().await;
    backend.on_get("getMachines", json!({"success": false, "message": "Quota exceeded"})).await;

    let machines = h.engine.get_machines().await;
    assert_eq!(machines.source, DataSource::Cache);
    assert_eq!(machines.error.as_deref(), Some("Quota exceeded"));
    assert_eq!(machines.data.len(), 2);
}

#[tokio::test]
async fn test_pending_writes_overlay_remote_reads() {
    let backend = TestBackend::start().await;
    backend.healthy().await;
    backend.reject_writes("Busy").await;
    backend
        .on_get(
            "getLogsEnhanced",
            json!({"success": true, "logs": [{
                "id": "r1", "machineName": "Tipper 4", "startReading": 10.0, "endReading": 30.0,
                "dieselFilled": 5.0, "usage": 20.0, "rate": 4.0, "timestamp": "2026-01-05T08:00:00Z"
            }]}),
        )
        .await;
    let h = harness(&backend, NetworkInfo::online("wifi")).await;
    assert!(h.engine.check_connection().await);

    let response = h
        .engine
        .submit_entry(NewEntry {
            machine_name: "EX-200".into(),
            start_reading: 1.0,
            end_reading: 3.0,
            diesel_filled: 10.0,
            ..Default::default()
        })
        .await;
    assert!(response.queued);

    let logs = h.engine.get_logs(None).await;
    assert_eq!(logs.source, DataSource::Remote);
    assert_eq!(logs.data.len(), 2);
    assert!(logs.data.iter().any(|log| log.machine_name == "EX-200" && log.rate == 5.0));

    let filtered = h.engine.get_logs(Some(LogFilter::for_machine("tipper 4"))).await;
    assert_eq!(filtered.data.len(), 1);
    assert_eq!(filtered.data[0].id, "r1");
}

#[tokio::test]
async fn test_inventory_and_alert_reads() {
    let backend = TestBackend::start().await;
    backend.healthy().await;
    backend
        .on_get(
            "getInventory",
            json!({"success": true, "currentStock": 750.0, "transactions": [
                {"id": "t1", "type": "IN", "litres": 1000.0, "timestamp": "2026-01-01T00:00:00Z"},
                {"id": "t2", "type": "OUT", "litres": 250.0, "timestamp": "2026-01-02T00:00:00Z"}
            ]}),
        )
        .await;
    backend
        .on_get(
            "getAlertsData",
            json!({"success": true, "alerts": [{"id": "a1", "machineName": "EX-200", "status": "open"}], "summary": {"open": 1}}),
        )
        .await;
    let h = harness(&backend, NetworkInfo::online("wifi")).await;
    assert!(h.engine.check_connection().await);

    let inventory = h.engine.get_inventory().await;
    assert_eq!(inventory.source, DataSource::Remote);
    assert_eq!(inventory.data.current_stock, 750.0);

    let alerts = h.engine.get_alerts_data().await;
    assert_eq!(alerts.data.open_count(), 1);
    assert_eq!(alerts.data.extra.get("summary"), Some(&json!({"open": 1})));
}

#[tokio::test]
async fn test_connection_state_is_persisted() {
    let backend = TestBackend::start().await;
    backend.healthy().await;
    let h = harness(&backend, NetworkInfo::online("wifi")).await;
    assert!(h.engine.check_connection().await);

    let stored: ConnectionState = h.engine.cache().get(CacheKey::ConnectionStatus).await.unwrap().unwrap();
    assert!(stored.is_connected);
    assert!(stored.latency_ms.is_some());
    assert_eq!(stored.network_type.as_deref(), Some("wifi"));
}
