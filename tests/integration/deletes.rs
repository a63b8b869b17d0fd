//! Machine deletion guard, audit trail and restore

use crate::common::*;
use dieselsync::client::local_cache::CacheKey;
use dieselsync::client::sync::{DeleteOptions, NetworkInfo};
use dieselsync::shared::models::{Machine, MachineUpdate, NewEntry, NewMachine, UsageUnit};
use pretty_assertions::assert_eq;

async fn cached_machines(h: &Harness) -> Vec<Machine> {
    h.engine.cache().get(CacheKey::Machines).await.unwrap().unwrap_or_default()
}

#[tokio::test]
async fn test_referenced_machine_needs_confirmation() {
    let backend = TestBackend::start().await;
    let h = harness(&backend, NetworkInfo::offline()).await;
    seed_machines(&h.engine, &[machine("EX-200", "KA01", UsageUnit::Hours, None)]).await;
    for start in [100.0, 110.0] {
        h.engine
            .submit_entry(NewEntry {
                machine_name: "EX-200".into(),
                start_reading: start,
                end_reading: start + 10.0,
                diesel_filled: 50.0,
                ..Default::default()
            })
            .await;
    }

    let refused = h.engine.delete_machine("ex-200", DeleteOptions::default()).await;
    assert!(!refused.success);
    assert!(refused.requires_confirmation);
    assert_eq!(refused.reference_count, Some(2));
    assert_eq!(cached_machines(&h).await.len(), 1);
    assert_eq!(h.engine.offline_queue_status().await.count, 2);

    let deleted = h.engine.delete_machine("ex-200", DeleteOptions::forced()).await;
    assert!(deleted.success);
    assert!(deleted.queued);
    assert!(cached_machines(&h).await.is_empty());

    let audit = h.engine.deletion_audit().await;
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].machine_name, "EX-200");
    assert!(audit[0].forced);
    assert_eq!(audit[0].reference_count, 2);
    assert_eq!(audit[0].machine.as_ref().map(|m| m.plate.as_str()), Some("KA01"));
    assert_eq!(Some(audit[0].mutation_id.clone()), deleted.mutation_id);
}

#[tokio::test]
async fn test_deleting_unknown_machine_is_refused() {
    let backend = TestBackend::start().await;
    let h = harness(&backend, NetworkInfo::offline()).await;
    seed_machines(&h.engine, &[machine("EX-200", "KA01", UsageUnit::Hours, None)]).await;

    let response = h.engine.delete_machine("Grader 9", DeleteOptions::default()).await;
    assert!(!response.success);
    assert_eq!(response.field.as_deref(), Some("machine_name"));
    assert!(h.engine.deletion_audit().await.is_empty());
}

#[tokio::test]
async fn test_restore_re_adds_the_deleted_machine() {
    let backend = TestBackend::start().await;
    let h = harness(&backend, NetworkInfo::offline()).await;
    seed_machines(&h.engine, &[machine("EX-200", "KA01", UsageUnit::Hours, Some(6.0))]).await;

    assert!(h.engine.delete_machine("EX-200", DeleteOptions::default()).await.success);
    let restored = h.engine.restore_deleted_machine("ex-200").await;
    assert!(restored.success, "{}", restored.message);

    let machines = cached_machines(&h).await;
    assert_eq!(machines.len(), 1);
    assert_eq!(machines[0].plate, "KA01");
    assert_eq!(machines[0].standard_avg, Some(6.0));
    assert_ne!(machines[0].id, "m-ka01");

    let missing = h.engine.restore_deleted_machine("Grader 9").await;
    assert!(!missing.success);
}

#[tokio::test]
async fn test_add_and_update_machine_locally() {
    let backend = TestBackend::start().await;
    let h = harness(&backend, NetworkInfo::offline()).await;

    let added = h
        .engine
        .add_machine(NewMachine {
            name: "Loader 7".into(),
            plate: "KA07".into(),
            unit: UsageUnit::Hours,
            initial_reading: 40.0,
            ..Default::default()
        })
        .await;
    assert!(added.success);
    let duplicate = h
        .engine
        .add_machine(NewMachine {
            name: "loader 7".into(),
            plate: "KA99".into(),
            ..Default::default()
        })
        .await;
    assert_eq!(duplicate.field.as_deref(), Some("name"));

    let updated = h
        .engine
        .update_machine(
            "LOADER 7",
            MachineUpdate {
                standard_avg: Some(7.5),
                status: Some("maintenance".into()),
                ..Default::default()
            },
        )
        .await;
    assert!(updated.success);

    let machines = cached_machines(&h).await;
    assert_eq!(machines[0].last_reading, Some(40.0));
    assert_eq!(machines[0].standard_avg, Some(7.5));
    assert_eq!(machines[0].status.as_deref(), Some("maintenance"));
    assert_eq!(h.engine.offline_queue_status().await.count, 2);
}
