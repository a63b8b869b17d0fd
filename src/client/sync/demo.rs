//! Seeded sample data, shown only before this install has ever read real data.

use crate::client::sync::calculations::{compute_rate, compute_usage};
use crate::shared::models::{
    Alert, AlertsData, DieselEntry, Extra, InventoryEntry, InventoryKind, InventorySnapshot, Machine, UsageUnit,
};
use chrono::{Duration, Utc};

fn machine(name: &str, plate: &str, machine_type: &str, unit: UsageUnit, avg: f64, reading: f64) -> Machine {
    Machine {
        id: format!("demo-{}", plate.to_ascii_lowercase()),
        name: name.to_string(),
        plate: plate.to_string(),
        machine_type: machine_type.to_string(),
        unit,
        ownership: Some("Own".to_string()),
        standard_avg: Some(avg),
        initial_reading: 0.0,
        last_reading: Some(reading),
        status: Some("active".to_string()),
        created_at: None,
        updated_at: None,
        extra: Extra::new(),
    }
}

pub fn machines() -> Vec<Machine> {
    vec![
        machine("Excavator JCB-220", "DEMO-001", "Excavator", UsageUnit::Hours, 8.0, 1250.0),
        machine("Tipper Tata-2518", "DEMO-002", "Tipper", UsageUnit::Kilometers, 3.5, 48210.0),
        machine("Roller Hamm-3410", "DEMO-003", "Roller", UsageUnit::Hours, 5.0, 860.0),
    ]
}

fn entry(machine: &Machine, start: f64, end: f64, diesel: f64, hours_ago: i64) -> DieselEntry {
    let usage = compute_usage(start, end);
    DieselEntry {
        id: format!("demo-log-{}-{}", machine.plate.to_ascii_lowercase(), hours_ago),
        machine_name: machine.name.clone(),
        start_reading: start,
        end_reading: end,
        diesel_filled: diesel,
        usage,
        rate: compute_rate(machine.unit, usage, diesel),
        remarks: None,
        phone: None,
        image_url: None,
        timestamp: Utc::now() - Duration::hours(hours_ago),
        extra: Extra::new(),
    }
}

pub fn logs() -> Vec<DieselEntry> {
    let machines = machines();
    vec![
        entry(&machines[0], 1240.0, 1250.0, 80.0, 2),
        entry(&machines[1], 48070.0, 48210.0, 40.0, 5),
        entry(&machines[2], 852.0, 860.0, 52.0, 26),
    ]
}

pub fn inventory() -> InventorySnapshot {
    let mut snapshot = InventorySnapshot::default();
    for (id, kind, litres, hours_ago) in [
        ("demo-inv-1", InventoryKind::In, 2000.0, 72),
        ("demo-inv-2", InventoryKind::Out, 450.0, 48),
        ("demo-inv-3", InventoryKind::Out, 300.0, 6),
    ] {
        snapshot.record(InventoryEntry {
            id: id.to_string(),
            kind,
            litres,
            note: Some("Sample data".to_string()),
            receipt_number: None,
            timestamp: Utc::now() - Duration::hours(hours_ago),
            extra: Extra::new(),
        });
    }
    snapshot
}

pub fn alerts() -> AlertsData {
    AlertsData {
        alerts: vec![Alert {
            id: "demo-alert-1".to_string(),
            machine_name: "Roller Hamm-3410".to_string(),
            alert_type: crate::shared::models::alert::CONSUMPTION_ANOMALY.to_string(),
            message: "Consumption 6.50 L/hr is 30% above the expected 5.00 L/hr".to_string(),
            status: crate::shared::models::alert::STATUS_OPEN.to_string(),
            timestamp: Some(Utc::now() - Duration::hours(26)),
            extra: Extra::new(),
        }],
        extra: Extra::new(),
    }
}
